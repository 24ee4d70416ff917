//! NVMe namespace command layer.
//!
//! Builds NVM command set requests for a namespace, splits reads and writes
//! that exceed the controller's transfer limit or cross a stripe boundary,
//! and aggregates the split commands' completions into one callback.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  NvmeNamespace   │  ← build_* / submit_* / async read, write, ...
//! └────────┬─────────┘
//!          │ SplitPlan
//!          ▼
//! ┌──────────────────┐
//! │    IoRequest     │  ← one Request, or parent + children (ascending LBA)
//! └────────┬─────────┘
//!          │ submit_request (fan-out, first error wins on fan-in)
//!          ▼
//! ┌──────────────────┐
//! │      Qpair       │  ← transport: Request only, later Request::complete
//! └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use nvme_io::nvme::{NullController, NullQpair, NvmeNamespace, NvmeNsOpts};
//! use nvme_io::{DmaBuf, block_on};
//!
//! # fn example() -> nvme_io::Result<()> {
//! let ctrlr = NullController::new(128 * 1024);
//! let ns = NvmeNamespace::new(&ctrlr, &NvmeNsOpts::default())?;
//! let qpair = NullQpair::new();
//!
//! // 256 KiB write: two physical commands, one completion
//! let mut buf = DmaBuf::alloc_zeroed(256 * 1024, 4096)?;
//! block_on(ns.write(&qpair, buf.payload(), 0, 512), &qpair)?;
//! assert_eq!(qpair.submitted().len(), 2);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod cmd;
mod controller;
mod cpl;
mod namespace;
mod ns_cmd;
mod null;
mod opts;
mod qpair;
mod request;
mod split;
mod tracker;

pub use cmd::{
    DSM_ATTR_DEALLOCATE, DSM_MAX_RANGES, DsmRange, IoFlags, MAX_LBA_COUNT_PER_CMD, NvmeCmd,
    Opcode,
};
pub use controller::Controller;
pub use cpl::Status;
pub use namespace::NvmeNamespace;
pub use null::{DEFAULT_MAX_XFER_SIZE, NullController, NullQpair};
pub use opts::NvmeNsOpts;
pub use qpair::Qpair;
pub use request::{IoCallback, IoRequest, Request};
pub use split::{Segment, SplitPlan};
pub use tracker::submit_request;
