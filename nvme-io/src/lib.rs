//! NVMe namespace I/O for poll-mode userspace drivers
//!
//! This crate sits between a logical namespace read/write/flush/deallocate
//! and the physical commands handed to a controller's I/O queue pair. Reads
//! and writes larger than the controller's maximum transfer size, or crossing
//! a stripe boundary, are transparently split; the caller still receives
//! exactly one completion. Nothing blocks: completions arrive from the
//! qpair's poll loop.
//!
//! # Quick Start
//!
//! ```
//! use nvme_io::nvme::{IoFlags, NullController, NullQpair, NvmeNamespace, NvmeNsOpts, Qpair};
//! use nvme_io::{DmaBuf, Result};
//!
//! fn main() -> Result<()> {
//!     let ns = NvmeNamespace::new(&NullController::default(), &NvmeNsOpts::default())?;
//!     let qpair = NullQpair::new();
//!
//!     let mut buf = DmaBuf::alloc(4096, 4096)?;
//!     ns.submit_write(&qpair, buf.payload(), 0, 8, IoFlags::FUA, |status| {
//!         println!("write done: {:?}", status);
//!     })?;
//!
//!     // Completions are delivered while polling
//!     qpair.process_completions(0);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`nvme`] - Namespace commands, splitting and completion aggregation
//! - [`complete`] - Callback-to-future utilities
//! - [`dma`] - Aligned buffers and payload handles
//! - [`poller`] - Qpair poller integration for async executors
//! - [`error`] - Error types

pub mod complete;
pub mod dma;
pub mod error;
pub mod nvme;
pub mod poller;

// Re-exports
pub use complete::{CompletionReceiver, CompletionSender, block_on, completion, io_completion};
pub use dma::{DmaBuf, Payload};
pub use error::{Error, Result};
pub use poller::{qpair_poller, qpair_poller_limited};
