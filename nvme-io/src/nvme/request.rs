//! Command descriptors.
//!
//! A [`Request`] is one unit of work for the transport: a built
//! [`NvmeCmd`], the payload window it transfers and the callback to run when
//! it completes. It is the only type a [`Qpair`](super::Qpair) accepts.
//!
//! An [`IoRequest`] is what the `build_*` methods return: either a single
//! [`Request`], or a split parent whose children cover its LBA range. The
//! only way to submit one is [`submit_request`](super::submit_request), which
//! hands the children, never the parent, to the transport.

use std::fmt;
use std::rc::Rc;

use crate::dma::Payload;

use super::cmd::{NvmeCmd, Opcode};
use super::cpl::Status;
use super::tracker::Aggregate;

/// Completion callback. Context is whatever the closure captures.
pub type IoCallback = Box<dyn FnOnce(Status) + 'static>;

/// One physical command.
///
/// Created only by this crate, so everything a transport receives is a
/// complete command with its own payload window.
///
/// # Thread Safety
///
/// `!Send + !Sync`. Requests are built, submitted and completed on the same
/// poll thread.
pub struct Request {
    cmd: NvmeCmd,
    lba: u64,
    lba_count: u32,
    payload: Option<Payload>,
    cb: Option<IoCallback>,
    pub(super) parent: Option<Rc<Aggregate>>,
}

impl Request {
    pub(crate) fn new(
        cmd: NvmeCmd,
        lba: u64,
        lba_count: u32,
        payload: Option<Payload>,
        cb: Option<IoCallback>,
    ) -> Self {
        Self {
            cmd,
            lba,
            lba_count,
            payload,
            cb,
            parent: None,
        }
    }

    /// The encoded command.
    pub fn cmd(&self) -> &NvmeCmd {
        &self.cmd
    }

    /// Opcode.
    pub fn opcode(&self) -> Opcode {
        self.cmd.opc
    }

    /// Target namespace identifier.
    pub fn nsid(&self) -> u32 {
        self.cmd.nsid
    }

    /// Starting LBA (0 for commands without an LBA range).
    pub fn lba(&self) -> u64 {
        self.lba
    }

    /// Number of logical blocks (0 for commands without an LBA range).
    pub fn lba_count(&self) -> u32 {
        self.lba_count
    }

    /// Payload window, if the command transfers data.
    pub fn payload(&self) -> Option<Payload> {
        self.payload
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload.map_or(0, |p| p.len())
    }

    /// True if this request reports into a split parent.
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Deliver the final status of this command.
    ///
    /// Called by the transport exactly once per submitted request. Consumes
    /// and releases the request; a child reports into its parent instead of
    /// running a caller callback.
    pub fn complete(mut self, status: Status) {
        if let Some(parent) = self.parent.take() {
            parent.child_complete(self.lba, self.lba_count, status);
        } else if let Some(cb) = self.cb.take() {
            cb(status);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("cmd", &self.cmd)
            .field("lba", &self.lba)
            .field("lba_count", &self.lba_count)
            .field("payload", &self.payload)
            .field("is_child", &self.is_child())
            .finish()
    }
}

/// A built namespace command, not yet submitted.
///
/// Submit with [`submit_request`](super::submit_request). A transport cannot
/// take an `IoRequest` directly:
///
/// ```compile_fail
/// use nvme_io::nvme::{IoFlags, NullController, NullQpair, NvmeNamespace, NvmeNsOpts, Qpair};
/// use nvme_io::DmaBuf;
///
/// let ns = NvmeNamespace::new(&NullController::new(4096), &NvmeNsOpts::default()).unwrap();
/// let qpair = NullQpair::new();
/// let mut buf = DmaBuf::alloc(8192, 4096).unwrap();
/// let req = ns.build_write(buf.payload(), 0, 16, IoFlags::empty(), |_| {}).unwrap();
/// qpair.submit_request(req);
/// ```
pub struct IoRequest(Shape);

pub(super) enum Shape {
    Single(Request),
    Split(SplitParent),
}

/// Parent of a split read or write. Never reaches the transport.
pub(super) struct SplitParent {
    pub(super) cmd: NvmeCmd,
    pub(super) lba: u64,
    pub(super) lba_count: u32,
    pub(super) children: Vec<Request>,
    pub(super) cb: IoCallback,
}

impl IoRequest {
    pub(crate) fn single(req: Request) -> Self {
        Self(Shape::Single(req))
    }

    /// Split parent over `children`, which must cover `[lba, lba + lba_count)`
    /// contiguously in ascending order.
    pub(crate) fn split(
        cmd: NvmeCmd,
        lba: u64,
        lba_count: u32,
        children: Vec<Request>,
        cb: IoCallback,
    ) -> Self {
        debug_assert!(
            children
                .windows(2)
                .all(|w| w[0].lba + u64::from(w[0].lba_count) == w[1].lba)
        );
        debug_assert_eq!(
            children.iter().map(|c| u64::from(c.lba_count)).sum::<u64>(),
            u64::from(lba_count)
        );
        Self(Shape::Split(SplitParent {
            cmd,
            lba,
            lba_count,
            children,
            cb,
        }))
    }

    pub(super) fn into_shape(self) -> Shape {
        self.0
    }

    /// The encoded command.
    ///
    /// For a split parent only `opc` and `nsid` are meaningful.
    pub fn cmd(&self) -> &NvmeCmd {
        match &self.0 {
            Shape::Single(req) => req.cmd(),
            Shape::Split(parent) => &parent.cmd,
        }
    }

    /// Opcode.
    pub fn opcode(&self) -> Opcode {
        self.cmd().opc
    }

    /// Target namespace identifier.
    pub fn nsid(&self) -> u32 {
        self.cmd().nsid
    }

    /// Starting LBA (0 for commands without an LBA range).
    pub fn lba(&self) -> u64 {
        match &self.0 {
            Shape::Single(req) => req.lba(),
            Shape::Split(parent) => parent.lba,
        }
    }

    /// Number of logical blocks (0 for commands without an LBA range).
    pub fn lba_count(&self) -> u32 {
        match &self.0 {
            Shape::Single(req) => req.lba_count(),
            Shape::Split(parent) => parent.lba_count,
        }
    }

    /// Payload window. `None` for a split parent; its children carry the
    /// windows.
    pub fn payload(&self) -> Option<Payload> {
        match &self.0 {
            Shape::Single(req) => req.payload(),
            Shape::Split(_) => None,
        }
    }

    /// Payload size in bytes.
    pub fn payload_size(&self) -> usize {
        self.payload().map_or(0, |p| p.len())
    }

    /// Number of child requests. Zero means the request is submitted as is.
    pub fn num_children(&self) -> usize {
        self.children().len()
    }

    /// Children in submission (ascending LBA) order.
    pub fn children(&self) -> &[Request] {
        match &self.0 {
            Shape::Single(_) => &[],
            Shape::Split(parent) => &parent.children,
        }
    }
}

impl fmt::Debug for IoRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoRequest")
            .field("cmd", self.cmd())
            .field("lba", &self.lba())
            .field("lba_count", &self.lba_count())
            .field("payload", &self.payload())
            .field("children", &self.children())
            .finish()
    }
}
