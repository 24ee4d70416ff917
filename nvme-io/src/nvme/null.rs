//! Null transport.
//!
//! A controller and queue pair that perform no data transfer, like SPDK's
//! null bdev. Every submitted request is queued and completed successfully
//! on the next [`process_completions`](Qpair::process_completions) call.
//! Useful for tests and for exercising the command layer without hardware.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::cmd::NvmeCmd;
use super::controller::Controller;
use super::cpl::Status;
use super::qpair::Qpair;
use super::request::Request;

/// Default maximum transfer size (128 KiB).
pub const DEFAULT_MAX_XFER_SIZE: u32 = 128 * 1024;

/// Controller with a fixed maximum transfer size.
#[derive(Debug, Clone, Copy)]
pub struct NullController {
    max_xfer_size: u32,
}

impl NullController {
    /// Controller reporting `max_xfer_size` bytes per command.
    pub fn new(max_xfer_size: u32) -> Self {
        Self { max_xfer_size }
    }
}

impl Default for NullController {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_XFER_SIZE)
    }
}

impl Controller for NullController {
    fn max_xfer_size(&self) -> u32 {
        self.max_xfer_size
    }
}

/// Queue pair that completes every request with success, in FIFO order.
///
/// Each [`process_completions`](Qpair::process_completions) call reaps only
/// the requests pending when it started.
///
/// Submitted commands are also recorded so callers can inspect what reached
/// the "hardware". Pending requests can be taken out with
/// [`take_pending`](Self::take_pending) and completed by hand, in any order
/// and with any status.
#[derive(Debug, Default)]
pub struct NullQpair {
    pending: RefCell<VecDeque<Request>>,
    submitted: RefCell<Vec<NvmeCmd>>,
}

impl NullQpair {
    /// Create an empty queue pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of submitted but not yet completed requests.
    pub fn num_pending(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Every command submitted so far, in submission order.
    pub fn submitted(&self) -> Vec<NvmeCmd> {
        self.submitted.borrow().clone()
    }

    /// Remove all pending requests without completing them.
    ///
    /// The caller takes over the obligation to call [`Request::complete`].
    pub fn take_pending(&self) -> Vec<Request> {
        self.pending.borrow_mut().drain(..).collect()
    }
}

impl Qpair for NullQpair {
    fn submit_request(&self, req: Request) {
        self.submitted.borrow_mut().push(*req.cmd());
        self.pending.borrow_mut().push_back(req);
    }

    fn process_completions(&self, max_completions: u32) -> usize {
        // requests submitted by callbacks wait for the next call
        let ready = self.pending.borrow().len();
        let limit = match max_completions {
            0 => ready,
            n => ready.min(n as usize),
        };

        for _ in 0..limit {
            // borrow released before the callback can resubmit
            let next = self.pending.borrow_mut().pop_front();
            let Some(req) = next else {
                break;
            };
            req.complete(Status::SUCCESS);
        }
        limit
    }
}
