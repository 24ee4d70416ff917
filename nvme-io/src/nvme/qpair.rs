//! NVMe I/O queue pair interface.
//!
//! The queue pair is the submission gateway: requests are handed over and
//! control returns immediately, completions are delivered later from the
//! qpair's own poll loop by calling [`Request::complete`].

use super::request::Request;

/// An I/O submission/completion queue pair provided by a transport.
///
/// Implementations are single-threaded: `submit_request` and
/// `process_completions` are called from one poll thread and take `&self`
/// so that completion callbacks may submit follow-up I/O on the same qpair.
///
/// Every [`Request`] is a single physical command. Split reads and writes
/// are unpacked by [`submit_request`](super::submit_request) before their
/// children get here.
///
/// # Contract
///
/// Every request passed to `submit_request` must eventually be completed
/// exactly once via [`Request::complete`], from within
/// `process_completions`. Implementations must not hold internal borrows
/// while calling `complete`.
///
/// # Example
///
/// ```
/// use nvme_io::nvme::{NullQpair, Qpair};
///
/// let qpair = NullQpair::new();
///
/// // Reap everything that is ready
/// let completions = qpair.process_completions(0);
/// assert_eq!(completions, 0);
/// ```
pub trait Qpair {
    /// Submit one physical command. Fire-and-forget.
    fn submit_request(&self, req: Request);

    /// Process I/O completions.
    ///
    /// # Arguments
    ///
    /// * `max_completions` - Max completions to process (0 = unlimited)
    ///
    /// # Returns
    ///
    /// Number of completions processed.
    fn process_completions(&self, max_completions: u32) -> usize;
}
