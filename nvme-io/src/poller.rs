//! Qpair poller integration for async executors.
//!
//! Command completions are delivered synchronously during
//! [`Qpair::process_completions`]. To integrate with async executors, run the
//! polling as a task that yields when idle:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Local Executor                           │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────┐  │
//! │  │ App Task 1      │  │ App Task 2      │  │ Qpair Poller│  │
//! │  │ (I/O future)    │  │ (I/O future)    │  │ (this task) │  │
//! │  └────────┬────────┘  └────────┬────────┘  └──────┬──────┘  │
//! │           │                    │                   │         │
//! │           ▼                    ▼                   ▼         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │   qpair.process_completions() - runs command callbacks  ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use futures::executor::LocalPool;
//! use futures::task::LocalSpawnExt;
//! use nvme_io::nvme::{NullController, NullQpair, NvmeNamespace, NvmeNsOpts};
//! use nvme_io::{DmaBuf, qpair_poller_limited};
//! use std::rc::Rc;
//!
//! let ns = NvmeNamespace::new(&NullController::default(), &NvmeNsOpts::default()).unwrap();
//! let qpair = Rc::new(NullQpair::new());
//!
//! let mut pool = LocalPool::new();
//! let q = qpair.clone();
//! pool.spawner()
//!     .spawn_local(async move { qpair_poller_limited(&*q, 16).await })
//!     .unwrap();
//!
//! let mut buf = DmaBuf::alloc(512, 512).unwrap();
//! pool.run_until(ns.read(&*qpair, buf.payload(), 0, 1)).unwrap();
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::nvme::Qpair;

/// A future that yields once, then completes.
///
/// This allows other tasks to run before continuing.
struct YieldNow(bool);

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Yield to other tasks in the executor.
fn yield_now() -> YieldNow {
    YieldNow(false)
}

/// Qpair poller task for use with async executors.
///
/// This future never completes - it runs indefinitely, reaping completions
/// and yielding to other tasks when idle.
///
/// # How it works
///
/// 1. Calls `process_completions(0)` to run ready command callbacks
/// 2. If work was done, immediately polls again (busy polling)
/// 3. If no work was done, yields to let other tasks run
pub async fn qpair_poller<Q: Qpair + ?Sized>(qpair: &Q) {
    loop {
        let work_done = qpair.process_completions(0);
        if work_done == 0 {
            // No work done, yield to other tasks
            yield_now().await;
        }
        // If work was done, immediately poll again (hot path)
    }
}

/// Qpair poller task that runs for a limited number of iterations.
///
/// Useful for tests or finite workloads. Returns when `max_iters` is reached.
///
/// # Arguments
///
/// * `max_iters` - Maximum number of poll iterations (0 for infinite, same as `qpair_poller`)
pub async fn qpair_poller_limited<Q: Qpair + ?Sized>(qpair: &Q, max_iters: u64) {
    if max_iters == 0 {
        return qpair_poller(qpair).await;
    }

    for _ in 0..max_iters {
        let work_done = qpair.process_completions(0);
        if work_done == 0 {
            yield_now().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yield_now() {
        use futures_task::noop_waker;

        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut fut = yield_now();
        let mut fut = Pin::new(&mut fut);

        // First poll returns Pending
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        // Second poll returns Ready
        assert!(fut.as_mut().poll(&mut cx).is_ready());
    }
}
