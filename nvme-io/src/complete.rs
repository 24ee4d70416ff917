//! Callback-to-future utilities for NVMe commands.
//!
//! The command layer reports completions through callbacks invoked from the
//! qpair's poll loop. This module converts them to Rust futures using oneshot
//! channels.
//!
//! # Pattern
//!
//! 1. Create a completion pair with [`completion()`]
//! 2. Move the sender into the command callback
//! 3. In the callback, send the result
//! 4. Await the receiver while something polls the qpair

use std::future::Future;
use std::pin::{Pin, pin};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use futures_channel::oneshot;

use crate::error::{Error, Result};
use crate::nvme::{Qpair, Status};

/// Sender half of a completion pair.
pub struct CompletionSender<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> CompletionSender<T> {
    /// Send a result.
    pub fn complete(self, result: Result<T>) {
        // Ignore send error - receiver may have been dropped
        let _ = self.tx.send(result);
    }

    /// Send a successful value.
    pub fn success(self, value: T) {
        let _ = self.tx.send(Ok(value));
    }
}

impl CompletionSender<()> {
    /// Send the outcome of an NVMe command.
    pub fn status(self, status: Status) {
        self.complete(status.into_result());
    }
}

/// Receiver half of a completion pair.
///
/// Implements `Future` - await this to get the result.
pub struct CompletionReceiver<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for CompletionReceiver<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Create a completion sender/receiver pair.
pub fn completion<T>() -> (CompletionSender<T>, CompletionReceiver<T>) {
    let (tx, rx) = oneshot::channel();
    (CompletionSender { tx }, CompletionReceiver { rx })
}

/// Helper to create a completion for I/O operations that return `()` on success.
pub fn io_completion() -> (CompletionSender<()>, CompletionReceiver<()>) {
    completion()
}

/// A simple waker that does nothing - we poll manually.
struct NoopWaker;

impl Wake for NoopWaker {
    fn wake(self: Arc<Self>) {}
}

/// Block on a future, polling `qpair` while waiting.
///
/// This function runs the future to completion by repeatedly:
/// 1. Polling the future
/// 2. If pending, processing the qpair's completions
///
/// Command callbacks only fire when the qpair is polled, so a future waiting
/// on a command never resolves without this (or [`qpair_poller`](crate::qpair_poller)).
///
/// The future must only depend on completions from `qpair`; otherwise this
/// spins forever.
///
/// # Example
///
/// ```
/// use nvme_io::nvme::{NullController, NullQpair, NvmeNamespace, NvmeNsOpts};
/// use nvme_io::{DmaBuf, block_on};
///
/// # fn example() -> nvme_io::Result<()> {
/// let ns = NvmeNamespace::new(&NullController::default(), &NvmeNsOpts::default())?;
/// let qpair = NullQpair::new();
/// let mut buf = DmaBuf::alloc(512, 512)?;
///
/// // Block until I/O completes
/// block_on(ns.read(&qpair, buf.payload(), 0, 1), &qpair)?;
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn block_on<F, Q>(future: F, qpair: &Q) -> F::Output
where
    F: Future,
    Q: Qpair + ?Sized,
{
    let waker = Waker::from(Arc::new(NoopWaker));
    let mut cx = Context::from_waker(&waker);
    let mut future = pin!(future);

    loop {
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(result) => return result,
            Poll::Pending => {
                qpair.process_completions(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_success() {
        let (tx, rx) = completion::<i32>();
        tx.success(42);

        // Use noop waker to poll the future
        let waker = futures_task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut rx = rx;
        match Pin::new(&mut rx).poll(&mut cx) {
            Poll::Ready(Ok(v)) => assert_eq!(v, 42),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_completion_status_error() {
        let (tx, rx) = io_completion();
        tx.status(Status::INTERNAL_DEVICE_ERROR);

        let waker = futures_task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut rx = rx;
        match Pin::new(&mut rx).poll(&mut cx) {
            Poll::Ready(Err(Error::NvmeError { sct: 0, sc: 0x06 })) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_dropped_sender_cancels() {
        let (tx, rx) = io_completion();
        drop(tx);

        let waker = futures_task::noop_waker();
        let mut cx = Context::from_waker(&waker);

        let mut rx = rx;
        match Pin::new(&mut rx).poll(&mut cx) {
            Poll::Ready(Err(Error::Cancelled)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }
}
