//! Fan-out/fan-in of split requests.
//!
//! An unsplit request goes straight to the qpair. A split parent is unpacked:
//! its caller callback moves into a shared [`Aggregate`], every child gets a
//! back-reference to it and is submitted in ascending LBA order. Each child
//! completion decrements the outstanding count; the first error seen is kept.
//! When the count reaches zero the caller callback runs once with the
//! aggregated status. The aggregate is freed when the last child is released.
//!
//! Completions may arrive in any order. No child is retried or cancelled.

use std::cell::Cell;
use std::rc::Rc;

use super::cmd::Opcode;
use super::cpl::Status;
use super::qpair::Qpair;
use super::request::{IoCallback, IoRequest, Shape, SplitParent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AggregateState {
    ChildrenSubmitted,
    Aggregated,
}

/// Completion state shared by the children of one split request.
pub(crate) struct Aggregate {
    opc: Opcode,
    nsid: u32,
    lba: u64,
    lba_count: u32,
    outstanding: Cell<usize>,
    status: Cell<Status>,
    state: Cell<AggregateState>,
    cb: Cell<Option<IoCallback>>,
}

impl Aggregate {
    fn new(parent: SplitParent, num_children: usize) -> Self {
        Self {
            opc: parent.cmd.opc,
            nsid: parent.cmd.nsid,
            lba: parent.lba,
            lba_count: parent.lba_count,
            outstanding: Cell::new(num_children),
            status: Cell::new(Status::SUCCESS),
            state: Cell::new(AggregateState::ChildrenSubmitted),
            cb: Cell::new(Some(parent.cb)),
        }
    }

    pub(crate) fn child_complete(&self, child_lba: u64, child_lba_count: u32, status: Status) {
        debug_assert_eq!(self.state.get(), AggregateState::ChildrenSubmitted);

        let outstanding = self.outstanding.get();
        debug_assert!(outstanding > 0, "more completions than children");
        let outstanding = outstanding.saturating_sub(1);
        self.outstanding.set(outstanding);

        if status.is_error() {
            tracing::debug!(
                nsid = self.nsid,
                lba = child_lba,
                lba_count = child_lba_count,
                ?status,
                "child request failed"
            );
            // first error wins
            if self.status.get().is_success() {
                self.status.set(status);
            }
        }

        if outstanding > 0 {
            return;
        }

        self.state.set(AggregateState::Aggregated);
        let status = self.status.get();
        tracing::debug!(
            nsid = self.nsid,
            opc = ?self.opc,
            lba = self.lba,
            lba_count = self.lba_count,
            ?status,
            "split request aggregated"
        );
        if let Some(cb) = self.cb.take() {
            cb(status);
        }
    }
}

/// Hand `req` to `qpair`, fanning a split parent out into its children.
///
/// Used by the `submit_*` methods of [`NvmeNamespace`](super::NvmeNamespace);
/// call it directly to submit a request obtained from a `build_*` method.
/// The qpair only ever receives physical commands.
pub fn submit_request<Q: Qpair + ?Sized>(qpair: &Q, req: IoRequest) {
    let mut parent = match req.into_shape() {
        Shape::Single(req) => {
            tracing::trace!(
                nsid = req.nsid(),
                opc = ?req.opcode(),
                lba = req.lba(),
                lba_count = req.lba_count(),
                "submit request"
            );
            qpair.submit_request(req);
            return;
        }
        Shape::Split(parent) => parent,
    };

    // counter covers every child before the first one is submitted
    let children = std::mem::take(&mut parent.children);
    let aggregate = Rc::new(Aggregate::new(parent, children.len()));

    tracing::trace!(
        nsid = aggregate.nsid,
        opc = ?aggregate.opc,
        lba = aggregate.lba,
        lba_count = aggregate.lba_count,
        num_children = children.len(),
        "submit split request"
    );

    for mut child in children {
        child.parent = Some(Rc::clone(&aggregate));
        qpair.submit_request(child);
    }
}
