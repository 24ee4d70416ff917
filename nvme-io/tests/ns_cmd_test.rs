//! Integration test for namespace command building and split completion
//!
//! Covers the read/write split decisions, flush and deallocate encoding, and
//! completion aggregation with out-of-order and failing children.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use nvme_io::nvme::{
    DSM_ATTR_DEALLOCATE, DsmRange, IoCallback, IoFlags, NullController, NullQpair, NvmeNamespace,
    NvmeNsOpts, Opcode, Qpair, Request, Status, submit_request,
};
use nvme_io::{DmaBuf, Error};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn prepare_for_test(sector_size: u32, max_xfer_size: u32, stripe_size: u32) -> NvmeNamespace {
    init_tracing();
    let opts = NvmeNsOpts {
        id: 1,
        sector_size,
        stripe_size: (stripe_size > 0).then_some(stripe_size),
    };
    NvmeNamespace::new(&NullController::new(max_xfer_size), &opts).expect("namespace setup")
}

/// Records every callback invocation.
#[derive(Clone, Default)]
struct CallbackLog(Rc<RefCell<Vec<Status>>>);

impl CallbackLog {
    fn callback(&self) -> IoCallback {
        let log = self.0.clone();
        Box::new(move |status| log.borrow_mut().push(status))
    }

    fn calls(&self) -> Vec<Status> {
        self.0.borrow().clone()
    }
}

#[test]
fn split_test() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let mut buf = DmaBuf::alloc(512, 512).unwrap();

    let req = ns
        .build_read(buf.payload(), 0, 1, IoFlags::empty(), |_| {})
        .unwrap();

    assert_eq!(req.num_children(), 0);
    assert_eq!(req.opcode(), Opcode::Read);
    assert_eq!(req.payload_size(), 512);
}

#[test]
fn split_test2() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let mut buf = DmaBuf::alloc(256 * 1024, 4096).unwrap();
    let lba_count = (256 * 1024) / 512;

    let req = ns
        .build_write(buf.payload(), 0, lba_count, IoFlags::empty(), |_| {})
        .unwrap();

    assert_eq!(req.num_children(), 2);
    assert!(req.payload().is_none());

    let children = req.children();
    assert_eq!(children[0].payload_size(), 128 * 1024);
    assert_eq!((children[0].lba(), children[0].lba_count()), (0, 256));

    assert_eq!(children[1].payload_size(), 128 * 1024);
    assert_eq!((children[1].lba(), children[1].lba_count()), (256, 256));

    assert_eq!(children[0].lba() + u64::from(children[0].lba_count()), children[1].lba());
}

#[test]
fn fits_in_max_xfer_not_split() {
    let ns = prepare_for_test(4096, 64 * 1024, 0);
    let mut buf = DmaBuf::alloc(64 * 1024, 4096).unwrap();

    for lba_count in 1..=16 {
        let req = ns
            .build_read(buf.payload(), 12345, lba_count, IoFlags::empty(), |_| {})
            .unwrap();
        assert_eq!(req.num_children(), 0, "lba_count={lba_count}");
        assert_eq!(req.cmd().nlb(), lba_count - 1);
    }
}

#[test]
fn split_on_stripe_boundary() {
    // 128 KiB stripes, 1 MiB transfer limit: striping decides the split
    let ns = prepare_for_test(512, 1024 * 1024, 128 * 1024);
    let mut buf = DmaBuf::alloc(64 * 1024, 4096).unwrap();

    let req = ns
        .build_read(buf.payload(), 200, 128, IoFlags::empty(), |_| {})
        .unwrap();

    let ranges: Vec<_> = req.children().iter().map(|c| (c.lba(), c.lba_count())).collect();
    assert_eq!(ranges, vec![(200, 56), (256, 72)]);
}

#[test]
fn zero_length_read_is_single_command() {
    let ns = prepare_for_test(512, 128 * 1024, 4096);
    let mut buf = DmaBuf::alloc(512, 512).unwrap();

    let req = ns
        .build_read(buf.payload(), 3, 0, IoFlags::empty(), |_| {})
        .unwrap();
    assert_eq!(req.num_children(), 0);
    assert_eq!(req.payload_size(), 0);
}

#[test]
fn test_nvme_ns_cmd_flush() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();

    ns.submit_flush(&qpair, log.callback()).unwrap();

    let submitted = qpair.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].opc, Opcode::Flush);
    assert_eq!(submitted[0].nsid, ns.id());

    assert_eq!(qpair.process_completions(0), 1);
    assert_eq!(log.calls(), vec![Status::SUCCESS]);
}

#[test]
fn test_nvme_ns_cmd_deallocate() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();

    let ranges = [DsmRange::new(0, 8)];
    ns.submit_deallocate(&qpair, &ranges, log.callback()).unwrap();

    let pending = qpair.take_pending();
    assert_eq!(pending.len(), 1);
    let cmd = pending[0].cmd();
    assert_eq!(cmd.opc, Opcode::DatasetManagement);
    assert_eq!(cmd.nsid, ns.id());
    assert_eq!(cmd.cdw10, ranges.len() as u32 - 1);
    assert_eq!(cmd.cdw11, DSM_ATTR_DEALLOCATE);

    let payload = pending[0].payload().unwrap();
    assert_eq!(payload.as_ptr() as usize, ranges.as_ptr() as usize);
    assert_eq!(payload.len(), 16);

    for req in pending {
        req.complete(Status::SUCCESS);
    }
    assert_eq!(log.calls(), vec![Status::SUCCESS]);

    let log = CallbackLog::default();
    let rc = ns.submit_deallocate(&qpair, &[], log.callback());
    assert!(matches!(rc, Err(Error::InvalidArgument(_))));
    assert_eq!(qpair.num_pending(), 0);
    assert_eq!(qpair.process_completions(0), 0);
    assert!(log.calls().is_empty());
}

#[test]
fn reverse_completion_first_error_wins() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();
    let mut buf = DmaBuf::alloc(256 * 1024, 4096).unwrap();

    ns.submit_write(&qpair, buf.payload(), 0, 512, IoFlags::empty(), log.callback())
        .unwrap();

    let mut pending = qpair.take_pending();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(Request::is_child));
    assert_eq!(pending[0].lba(), 0);
    assert_eq!(pending[1].lba(), 256);

    // complete in reverse: the second-submitted child fails first
    let first = pending.remove(0);
    let second = pending.remove(0);
    second.complete(Status::DATA_TRANSFER_ERROR);
    assert!(log.calls().is_empty());
    first.complete(Status::SUCCESS);

    assert_eq!(log.calls(), vec![Status::DATA_TRANSFER_ERROR]);
}

#[test]
fn first_error_kept_over_later_errors() {
    let ns = prepare_for_test(512, 4096, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();
    let mut buf = DmaBuf::alloc(4 * 4096, 4096).unwrap();

    ns.submit_read(&qpair, buf.payload(), 0, 32, IoFlags::empty(), log.callback())
        .unwrap();

    let pending = qpair.take_pending();
    assert_eq!(pending.len(), 4);

    let statuses = [
        Status::SUCCESS,
        Status::LBA_OUT_OF_RANGE,
        Status::SUCCESS,
        Status::INTERNAL_DEVICE_ERROR,
    ];
    // completion order 2, 3, 1, 0
    let mut pending: Vec<Option<Request>> = pending.into_iter().map(Some).collect();
    for idx in [2, 3, 1, 0] {
        pending[idx].take().unwrap().complete(statuses[idx]);
    }

    assert_eq!(log.calls(), vec![Status::INTERNAL_DEVICE_ERROR]);
}

#[test]
fn all_children_succeed() {
    let ns = prepare_for_test(512, 128 * 1024, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();
    let mut buf = DmaBuf::alloc(1024 * 1024, 4096).unwrap();

    ns.submit_read(&qpair, buf.payload(), 0, 2048, IoFlags::LIMITED_RETRY, log.callback())
        .unwrap();

    let submitted = qpair.submitted();
    assert_eq!(submitted.len(), 8);
    assert!(submitted.iter().all(|c| c.io_flags() == IoFlags::LIMITED_RETRY));
    assert_eq!(
        submitted.iter().map(|c| c.slba()).collect::<Vec<_>>(),
        (0..8).map(|i| i * 256).collect::<Vec<_>>()
    );

    assert_eq!(qpair.process_completions(0), 8);
    assert_eq!(log.calls(), vec![Status::SUCCESS]);
}

#[test]
fn submit_prebuilt_request() {
    let ns = prepare_for_test(512, 4096, 0);
    let qpair = NullQpair::new();
    let done = Rc::new(Cell::new(false));
    let d = done.clone();
    let mut buf = DmaBuf::alloc(8192, 4096).unwrap();

    let req = ns
        .build_write(buf.payload(), 0, 16, IoFlags::empty(), move |st| {
            assert!(st.is_success());
            d.set(true);
        })
        .unwrap();
    assert_eq!(req.num_children(), 2);

    submit_request(&qpair, req);
    assert_eq!(qpair.num_pending(), 2);
    qpair.process_completions(0);
    assert!(done.get());
}

#[test]
fn prebuilt_split_write_sends_every_child() {
    let ns = prepare_for_test(512, 4096, 0);
    let qpair = NullQpair::new();
    let log = CallbackLog::default();
    let mut buf = DmaBuf::alloc(8192, 4096).unwrap();
    let base = buf.as_ptr() as usize;

    let req = ns
        .build_write(buf.payload(), 0, 16, IoFlags::empty(), log.callback())
        .unwrap();
    assert_eq!(req.num_children(), 2);
    submit_request(&qpair, req);

    let pending = qpair.take_pending();
    assert_eq!(pending.len(), 2);
    for (i, child) in pending.iter().enumerate() {
        assert!(child.is_child());
        assert_eq!(child.cmd().slba(), 8 * i as u64);
        assert_eq!(child.cmd().nlb(), 7);
        assert_eq!(child.payload().unwrap().as_ptr() as usize, base + 4096 * i);
        assert_eq!(child.payload_size(), 4096);
    }

    let mut pending = pending.into_iter();
    pending.next().unwrap().complete(Status::SUCCESS);
    assert!(log.calls().is_empty());
    pending.next().unwrap().complete(Status::SUCCESS);
    assert_eq!(log.calls(), vec![Status::SUCCESS]);
}

#[test]
fn callback_can_submit_follow_up_io() {
    let ns = Rc::new(prepare_for_test(512, 4096, 0));
    let qpair = Rc::new(NullQpair::new());
    let log = CallbackLog::default();
    let mut buf = DmaBuf::alloc(8192, 4096).unwrap();

    let (ns2, q2, flush_cb) = (ns.clone(), qpair.clone(), log.callback());
    ns.submit_write(&*qpair, buf.payload(), 0, 16, IoFlags::empty(), move |st| {
        assert!(st.is_success());
        ns2.submit_flush(&*q2, flush_cb).unwrap();
    })
    .unwrap();

    // two write children; the flush queued by the write's callback is reaped
    // on the next call
    assert_eq!(qpair.process_completions(0), 2);
    assert!(log.calls().is_empty());
    assert_eq!(qpair.process_completions(0), 1);
    assert_eq!(log.calls(), vec![Status::SUCCESS]);
    assert_eq!(qpair.submitted().last().unwrap().opc, Opcode::Flush);
}
