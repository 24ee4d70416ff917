//! Namespace I/O commands.
//!
//! `build_*` construct an [`IoRequest`] without submitting it. `submit_*` build
//! and hand the result to a [`Qpair`], returning an error only when the
//! arguments are rejected up front; the command's outcome arrives later
//! through the callback. The `async` variants wrap `submit_*` in a
//! completion future.

use crate::complete::io_completion;
use crate::dma::Payload;
use crate::error::{Error, Result};

use super::cmd::{DSM_MAX_RANGES, DsmRange, IoFlags, NvmeCmd, Opcode};
use super::cpl::Status;
use super::namespace::NvmeNamespace;
use super::qpair::Qpair;
use super::request::{IoCallback, IoRequest, Request};
use super::split::SplitPlan;
use super::tracker;

impl NvmeNamespace {
    /// Build a read of `lba_count` blocks at `lba` into `payload`.
    ///
    /// Split into child requests when the range exceeds the transfer limit or
    /// crosses a stripe boundary.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `payload` is shorter than
    /// `lba_count * sector_size` or the range overflows the LBA space.
    pub fn build_read<F>(
        &self,
        payload: Payload,
        lba: u64,
        lba_count: u32,
        flags: IoFlags,
        cb: F,
    ) -> Result<IoRequest>
    where
        F: FnOnce(Status) + 'static,
    {
        self.build_rw(Opcode::Read, payload, lba, lba_count, flags, Box::new(cb))
    }

    /// Build a write of `lba_count` blocks at `lba` from `payload`.
    ///
    /// See [`build_read`](Self::build_read).
    pub fn build_write<F>(
        &self,
        payload: Payload,
        lba: u64,
        lba_count: u32,
        flags: IoFlags,
        cb: F,
    ) -> Result<IoRequest>
    where
        F: FnOnce(Status) + 'static,
    {
        self.build_rw(Opcode::Write, payload, lba, lba_count, flags, Box::new(cb))
    }

    /// Build a flush. Never split.
    pub fn build_flush<F>(&self, cb: F) -> IoRequest
    where
        F: FnOnce(Status) + 'static,
    {
        IoRequest::single(Request::new(
            NvmeCmd::new(Opcode::Flush, self.id()),
            0,
            0,
            None,
            Some(Box::new(cb)),
        ))
    }

    /// Build a dataset management deallocate over `ranges`.
    ///
    /// The range table is referenced, not copied: it must stay alive and
    /// unmodified until the callback runs.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `ranges` is empty or holds more than
    /// [`DSM_MAX_RANGES`] entries. No request is built and `cb` is dropped
    /// without being called.
    pub fn build_deallocate<F>(&self, ranges: &[DsmRange], cb: F) -> Result<IoRequest>
    where
        F: FnOnce(Status) + 'static,
    {
        if ranges.is_empty() {
            return Err(Error::invalid("deallocate needs at least one range"));
        }
        if ranges.len() > DSM_MAX_RANGES {
            return Err(Error::invalid(format!(
                "deallocate supports at most {DSM_MAX_RANGES} ranges, got {}",
                ranges.len()
            )));
        }

        Ok(IoRequest::single(Request::new(
            NvmeCmd::deallocate(self.id(), ranges.len()),
            0,
            0,
            Some(Payload::from_slice(ranges)),
            Some(Box::new(cb)),
        )))
    }

    fn build_rw(
        &self,
        opc: Opcode,
        payload: Payload,
        lba: u64,
        lba_count: u32,
        flags: IoFlags,
        cb: IoCallback,
    ) -> Result<IoRequest> {
        let sector_size = self.sector_size() as usize;
        let bytes = (lba_count as usize)
            .checked_mul(sector_size)
            .ok_or_else(|| {
                Error::invalid(format!(
                    "{lba_count} blocks of {sector_size} bytes overflow the address space"
                ))
            })?;
        if payload.len() < bytes {
            return Err(Error::invalid(format!(
                "payload of {} bytes is too small for {lba_count} blocks of {sector_size} bytes",
                payload.len()
            )));
        }
        if lba.checked_add(u64::from(lba_count)).is_none() {
            return Err(Error::invalid(format!(
                "lba range {lba}+{lba_count} overflows"
            )));
        }

        let plan = SplitPlan::new(self, lba, lba_count);
        if plan.is_single() {
            return Ok(IoRequest::single(Request::new(
                NvmeCmd::rw(opc, self.id(), lba, lba_count, flags),
                lba,
                lba_count,
                payload.slice(0, bytes),
                Some(cb),
            )));
        }

        let children = plan
            .map(|seg| {
                let window = payload
                    .slice(seg.payload_offset, seg.lba_count as usize * sector_size)
                    .ok_or_else(|| Error::invalid("payload window out of bounds"))?;
                Ok(Request::new(
                    NvmeCmd::rw(opc, self.id(), seg.lba, seg.lba_count, flags),
                    seg.lba,
                    seg.lba_count,
                    Some(window),
                    None,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            nsid = self.id(),
            ?opc,
            lba,
            lba_count,
            num_children = children.len(),
            "split request"
        );

        Ok(IoRequest::split(
            NvmeCmd::new(opc, self.id()),
            lba,
            lba_count,
            children,
            cb,
        ))
    }

    /// Submit a read command.
    ///
    /// # Arguments
    ///
    /// * `qpair` - Queue pair for submission
    /// * `payload` - Buffer to read into (at least `lba_count * sector_size` bytes)
    /// * `lba` - Starting logical block address
    /// * `lba_count` - Number of blocks to read
    /// * `flags` - Per-command I/O flags
    /// * `cb` - Called once with the final (aggregated) status
    ///
    /// # Example
    ///
    /// ```
    /// use nvme_io::nvme::{IoFlags, NullController, NullQpair, NvmeNamespace, NvmeNsOpts, Qpair};
    /// use nvme_io::DmaBuf;
    ///
    /// # fn example() -> nvme_io::Result<()> {
    /// let ns = NvmeNamespace::new(&NullController::default(), &NvmeNsOpts::default())?;
    /// let qpair = NullQpair::new();
    ///
    /// let mut buf = DmaBuf::alloc(4096, 4096)?;
    /// ns.submit_read(&qpair, buf.payload(), 0, 8, IoFlags::empty(), |status| {
    ///     assert!(status.is_success());
    /// })?;
    /// qpair.process_completions(0);
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn submit_read<Q, F>(
        &self,
        qpair: &Q,
        payload: Payload,
        lba: u64,
        lba_count: u32,
        flags: IoFlags,
        cb: F,
    ) -> Result<()>
    where
        Q: Qpair + ?Sized,
        F: FnOnce(Status) + 'static,
    {
        let req = self.build_read(payload, lba, lba_count, flags, cb)?;
        tracker::submit_request(qpair, req);
        Ok(())
    }

    /// Submit a write command.
    ///
    /// Arguments as for [`submit_read`](Self::submit_read); `payload` holds
    /// the data to write.
    pub fn submit_write<Q, F>(
        &self,
        qpair: &Q,
        payload: Payload,
        lba: u64,
        lba_count: u32,
        flags: IoFlags,
        cb: F,
    ) -> Result<()>
    where
        Q: Qpair + ?Sized,
        F: FnOnce(Status) + 'static,
    {
        let req = self.build_write(payload, lba, lba_count, flags, cb)?;
        tracker::submit_request(qpair, req);
        Ok(())
    }

    /// Submit a flush command.
    pub fn submit_flush<Q, F>(&self, qpair: &Q, cb: F) -> Result<()>
    where
        Q: Qpair + ?Sized,
        F: FnOnce(Status) + 'static,
    {
        tracker::submit_request(qpair, self.build_flush(cb));
        Ok(())
    }

    /// Submit a dataset management deallocate command.
    ///
    /// Fails synchronously, without calling `cb`, for an empty or oversized
    /// range table.
    pub fn submit_deallocate<Q, F>(&self, qpair: &Q, ranges: &[DsmRange], cb: F) -> Result<()>
    where
        Q: Qpair + ?Sized,
        F: FnOnce(Status) + 'static,
    {
        let req = self.build_deallocate(ranges, cb)?;
        tracker::submit_request(qpair, req);
        Ok(())
    }

    /// Read and wait for completion.
    ///
    /// The future resolves once the qpair has been polled enough for every
    /// physical command to complete; see [`block_on`](crate::block_on) and
    /// [`qpair_poller`](crate::qpair_poller).
    pub async fn read<Q: Qpair + ?Sized>(
        &self,
        qpair: &Q,
        payload: Payload,
        lba: u64,
        lba_count: u32,
    ) -> Result<()> {
        let (tx, rx) = io_completion();
        self.submit_read(qpair, payload, lba, lba_count, IoFlags::empty(), move |st| {
            tx.status(st)
        })?;
        rx.await
    }

    /// Write and wait for completion.
    pub async fn write<Q: Qpair + ?Sized>(
        &self,
        qpair: &Q,
        payload: Payload,
        lba: u64,
        lba_count: u32,
    ) -> Result<()> {
        let (tx, rx) = io_completion();
        self.submit_write(qpair, payload, lba, lba_count, IoFlags::empty(), move |st| {
            tx.status(st)
        })?;
        rx.await
    }

    /// Flush and wait for completion.
    pub async fn flush<Q: Qpair + ?Sized>(&self, qpair: &Q) -> Result<()> {
        let (tx, rx) = io_completion();
        self.submit_flush(qpair, move |st| tx.status(st))?;
        rx.await
    }

    /// Deallocate `ranges` and wait for completion.
    pub async fn deallocate<Q: Qpair + ?Sized>(
        &self,
        qpair: &Q,
        ranges: &[DsmRange],
    ) -> Result<()> {
        let (tx, rx) = io_completion();
        self.submit_deallocate(qpair, ranges, move |st| tx.status(st))?;
        rx.await
    }
}
