//! Read/write splitting.
//!
//! A read or write longer than the controller's transfer limit, or one that
//! crosses a stripe boundary on a namespace with driver-assisted striping,
//! is issued as several physical commands. [`SplitPlan`] yields those
//! commands' ranges in ascending LBA order.
//!
//! Stripe alignment is applied first: a segment never runs past the end of
//! the stripe it starts in. Within a stripe, segments are further capped at
//! `sectors_per_max_io`. Only offsets are computed; payload bytes are never
//! touched.

use super::namespace::NvmeNamespace;

/// One physical command's share of a split read/write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First LBA of the segment.
    pub lba: u64,
    /// Number of LBAs in the segment.
    pub lba_count: u32,
    /// Byte offset of the segment's data in the caller's payload.
    pub payload_offset: usize,
}

/// Iterator over the segments of one read/write.
///
/// Always yields at least one segment; a zero-length request yields a single
/// zero-length segment.
///
/// # Example
///
/// ```
/// use nvme_io::nvme::{NullController, NvmeNamespace, NvmeNsOpts, SplitPlan};
///
/// # fn example() -> nvme_io::Result<()> {
/// let ns = NvmeNamespace::new(&NullController::new(128 * 1024), &NvmeNsOpts::default())?;
///
/// let plan = SplitPlan::new(&ns, 0, 512);
/// assert!(!plan.is_single());
///
/// let segs: Vec<_> = plan.map(|s| (s.lba, s.lba_count)).collect();
/// assert_eq!(segs, vec![(0, 256), (256, 256)]);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct SplitPlan {
    lba: u64,
    remaining: u32,
    payload_offset: usize,
    sector_size: u32,
    sectors_per_max_io: u32,
    sectors_per_stripe: u32,
    yielded: bool,
}

impl SplitPlan {
    /// Plan the read/write of `lba_count` blocks at `lba` on `ns`.
    pub fn new(ns: &NvmeNamespace, lba: u64, lba_count: u32) -> Self {
        Self {
            lba,
            remaining: lba_count,
            payload_offset: 0,
            sector_size: ns.sector_size(),
            sectors_per_max_io: ns.sectors_per_max_io(),
            sectors_per_stripe: ns.sectors_per_stripe(),
            yielded: false,
        }
    }

    /// True if the whole range fits in one command.
    pub fn is_single(&self) -> bool {
        self.remaining == 0 || self.next_len() == self.remaining
    }

    fn next_len(&self) -> u32 {
        let mut len = self.remaining.min(self.sectors_per_max_io);
        if self.sectors_per_stripe > 0 {
            let sps = u64::from(self.sectors_per_stripe);
            let to_boundary = (sps - self.lba % sps) as u32;
            len = len.min(to_boundary);
        }
        len
    }
}

impl Iterator for SplitPlan {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        if self.remaining == 0 {
            if self.yielded {
                return None;
            }
            self.yielded = true;
            return Some(Segment {
                lba: self.lba,
                lba_count: 0,
                payload_offset: 0,
            });
        }

        let lba_count = self.next_len();
        let seg = Segment {
            lba: self.lba,
            lba_count,
            payload_offset: self.payload_offset,
        };

        self.yielded = true;
        self.remaining -= lba_count;
        self.lba += u64::from(lba_count);
        let seg_bytes = (lba_count as usize).saturating_mul(self.sector_size as usize);
        self.payload_offset = self.payload_offset.saturating_add(seg_bytes);
        Some(seg)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining == 0 {
            let n = usize::from(!self.yielded);
            return (n, Some(n));
        }
        // at least one more, at most one per sector
        let lower = (self.remaining as usize).div_ceil(self.sectors_per_max_io as usize);
        (lower, Some(self.remaining as usize))
    }
}
