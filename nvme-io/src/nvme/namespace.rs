//! NVMe namespace.
//!
//! Holds the read-only geometry every command on the namespace is built
//! against. Command construction and submission live in `ns_cmd`.

use super::cmd::MAX_LBA_COUNT_PER_CMD;
use super::controller::Controller;
use super::opts::NvmeNsOpts;
use crate::error::{Error, Result};

/// NVMe namespace descriptor.
///
/// Created once per namespace from the controller's transfer limit and the
/// namespace's identify data, then shared read-only by all I/O.
///
/// # Example
///
/// ```
/// use nvme_io::nvme::{NullController, NvmeNamespace, NvmeNsOpts};
///
/// # fn example() -> nvme_io::Result<()> {
/// let ctrlr = NullController::new(128 * 1024);
/// let ns = NvmeNamespace::new(&ctrlr, &NvmeNsOpts::default())?;
///
/// assert_eq!(ns.sector_size(), 512);
/// assert_eq!(ns.sectors_per_max_io(), 256);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvmeNamespace {
    id: u32,
    sector_size: u32,
    stripe_size: u32,
    sectors_per_max_io: u32,
    sectors_per_stripe: u32,
}

impl NvmeNamespace {
    /// Set up a namespace on `ctrlr`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the namespace id is 0, the
    /// sector size is 0, the stripe size is not a multiple of the sector size,
    /// or the controller cannot transfer a single sector.
    pub fn new<C: Controller + ?Sized>(ctrlr: &C, opts: &NvmeNsOpts) -> Result<Self> {
        if opts.id == 0 {
            return Err(Error::invalid("namespace id must be > 0"));
        }
        let sector_size = opts.sector_size;
        if sector_size == 0 {
            return Err(Error::invalid("sector size must be > 0"));
        }
        let stripe_size = opts.stripe_size.unwrap_or(0);
        if stripe_size % sector_size != 0 {
            return Err(Error::invalid(format!(
                "stripe size {stripe_size} is not a multiple of sector size {sector_size}"
            )));
        }

        let max_xfer_size = ctrlr.max_xfer_size();
        let sectors_per_max_io = (max_xfer_size / sector_size).min(MAX_LBA_COUNT_PER_CMD);
        if sectors_per_max_io == 0 {
            return Err(Error::invalid(format!(
                "max transfer size {max_xfer_size} is smaller than sector size {sector_size}"
            )));
        }

        let ns = Self {
            id: opts.id,
            sector_size,
            stripe_size,
            sectors_per_max_io,
            sectors_per_stripe: stripe_size / sector_size,
        };
        tracing::debug!(
            nsid = ns.id,
            sector_size,
            stripe_size,
            max_xfer_size,
            sectors_per_max_io,
            "namespace ready"
        );
        Ok(ns)
    }

    /// Get namespace ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Get sector size in bytes.
    pub fn sector_size(&self) -> u32 {
        self.sector_size
    }

    /// Get stripe size in bytes (0 when striping is disabled).
    pub fn stripe_size(&self) -> u32 {
        self.stripe_size
    }

    /// Largest number of sectors one command may transfer.
    pub fn sectors_per_max_io(&self) -> u32 {
        self.sectors_per_max_io
    }

    /// Sectors per stripe (0 when striping is disabled).
    pub fn sectors_per_stripe(&self) -> u32 {
        self.sectors_per_stripe
    }

    /// Largest number of bytes one command may transfer.
    pub fn max_io_xfer_size(&self) -> u64 {
        u64::from(self.sectors_per_max_io) * u64::from(self.sector_size)
    }
}
