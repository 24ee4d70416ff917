//! NVMe namespace options.

/// NVMe namespace options.
///
/// Describes the namespace geometry reported by the controller's identify
/// data. Passed to [`NvmeNamespace::new`](super::NvmeNamespace::new).
#[derive(Debug, Clone)]
pub struct NvmeNsOpts {
    /// Namespace identifier (1-based)
    pub id: u32,
    /// Sector (logical block) size in bytes
    pub sector_size: u32,
    /// Stripe size in bytes for driver-assisted striping (None = disabled)
    pub stripe_size: Option<u32>,
}

impl Default for NvmeNsOpts {
    fn default() -> Self {
        Self {
            id: 1,
            sector_size: 512,
            stripe_size: None,
        }
    }
}
