//! NVMe controller interface.

/// The controller properties the command layer depends on.
///
/// Queried once when a namespace is set up.
pub trait Controller {
    /// Maximum data transfer size of one command, in bytes.
    fn max_xfer_size(&self) -> u32;
}
