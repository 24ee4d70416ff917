//! Error types for nvme-io

/// Result type for nvme-io operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for nvme-io operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Invalid argument provided
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// NVMe command completed with an error status
    #[error("NVMe error: sct={sct:#x}, sc={sc:#x}")]
    NvmeError {
        /// Status code type
        sct: u8,
        /// Status code
        sc: u8,
    },

    /// Memory allocation failed
    #[error("Memory allocation failed ({0} bytes)")]
    MemoryAlloc(usize),

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
