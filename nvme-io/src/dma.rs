//! DMA-capable buffers and payload handles.
//!
//! NVMe commands reference host memory by address. The engine never reads or
//! writes payload bytes itself: it only carves a caller's buffer into
//! `(address, length)` windows, one per physical command. [`Payload`] is that
//! window. [`DmaBuf`] is an aligned allocation suitable as the backing store.
//!
//! # Example
//!
//! ```
//! use nvme_io::DmaBuf;
//!
//! // Allocate a 4KB buffer aligned to 4KB (typical block size)
//! let mut buf = DmaBuf::alloc(4096, 4096).expect("allocation failed");
//!
//! // Write some data
//! buf.as_mut_slice()[..5].copy_from_slice(b"hello");
//!
//! // Hand the region to a namespace command
//! let payload = buf.payload();
//! assert_eq!(payload.len(), 4096);
//! ```

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{Error, Result};

/// Minimum alignment of a [`DmaBuf`] (cache line).
pub const MIN_ALIGN: usize = 64;

/// An aligned memory buffer for NVMe I/O operations.
///
/// # Thread Safety
///
/// `DmaBuf` is `Send` but not `Sync`. It can be moved between threads,
/// but cannot be shared across threads simultaneously.
///
/// # Memory Layout
///
/// The buffer is always aligned to at least cache line size (64 bytes),
/// and can be further aligned as requested. For NVMe operations, alignment
/// to the block size (typically 512 or 4096) is recommended.
pub struct DmaBuf {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The underlying memory is just bytes, no thread-local state
unsafe impl Send for DmaBuf {}

impl DmaBuf {
    /// Allocate a buffer.
    ///
    /// # Arguments
    ///
    /// * `size` - Size in bytes to allocate
    /// * `align` - Alignment requirement (must be power of 2, or 0 for default).
    ///   The buffer will be aligned to at least cache line size (64 bytes).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a zero size or a bad alignment and
    /// [`Error::MemoryAlloc`] if the allocator fails.
    pub fn alloc(size: usize, align: usize) -> Result<Self> {
        Self::alloc_inner(size, align, false)
    }

    /// Allocate a zeroed buffer.
    ///
    /// Same as [`alloc`](Self::alloc) but the memory is zeroed.
    pub fn alloc_zeroed(size: usize, align: usize) -> Result<Self> {
        Self::alloc_inner(size, align, true)
    }

    fn alloc_inner(size: usize, align: usize, zeroed: bool) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid("size must be > 0"));
        }

        if align != 0 && !align.is_power_of_two() {
            return Err(Error::invalid(format!(
                "alignment must be a power of 2, got {align}"
            )));
        }

        let layout = Layout::from_size_align(size, align.max(MIN_ALIGN))
            .map_err(|e| Error::invalid(format!("bad buffer layout: {e}")))?;

        let ptr = unsafe {
            if zeroed {
                alloc::alloc_zeroed(layout)
            } else {
                alloc::alloc(layout)
            }
        };

        NonNull::new(ptr)
            .map(|ptr| Self { ptr, layout })
            .ok_or(Error::MemoryAlloc(size))
    }

    /// Get the buffer length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Check if the buffer is empty (zero length).
    ///
    /// Note: Zero-length buffers cannot be created via `alloc()`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Alignment of the allocation in bytes.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Get mutable raw pointer to the buffer.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Get raw pointer to the buffer.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Get an immutable slice view of the buffer.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    /// Get a mutable slice view of the buffer.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }

    /// Payload handle covering the whole buffer.
    ///
    /// The buffer must outlive every command issued with the handle, i.e. it
    /// must not be dropped or modified before the command's completion fires.
    pub fn payload(&mut self) -> Payload {
        Payload {
            ptr: self.ptr,
            len: self.len(),
        }
    }
}

impl Drop for DmaBuf {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl std::fmt::Debug for DmaBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DmaBuf")
            .field("ptr", &self.ptr)
            .field("len", &self.len())
            .field("align", &self.align())
            .finish()
    }
}

impl AsRef<[u8]> for DmaBuf {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for DmaBuf {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

/// Caller-owned memory region referenced by a command.
///
/// A `Payload` is an inert address/length pair. Creating, copying and slicing
/// it never touches the bytes; only a transport dereferences it, and doing so
/// is `unsafe` because the caller's buffer lifetime is not tracked.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    ptr: NonNull<u8>,
    len: usize,
}

impl Payload {
    /// Payload handle over a typed table such as a dataset-management range
    /// list. The table must stay alive until the command completes.
    pub fn from_slice<T>(table: &[T]) -> Self {
        Self {
            ptr: NonNull::from(table).cast(),
            len: std::mem::size_of_val(table),
        }
    }

    /// Length of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the region is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start address of the region.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Sub-window `[offset, offset + len)` of this region.
    ///
    /// Returns `None` if the window does not fit.
    pub fn slice(&self, offset: usize, len: usize) -> Option<Payload> {
        let end = offset.checked_add(len)?;
        if end > self.len {
            return None;
        }
        // In bounds of the same allocation, checked above.
        let ptr = unsafe { self.ptr.add(offset) };
        Some(Payload { ptr, len })
    }

    /// View the region as bytes.
    ///
    /// For transports that move data for a command they were handed; the
    /// view must not outlive that command.
    ///
    /// # Safety
    ///
    /// The backing buffer must still be alive and not mutably aliased.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the region as mutable bytes.
    ///
    /// Same usage as [`as_slice`](Self::as_slice).
    ///
    /// # Safety
    ///
    /// The backing buffer must still be alive and not aliased at all.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_fails() {
        assert!(DmaBuf::alloc(0, 0).is_err());
        assert!(DmaBuf::alloc_zeroed(0, 0).is_err());
    }

    #[test]
    fn test_alignment() {
        let buf = DmaBuf::alloc(4096, 4096).unwrap();
        assert_eq!(buf.as_ptr() as usize % 4096, 0);

        let buf = DmaBuf::alloc(100, 0).unwrap();
        assert_eq!(buf.as_ptr() as usize % MIN_ALIGN, 0);
        assert_eq!(buf.len(), 100);
    }

    #[test]
    fn test_bad_alignment_rejected() {
        assert!(matches!(
            DmaBuf::alloc(512, 3),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DmaBuf::alloc_zeroed(512, 48),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DmaBuf::alloc(512, 4097),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(DmaBuf::alloc(512, 8).unwrap().align(), MIN_ALIGN);
    }

    #[test]
    fn test_zeroed() {
        let buf = DmaBuf::alloc_zeroed(1024, 512).unwrap();
        assert!(buf.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_payload_slice_shares_memory() {
        let mut buf = DmaBuf::alloc_zeroed(1024, 512).unwrap();
        let base = buf.as_ptr() as usize;
        let payload = buf.payload();

        let window = payload.slice(512, 512).unwrap();
        assert_eq!(window.as_ptr() as usize, base + 512);
        assert_eq!(window.len(), 512);

        assert!(payload.slice(513, 512).is_none());
        assert!(payload.slice(usize::MAX, 2).is_none());
        assert!(payload.slice(1024, 0).unwrap().is_empty());
    }

    #[test]
    fn test_payload_window_reads_and_writes_buffer() {
        let mut buf = DmaBuf::alloc_zeroed(1024, 512).unwrap();
        let mut window = buf.payload().slice(512, 4).unwrap();

        unsafe { window.as_mut_slice() }.copy_from_slice(b"nvme");
        assert_eq!(unsafe { window.as_slice() }, b"nvme");
        assert_eq!(&buf.as_slice()[512..516], b"nvme");
        assert!(buf.as_slice()[..512].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_payload_from_table() {
        let table = [0u64; 4];
        let payload = Payload::from_slice(&table);
        assert_eq!(payload.len(), 32);
        assert_eq!(payload.as_ptr() as usize, table.as_ptr() as usize);
    }
}
