use std::ptr::NonNull;
use std::io;
use crate::sys::socket::munmap;

/// An owned mapping of one kernel ring.
/// Unmapped on drop.
pub struct MmapArea {
    ptr: NonNull<u8>,
    len: usize,
}

unsafe impl Send for MmapArea {}
unsafe impl Sync for MmapArea {}

impl MmapArea {
    /// Take ownership of a mapping of `len` bytes.
    ///
    /// # Safety
    /// The pointer must come from a successful `mmap` of exactly `len` bytes
    /// that nothing else will unmap.
    pub unsafe fn from_raw(ptr: *mut u8, len: usize) -> io::Result<Self> {
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "mmap returned null"))?;
        Ok(Self { ptr, len })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for MmapArea {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(self.ptr.as_ptr(), self.len);
        }
    }
}
