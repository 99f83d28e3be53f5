use std::io;
use std::slice;
use memmap2::{MmapMut, MmapOptions};
use crate::umem::layout::UmemLayout;

/// Page-aligned anonymous mapping backing a umem.
pub struct UmemRegion {
    mmap: MmapMut,
    layout: UmemLayout,
}

impl UmemRegion {
    pub fn new(layout: UmemLayout) -> io::Result<Self> {
        let len = layout.size();
        let mmap = MmapOptions::new().len(len).populate().map_anon()?;

        Ok(Self { mmap, layout })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn layout(&self) -> UmemLayout {
        self.layout
    }

    /// Raw view of the frame memory for the thread that owns the rings.
    pub fn area(&self) -> FrameArea {
        FrameArea {
            ptr: self.as_ptr(),
            len: self.len(),
        }
    }
}

/// Unowned view of umem memory, handed to the engine thread.
///
/// Valid while the [`UmemRegion`] it was taken from is alive.
#[derive(Debug, Clone, Copy)]
pub struct FrameArea {
    ptr: *mut u8,
    len: usize,
}

unsafe impl Send for FrameArea {}

impl FrameArea {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes `addr..addr + len` of the umem, or `None` if out of bounds.
    ///
    /// # Safety
    /// The region must still be mapped, the caller must own the frame at
    /// `addr`, and no other slice over those bytes may be alive.
    pub unsafe fn slice_mut<'a>(&self, addr: u64, len: usize) -> Option<&'a mut [u8]> {
        let start = usize::try_from(addr).ok()?;
        let end = start.checked_add(len)?;
        if end > self.len {
            return None;
        }
        Some(slice::from_raw_parts_mut(self.ptr.add(start), len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_covers_every_frame() {
        let layout = UmemLayout::new(2048, 4).unwrap();
        let region = UmemRegion::new(layout).unwrap();
        assert_eq!(region.len(), 8192);
        assert_eq!(region.as_ptr() as usize % 4096, 0, "umem must be page aligned");

        let area = region.area();
        let last = unsafe { area.slice_mut(6144, 2048) }.unwrap();
        assert!(last.iter().all(|&b| b == 0));
        assert!(unsafe { area.slice_mut(6144, 2049) }.is_none());
    }
}
