use crate::umem::layout::UmemLayout;

/// Exclusive claim on one umem frame.
///
/// Not `Clone`: a frame leaves user space by being consumed
/// ([`into_addr`](Self::into_addr)) and comes back through [`Frame::from_kernel`].
#[derive(Debug, PartialEq, Eq)]
pub struct Frame {
    addr: u64,
}

impl Frame {
    /// Re-take ownership of an address the kernel handed back on the RX or
    /// completion ring.
    ///
    /// # Safety
    /// `addr` must have just been read from a ring entry that the kernel
    /// produced, and must not be wrapped into a `Frame` twice.
    #[inline]
    pub unsafe fn from_kernel(addr: u64) -> Self {
        Self { addr }
    }

    #[inline]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Give up the claim, typically to write the address into a ring.
    #[inline]
    pub fn into_addr(self) -> u64 {
        self.addr
    }
}

/// Fixed-capacity stack of free umem frames.
///
/// Every frame is either here or held as a [`Frame`] (or lent to the kernel
/// through a ring). Capacity never changes after construction.
pub struct FramePool {
    free: Vec<u64>,
    // Indexed by chunk; true while the chunk is on the free stack.
    is_free: Vec<bool>,
    layout: UmemLayout,
    rejected: u64,
}

impl FramePool {
    pub fn new(layout: UmemLayout) -> Self {
        let mut free = Vec::with_capacity(layout.frame_count as usize);
        for i in 0..layout.frame_count {
            if let Some(addr) = layout.idx_to_addr(i) {
                free.push(addr);
            }
        }

        Self {
            free,
            is_free: vec![true; layout.frame_count as usize],
            layout,
            rejected: 0,
        }
    }

    /// Pop a free frame; `None` means every frame is in flight.
    #[inline]
    pub fn allocate(&mut self) -> Option<Frame> {
        let addr = self.free.pop()?;
        if let Some(idx) = self.layout.addr_to_idx(addr) {
            self.is_free[idx as usize] = false;
        }
        Some(Frame { addr })
    }

    /// Push a frame back. Addresses are normalised to their chunk start.
    ///
    /// A frame that is already free or lies outside the umem is refused and
    /// counted in [`rejected`](Self::rejected) instead of corrupting the
    /// stack; debug builds panic.
    #[inline]
    pub fn free(&mut self, frame: Frame) {
        let addr = self.layout.chunk_base(frame.into_addr());
        let Some(idx) = self.layout.addr_to_idx(addr) else {
            debug_assert!(false, "freeing frame {addr:#x} outside the umem");
            self.rejected += 1;
            return;
        };
        if self.is_free[idx as usize] {
            debug_assert!(false, "double free of frame {addr:#x}");
            self.rejected += 1;
            return;
        }
        debug_assert!(self.free.len() < self.layout.frame_count as usize);
        self.is_free[idx as usize] = true;
        self.free.push(addr);
    }

    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.layout.frame_count as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn layout(&self) -> UmemLayout {
        self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(frames: u32) -> FramePool {
        FramePool::new(UmemLayout::new(2048, frames).unwrap())
    }

    #[test]
    fn test_allocate_until_empty() {
        let mut pool = pool(4);
        let mut seen = HashSet::new();
        let mut held = Vec::new();
        while let Some(frame) = pool.allocate() {
            assert!(seen.insert(frame.addr()), "address handed out twice");
            held.push(frame);
        }
        assert_eq!(held.len(), 4);
        assert_eq!(pool.free_count(), 0);
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn test_conservation_under_churn() {
        let mut pool = pool(16);
        let mut held: Vec<Frame> = Vec::new();

        // Deterministic mix of allocations and frees.
        for step in 0..500u32 {
            if step % 3 == 2 && !held.is_empty() {
                let victim = (step as usize * 7) % held.len();
                pool.free(held.swap_remove(victim));
            } else if let Some(frame) = pool.allocate() {
                held.push(frame);
            }
            assert_eq!(pool.free_count() + held.len(), pool.capacity());

            let unique: HashSet<u64> = held.iter().map(Frame::addr).collect();
            assert_eq!(unique.len(), held.len());
        }
    }

    #[test]
    fn test_free_everything_back_to_capacity() {
        let mut pool = pool(8);
        let held: Vec<Frame> = std::iter::from_fn(|| pool.allocate()).collect();
        assert_eq!(held.len(), 8);

        for frame in held {
            pool.free(frame);
        }
        assert_eq!(pool.free_count(), pool.capacity());
        assert_eq!(pool.rejected(), 0);
    }

    #[test]
    fn test_free_normalises_to_chunk() {
        let mut pool = pool(2);
        let frame = pool.allocate().unwrap();
        let addr = frame.into_addr();

        // RX descriptors point past the headroom.
        pool.free(unsafe { Frame::from_kernel(addr + 256) });
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.allocate().unwrap().addr(), addr);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_double_free_is_refused() {
        let mut pool = pool(2);
        let frame = pool.allocate().unwrap();
        let addr = frame.into_addr();
        pool.free(unsafe { Frame::from_kernel(addr) });
        pool.free(unsafe { Frame::from_kernel(addr) });
        assert_eq!(pool.free_count(), 2);
        assert_eq!(pool.rejected(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics_in_debug() {
        let mut pool = pool(2);
        let addr = pool.allocate().unwrap().into_addr();
        pool.free(unsafe { Frame::from_kernel(addr) });
        pool.free(unsafe { Frame::from_kernel(addr) });
    }
}
