use std::hint;
use xskd_core::ring::{ConsumerRing, ProducerRing};
use xskd_core::umem::Frame;

/// Producer side of the umem fill ring: empty frames offered to the kernel.
pub struct FillQueue {
    ring: ProducerRing<u64>,
}

impl FillQueue {
    pub fn new(ring: ProducerRing<u64>) -> Self {
        Self { ring }
    }

    /// Slots the kernel has left free, refreshed from the ring when the
    /// cached view cannot cover `wanted`.
    #[inline]
    pub fn free_entries(&mut self, wanted: u32) -> u32 {
        self.ring.free_entries(wanted)
    }

    /// Reserve exactly `n` slots and return the index of the first.
    ///
    /// Spins until the kernel has consumed enough older entries. If the
    /// kernel stops draining the ring (link down, program detached) this
    /// never returns. Callers bound `n` by [`free_entries`](Self::free_entries)
    /// so the first attempt normally succeeds.
    pub fn reserve_slots(&mut self, n: u32) -> u32 {
        debug_assert!(n <= self.ring.len(), "fill reservation larger than the ring");
        loop {
            if let Some(idx) = self.ring.reserve(n) {
                return idx;
            }
            hint::spin_loop();
        }
    }

    /// Hand `frame` to the kernel through slot `idx` of a pending reservation.
    #[inline]
    pub fn write(&mut self, idx: u32, frame: Frame) {
        unsafe { self.ring.write_at(idx, frame.into_addr()) };
    }

    /// Publish `n` reserved and written slots.
    #[inline]
    pub fn submit(&mut self, n: u32) {
        self.ring.submit(n);
    }

    #[inline]
    pub fn needs_wakeup(&self) -> bool {
        self.ring.needs_wakeup()
    }

    pub fn len(&self) -> u32 {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Consumer side of the umem completion ring: frames the kernel has sent.
pub struct CompletionQueue {
    ring: ConsumerRing<u64>,
}

impl CompletionQueue {
    pub fn new(ring: ConsumerRing<u64>) -> Self {
        Self { ring }
    }

    /// Drain up to `max` completed frames without blocking, passing each to
    /// `reclaim` exactly once. Returns how many were drained.
    pub fn poll<F>(&mut self, max: u32, mut reclaim: F) -> u32
    where
        F: FnMut(Frame),
    {
        let count = self.ring.peek(max);
        if count == 0 {
            return 0;
        }
        let start = self.ring.consumer_idx();
        for i in 0..count {
            let addr = unsafe { self.ring.read_at(start.wrapping_add(i)) };
            reclaim(unsafe { Frame::from_kernel(addr) });
        }
        self.ring.release(count);
        count
    }

    pub fn len(&self) -> u32 {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
