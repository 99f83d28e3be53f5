use std::sync::atomic::{AtomicU32, Ordering};
use std::ptr;
use crate::sys::if_xdp::XDP_RING_NEED_WAKEUP;

/// User-space producer side of a kernel ring (fill, TX).
///
/// Slots are claimed with [`reserve`](Self::reserve), written with
/// [`write_at`](Self::write_at) and handed over with [`submit`](Self::submit).
pub struct ProducerRing<T> {
    producer: *mut AtomicU32,
    consumer: *const AtomicU32,
    flags: *const AtomicU32,
    descriptors: *mut T,
    mask: u32,
    size: u32,
    cached_prod: u32,
    cached_cons: u32,
}

unsafe impl<T> Send for ProducerRing<T> {}

impl<T: Copy> ProducerRing<T> {
    /// # Safety
    /// Pointers must be valid for the lifetime of the ring, mapped from the
    /// kernel (or equivalent shared memory), and `size` must be a power of two.
    pub unsafe fn new(
        producer: *mut u32,
        consumer: *mut u32,
        descriptors: *mut T,
        size: u32,
    ) -> Self {
        debug_assert!(size.is_power_of_two());
        let producer = producer as *mut AtomicU32;
        let consumer = consumer as *const AtomicU32;
        let cached_prod = (*producer).load(Ordering::Relaxed);
        let cached_cons = (*consumer).load(Ordering::Acquire).wrapping_add(size);
        Self {
            producer,
            consumer,
            flags: ptr::null(),
            descriptors,
            mask: size - 1,
            size,
            cached_prod,
            cached_cons,
        }
    }

    /// Attach the ring's flags word so [`needs_wakeup`](Self::needs_wakeup) works.
    ///
    /// # Safety
    /// `flags` must stay valid for the lifetime of the ring.
    pub unsafe fn with_flags(mut self, flags: *mut u32) -> Self {
        self.flags = flags as *const AtomicU32;
        self
    }

    /// Number of free slots, refreshing the consumer cursor only when the
    /// cached view cannot satisfy `wanted`.
    #[inline]
    pub fn free_entries(&mut self, wanted: u32) -> u32 {
        let free = self.cached_cons.wrapping_sub(self.cached_prod);
        if free >= wanted {
            return free;
        }
        let consumer_idx = unsafe { (*self.consumer).load(Ordering::Acquire) };
        self.cached_cons = consumer_idx.wrapping_add(self.size);
        self.cached_cons.wrapping_sub(self.cached_prod)
    }

    /// Claim `count` slots. Returns the index of the first one, or `None`
    /// when the ring cannot take all of them.
    #[inline]
    pub fn reserve(&mut self, count: u32) -> Option<u32> {
        if self.free_entries(count) < count {
            return None;
        }
        let idx = self.cached_prod;
        self.cached_prod = self.cached_prod.wrapping_add(count);
        Some(idx)
    }

    /// Publish `count` previously reserved and written slots.
    #[inline]
    pub fn submit(&mut self, count: u32) {
        let producer_idx = unsafe { (*self.producer).load(Ordering::Relaxed) };
        unsafe { (*self.producer).store(producer_idx.wrapping_add(count), Ordering::Release) };
    }

    /// # Safety
    /// `idx` must lie inside a reservation that has not been submitted yet.
    #[inline]
    pub unsafe fn write_at(&mut self, idx: u32, item: T) {
        let offset = (idx & self.mask) as usize;
        ptr::write(self.descriptors.add(offset), item);
    }

    #[inline]
    pub fn needs_wakeup(&self) -> bool {
        if self.flags.is_null() {
            return false;
        }
        unsafe { (*self.flags).load(Ordering::Relaxed) & XDP_RING_NEED_WAKEUP != 0 }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
