use std::sync::atomic::{AtomicU32, Ordering};
use std::ptr;

/// User-space consumer side of a kernel ring (RX, completion).
pub struct ConsumerRing<T> {
    producer: *const AtomicU32,
    consumer: *mut AtomicU32,
    descriptors: *const T,
    mask: u32,
    size: u32,
    cached_prod: u32,
    cached_cons: u32,
}

unsafe impl<T> Send for ConsumerRing<T> {}

impl<T: Copy> ConsumerRing<T> {
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
        let producer = producer as *const AtomicU32;
        let consumer = consumer as *mut AtomicU32;
        let cached_cons = (*consumer).load(Ordering::Relaxed);
        let cached_prod = (*producer).load(Ordering::Acquire);
        Self {
            producer,
            consumer,
            descriptors,
            mask: size - 1,
            size,
            cached_prod,
            cached_cons,
        }
    }

    /// Number of entries ready to read, capped at `count`. Entries are read
    /// from [`consumer_idx`](Self::consumer_idx) onwards and stay owned by the
    /// ring until [`release`](Self::release).
    #[inline]
    pub fn peek(&mut self, count: u32) -> u32 {
        let mut available = self.cached_prod.wrapping_sub(self.cached_cons);
        if available == 0 {
            self.cached_prod = unsafe { (*self.producer).load(Ordering::Acquire) };
            available = self.cached_prod.wrapping_sub(self.cached_cons);
        }
        available.min(count)
    }

    #[inline]
    pub fn release(&mut self, count: u32) {
        self.cached_cons = self.cached_cons.wrapping_add(count);
        unsafe { (*self.consumer).store(self.cached_cons, Ordering::Release) };
    }

    /// # Safety
    /// `idx` must lie between `consumer_idx()` and the last value returned by `peek`.
    #[inline]
    pub unsafe fn read_at(&self, idx: u32) -> T {
        let offset = (idx & self.mask) as usize;
        ptr::read(self.descriptors.add(offset))
    }

    #[inline]
    pub fn consumer_idx(&self) -> u32 {
        self.cached_cons
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
