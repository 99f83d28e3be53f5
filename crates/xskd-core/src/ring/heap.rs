use std::sync::atomic::{AtomicU32, Ordering};
use crate::ring::{ConsumerRing, ProducerRing};

/// Ring memory on the process heap, laid out like a kernel-mapped ring.
///
/// Lets both ends of a ring be driven from user space, which is how the
/// engine is exercised without an AF_XDP socket.
pub struct HeapRing<T> {
    producer: Box<AtomicU32>,
    consumer: Box<AtomicU32>,
    flags: Box<AtomicU32>,
    descriptors: *mut [T],
    size: u32,
}

unsafe impl<T: Send> Send for HeapRing<T> {}

impl<T: Copy + Default> HeapRing<T> {
    pub fn new(size: u32) -> Self {
        Self::starting_at(size, 0)
    }

    /// A ring whose cursors start at `start`, for exercising index wrap-around.
    pub fn starting_at(size: u32, start: u32) -> Self {
        assert!(size.is_power_of_two(), "ring size must be a power of two");
        let descriptors = vec![T::default(); size as usize].into_boxed_slice();
        Self {
            producer: Box::new(AtomicU32::new(start)),
            consumer: Box::new(AtomicU32::new(start)),
            flags: Box::new(AtomicU32::new(0)),
            descriptors: Box::into_raw(descriptors),
            size,
        }
    }

    /// # Safety
    /// The returned view must not outlive `self`, and only one producer view
    /// may be used at a time.
    pub unsafe fn producer(&self) -> ProducerRing<T> {
        ProducerRing::new(
            self.producer.as_ptr(),
            self.consumer.as_ptr(),
            self.descriptors as *mut T,
            self.size,
        )
        .with_flags(self.flags.as_ptr())
    }

    /// # Safety
    /// The returned view must not outlive `self`, and only one consumer view
    /// may be used at a time.
    pub unsafe fn consumer(&self) -> ConsumerRing<T> {
        ConsumerRing::new(
            self.producer.as_ptr(),
            self.consumer.as_ptr(),
            self.descriptors as *mut T,
            self.size,
        )
    }

    pub fn producer_idx(&self) -> u32 {
        self.producer.load(Ordering::Acquire)
    }

    pub fn consumer_idx(&self) -> u32 {
        self.consumer.load(Ordering::Acquire)
    }

    /// Entries published by the producer and not yet released by the consumer.
    pub fn pending(&self) -> u32 {
        self.producer_idx().wrapping_sub(self.consumer_idx())
    }

    pub fn set_flags(&self, flags: u32) {
        self.flags.store(flags, Ordering::Release);
    }
}

impl<T> Drop for HeapRing<T> {
    fn drop(&mut self) {
        drop(unsafe { Box::from_raw(self.descriptors) });
    }
}
