pub mod consumer;
pub mod desc;
pub mod heap;
pub mod producer;

pub use consumer::ConsumerRing;
pub use desc::XDPDesc;
pub use heap::HeapRing;
pub use producer::ProducerRing;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::if_xdp::XDP_RING_NEED_WAKEUP;

    #[test]
    fn test_producer_ring_basic_flow() {
        let mem = HeapRing::<u64>::new(4);
        let mut ring = unsafe { mem.producer() };

        assert_eq!(ring.free_entries(4), 4);

        let idx = ring.reserve(2).expect("two free slots");
        assert_eq!(idx, 0);
        unsafe {
            ring.write_at(idx, 100);
            ring.write_at(idx + 1, 101);
        }

        // Nothing is visible to the consumer before submit.
        assert_eq!(mem.producer_idx(), 0);
        ring.submit(2);
        assert_eq!(mem.producer_idx(), 2);

        let idx2 = ring.reserve(2).expect("two more slots");
        assert_eq!(idx2, 2);
        ring.submit(2);
        assert_eq!(mem.producer_idx(), 4);

        // prod = 4, cons = 0, size = 4
        assert!(ring.reserve(1).is_none());
    }

    #[test]
    fn test_consumer_ring_basic_flow() {
        let mem = HeapRing::<u64>::new(4);
        let mut prod = unsafe { mem.producer() };
        let mut ring = unsafe { mem.consumer() };

        assert_eq!(ring.peek(4), 0);

        let idx = prod.reserve(2).unwrap();
        unsafe {
            prod.write_at(idx, 7);
            prod.write_at(idx + 1, 8);
        }
        prod.submit(2);

        assert_eq!(ring.peek(4), 2);
        assert_eq!(ring.peek(1), 1);
        let cons_idx = ring.consumer_idx();
        assert_eq!(cons_idx, 0);
        assert_eq!(unsafe { ring.read_at(cons_idx) }, 7);
        assert_eq!(unsafe { ring.read_at(cons_idx + 1) }, 8);

        ring.release(2);
        assert_eq!(mem.consumer_idx(), 2);
        assert_eq!(ring.peek(4), 0);
    }

    #[test]
    fn test_producer_sees_released_slots() {
        let mem = HeapRing::<u64>::new(4);
        let mut prod = unsafe { mem.producer() };
        let mut cons = unsafe { mem.consumer() };

        prod.reserve(4).unwrap();
        prod.submit(4);
        assert!(prod.reserve(1).is_none());

        assert_eq!(cons.peek(4), 4);
        cons.release(3);

        assert_eq!(prod.free_entries(1), 3);
        assert!(prod.reserve(3).is_some());
    }

    #[test]
    fn test_ring_wrapping() {
        let start = u32::MAX - 1;
        let mem = HeapRing::<u64>::starting_at(4, start);
        let mut ring = unsafe { mem.producer() };

        let start_idx = ring.reserve(2).unwrap();
        assert_eq!(start_idx, start);

        // offsets (MAX-1) & 3 = 2 and MAX & 3 = 3
        unsafe {
            ring.write_at(start_idx, 10);
            ring.write_at(start_idx.wrapping_add(1), 11);
        }
        ring.submit(2);
        assert_eq!(mem.producer_idx(), 0);

        let mut cons_ring = unsafe { mem.consumer() };
        assert_eq!(cons_ring.peek(4), 2);
        let idx = cons_ring.consumer_idx();
        assert_eq!(unsafe { cons_ring.read_at(idx) }, 10);
        assert_eq!(unsafe { cons_ring.read_at(idx.wrapping_add(1)) }, 11);

        cons_ring.release(2);
        assert_eq!(mem.consumer_idx(), 0);
    }

    #[test]
    fn test_needs_wakeup_flag() {
        let mem = HeapRing::<XDPDesc>::new(8);
        let ring = unsafe { mem.producer() };
        assert!(!ring.needs_wakeup());
        mem.set_flags(XDP_RING_NEED_WAKEUP);
        assert!(ring.needs_wakeup());
    }
}
