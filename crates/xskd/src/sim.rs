//! An in-process stand-in for the kernel side of an AF_XDP socket.
//!
//! Rings live on the heap and the "kernel" is driven explicitly by the test:
//! [`SimXsk::deliver`] plays a received packet through the fill and RX
//! rings, [`SimXsk::transmit`] drains TX, and [`SimXsk::complete`] returns
//! sent frames on the completion ring.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use xskd_core::ring::{ConsumerRing, HeapRing, ProducerRing, XDPDesc};
use xskd_core::sys::if_xdp::XDP_RING_NEED_WAKEUP;
use xskd_core::umem::{FrameArea, UmemLayout, UmemRegion};

use crate::engine::{Queues, XskPort};
use crate::stats::XskStats;
use crate::xsk::queue::{CompletionQueue, FillQueue};

pub struct SimXsk {
    // User-side views into the heap rings below.
    rx_view: ConsumerRing<XDPDesc>,
    tx_view: ProducerRing<XDPDesc>,
    fill_view: FillQueue,
    comp_view: CompletionQueue,
    rx: HeapRing<XDPDesc>,
    tx: HeapRing<XDPDesc>,
    fill: HeapRing<u64>,
    comp: HeapRing<u64>,
    region: UmemRegion,
    in_flight: VecDeque<u64>,
    stats: Arc<XskStats>,
    need_wakeup: bool,
    kicks: Cell<u64>,
    rx_wakeups: Cell<u64>,
}

impl SimXsk {
    /// All four rings get `ring_size` slots.
    pub fn new(layout: UmemLayout, ring_size: u32) -> io::Result<Self> {
        let rx = HeapRing::new(ring_size);
        let tx = HeapRing::new(ring_size);
        let fill = HeapRing::new(ring_size);
        let comp = HeapRing::new(ring_size);
        let (rx_view, tx_view, fill_view, comp_view) = unsafe {
            (
                rx.consumer(),
                tx.producer(),
                FillQueue::new(fill.producer()),
                CompletionQueue::new(comp.consumer()),
            )
        };
        Ok(Self {
            rx_view,
            tx_view,
            fill_view,
            comp_view,
            rx,
            tx,
            fill,
            comp,
            region: UmemRegion::new(layout)?,
            in_flight: VecDeque::new(),
            stats: Arc::new(XskStats::default()),
            need_wakeup: false,
            kicks: Cell::new(0),
            rx_wakeups: Cell::new(0),
        })
    }

    /// Behave as if bound with `XDP_USE_NEED_WAKEUP`.
    pub fn with_need_wakeup(mut self) -> Self {
        self.need_wakeup = true;
        self
    }

    /// Receive `packet`: take a frame off the fill ring, copy the bytes in
    /// and post an RX descriptor. Returns the frame address, or `None` when
    /// the kernel would drop the packet (no fill entry, RX ring full, or
    /// packet larger than a frame).
    pub fn deliver(&mut self, packet: &[u8]) -> Option<u64> {
        let mut rx = unsafe { self.rx.producer() };
        let mut fill = unsafe { self.fill.consumer() };
        if fill.peek(1) == 0 || rx.free_entries(1) == 0 {
            return None;
        }
        let addr = unsafe { fill.read_at(fill.consumer_idx()) };
        if packet.len() > self.region.layout().frame_size as usize {
            return None;
        }
        let frame = unsafe { self.region.area().slice_mut(addr, packet.len()) }?;
        frame.copy_from_slice(packet);
        fill.release(1);

        let idx = rx.reserve(1)?;
        unsafe { rx.write_at(idx, XDPDesc::new(addr, packet.len() as u32)) };
        rx.submit(1);
        Some(addr)
    }

    /// Take every queued TX descriptor. The frames stay in flight until
    /// [`complete`](Self::complete).
    pub fn transmit(&mut self) -> Vec<XDPDesc> {
        let mut tx = unsafe { self.tx.consumer() };
        let count = tx.peek(u32::MAX);
        let start = tx.consumer_idx();
        let sent: Vec<XDPDesc> = (0..count)
            .map(|i| unsafe { tx.read_at(start.wrapping_add(i)) })
            .collect();
        tx.release(count);
        self.in_flight.extend(sent.iter().map(|d| d.addr));
        sent
    }

    /// Post up to `max` in-flight frames on the completion ring, oldest
    /// first. Returns how many were posted.
    pub fn complete(&mut self, max: usize) -> usize {
        let mut comp = unsafe { self.comp.producer() };
        let count = max.min(self.in_flight.len()) as u32;
        let count = comp.free_entries(count).min(count);
        let Some(idx) = comp.reserve(count) else {
            return 0;
        };
        for i in 0..count {
            if let Some(addr) = self.in_flight.pop_front() {
                unsafe { comp.write_at(idx.wrapping_add(i), addr) };
            }
        }
        comp.submit(count);
        count as usize
    }

    /// Bytes of the frame at `addr`.
    pub fn frame(&self, addr: u64, len: usize) -> Vec<u8> {
        unsafe { self.region.area().slice_mut(addr, len) }
            .map(|s| s.to_vec())
            .unwrap_or_default()
    }

    pub fn set_tx_need_wakeup(&self, flagged: bool) {
        self.tx.set_flags(if flagged { XDP_RING_NEED_WAKEUP } else { 0 });
    }

    pub fn set_fill_need_wakeup(&self, flagged: bool) {
        self.fill.set_flags(if flagged { XDP_RING_NEED_WAKEUP } else { 0 });
    }

    pub fn fill_pending(&self) -> u32 {
        self.fill.pending()
    }

    pub fn rx_pending(&self) -> u32 {
        self.rx.pending()
    }

    pub fn tx_pending(&self) -> u32 {
        self.tx.pending()
    }

    pub fn comp_pending(&self) -> u32 {
        self.comp.pending()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn kicks(&self) -> u64 {
        self.kicks.get()
    }

    pub fn rx_wakeups(&self) -> u64 {
        self.rx_wakeups.get()
    }
}

impl XskPort for SimXsk {
    fn queues(&mut self) -> Queues<'_> {
        Queues {
            rx: &mut self.rx_view,
            tx: &mut self.tx_view,
            fill: &mut self.fill_view,
            comp: &mut self.comp_view,
        }
    }

    fn frame_area(&self) -> FrameArea {
        self.region.area()
    }

    fn layout(&self) -> UmemLayout {
        self.region.layout()
    }

    fn wait_readable(&self, _timeout: Duration) -> io::Result<bool> {
        Ok(self.rx.pending() > 0)
    }

    fn kick_tx(&self) -> io::Result<()> {
        self.kicks.set(self.kicks.get() + 1);
        Ok(())
    }

    fn wakeup_rx(&self) -> io::Result<()> {
        self.rx_wakeups.set(self.rx_wakeups.get() + 1);
        Ok(())
    }

    fn need_wakeup(&self) -> bool {
        self.need_wakeup
    }

    fn counters(&self) -> &Arc<XskStats> {
        &self.stats
    }
}
