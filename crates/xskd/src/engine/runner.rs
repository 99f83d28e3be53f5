use std::iter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use xskd_core::ring::XDPDesc;
use xskd_core::umem::{Frame, FramePool};

use crate::config::{Poller, XskConfig};
use crate::engine::XskPort;
use crate::error::Result;
use crate::processor::{PacketProcessor, Verdict};
use crate::stats::XskStats;

/// Receive-process-transmit loop over one socket.
///
/// Owns the frame pool and every ring cursor of the port; nothing else may
/// touch them while the engine runs. Counters are published through the
/// port's [`XskStats`].
pub struct Engine<P: XskPort> {
    port: P,
    pool: FramePool,
    processor: Box<dyn PacketProcessor>,
    stats: Arc<XskStats>,
    poller: Poller,
    poll_timeout: Duration,
    batch_size: usize,
    need_wakeup: bool,
    outstanding_tx: u32,
    // Reused across batches.
    descs_buf: Vec<XDPDesc>,
    verdicts_buf: Vec<Verdict>,
    refill_buf: Vec<Frame>,
}

impl<P: XskPort> Engine<P> {
    /// Take over `port` and hand the kernel as many empty frames as the fill
    /// ring holds.
    pub fn new(port: P, processor: Box<dyn PacketProcessor>, config: &XskConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        let pool = FramePool::new(port.layout());
        let stats = Arc::clone(port.counters());
        let need_wakeup = port.need_wakeup();

        let mut engine = Self {
            port,
            pool,
            processor,
            stats,
            poller: config.poller,
            poll_timeout: config.poll_timeout,
            batch_size,
            need_wakeup,
            outstanding_tx: 0,
            descs_buf: vec![XDPDesc::default(); batch_size],
            verdicts_buf: vec![Verdict::Drop; batch_size],
            refill_buf: Vec::with_capacity(batch_size),
        };

        let ring = engine.port.queues().fill.len();
        let filled = engine.refill(ring);
        info!(
            filled,
            pool = engine.pool.capacity(),
            processor = engine.processor.name(),
            "fill ring primed"
        );
        engine
    }

    /// Loop until `stop` is set. The current batch always completes first.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        match self.poller {
            Poller::Wait => {
                while !stop.load(Ordering::Relaxed) {
                    // On timeout the batch only reclaims completions.
                    self.port.wait_readable(self.poll_timeout)?;
                    self.process_batch()?;
                }
            }
            Poller::Busy => {
                while !stop.load(Ordering::Relaxed) {
                    if self.process_batch()? == 0
                        && self.need_wakeup
                        && self.port.queues().fill.needs_wakeup()
                    {
                        self.port.wakeup_rx()?;
                    }
                }
            }
        }
        debug!(outstanding_tx = self.outstanding_tx, "engine stopped");
        Ok(())
    }

    /// One Draining -> Replenishing -> Processing -> Reclaiming pass.
    /// Returns the number of packets received.
    pub fn process_batch(&mut self) -> Result<usize> {
        let received = self.drain();
        if received == 0 {
            self.reclaim()?;
            return Ok(0);
        }

        self.replenish();
        self.process(received);
        self.reclaim()?;
        Ok(received as usize)
    }

    /// Copy up to one batch of RX descriptors out of the ring. They stay
    /// owned by the ring until [`process`](Self::process) releases them.
    fn drain(&mut self) -> u32 {
        let rx = self.port.queues().rx;
        let count = rx.peek(self.batch_size as u32);
        let start = rx.consumer_idx();
        for i in 0..count {
            self.descs_buf[i as usize] = unsafe { rx.read_at(start.wrapping_add(i)) };
        }
        count
    }

    /// Offer the kernel fresh frames, as many as both the fill ring and the
    /// pool can spare.
    fn replenish(&mut self) {
        let free = self.pool.free_count() as u32;
        self.refill(free);
    }

    /// Put up to `max` pool frames on the fill ring. Never takes more than
    /// the pool has free or the ring has room for.
    fn refill(&mut self, max: u32) -> u32 {
        let fill = self.port.queues().fill;
        let room = fill.free_entries(max).min(max);
        let pool = &mut self.pool;
        self.refill_buf
            .extend(iter::from_fn(|| pool.allocate()).take(room as usize));

        let count = self.refill_buf.len() as u32;
        if count == 0 {
            return 0;
        }
        let start = fill.reserve_slots(count);
        for (i, frame) in self.refill_buf.drain(..).enumerate() {
            fill.write(start.wrapping_add(i as u32), frame);
        }
        fill.submit(count);
        count
    }

    /// Run the processor over the drained frames, queue the forwarded ones
    /// on TX, free the rest and release the RX slots.
    fn process(&mut self, count: u32) {
        let n = count as usize;
        let area = self.port.frame_area();
        let mut rx_bytes = 0u64;
        let mut forward = 0u32;

        for i in 0..n {
            let desc = self.descs_buf[i];
            rx_bytes += desc.len as u64;
            let verdict = match unsafe { area.slice_mut(desc.addr, desc.len as usize) } {
                Some(packet) => self.processor.process(packet),
                None => {
                    warn!(addr = desc.addr, len = desc.len, "RX descriptor outside the umem");
                    Verdict::Drop
                }
            };
            if verdict == Verdict::Forward {
                forward += 1;
            }
            self.verdicts_buf[i] = verdict;
        }
        self.stats.record_rx(count as u64, rx_bytes);

        let queues = self.port.queues();
        let tx = queues.tx;
        let accepted = if forward > 0 { tx.free_entries(forward).min(forward) } else { 0 };
        let mut tx_idx = tx.reserve(accepted).unwrap_or(0);
        let mut sent = 0u32;
        let mut tx_bytes = 0u64;
        let mut dropped = 0u64;

        for i in 0..n {
            let desc = self.descs_buf[i];
            let frame = unsafe { Frame::from_kernel(desc.addr) };
            if self.verdicts_buf[i] == Verdict::Forward && sent < accepted {
                unsafe { tx.write_at(tx_idx, XDPDesc::new(frame.into_addr(), desc.len)) };
                tx_idx = tx_idx.wrapping_add(1);
                sent += 1;
                tx_bytes += desc.len as u64;
            } else {
                self.pool.free(frame);
                dropped += 1;
            }
        }

        if sent > 0 {
            tx.submit(sent);
            self.outstanding_tx += sent;
            self.stats.record_tx(sent as u64, tx_bytes);
        }
        if accepted < forward {
            warn!(overflow = forward - accepted, "TX ring full, dropping replies");
        }
        if dropped > 0 {
            self.stats.record_dropped(dropped);
        }

        queues.rx.release(count);
    }

    /// Kick TX and return every completed frame to the pool.
    fn reclaim(&mut self) -> Result<()> {
        if self.outstanding_tx == 0 {
            return Ok(());
        }

        let tx_flagged = self.port.queues().tx.needs_wakeup();
        if !self.need_wakeup || tx_flagged {
            self.port.kick_tx()?;
        }

        let comp = self.port.queues().comp;
        let max = comp.len();
        let pool = &mut self.pool;
        let reclaimed = comp.poll(max, |frame| pool.free(frame));

        if reclaimed > self.outstanding_tx {
            warn!(
                reclaimed,
                outstanding = self.outstanding_tx,
                "completion ring returned more frames than were sent"
            );
        }
        self.outstanding_tx = self.outstanding_tx.saturating_sub(reclaimed);
        Ok(())
    }

    pub fn pool(&self) -> &FramePool {
        &self.pool
    }

    pub fn outstanding_tx(&self) -> u32 {
        self.outstanding_tx
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn stats(&self) -> &Arc<XskStats> {
        &self.stats
    }

    /// Stop driving the port and give it back, e.g. for teardown.
    pub fn into_port(self) -> P {
        let rejected = self.pool.rejected();
        if rejected > 0 {
            warn!(rejected, "frame pool refused frees during the run");
        }
        self.port
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::icmp::tests::echo_request_v4;
    use crate::processor::IcmpEchoResponder;
    use crate::sim::SimXsk;
    use crate::stats::StatsSnapshot;
    use std::thread;
    use std::time::Instant;
    use xskd_core::umem::UmemLayout;
    use xskd_proto::ethernet::ETH_HLEN;
    use xskd_proto::icmp::ICMP_ECHOREPLY;
    use xskd_proto::ipv4::{IPPROTO_ICMP, IPPROTO_UDP, IPV4_MIN_HLEN};

    fn engine(frames: u32, ring: u32) -> Engine<SimXsk> {
        let sim = SimXsk::new(UmemLayout::new(2048, frames).unwrap(), ring).unwrap();
        Engine::new(sim, Box::new(IcmpEchoResponder), &XskConfig::default())
    }

    /// Every frame is in exactly one place.
    fn assert_conserved(engine: &Engine<SimXsk>) {
        let sim = engine.port();
        let accounted = engine.pool().free_count() as u32
            + sim.fill_pending()
            + sim.rx_pending()
            + sim.tx_pending()
            + sim.in_flight() as u32
            + sim.comp_pending();
        assert_eq!(accounted as usize, engine.pool().capacity());
    }

    /// Run `engine` on its own thread until `done` holds for its counters
    /// (or two seconds pass), then stop it and wait for the loop to exit.
    fn run_until(engine: &mut Engine<SimXsk>, done: impl Fn(&StatsSnapshot) -> bool) {
        let stop = AtomicBool::new(false);
        let stats = Arc::clone(engine.stats());
        thread::scope(|s| {
            let runner = s.spawn(|| engine.run(&stop));
            let deadline = Instant::now() + Duration::from_secs(2);
            while !done(&stats.snapshot()) && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            stop.store(true, Ordering::Relaxed);
            runner.join().unwrap().unwrap();
        });
    }

    fn busy_engine(need_wakeup: bool) -> Engine<SimXsk> {
        let mut sim = SimXsk::new(UmemLayout::new(2048, 8).unwrap(), 8).unwrap();
        if need_wakeup {
            sim = sim.with_need_wakeup();
        }
        let config = XskConfig { poller: Poller::Busy, ..Default::default() };
        Engine::new(sim, Box::new(IcmpEchoResponder), &config)
    }

    #[test]
    fn test_initial_fill_takes_whole_pool() {
        let engine = engine(8, 8);
        assert_eq!(engine.port().fill_pending(), 8);
        assert_eq!(engine.pool().free_count(), 0);
    }

    #[test]
    fn test_initial_fill_bounded_by_ring() {
        let engine = engine(16, 8);
        assert_eq!(engine.port().fill_pending(), 8);
        assert_eq!(engine.pool().free_count(), 8);
    }

    #[test]
    fn test_echo_scenario() {
        let mut engine = engine(8, 8);
        for seq in 0..3 {
            let pkt = echo_request_v4(IPPROTO_ICMP, seq, b"payload!");
            assert!(engine.port_mut().deliver(&pkt).is_some());
        }

        assert_eq!(engine.process_batch().unwrap(), 3);
        assert_eq!(engine.port().tx_pending(), 3);
        assert_eq!(engine.pool().free_count(), 0);
        assert_eq!(engine.outstanding_tx(), 3);
        let snap = engine.stats().snapshot();
        assert_eq!((snap.rx_packets, snap.tx_packets, snap.dropped), (3, 3, 0));
        assert_conserved(&engine);

        let sent = engine.port_mut().transmit();
        assert_eq!(sent.len(), 3);
        for desc in &sent {
            let frame = engine.port().frame(desc.addr, desc.len as usize);
            assert_eq!(frame[ETH_HLEN + IPV4_MIN_HLEN], ICMP_ECHOREPLY);
        }
        assert_eq!(engine.port_mut().complete(3), 3);

        assert_eq!(engine.process_batch().unwrap(), 0);
        assert_eq!(engine.pool().free_count(), 3);
        assert_eq!(engine.outstanding_tx(), 0);
        assert_eq!(engine.stats().snapshot().rx_packets, 3);
        assert_conserved(&engine);
    }

    #[test]
    fn test_drop_scenario() {
        let mut engine = engine(8, 8);
        for seq in 0..3 {
            let pkt = echo_request_v4(IPPROTO_UDP, seq, b"payload!");
            assert!(engine.port_mut().deliver(&pkt).is_some());
        }

        assert_eq!(engine.process_batch().unwrap(), 3);
        assert_eq!(engine.port().tx_pending(), 0);
        assert_eq!(engine.pool().free_count(), 3);
        assert_eq!(engine.outstanding_tx(), 0);
        let snap = engine.stats().snapshot();
        assert_eq!((snap.rx_packets, snap.tx_packets, snap.dropped), (3, 0, 3));
        assert_conserved(&engine);
    }

    #[test]
    fn test_replenish_never_exceeds_pool() {
        let mut engine = engine(4, 8);
        assert_eq!(engine.port().fill_pending(), 4);
        let pkt = echo_request_v4(IPPROTO_UDP, 0, b"x");
        engine.port_mut().deliver(&pkt);
        engine.port_mut().deliver(&pkt);

        engine.process_batch().unwrap();
        // Pool was empty when replenishing, so only the two dropped frames
        // are back, and in the pool rather than on the fill ring.
        assert_eq!(engine.port().fill_pending(), 2);
        assert_eq!(engine.pool().free_count(), 2);

        engine.port_mut().deliver(&pkt);
        engine.process_batch().unwrap();
        assert_eq!(engine.port().fill_pending(), 3);
        assert_eq!(engine.pool().free_count(), 1);
        assert_conserved(&engine);
    }

    #[test]
    fn test_batch_size_caps_drain() {
        let sim = SimXsk::new(UmemLayout::new(2048, 16).unwrap(), 16).unwrap();
        let config = XskConfig { batch_size: 4, ..Default::default() };
        let mut engine = Engine::new(sim, Box::new(IcmpEchoResponder), &config);
        let pkt = echo_request_v4(IPPROTO_UDP, 0, b"x");
        for _ in 0..10 {
            engine.port_mut().deliver(&pkt);
        }

        assert_eq!(engine.process_batch().unwrap(), 4);
        assert_eq!(engine.port().rx_pending(), 6);
        assert_eq!(engine.process_batch().unwrap(), 4);
        assert_eq!(engine.process_batch().unwrap(), 2);
        assert_eq!(engine.process_batch().unwrap(), 0);
        assert_conserved(&engine);
    }

    #[test]
    fn test_tx_overflow_frees_frames() {
        let mut engine = engine(8, 4);
        let pkt = echo_request_v4(IPPROTO_ICMP, 1, b"ping");
        for _ in 0..4 {
            engine.port_mut().deliver(&pkt);
        }
        assert_eq!(engine.process_batch().unwrap(), 4);
        assert_eq!(engine.port().tx_pending(), 4);

        // TX ring is full and nothing drains it.
        for _ in 0..4 {
            engine.port_mut().deliver(&pkt);
        }
        assert_eq!(engine.process_batch().unwrap(), 4);
        assert_eq!(engine.port().tx_pending(), 4);
        assert_eq!(engine.pool().free_count(), 4);
        let snap = engine.stats().snapshot();
        assert_eq!((snap.tx_packets, snap.dropped), (4, 4));
        assert_conserved(&engine);
    }

    #[test]
    fn test_conservation_under_mixed_traffic() {
        let mut engine = engine(32, 16);
        for round in 0..200u16 {
            let proto = if round % 3 == 0 { IPPROTO_UDP } else { IPPROTO_ICMP };
            let pkt = echo_request_v4(proto, round, b"mixed");
            for _ in 0..(round % 5) {
                engine.port_mut().deliver(&pkt);
            }
            engine.process_batch().unwrap();
            assert_conserved(&engine);

            if round % 4 == 0 {
                engine.port_mut().transmit();
            }
            if round % 7 == 0 {
                let n = engine.port().in_flight();
                engine.port_mut().complete(n);
            }
            assert_conserved(&engine);
        }
    }

    #[test]
    fn test_need_wakeup_gates_tx_kick() {
        let sim = SimXsk::new(UmemLayout::new(2048, 8).unwrap(), 8)
            .unwrap()
            .with_need_wakeup();
        let mut engine = Engine::new(sim, Box::new(IcmpEchoResponder), &XskConfig::default());
        let pkt = echo_request_v4(IPPROTO_ICMP, 1, b"ping");

        engine.port_mut().deliver(&pkt);
        engine.process_batch().unwrap();
        assert_eq!(engine.port().kicks(), 0);

        engine.port().set_tx_need_wakeup(true);
        engine.process_batch().unwrap();
        assert_eq!(engine.port().kicks(), 1);
    }

    #[test]
    fn test_kick_without_need_wakeup() {
        let mut engine = engine(8, 8);
        engine.process_batch().unwrap();
        assert_eq!(engine.port().kicks(), 0, "nothing outstanding, no kick");

        engine.port_mut().deliver(&echo_request_v4(IPPROTO_ICMP, 1, b"ping"));
        engine.process_batch().unwrap();
        assert_eq!(engine.port().kicks(), 1);
    }

    #[test]
    fn test_run_returns_once_stopped() {
        let stop = AtomicBool::new(true);
        for poller in [Poller::Wait, Poller::Busy] {
            let sim = SimXsk::new(UmemLayout::new(2048, 8).unwrap(), 8).unwrap();
            let config = XskConfig { poller, ..Default::default() };
            let mut engine = Engine::new(sim, Box::new(IcmpEchoResponder), &config);
            engine.run(&stop).unwrap();
            assert_eq!(engine.into_port().fill_pending(), 8);
        }
    }

    #[test]
    fn test_wait_loop_finishes_batch_before_stopping() {
        let mut engine = engine(8, 8);
        for seq in 0..4 {
            let pkt = echo_request_v4(IPPROTO_ICMP, seq, b"payload!");
            assert!(engine.port_mut().deliver(&pkt).is_some());
        }

        run_until(&mut engine, |snap| snap.rx_packets >= 4);

        let snap = engine.stats().snapshot();
        assert_eq!((snap.rx_packets, snap.tx_packets, snap.dropped), (4, 4, 0));
        assert_eq!(engine.port().rx_pending(), 0);
        assert_eq!(engine.port().tx_pending(), 4);
        assert_eq!(engine.outstanding_tx(), 4);
        assert_conserved(&engine);
    }

    #[test]
    fn test_busy_loop_wakes_rx_when_fill_flagged() {
        let mut engine = busy_engine(true);
        engine.port().set_fill_need_wakeup(true);
        for seq in 0..2 {
            engine.port_mut().deliver(&echo_request_v4(IPPROTO_ICMP, seq, b"ping"));
        }

        // Leave time for idle spins after the two packets.
        let start = Instant::now();
        run_until(&mut engine, |snap| {
            snap.rx_packets >= 2 && start.elapsed() >= Duration::from_millis(20)
        });

        assert_eq!(engine.stats().snapshot().rx_packets, 2);
        assert!(engine.port().rx_wakeups() > 0);
        assert_conserved(&engine);
    }

    #[test]
    fn test_busy_loop_leaves_rx_alone_otherwise() {
        // Flag clear with need_wakeup, and flag set without it.
        for (need_wakeup, flagged) in [(true, false), (false, true)] {
            let mut engine = busy_engine(need_wakeup);
            engine.port().set_fill_need_wakeup(flagged);

            let start = Instant::now();
            run_until(&mut engine, |_| start.elapsed() >= Duration::from_millis(20));

            assert_eq!(engine.port().rx_wakeups(), 0, "need_wakeup={need_wakeup} flagged={flagged}");
        }
    }
}
