use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

/// Cumulative per-socket counters.
///
/// Written only by the engine thread; any thread may take a [`snapshot`].
/// Individual counters are exact, a snapshot as a whole is not atomic.
///
/// [`snapshot`]: XskStats::snapshot
#[derive(Debug, Default)]
pub struct XskStats {
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    dropped: AtomicU64,
}

impl XskStats {
    pub fn record_rx(&self, packets: u64, bytes: u64) {
        self.rx_packets.fetch_add(packets, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_tx(&self, packets: u64, bytes: u64) {
        self.tx_packets.fetch_add(packets, Ordering::Relaxed);
        self.tx_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Frames handed back to the pool instead of being transmitted.
    pub fn record_dropped(&self, packets: u64) {
        self.dropped.fetch_add(packets, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            at: Instant::now(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub dropped: u64,
    pub at: Instant,
}

/// Rates between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsDelta {
    pub period: f64,
    pub rx_pps: f64,
    pub rx_mbps: f64,
    pub tx_pps: f64,
    pub tx_mbps: f64,
}

impl StatsDelta {
    pub fn between(prev: &StatsSnapshot, cur: &StatsSnapshot) -> Self {
        let period = cur.at.saturating_duration_since(prev.at).as_secs_f64();
        if period <= 0.0 {
            return Self { period: 0.0, rx_pps: 0.0, rx_mbps: 0.0, tx_pps: 0.0, tx_mbps: 0.0 };
        }
        let pps = |now: u64, then: u64| now.saturating_sub(then) as f64 / period;
        let mbps = |now: u64, then: u64| now.saturating_sub(then) as f64 * 8.0 / period / 1_000_000.0;
        Self {
            period,
            rx_pps: pps(cur.rx_packets, prev.rx_packets),
            rx_mbps: mbps(cur.rx_bytes, prev.rx_bytes),
            tx_pps: pps(cur.tx_packets, prev.tx_packets),
            tx_mbps: mbps(cur.tx_bytes, prev.tx_bytes),
        }
    }
}

/// Logs throughput for one socket every `interval`.
pub struct StatsReporter {
    stats: Arc<XskStats>,
    interval: Duration,
    prev: StatsSnapshot,
}

impl StatsReporter {
    pub fn new(stats: Arc<XskStats>, interval: Duration) -> Self {
        let prev = stats.snapshot();
        Self { stats, interval, prev }
    }

    /// Sample the counters and log the rates since the previous sample.
    pub fn report(&mut self) -> StatsDelta {
        let cur = self.stats.snapshot();
        let delta = StatsDelta::between(&self.prev, &cur);
        info!(
            "AF_XDP RX: {:>11} pkts ({:>10.0} pps) {:>11} Kbytes ({:>6.0} Mbits/s) period:{:.6}",
            cur.rx_packets,
            delta.rx_pps,
            cur.rx_bytes / 1000,
            delta.rx_mbps,
            delta.period
        );
        info!(
            "       TX: {:>11} pkts ({:>10.0} pps) {:>11} Kbytes ({:>6.0} Mbits/s) period:{:.6}",
            cur.tx_packets,
            delta.tx_pps,
            cur.tx_bytes / 1000,
            delta.tx_mbps,
            delta.period
        );
        self.prev = cur;
        delta
    }

    /// Report every interval until `stop` is set. Sleeps in short slices so
    /// shutdown is not held up by a full interval.
    pub fn run(&mut self, stop: &AtomicBool) {
        let slice = self.interval.min(Duration::from_millis(100));
        let mut next = Instant::now() + self.interval;
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(slice);
            if Instant::now() >= next {
                self.report();
                next += self.interval;
            }
        }
    }
}
