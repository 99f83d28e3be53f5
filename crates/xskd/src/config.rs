use std::time::Duration;
use xskd_core::sys::if_xdp::{XSK_RING_DEFAULT_NUM_DESCS, XSK_UMEM_DEFAULT_FRAME_SIZE};
use crate::error::{Result, XskError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poller {
    /// Burns 100% CPU draining the RX ring. Lowest latency.
    Busy,
    /// Blocks in poll(2) until the socket is readable, bounded by `poll_timeout`.
    Wait,
}

/// Which packet processor the engine runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorKind {
    /// Answer ICMPv4 echo requests back out through the TX ring.
    IcmpEcho,
    /// Answer ICMPv6 echo requests back out through the TX ring.
    Icmpv6Echo,
    /// Rewrite ICMPv4 echo requests and push them out of another link with a
    /// raw packet socket. Frames never enter the TX ring.
    Egress { interface: String },
}

/// Everything the bindings and the engine need, built once at startup.
#[derive(Debug, Clone)]
pub struct XskConfig {
    pub frame_size: u32,
    pub frame_count: u32,
    pub headroom: u32,
    pub rx_size: u32,
    pub tx_size: u32,
    pub fill_size: u32,
    pub comp_size: u32,
    pub batch_size: usize,
    pub poller: Poller,
    pub poll_timeout: Duration,
    pub bind_flags: u16,
    pub need_wakeup: bool,
    pub stats_interval: Duration,
    pub processor: ProcessorKind,
}

impl Default for XskConfig {
    fn default() -> Self {
        Self {
            frame_size: XSK_UMEM_DEFAULT_FRAME_SIZE,
            frame_count: 4096,
            headroom: 0,
            rx_size: XSK_RING_DEFAULT_NUM_DESCS,
            tx_size: XSK_RING_DEFAULT_NUM_DESCS,
            fill_size: XSK_RING_DEFAULT_NUM_DESCS,
            comp_size: XSK_RING_DEFAULT_NUM_DESCS,
            batch_size: 64,
            poller: Poller::Wait,
            poll_timeout: Duration::from_millis(1000),
            bind_flags: 0,
            need_wakeup: false,
            stats_interval: Duration::from_secs(2),
            processor: ProcessorKind::IcmpEcho,
        }
    }
}

impl XskConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(XskError::InvalidConfiguration(msg));

        if !self.frame_size.is_power_of_two() || !(2048..=4096).contains(&self.frame_size) {
            return invalid(format!("frame size {} must be 2048 or 4096", self.frame_size));
        }
        if self.frame_count == 0 {
            return invalid("frame count must be non-zero".into());
        }
        if self.headroom >= self.frame_size {
            return invalid(format!("headroom {} leaves no room in a {} byte frame", self.headroom, self.frame_size));
        }
        for (name, size) in [
            ("rx", self.rx_size),
            ("tx", self.tx_size),
            ("fill", self.fill_size),
            ("completion", self.comp_size),
        ] {
            if !size.is_power_of_two() {
                return invalid(format!("{name} ring size {size} must be a power of two"));
            }
        }
        if self.batch_size == 0 || self.batch_size > self.rx_size as usize {
            return invalid(format!("batch size {} must be in 1..={}", self.batch_size, self.rx_size));
        }
        if self.poll_timeout.as_millis() > i32::MAX as u128 {
            return invalid("poll timeout too large".into());
        }
        if let ProcessorKind::Egress { interface } = &self.processor {
            if interface.is_empty() {
                return invalid("egress processor needs an interface".into());
            }
        }
        Ok(())
    }
}
