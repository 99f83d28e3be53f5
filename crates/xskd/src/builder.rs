use std::time::Duration;
use xskd_core::umem::{UmemLayout, UmemRegion};

use crate::config::{Poller, ProcessorKind, XskConfig};
use crate::engine::Engine;
use crate::error::{Result, XskError};
use crate::processor;
use crate::xsk::{SocketBinding, SocketMap, UmemBinding};

/// Fluent setup for one socket on one link queue.
///
/// ```no_run
/// # use xskd::{XskBuilder, Poller};
/// # fn demo(map: &mut impl xskd::SocketMap) -> xskd::Result<()> {
/// let engine = XskBuilder::new("veth0")
///     .queue_id(0)
///     .poller(Poller::Busy)
///     .build_engine(map)?;
/// # Ok(()) }
/// ```
pub struct XskBuilder {
    interface: String,
    queue_id: u32,
    config: XskConfig,
}

impl XskBuilder {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            queue_id: 0,
            config: XskConfig::default(),
        }
    }

    pub fn queue_id(mut self, id: u32) -> Self {
        self.queue_id = id;
        self
    }

    /// Replace every setting at once.
    pub fn config(mut self, config: XskConfig) -> Self {
        self.config = config;
        self
    }

    pub fn frame_size(mut self, size: u32) -> Self {
        self.config.frame_size = size;
        self
    }

    pub fn frame_count(mut self, count: u32) -> Self {
        self.config.frame_count = count;
        self
    }

    pub fn headroom(mut self, headroom: u32) -> Self {
        self.config.headroom = headroom;
        self
    }

    /// RX and TX ring sizes.
    pub fn ring_size(mut self, rx: u32, tx: u32) -> Self {
        self.config.rx_size = rx;
        self.config.tx_size = tx;
        self
    }

    /// Fill and completion ring sizes.
    pub fn umem_ring_size(mut self, fill: u32, comp: u32) -> Self {
        self.config.fill_size = fill;
        self.config.comp_size = comp;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn poller(mut self, poller: Poller) -> Self {
        self.config.poller = poller;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    pub fn bind_flags(mut self, flags: u16) -> Self {
        self.config.bind_flags = flags;
        self
    }

    pub fn need_wakeup(mut self, enabled: bool) -> Self {
        self.config.need_wakeup = enabled;
        self
    }

    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.config.stats_interval = interval;
        self
    }

    pub fn processor(mut self, kind: ProcessorKind) -> Self {
        self.config.processor = kind;
        self
    }

    pub fn settings(&self) -> &XskConfig {
        &self.config
    }

    /// Create the umem, bind the socket and register it in `map`.
    pub fn build<M>(&self, map: &mut M) -> Result<SocketBinding>
    where
        M: SocketMap + ?Sized,
    {
        self.config.validate()?;
        let layout = UmemLayout::new(self.config.frame_size, self.config.frame_count)
            .map_err(|e| XskError::InvalidConfiguration(e.to_string()))?;
        let region = UmemRegion::new(layout).map_err(XskError::kernel("umem memory"))?;
        let umem = UmemBinding::create(region, &self.config)?;
        SocketBinding::bind(&self.interface, self.queue_id, umem, map, &self.config)
    }

    /// [`build`](Self::build), then wrap the socket in an engine running the
    /// configured processor.
    pub fn build_engine<M>(self, map: &mut M) -> Result<Engine<SocketBinding>>
    where
        M: SocketMap + ?Sized,
    {
        let socket = self.build(map)?;
        let processor = processor::build(&self.config.processor, &socket.stats())?;
        Ok(Engine::new(socket, processor, &self.config))
    }
}
