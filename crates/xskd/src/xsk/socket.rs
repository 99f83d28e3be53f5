use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use xskd_core::ring::{ConsumerRing, ProducerRing, XDPDesc};
use xskd_core::sys::if_xdp::{
    XdpStatistics, XDP_PGOFF_RX_RING, XDP_PGOFF_TX_RING, XDP_RX_RING, XDP_TX_RING,
    XDP_USE_NEED_WAKEUP,
};
use xskd_core::sys::socket::{
    bind_socket, get_mmap_offsets, get_statistics, kick_tx, set_ring_size, wait_rx, wakeup_rx, RawFd,
};
use xskd_core::sys::utils::if_nametoindex;
use xskd_core::umem::{FrameArea, UmemLayout};

use crate::config::XskConfig;
use crate::engine::{Queues, XskPort};
use crate::error::{Result, XskError};
use crate::stats::XskStats;
use crate::xsk::map::SocketMap;
use crate::xsk::umem::UmemBinding;
use crate::xsk::RingMap;

/// An AF_XDP socket bound to one link queue.
///
/// Holds the RX and TX rings and owns the [`UmemBinding`] it was built on.
/// Must be released with [`teardown`](Self::teardown), which hands the
/// umem back so it can be deleted after the socket.
pub struct SocketBinding {
    rx: ConsumerRing<XDPDesc>,
    tx: ProducerRing<XDPDesc>,
    _rx_map: RingMap,
    _tx_map: RingMap,
    umem: UmemBinding,
    stats: Arc<XskStats>,
    interface: String,
    ifindex: u32,
    queue_id: u32,
    need_wakeup: bool,
}

impl SocketBinding {
    /// Bind `umem`'s socket to `interface`/`queue_id` and register it in
    /// `map`. The redirect program must already be attached to the link.
    ///
    /// On failure everything acquired so far, the umem included, is released.
    pub fn bind<M>(
        interface: &str,
        queue_id: u32,
        umem: UmemBinding,
        map: &mut M,
        config: &XskConfig,
    ) -> Result<Self>
    where
        M: SocketMap + ?Sized,
    {
        let ifindex = if_nametoindex(interface)
            .map_err(|_| XskError::InterfaceNotFound(interface.to_string()))?;
        let fd = umem.fd();
        let bind_err = |source: io::Error| XskError::Bind {
            interface: interface.to_string(),
            queue_id,
            source,
        };

        set_ring_size(fd, XDP_RX_RING, config.rx_size).map_err(XskError::kernel("rx ring"))?;
        set_ring_size(fd, XDP_TX_RING, config.tx_size).map_err(XskError::kernel("tx ring"))?;

        let off = get_mmap_offsets(fd).map_err(XskError::kernel("ring offsets"))?;
        let rx_map = RingMap::map::<XDPDesc>(fd, off.rx, config.rx_size, XDP_PGOFF_RX_RING)
            .map_err(XskError::kernel("rx ring mmap"))?;
        let tx_map = RingMap::map::<XDPDesc>(fd, off.tx, config.tx_size, XDP_PGOFF_TX_RING)
            .map_err(XskError::kernel("tx ring mmap"))?;
        let rx = unsafe { rx_map.consumer() };
        let tx = unsafe { tx_map.producer() };

        let mut flags = config.bind_flags;
        if config.need_wakeup {
            flags |= XDP_USE_NEED_WAKEUP;
        }
        bind_socket(fd, ifindex, queue_id, flags).map_err(|e| {
            if e.kind() == io::ErrorKind::PermissionDenied {
                XskError::PermissionDenied
            } else {
                bind_err(e)
            }
        })?;

        map.register(queue_id, fd)?;

        info!(interface, ifindex, queue_id, fd, flags, "AF_XDP socket bound");

        Ok(Self {
            rx,
            tx,
            _rx_map: rx_map,
            _tx_map: tx_map,
            umem,
            stats: Arc::new(XskStats::default()),
            interface: interface.to_string(),
            ifindex,
            queue_id,
            need_wakeup: config.need_wakeup,
        })
    }

    /// Descriptor used to wait for RX readiness.
    pub fn fd(&self) -> RawFd {
        self.umem.fd()
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    /// Shared counters, readable from any thread.
    pub fn stats(&self) -> Arc<XskStats> {
        Arc::clone(&self.stats)
    }

    /// Kernel-side drop and ring-error counters for this socket.
    pub fn kernel_statistics(&self) -> Result<XdpStatistics> {
        get_statistics(self.fd()).map_err(XskError::kernel("XDP statistics"))
    }

    /// Unmap the RX and TX rings and return the umem, which still owns the
    /// socket descriptor and must be torn down next.
    pub fn teardown(self) -> UmemBinding {
        debug!(interface = %self.interface, queue_id = self.queue_id, "AF_XDP socket deleted");
        let Self { umem, .. } = self;
        umem
    }
}

impl XskPort for SocketBinding {
    fn queues(&mut self) -> Queues<'_> {
        let (fill, comp) = self.umem.queues();
        Queues {
            rx: &mut self.rx,
            tx: &mut self.tx,
            fill,
            comp,
        }
    }

    fn frame_area(&self) -> FrameArea {
        self.umem.frame_area()
    }

    fn layout(&self) -> UmemLayout {
        self.umem.layout()
    }

    fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        wait_rx(self.fd(), ms)
    }

    fn kick_tx(&self) -> io::Result<()> {
        kick_tx(self.fd())
    }

    fn wakeup_rx(&self) -> io::Result<()> {
        wakeup_rx(self.fd())
    }

    fn need_wakeup(&self) -> bool {
        self.need_wakeup
    }

    fn counters(&self) -> &Arc<XskStats> {
        &self.stats
    }
}
