use std::os::fd::{AsRawFd, OwnedFd};
use tracing::debug;
use xskd_core::sys::if_xdp::{
    XDP_UMEM_COMPLETION_RING, XDP_UMEM_FILL_RING, XDP_UMEM_PGOFF_COMPLETION_RING,
    XDP_UMEM_PGOFF_FILL_RING,
};
use xskd_core::sys::socket::{create_xsk_socket, get_mmap_offsets, set_ring_size, set_umem_reg, RawFd};
use xskd_core::umem::{FrameArea, UmemLayout, UmemRegion};

use crate::config::XskConfig;
use crate::error::{Result, XskError};
use crate::xsk::queue::{CompletionQueue, FillQueue};
use crate::xsk::RingMap;

/// A umem registered with the kernel, plus its fill and completion queues.
///
/// Owns the AF_XDP socket descriptor the umem was registered on; the
/// [`SocketBinding`](crate::xsk::SocketBinding) built on top borrows it.
/// Dropping the binding unmaps both queues, closes the socket and finally
/// unmaps the frame memory.
pub struct UmemBinding {
    fill: FillQueue,
    comp: CompletionQueue,
    _fill_map: RingMap,
    _comp_map: RingMap,
    fd: OwnedFd,
    region: UmemRegion,
}

impl UmemBinding {
    pub fn create(region: UmemRegion, config: &XskConfig) -> Result<Self> {
        let layout = region.layout();
        let fd = create_xsk_socket().map_err(XskError::kernel("AF_XDP socket"))?;
        let raw = fd.as_raw_fd();

        set_umem_reg(raw, region.as_ptr() as u64, region.len() as u64, layout.frame_size, config.headroom)
            .map_err(XskError::kernel("umem registration"))?;
        set_ring_size(raw, XDP_UMEM_FILL_RING, config.fill_size)
            .map_err(XskError::kernel("fill ring"))?;
        set_ring_size(raw, XDP_UMEM_COMPLETION_RING, config.comp_size)
            .map_err(XskError::kernel("completion ring"))?;

        let off = get_mmap_offsets(raw).map_err(XskError::kernel("ring offsets"))?;
        let fill_map = RingMap::map::<u64>(raw, off.fr, config.fill_size, XDP_UMEM_PGOFF_FILL_RING)
            .map_err(XskError::kernel("fill ring mmap"))?;
        let comp_map = RingMap::map::<u64>(raw, off.cr, config.comp_size, XDP_UMEM_PGOFF_COMPLETION_RING)
            .map_err(XskError::kernel("completion ring mmap"))?;

        let fill = FillQueue::new(unsafe { fill_map.producer() });
        let comp = CompletionQueue::new(unsafe { comp_map.consumer() });

        debug!(
            frames = layout.frame_count,
            frame_size = layout.frame_size,
            fd = raw,
            "umem registered"
        );

        Ok(Self {
            fill,
            comp,
            _fill_map: fill_map,
            _comp_map: comp_map,
            fd,
            region,
        })
    }

    pub fn fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn layout(&self) -> UmemLayout {
        self.region.layout()
    }

    pub fn frame_area(&self) -> FrameArea {
        self.region.area()
    }

    pub(crate) fn queues(&mut self) -> (&mut FillQueue, &mut CompletionQueue) {
        (&mut self.fill, &mut self.comp)
    }

    /// Release the queues, the socket descriptor and the frame memory.
    ///
    /// Only reachable once the socket using this umem has been torn down,
    /// see [`SocketBinding::teardown`](crate::xsk::SocketBinding::teardown).
    pub fn teardown(self) {
        debug!(fd = self.fd(), "umem deleted");
        drop(self);
    }
}
