//! Kernel-facing AF_XDP objects: the umem with its fill and completion
//! queues, the bound socket with its RX and TX rings, and the socket map
//! that steers a queue's traffic to it.

pub mod map;
pub mod program;
pub mod queue;
pub mod socket;
pub mod umem;

pub use map::SocketMap;
pub use program::{AttachMode, XdpProgram};
pub use queue::{CompletionQueue, FillQueue};
pub use socket::SocketBinding;
pub use umem::UmemBinding;

use std::io;
use std::mem;
use xskd_core::ring::{ConsumerRing, ProducerRing};
use xskd_core::sys::if_xdp::XdpRingOffset;
use xskd_core::sys::mmap::MmapArea;
use xskd_core::sys::socket::{mmap_range, RawFd};

/// One ring mapped out of an AF_XDP socket.
struct RingMap {
    area: MmapArea,
    off: XdpRingOffset,
    size: u32,
}

impl RingMap {
    fn map<T>(fd: RawFd, off: XdpRingOffset, size: u32, pgoff: u64) -> io::Result<Self> {
        let len = off.desc as usize + size as usize * mem::size_of::<T>();
        let ptr = unsafe { mmap_range(fd, len, pgoff) }?;
        let area = unsafe { MmapArea::from_raw(ptr, len) }?;
        Ok(Self { area, off, size })
    }

    /// # Safety
    /// The view must not outlive `self.area`.
    unsafe fn producer<T: Copy>(&self) -> ProducerRing<T> {
        let base = self.area.as_ptr();
        ProducerRing::new(
            base.add(self.off.producer as usize) as *mut u32,
            base.add(self.off.consumer as usize) as *mut u32,
            base.add(self.off.desc as usize) as *mut T,
            self.size,
        )
        .with_flags(base.add(self.off.flags as usize) as *mut u32)
    }

    /// # Safety
    /// The view must not outlive `self.area`.
    unsafe fn consumer<T: Copy>(&self) -> ConsumerRing<T> {
        let base = self.area.as_ptr();
        ConsumerRing::new(
            base.add(self.off.producer as usize) as *mut u32,
            base.add(self.off.consumer as usize) as *mut u32,
            base.add(self.off.desc as usize) as *mut T,
            self.size,
        )
    }
}
