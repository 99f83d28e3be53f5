use std::io;
use std::mem;
pub use std::os::unix::io::RawFd;
use std::os::fd::{FromRawFd, OwnedFd};
use libc::{
    socket, bind, setsockopt, getsockopt, mmap, sendto, recvfrom, poll, pollfd,
    AF_XDP, SOCK_RAW, SOCK_CLOEXEC, SOL_XDP,
    PROT_READ, PROT_WRITE, MAP_SHARED, MAP_POPULATE,
    MSG_DONTWAIT, POLLIN,
    sockaddr, socklen_t, c_void,
};
use crate::sys::if_xdp::*;

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// `setsockopt(fd, SOL_XDP, name, value)`.
fn set_xdp_opt<T>(fd: RawFd, name: i32, value: &T) -> io::Result<()> {
    let len = mem::size_of::<T>() as socklen_t;
    cvt(unsafe { setsockopt(fd, SOL_XDP, name, value as *const T as *const c_void, len) })?;
    Ok(())
}

/// `getsockopt(fd, SOL_XDP, name)` into a zero-initialised `T`. The kernel
/// may fill less than `size_of::<T>()`; the rest stays at its default.
fn get_xdp_opt<T: Default>(fd: RawFd, name: i32) -> io::Result<T> {
    let mut value = T::default();
    let mut len = mem::size_of::<T>() as socklen_t;
    cvt(unsafe { getsockopt(fd, SOL_XDP, name, &mut value as *mut T as *mut c_void, &mut len) })?;
    Ok(value)
}

pub fn create_xsk_socket() -> io::Result<OwnedFd> {
    let fd = cvt(unsafe { socket(AF_XDP, SOCK_RAW | SOCK_CLOEXEC, 0) })?;
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Bind to `ifindex`/`queue_id`. `bind_flags` takes `XDP_COPY`,
/// `XDP_ZEROCOPY` and `XDP_USE_NEED_WAKEUP`.
pub fn bind_socket(fd: RawFd, ifindex: u32, queue_id: u32, bind_flags: u16) -> io::Result<()> {
    let sa = SockaddrXdp {
        sxdp_family: AF_XDP as u16,
        sxdp_flags: bind_flags,
        sxdp_ifindex: ifindex,
        sxdp_queue_id: queue_id,
        sxdp_shared_umem_fd: 0,
    };
    let len = mem::size_of::<SockaddrXdp>() as socklen_t;
    cvt(unsafe { bind(fd, &sa as *const SockaddrXdp as *const sockaddr, len) })?;
    Ok(())
}

/// Register `len` bytes at `umem_addr` as the socket's umem.
pub fn set_umem_reg(fd: RawFd, umem_addr: u64, len: u64, chunk_size: u32, headroom: u32) -> io::Result<()> {
    let reg = XdpUmemReg {
        addr: umem_addr,
        len,
        chunk_size,
        headroom,
        flags: 0,
    };
    set_xdp_opt(fd, XDP_UMEM_REG, &reg)
}

/// Size one of the four rings; `ring` is `XDP_RX_RING`, `XDP_TX_RING`,
/// `XDP_UMEM_FILL_RING` or `XDP_UMEM_COMPLETION_RING`.
pub fn set_ring_size(fd: RawFd, ring: i32, size: u32) -> io::Result<()> {
    set_xdp_opt(fd, ring, &size)
}

pub fn get_mmap_offsets(fd: RawFd) -> io::Result<XdpMmapOffsets> {
    get_xdp_opt(fd, XDP_MMAP_OFFSETS)
}

/// Older kernels report only the first three counters.
pub fn get_statistics(fd: RawFd) -> io::Result<XdpStatistics> {
    get_xdp_opt(fd, XDP_STATISTICS)
}

/// # Safety
/// `fd` must be an AF_XDP socket and `offset` one of the `XDP_*PGOFF_*` ring offsets.
pub unsafe fn mmap_range(fd: RawFd, len: usize, offset: u64) -> io::Result<*mut u8> {
    let ptr = mmap(
        std::ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_SHARED | MAP_POPULATE,
        fd,
        offset as libc::off_t,
    );

    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }

    Ok(ptr as *mut u8)
}

/// # Safety
/// `ptr`/`len` must describe a live mapping created by [`mmap_range`].
pub unsafe fn munmap(ptr: *mut u8, len: usize) -> io::Result<()> {
    cvt(libc::munmap(ptr as *mut c_void, len))?;
    Ok(())
}

/// Nudge the kernel to process the TX ring.
pub fn kick_tx(fd: RawFd) -> io::Result<()> {
    let ret = unsafe {
        sendto(fd, std::ptr::null(), 0, MSG_DONTWAIT, std::ptr::null(), 0)
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        // The kernel reports a busy or still-draining ring with these; the
        // next kick picks the work up.
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::EBUSY) | Some(libc::ENOBUFS) | Some(libc::ENETDOWN) => {}
            _ => return Err(err),
        }
    }
    Ok(())
}

/// Nudge the kernel to pull more buffers off the fill ring.
pub fn wakeup_rx(fd: RawFd) -> io::Result<()> {
    let ret = unsafe {
        recvfrom(fd, std::ptr::null_mut(), 0, MSG_DONTWAIT, std::ptr::null_mut(), std::ptr::null_mut())
    };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::WouldBlock {
            return Err(err);
        }
    }
    Ok(())
}

/// Wait up to `timeout_ms` for the socket to become readable.
/// Returns `Ok(false)` on timeout or when interrupted by a signal.
pub fn wait_rx(fd: RawFd, timeout_ms: i32) -> io::Result<bool> {
    let mut pfd = pollfd { fd, events: POLLIN, revents: 0 };
    match cvt(unsafe { poll(&mut pfd, 1, timeout_ms) }) {
        Ok(ready) => Ok(ready > 0 && pfd.revents & POLLIN != 0),
        Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e),
    }
}
