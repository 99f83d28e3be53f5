use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use libc::{sockaddr, sockaddr_ll, socklen_t, c_void, AF_PACKET, ETH_P_ALL, SOCK_RAW, SOCK_CLOEXEC};
use crate::sys::utils::{if_nametoindex, link_mac_address};

/// An `AF_PACKET` socket that writes whole Ethernet frames out of one link.
pub struct RawLinkSocket {
    fd: OwnedFd,
    addr: sockaddr_ll,
    ifname: String,
}

impl RawLinkSocket {
    pub fn open(ifname: &str) -> io::Result<Self> {
        let ifindex = if_nametoindex(ifname)?;
        let mac = link_mac_address(ifname)?;

        let proto = (ETH_P_ALL as u16).to_be();
        let fd = unsafe { libc::socket(AF_PACKET, SOCK_RAW | SOCK_CLOEXEC, proto as i32) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = AF_PACKET as u16;
        addr.sll_protocol = proto;
        addr.sll_ifindex = ifindex as i32;
        addr.sll_halen = 6;
        addr.sll_addr[..6].copy_from_slice(&mac);

        Ok(Self { fd, addr, ifname: ifname.to_string() })
    }

    pub fn ifname(&self) -> &str {
        &self.ifname
    }

    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        let ret = unsafe {
            libc::sendto(
                self.fd.as_raw_fd(),
                frame.as_ptr() as *const c_void,
                frame.len(),
                0,
                &self.addr as *const sockaddr_ll as *const sockaddr,
                mem::size_of::<sockaddr_ll>() as socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ret as usize)
    }
}
