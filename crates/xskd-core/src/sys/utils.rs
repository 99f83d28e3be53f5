use std::ffi::CString;
use std::fs;
use std::io;

pub fn if_nametoindex(name: &str) -> io::Result<u32> {
    let name_cstr = CString::new(name).map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Invalid interface name"))?;
    let idx = unsafe { libc::if_nametoindex(name_cstr.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx)
}

/// Lift `RLIMIT_MEMLOCK` so umem registration can pin the buffer.
pub fn raise_memlock_limit() -> io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Hardware address of `ifname`, read from sysfs.
pub fn link_mac_address(ifname: &str) -> io::Result<[u8; 6]> {
    let raw = fs::read_to_string(format!("/sys/class/net/{ifname}/address"))?;
    parse_mac(raw.trim())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, format!("bad MAC address {raw:?}")))
}

pub fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(':');
    for byte in mac.iter_mut() {
        *byte = u8::from_str_radix(parts.next()?, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}
