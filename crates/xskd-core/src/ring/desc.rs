/// One RX/TX ring entry: `struct xdp_desc`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XDPDesc {
    pub addr: u64,
    pub len: u32,
    pub options: u32,
}

impl XDPDesc {
    pub fn new(addr: u64, len: u32) -> Self {
        Self { addr, len, options: 0 }
    }
}
