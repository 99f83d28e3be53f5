use std::mem;

/// Ethernet II header, no VLAN tags.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct EthHeader {
    pub dst: [u8; 6],
    pub src: [u8; 6],
    pub eth_type: u16,
}

pub const ETH_HLEN: usize = mem::size_of::<EthHeader>();
pub const ETH_P_IP: u16 = 0x0800;
pub const ETH_P_IPV6: u16 = 0x86DD;
pub const ETH_P_ARP: u16 = 0x0806;

impl EthHeader {
    pub fn eth_type(&self) -> u16 {
        u16::from_be(self.eth_type)
    }

    /// Address the frame back to its sender.
    pub fn swap_addrs(&mut self) {
        mem::swap(&mut self.dst, &mut self.src);
    }
}

/// Header and L3 payload of `data`, or `None` for a runt frame.
pub fn parse_eth(data: &[u8]) -> Option<(&EthHeader, &[u8])> {
    let (head, payload) = data.split_at_checked(ETH_HLEN)?;
    // Packed, so any alignment is fine.
    Some((unsafe { &*(head.as_ptr() as *const EthHeader) }, payload))
}

pub fn parse_eth_mut(data: &mut [u8]) -> Option<(&mut EthHeader, &mut [u8])> {
    let (head, payload) = data.split_at_mut_checked(ETH_HLEN)?;
    Some((unsafe { &mut *(head.as_mut_ptr() as *mut EthHeader) }, payload))
}
