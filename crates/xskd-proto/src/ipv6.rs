use std::mem;

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Ipv6Header {
    pub ver_tc_flow: u32,
    pub payload_len: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: [u8; 16],
    pub dst: [u8; 16],
}

pub const IPV6_HLEN: usize = mem::size_of::<Ipv6Header>();
pub const IPPROTO_ICMPV6: u8 = 58;

impl Ipv6Header {
    pub fn version(&self) -> u8 {
        (u32::from_be(self.ver_tc_flow) >> 28) as u8
    }

    pub fn payload_len(&self) -> u16 {
        u16::from_be(self.payload_len)
    }

    pub fn swap_addrs(&mut self) {
        mem::swap(&mut self.src, &mut self.dst);
    }
}

pub fn parse_ipv6(data: &[u8]) -> Option<(&Ipv6Header, &[u8])> {
    if data.len() < IPV6_HLEN {
        return None;
    }

    let header = unsafe { &*(data.as_ptr() as *const Ipv6Header) };
    Some((header, &data[IPV6_HLEN..]))
}

pub fn parse_ipv6_mut(data: &mut [u8]) -> Option<(&mut Ipv6Header, &mut [u8])> {
    if data.len() < IPV6_HLEN {
        return None;
    }

    let (head, payload) = data.split_at_mut(IPV6_HLEN);
    let header = unsafe { &mut *(head.as_mut_ptr() as *mut Ipv6Header) };
    Some((header, payload))
}
