use std::mem;

/// ICMP / ICMPv6 header as far as the echo messages go.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IcmpHeader {
    pub kind: u8,
    pub code: u8,
    pub check: u16,
    pub id: u16,
    pub seq: u16,
}

pub const ICMP_HLEN: usize = mem::size_of::<IcmpHeader>();

pub const ICMP_ECHOREPLY: u8 = 0;
pub const ICMP_ECHO: u8 = 8;
pub const ICMPV6_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_ECHO_REPLY: u8 = 129;

impl IcmpHeader {
    pub fn checksum(&self) -> u16 {
        u16::from_be(self.check)
    }

    pub fn set_checksum(&mut self, check: u16) {
        self.check = check.to_be();
    }

    /// The type/code pair as the big-endian word the checksum covers.
    pub fn type_code_word(&self) -> u16 {
        u16::from_be_bytes([self.kind, self.code])
    }

    /// Change the message type and patch the checksum incrementally.
    pub fn rewrite_type(&mut self, kind: u8) {
        let old = self.type_code_word();
        self.kind = kind;
        let new = self.type_code_word();
        self.set_checksum(crate::csum_replace2(self.checksum(), old, new));
    }
}

pub fn parse_icmp(data: &[u8]) -> Option<(&IcmpHeader, &[u8])> {
    if data.len() < ICMP_HLEN {
        return None;
    }

    let header = unsafe { &*(data.as_ptr() as *const IcmpHeader) };
    Some((header, &data[ICMP_HLEN..]))
}

pub fn parse_icmp_mut(data: &mut [u8]) -> Option<(&mut IcmpHeader, &mut [u8])> {
    if data.len() < ICMP_HLEN {
        return None;
    }

    let (head, payload) = data.split_at_mut(ICMP_HLEN);
    let header = unsafe { &mut *(head.as_mut_ptr() as *mut IcmpHeader) };
    Some((header, payload))
}
