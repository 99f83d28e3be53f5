use std::mem;

#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Ipv4Header {
    pub ver_ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub frag_off: u16,
    pub ttl: u8,
    pub proto: u8,
    pub check: u16,
    pub src: u32,
    pub dst: u32,
}

/// Size of an IPv4 header without options.
pub const IPV4_MIN_HLEN: usize = mem::size_of::<Ipv4Header>();
pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_UDP: u8 = 17;

impl Ipv4Header {
    pub fn version(&self) -> u8 {
        self.ver_ihl >> 4
    }

    pub fn ihl(&self) -> u8 {
        self.ver_ihl & 0x0F
    }

    pub fn header_len(&self) -> usize {
        (self.ihl() as usize) * 4
    }

    pub fn src_addr(&self) -> [u8; 4] {
        self.src.to_ne_bytes()
    }

    pub fn dst_addr(&self) -> [u8; 4] {
        self.dst.to_ne_bytes()
    }

    /// Exchange source and destination. The header checksum is unaffected.
    pub fn swap_addrs(&mut self) {
        let src = self.src;
        self.src = self.dst;
        self.dst = src;
    }
}

fn header_len_checked(data: &[u8]) -> Option<usize> {
    if data.len() < IPV4_MIN_HLEN {
        return None;
    }
    let header_len = ((data[0] & 0x0F) as usize) * 4;
    if data[0] >> 4 != 4 || header_len < IPV4_MIN_HLEN || data.len() < header_len {
        return None;
    }
    Some(header_len)
}

pub fn parse_ipv4(data: &[u8]) -> Option<(&Ipv4Header, &[u8])> {
    let header_len = header_len_checked(data)?;

    let header = unsafe { &*(data.as_ptr() as *const Ipv4Header) };
    Some((header, &data[header_len..]))
}

pub fn parse_ipv4_mut(data: &mut [u8]) -> Option<(&mut Ipv4Header, &mut [u8])> {
    let header_len = header_len_checked(data)?;

    let (head, payload) = data.split_at_mut(header_len);
    let header = unsafe { &mut *(head.as_mut_ptr() as *mut Ipv4Header) };
    Some((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_parsing() {
        let mut data = [0u8; 24];
        data[0] = 0x45; // Version 4, IHL 5 (20 bytes)
        data[2..4].copy_from_slice(&24u16.to_be_bytes());
        data[9] = IPPROTO_ICMP;
        data[12..16].copy_from_slice(&[192, 168, 1, 1]);
        data[16..20].copy_from_slice(&[192, 168, 1, 100]);
        data[20..24].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);

        let csum = crate::checksum(&data[0..20]);
        data[10..12].copy_from_slice(&csum.to_be_bytes());

        let (header, payload) = parse_ipv4(&data).expect("Should parse ipv4");
        assert_eq!(header.version(), 4);
        assert_eq!(header.header_len(), 20);
        assert_eq!(header.proto, IPPROTO_ICMP);
        assert_eq!(header.src_addr(), [192, 168, 1, 1]);
        assert_eq!(header.dst_addr(), [192, 168, 1, 100]);
        assert_eq!(crate::checksum(&data[0..20]), 0);
        assert_eq!(payload, &[0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_ipv4_with_options() {
        let mut data = [0u8; 28];
        data[0] = 0x47; // IHL 7 (28 bytes)

        let (header, payload) = parse_ipv4(&data).expect("Should parse ipv4");
        assert_eq!(header.header_len(), 28);
        assert_eq!(payload.len(), 0);

        data[0] = 0x48; // claims 32 bytes
        assert!(parse_ipv4(&data).is_none());
    }

    #[test]
    fn test_ipv4_rejects_bad_header() {
        let mut data = [0u8; 20];
        data[0] = 0x44; // IHL below minimum
        assert!(parse_ipv4(&data).is_none());
        data[0] = 0x65; // version 6
        assert!(parse_ipv4(&data).is_none());
    }

    #[test]
    fn test_ipv4_swap_keeps_checksum_valid() {
        let mut data = [0u8; 20];
        data[0] = 0x45;
        data[12..16].copy_from_slice(&[10, 0, 0, 1]);
        data[16..20].copy_from_slice(&[10, 0, 0, 2]);
        let csum = crate::checksum(&data);
        data[10..12].copy_from_slice(&csum.to_be_bytes());

        let (header, _) = parse_ipv4_mut(&mut data).unwrap();
        header.swap_addrs();
        assert_eq!(&data[12..16], &[10, 0, 0, 2]);
        assert_eq!(&data[16..20], &[10, 0, 0, 1]);
        assert_eq!(crate::checksum(&data), 0);
    }
}
