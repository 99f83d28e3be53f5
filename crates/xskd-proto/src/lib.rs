pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod icmp;

pub use ethernet::{EthHeader, parse_eth, parse_eth_mut};
pub use ipv4::{Ipv4Header, parse_ipv4, parse_ipv4_mut};
pub use ipv6::{Ipv6Header, parse_ipv6, parse_ipv6_mut};
pub use icmp::{IcmpHeader, parse_icmp, parse_icmp_mut};

/// Internet checksum (RFC 1071) over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    !fold(sum_words(data, 0))
}

/// One's-complement sum of big-endian 16-bit words, added onto `sum`.
pub fn sum_words(data: &[u8], mut sum: u32) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]) as u32);
    }
    if let [last] = chunks.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

/// Fold carries back into the low 16 bits.
#[inline]
pub fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Incrementally update `check` after one 16-bit field changed from `old`
/// to `new` (RFC 1624, eqn. 3: `HC' = ~(~HC + ~m + m')`).
///
/// All three values are the big-endian words as read from the packet.
/// Matches a full recompute except when the covered data sums to zero:
/// then this yields `0x0000` where [`checksum`] gives `0xffff`, the other
/// one's-complement zero.
#[inline]
pub fn csum_replace2(check: u16, old: u16, new: u16) -> u16 {
    let sum = (!check) as u32 + (!old) as u32 + new as u32;
    !fold(sum)
}
