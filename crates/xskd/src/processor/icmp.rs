use tracing::debug;
use xskd_proto::ethernet::{ETH_HLEN, ETH_P_IP, ETH_P_IPV6};
use xskd_proto::icmp::{ICMPV6_ECHO_REPLY, ICMPV6_ECHO_REQUEST, ICMP_ECHO, ICMP_ECHOREPLY, ICMP_HLEN};
use xskd_proto::ipv4::{IPPROTO_ICMP, IPV4_MIN_HLEN};
use xskd_proto::ipv6::{IPPROTO_ICMPV6, IPV6_HLEN};
use xskd_proto::{parse_eth, parse_eth_mut, parse_icmp, parse_icmp_mut, parse_ipv4, parse_ipv4_mut, parse_ipv6, parse_ipv6_mut};

use crate::processor::{PacketProcessor, Verdict};

/// Answers ICMPv4 echo requests in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpEchoResponder;

/// Answers ICMPv6 echo requests in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct Icmpv6EchoResponder;

impl PacketProcessor for IcmpEchoResponder {
    fn process(&mut self, packet: &mut [u8]) -> Verdict {
        if echo_reply_v4(packet) {
            Verdict::Forward
        } else {
            Verdict::Drop
        }
    }

    fn name(&self) -> &'static str {
        "icmp-echo"
    }
}

impl PacketProcessor for Icmpv6EchoResponder {
    fn process(&mut self, packet: &mut [u8]) -> Verdict {
        if echo_reply_v6(packet) {
            Verdict::Forward
        } else {
            Verdict::Drop
        }
    }

    fn name(&self) -> &'static str {
        "icmpv6-echo"
    }
}

/// Turn an Ethernet/IPv4/ICMP echo request into its reply.
///
/// Returns false, with `packet` untouched, for anything else.
pub fn echo_reply_v4(packet: &mut [u8]) -> bool {
    if packet.len() < ETH_HLEN + IPV4_MIN_HLEN + ICMP_HLEN {
        debug!(len = packet.len(), "drop: runt frame");
        return false;
    }
    let Some((eth, l3)) = parse_eth(packet) else {
        return false;
    };
    if eth.eth_type() != ETH_P_IP {
        debug!(eth_type = eth.eth_type(), "drop: not IPv4");
        return false;
    }
    let Some((ip, l4)) = parse_ipv4(l3) else {
        debug!("drop: bad IPv4 header");
        return false;
    };
    if ip.proto != IPPROTO_ICMP {
        debug!(proto = ip.proto, "drop: not ICMP");
        return false;
    }
    match parse_icmp(l4) {
        Some((icmp, _)) if icmp.kind == ICMP_ECHO => {}
        _ => {
            debug!("drop: not an ICMP echo request");
            return false;
        }
    }

    // Validated above, so every mutable parse succeeds.
    let Some((eth, l3)) = parse_eth_mut(packet) else {
        return false;
    };
    eth.swap_addrs();
    let Some((ip, l4)) = parse_ipv4_mut(l3) else {
        return false;
    };
    ip.swap_addrs();
    let Some((icmp, _)) = parse_icmp_mut(l4) else {
        return false;
    };
    icmp.rewrite_type(ICMP_ECHOREPLY);
    true
}

/// Turn an Ethernet/IPv6/ICMPv6 echo request into its reply.
///
/// Extension headers are not walked; the ICMPv6 header must follow the
/// fixed IPv6 header directly.
pub fn echo_reply_v6(packet: &mut [u8]) -> bool {
    if packet.len() < ETH_HLEN + IPV6_HLEN + ICMP_HLEN {
        debug!(len = packet.len(), "drop: runt frame");
        return false;
    }
    let Some((eth, l3)) = parse_eth(packet) else {
        return false;
    };
    if eth.eth_type() != ETH_P_IPV6 {
        debug!(eth_type = eth.eth_type(), "drop: not IPv6");
        return false;
    }
    let Some((ip, l4)) = parse_ipv6(l3) else {
        debug!("drop: bad IPv6 header");
        return false;
    };
    if ip.next_header != IPPROTO_ICMPV6 {
        debug!(next_header = ip.next_header, "drop: not ICMPv6");
        return false;
    }
    match parse_icmp(l4) {
        Some((icmp, _)) if icmp.kind == ICMPV6_ECHO_REQUEST => {}
        _ => {
            debug!("drop: not an ICMPv6 echo request");
            return false;
        }
    }

    let Some((eth, l3)) = parse_eth_mut(packet) else {
        return false;
    };
    eth.swap_addrs();
    let Some((ip, l4)) = parse_ipv6_mut(l3) else {
        return false;
    };
    // The pseudo-header sum is symmetric in src/dst, so only the type
    // change needs patching.
    ip.swap_addrs();
    let Some((icmp, _)) = parse_icmp_mut(l4) else {
        return false;
    };
    icmp.rewrite_type(ICMPV6_ECHO_REPLY);
    true
}
