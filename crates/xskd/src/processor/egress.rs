use std::io;
use std::sync::Arc;
use tracing::warn;
use xskd_core::sys::packet::RawLinkSocket;

use crate::processor::icmp::echo_reply_v4;
use crate::processor::{PacketProcessor, Verdict};
use crate::stats::XskStats;

/// Something that puts a whole Ethernet frame on a wire.
pub trait LinkSender: Send {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize>;
}

impl LinkSender for RawLinkSocket {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        RawLinkSocket::send(self, frame)
    }
}

/// Answers ICMPv4 echo requests out of a second link.
///
/// The reply is copied into the kernel by the raw send, so the umem frame is
/// always given back: every verdict is [`Verdict::Drop`]. Successful sends
/// are counted as TX on the shared statistics.
pub struct EgressForwarder<S: LinkSender> {
    link: S,
    stats: Arc<XskStats>,
    send_errors: u64,
}

impl<S: LinkSender> EgressForwarder<S> {
    pub fn new(link: S, stats: Arc<XskStats>) -> Self {
        Self { link, stats, send_errors: 0 }
    }

    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }
}

impl<S: LinkSender> PacketProcessor for EgressForwarder<S> {
    fn process(&mut self, packet: &mut [u8]) -> Verdict {
        if !echo_reply_v4(packet) {
            return Verdict::Drop;
        }
        match self.link.send(packet) {
            Ok(n) => self.stats.record_tx(1, n as u64),
            Err(e) => {
                self.send_errors += 1;
                // One line per power of two keeps a dead link from flooding the log.
                if self.send_errors.is_power_of_two() {
                    warn!(error = %e, failures = self.send_errors, "egress send failed");
                }
            }
        }
        Verdict::Drop
    }

    fn name(&self) -> &'static str {
        "egress"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::icmp::tests::echo_request_v4;
    use xskd_proto::ethernet::ETH_HLEN;
    use xskd_proto::icmp::ICMP_ECHOREPLY;
    use xskd_proto::ipv4::{IPPROTO_ICMP, IPPROTO_UDP, IPV4_MIN_HLEN};

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Vec<u8>>,
        fail: bool,
    }

    impl LinkSender for Recorder {
        fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::other("link down"));
            }
            self.frames.push(frame.to_vec());
            Ok(frame.len())
        }
    }

    #[test]
    fn test_reply_is_sent_and_frame_dropped() {
        let stats = Arc::new(XskStats::default());
        let mut fwd = EgressForwarder::new(Recorder::default(), Arc::clone(&stats));
        let mut pkt = echo_request_v4(IPPROTO_ICMP, 9, b"egress");

        assert_eq!(fwd.process(&mut pkt), Verdict::Drop);
        assert_eq!(fwd.link.frames.len(), 1);
        assert_eq!(fwd.link.frames[0][ETH_HLEN + IPV4_MIN_HLEN], ICMP_ECHOREPLY);
        let snap = stats.snapshot();
        assert_eq!((snap.tx_packets, snap.tx_bytes), (1, pkt.len() as u64));
    }

    #[test]
    fn test_non_echo_is_not_sent() {
        let stats = Arc::new(XskStats::default());
        let mut fwd = EgressForwarder::new(Recorder::default(), Arc::clone(&stats));
        let mut pkt = echo_request_v4(IPPROTO_UDP, 1, b"x");

        assert_eq!(fwd.process(&mut pkt), Verdict::Drop);
        assert!(fwd.link.frames.is_empty());
        assert_eq!(stats.snapshot().tx_packets, 0);
    }

    #[test]
    fn test_send_failure_is_counted() {
        let stats = Arc::new(XskStats::default());
        let link = Recorder { fail: true, ..Default::default() };
        let mut fwd = EgressForwarder::new(link, Arc::clone(&stats));
        for _ in 0..3 {
            let mut pkt = echo_request_v4(IPPROTO_ICMP, 1, b"x");
            assert_eq!(fwd.process(&mut pkt), Verdict::Drop);
        }
        assert_eq!(fwd.send_errors(), 3);
        assert_eq!(stats.snapshot().tx_packets, 0);
    }
}
