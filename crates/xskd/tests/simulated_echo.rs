//! End-to-end runs of the engine against the simulated kernel.

#[cfg(feature = "simulator")]
#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use xskd::processor::{IcmpEchoResponder, PacketProcessor};
    use xskd::sim::SimXsk;
    use xskd::{Engine, XskConfig};
    use xskd_core::umem::UmemLayout;
    use xskd_proto::checksum;

    const ETH: usize = 14;
    const IP: usize = 20;

    /// Ethernet + IPv4 + ICMP echo request carrying `proto` in the IP header.
    fn ping(proto: u8, seq: u16) -> Vec<u8> {
        let mut pkt = vec![
            0x02, 0, 0, 0, 0, 0x02, // dst
            0x02, 0, 0, 0, 0, 0x01, // src
            0x08, 0x00,
        ];
        let mut ip = [
            0x45, 0, 0, 36, 0, 0, 0, 0, 64, proto, 0, 0, 192, 168, 1, 1, 192, 168, 1, 2,
        ];
        let ip_check = checksum(&ip);
        ip[10..12].copy_from_slice(&ip_check.to_be_bytes());
        pkt.extend_from_slice(&ip);

        let mut icmp = vec![8, 0, 0, 0, 0xbe, 0xef];
        icmp.extend_from_slice(&seq.to_be_bytes());
        icmp.extend_from_slice(b"xskd-sim");
        let icmp_check = checksum(&icmp);
        icmp[2..4].copy_from_slice(&icmp_check.to_be_bytes());
        pkt.extend_from_slice(&icmp);
        pkt
    }

    fn engine(processor: Box<dyn PacketProcessor>) -> Engine<SimXsk> {
        let sim = SimXsk::new(UmemLayout::new(2048, 8).unwrap(), 2048).unwrap();
        Engine::new(sim, processor, &XskConfig::default())
    }

    #[test]
    fn test_echo_requests_come_back_as_replies() {
        let mut engine = engine(Box::new(IcmpEchoResponder));
        assert_eq!(engine.port().fill_pending(), 8);

        let delivered: Vec<u64> = (0..3)
            .map(|seq| engine.port_mut().deliver(&ping(1, seq)).unwrap())
            .collect();

        assert_eq!(engine.process_batch().unwrap(), 3);
        assert_eq!(engine.pool().free_count(), 0);

        let sent = engine.port_mut().transmit();
        let addrs: Vec<u64> = sent.iter().map(|d| d.addr).collect();
        assert_eq!(addrs, delivered);
        for desc in &sent {
            let frame = engine.port().frame(desc.addr, desc.len as usize);
            assert_eq!(&frame[0..6], &[0x02, 0, 0, 0, 0, 0x01]);
            assert_eq!(&frame[ETH + 12..ETH + 16], &[192, 168, 1, 2]);
            assert_eq!(frame[ETH + IP], 0);
            assert_eq!(checksum(&frame[ETH + IP..]), 0);
        }

        engine.port_mut().complete(3);
        engine.process_batch().unwrap();
        assert_eq!(engine.pool().free_count(), 3);

        let snap = engine.stats().snapshot();
        assert_eq!(snap.rx_packets, 3);
        assert_eq!(snap.tx_packets, 3);
        assert_eq!(snap.rx_bytes, snap.tx_bytes);
    }

    #[test]
    fn test_non_icmp_traffic_is_freed_immediately() {
        let mut engine = engine(Box::new(IcmpEchoResponder));
        let pkt = ping(17, 1);
        let mut addrs = Vec::new();
        for _ in 0..3 {
            addrs.push(engine.port_mut().deliver(&pkt).unwrap());
        }

        assert_eq!(engine.process_batch().unwrap(), 3);
        assert!(engine.port_mut().transmit().is_empty());
        assert_eq!(engine.pool().free_count(), 3);
        for addr in addrs {
            assert_eq!(engine.port().frame(addr, pkt.len()), pkt, "dropped frame was modified");
        }

        let snap = engine.stats().snapshot();
        assert_eq!(snap.rx_packets, 3);
        assert_eq!(snap.tx_packets, 0);
        assert_eq!(snap.dropped, 3);
    }

    #[test]
    fn test_engine_keeps_the_kernel_supplied() {
        let mut engine = engine(Box::new(IcmpEchoResponder));
        let stop = AtomicBool::new(false);

        for round in 0..50u16 {
            // Never stalls on an empty fill ring: every round finds a frame.
            assert!(engine.port_mut().deliver(&ping(1, round)).is_some(), "round {round}");
            engine.process_batch().unwrap();
            engine.port_mut().transmit();
            engine.port_mut().complete(usize::MAX);
            engine.process_batch().unwrap();
        }
        assert_eq!(engine.stats().snapshot().tx_packets, 50);
        assert_eq!(engine.outstanding_tx(), 0);

        stop.store(true, std::sync::atomic::Ordering::Relaxed);
        engine.run(&stop).unwrap();
    }
}
