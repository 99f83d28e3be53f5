//! Per-packet decisions.

pub mod egress;
pub mod icmp;

pub use egress::{EgressForwarder, LinkSender};
pub use icmp::{IcmpEchoResponder, Icmpv6EchoResponder};

use std::sync::Arc;
use xskd_core::sys::packet::RawLinkSocket;

use crate::config::ProcessorKind;
use crate::error::{Result, XskError};
use crate::stats::XskStats;

/// What happens to a frame after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Rewritten in place; queue it on the TX ring.
    Forward,
    /// Return the frame to the pool.
    Drop,
}

/// Inspects one received frame and decides its fate.
///
/// A `Drop` verdict must leave the bytes untouched unless the processor has
/// already sent a copy elsewhere.
pub trait PacketProcessor: Send {
    fn process(&mut self, packet: &mut [u8]) -> Verdict;

    fn name(&self) -> &'static str;
}

/// Build the processor selected in the configuration.
pub fn build(kind: &ProcessorKind, stats: &Arc<XskStats>) -> Result<Box<dyn PacketProcessor>> {
    Ok(match kind {
        ProcessorKind::IcmpEcho => Box::new(IcmpEchoResponder),
        ProcessorKind::Icmpv6Echo => Box::new(Icmpv6EchoResponder),
        ProcessorKind::Egress { interface } => {
            let socket = RawLinkSocket::open(interface).map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => XskError::InterfaceNotFound(interface.clone()),
                _ => XskError::kernel("raw egress socket")(e),
            })?;
            Box::new(EgressForwarder::new(socket, Arc::clone(stats)))
        }
    })
}
