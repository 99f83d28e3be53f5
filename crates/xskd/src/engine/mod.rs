pub mod runner;

pub use runner::Engine;

use std::io;
use std::sync::Arc;
use std::time::Duration;
use xskd_core::ring::{ConsumerRing, ProducerRing, XDPDesc};
use xskd_core::umem::{FrameArea, UmemLayout};

use crate::stats::XskStats;
use crate::xsk::queue::{CompletionQueue, FillQueue};

/// The four rings of one socket, borrowed together for a batch.
pub struct Queues<'a> {
    pub rx: &'a mut ConsumerRing<XDPDesc>,
    pub tx: &'a mut ProducerRing<XDPDesc>,
    pub fill: &'a mut FillQueue,
    pub comp: &'a mut CompletionQueue,
}

/// What the engine needs from a bound socket.
///
/// Implemented by [`SocketBinding`](crate::xsk::SocketBinding) and by the
/// in-process simulator used in tests.
pub trait XskPort {
    fn queues(&mut self) -> Queues<'_>;
    fn frame_area(&self) -> FrameArea;
    fn layout(&self) -> UmemLayout;
    /// Block until RX has work or `timeout` passes. `Ok(false)` on timeout.
    fn wait_readable(&self, timeout: Duration) -> io::Result<bool>;
    fn kick_tx(&self) -> io::Result<()>;
    fn wakeup_rx(&self) -> io::Result<()>;
    /// Whether the socket was bound with `XDP_USE_NEED_WAKEUP`.
    fn need_wakeup(&self) -> bool;
    fn counters(&self) -> &Arc<XskStats>;
}
