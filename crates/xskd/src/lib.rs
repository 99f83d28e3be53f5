pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod processor;
pub mod stats;
pub mod xsk;

#[cfg(any(test, feature = "simulator"))]
pub mod sim;

pub use builder::XskBuilder;
pub use config::{Poller, ProcessorKind, XskConfig};
pub use engine::{Engine, XskPort};
pub use error::{Result, XskError};
pub use stats::{StatsReporter, XskStats};
pub use xsk::{SocketBinding, SocketMap, UmemBinding};
