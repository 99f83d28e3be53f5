use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XskError {
    #[error("Interface {0} not found")]
    InterfaceNotFound(String),

    #[error("Permission denied (requires CAP_NET_ADMIN, CAP_NET_RAW and CAP_BPF)")]
    PermissionDenied,

    #[error("Kernel refused {op}: {source}")]
    KernelResource {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind AF_XDP socket to {interface} queue {queue_id}: {source}")]
    Bind {
        interface: String,
        queue_id: u32,
        #[source]
        source: io::Error,
    },

    #[error("Socket map update failed: {0}")]
    SocketMap(String),

    #[error("XDP program error: {0}")]
    Program(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl XskError {
    /// Wrap a failed kernel call made while acquiring `op`.
    pub(crate) fn kernel(op: &'static str) -> impl FnOnce(io::Error) -> XskError {
        move |source| {
            if source.kind() == io::ErrorKind::PermissionDenied {
                XskError::PermissionDenied
            } else {
                XskError::KernelResource { op, source }
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, XskError>;
