use std::path::{Path, PathBuf};
use aya::maps::{Map, MapData, XskMap};
use tracing::info;
use xskd_core::sys::socket::RawFd;

use crate::error::{Result, XskError};

/// Where the kernel-side redirect program looks up the socket for a queue.
///
/// Entries disappear when the socket is closed, so there is no unregister.
pub trait SocketMap {
    fn register(&mut self, queue_id: u32, fd: RawFd) -> Result<()>;
}

impl SocketMap for XskMap<MapData> {
    fn register(&mut self, queue_id: u32, fd: RawFd) -> Result<()> {
        self.set(queue_id, fd, 0)
            .map_err(|e| XskError::SocketMap(format!("queue {queue_id}: {e}")))?;
        info!(queue_id, fd, "registered AF_XDP socket in XSKMAP");
        Ok(())
    }
}

/// Path under which a link's redirect program pins its socket map.
pub fn pinned_map_path(interface: &str, map: &str) -> PathBuf {
    PathBuf::from(format!("/sys/fs/bpf/{interface}/{map}"))
}

/// Open a socket map pinned by whoever attached the redirect program.
pub fn open_pinned(path: impl AsRef<Path>) -> Result<XskMap<MapData>> {
    let path = path.as_ref();
    let data = MapData::from_pin(path)
        .map_err(|e| XskError::SocketMap(format!("opening {}: {e}", path.display())))?;
    XskMap::try_from(Map::XskMap(data))
        .map_err(|e| XskError::SocketMap(format!("{} is not an XSKMAP: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_map_path() {
        assert_eq!(pinned_map_path("veth0", "xsks_map"), Path::new("/sys/fs/bpf/veth0/xsks_map"));
    }

    #[test]
    fn test_open_missing_pin_fails() {
        let err = open_pinned("/nonexistent/xsks_map").err().unwrap();
        assert!(matches!(err, XskError::SocketMap(_)));
    }
}
