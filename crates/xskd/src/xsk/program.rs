use std::path::Path;
use aya::maps::{MapData, XskMap};
use aya::programs::{Xdp, XdpFlags};
use aya::Ebpf;
use tracing::{info, warn};

use crate::error::{Result, XskError};

/// How the XDP program hooks into the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachMode {
    /// Let the kernel pick; falls back to generic mode if the driver refuses.
    #[default]
    Auto,
    Generic,
    Native,
    Offload,
}

impl AttachMode {
    fn flags(self) -> XdpFlags {
        match self {
            AttachMode::Auto => XdpFlags::default(),
            AttachMode::Generic => XdpFlags::SKB_MODE,
            AttachMode::Native => XdpFlags::DRV_MODE,
            AttachMode::Offload => XdpFlags::HW_MODE,
        }
    }
}

/// A redirect program loaded from an object file and attached to one link.
///
/// The program stays attached for as long as this value lives. Drop it only
/// after every socket registered in its map has been torn down.
pub struct XdpProgram {
    bpf: Ebpf,
    interface: String,
}

impl XdpProgram {
    pub fn load_and_attach(
        object: impl AsRef<Path>,
        program: &str,
        interface: &str,
        mode: AttachMode,
    ) -> Result<Self> {
        let object = object.as_ref();
        let mut bpf = Ebpf::load_file(object)
            .map_err(|e| XskError::Program(format!("loading {}: {e}", object.display())))?;

        let prog: &mut Xdp = bpf
            .program_mut(program)
            .ok_or_else(|| XskError::Program(format!("program {program} not found")))?
            .try_into()
            .map_err(|e| XskError::Program(format!("{program} is not an XDP program: {e}")))?;
        prog.load()
            .map_err(|e| XskError::Program(format!("loading {program}: {e}")))?;

        match prog.attach(interface, mode.flags()) {
            Ok(_) => {}
            Err(e) if mode == AttachMode::Auto => {
                warn!(interface, error = %e, "default XDP attach failed, trying generic mode");
                prog.attach(interface, XdpFlags::SKB_MODE)
                    .map_err(|e| XskError::Program(format!("attaching to {interface}: {e}")))?;
            }
            Err(e) => return Err(XskError::Program(format!("attaching to {interface}: {e}"))),
        }
        info!(interface, program, ?mode, "XDP program attached");

        Ok(Self {
            bpf,
            interface: interface.to_string(),
        })
    }

    /// Take ownership of the program's socket map.
    pub fn take_socket_map(&mut self, name: &str) -> Result<XskMap<MapData>> {
        let map = self
            .bpf
            .take_map(name)
            .ok_or_else(|| XskError::SocketMap(format!("map {name} not found")))?;
        XskMap::try_from(map).map_err(|e| XskError::SocketMap(format!("{name}: {e}")))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }
}

impl Drop for XdpProgram {
    fn drop(&mut self) {
        info!(interface = %self.interface, "detaching XDP program");
    }
}
