use std::io;

/// Geometry of a umem: `frame_count` chunks of `frame_size` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmemLayout {
    pub frame_size: u32,
    pub frame_count: u32,
}

impl UmemLayout {
    pub const MIN_FRAME_SIZE: u32 = 2048;
    pub const MAX_FRAME_SIZE: u32 = 4096;

    pub fn new(frame_size: u32, frame_count: u32) -> io::Result<Self> {
        // Aligned-mode chunks: a power of two between 2K and one page.
        if !frame_size.is_power_of_two()
            || !(Self::MIN_FRAME_SIZE..=Self::MAX_FRAME_SIZE).contains(&frame_size)
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame size {frame_size} must be a power of two in 2048..=4096"),
            ));
        }
        if frame_count == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame count must be non-zero"));
        }

        Ok(Self {
            frame_size,
            frame_count,
        })
    }

    pub fn size(&self) -> usize {
        (self.frame_size as usize) * (self.frame_count as usize)
    }

    #[inline]
    pub fn addr_to_idx(&self, addr: u64) -> Option<u32> {
        if addr >= (self.size() as u64) {
            return None;
        }
        Some((addr / self.frame_size as u64) as u32)
    }

    #[inline]
    pub fn idx_to_addr(&self, idx: u32) -> Option<u64> {
        if idx >= self.frame_count {
            return None;
        }
        Some((idx as u64) * (self.frame_size as u64))
    }

    /// Start of the chunk that contains `addr`. RX descriptors point past the
    /// kernel headroom, so their addresses are not chunk-aligned.
    #[inline]
    pub fn chunk_base(&self, addr: u64) -> u64 {
        addr & !(self.frame_size as u64 - 1)
    }
}
