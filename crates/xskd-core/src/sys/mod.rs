pub mod if_xdp;
pub mod mmap;
pub mod packet;
pub mod socket;
pub mod utils;
