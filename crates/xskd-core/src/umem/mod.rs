pub mod layout;
pub mod pool;
pub mod region;

pub use layout::UmemLayout;
pub use pool::{Frame, FramePool};
pub use region::{FrameArea, UmemRegion};
