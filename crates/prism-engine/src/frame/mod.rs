//! Swap surface and per-image render targets.

mod init;
mod resources;

pub use init::SurfaceInit;
pub use resources::FrameResourceSet;
