//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and drives a wgpu-backed
//! [`TriangleRenderer`](crate::renderer::TriangleRenderer) from it.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig};
