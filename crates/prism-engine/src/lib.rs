//! Prism engine crate.
//!
//! An explicit-API frame pipeline that draws one colored triangle. The
//! pipeline talks to the GPU only through the traits in [`backend`]; the
//! wgpu backend drives a real window and the headless backend renders into
//! CPU images for tests.

pub mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod logging;
pub mod renderer;
pub mod resource;
pub mod state;
pub mod sync;
pub mod window;

pub use error::{InitStage, RenderError, Result};
pub use renderer::{RendererConfig, ShaderSet, TriangleRenderer};
