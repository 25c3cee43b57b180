//! GPU resources owned by the frame pipeline.
//!
//! - [`StaticUploader`]: vertex/index buffers and shader objects, written once
//! - [`UniformBuffer`]: the per-frame transform block
//! - [`PipelineState`]: pipeline + root signature

mod handle;
mod uniform;
mod upload;

pub use handle::{ResourceHandle, ResourceId};
pub use uniform::{MappedUniform, UniformBuffer};
pub use upload::{
    IndexBuffer, IndexBufferView, IndexFormat, PipelineState, ShaderModule, StaticUploader, VertexBuffer,
    VertexBufferView,
};
