//! Explicit graphics API seam.
//!
//! The frame pipeline only talks to these traits. Each backend supplies its own
//! object types through associated types:
//!
//! | backend        | use                                                 |
//! |----------------|-----------------------------------------------------|
//! | [`wgpu_backend`] | real GPU, windowed presentation                   |
//! | [`headless`]     | in-process device with a software rasterizer      |
//!
//! Every object handed out here is exclusively owned and released on drop.

pub mod headless;
pub mod wgpu_backend;

use std::fmt;
use std::time::Duration;

use prism_shaderc::ShaderBytecode;

use crate::command::CommandBuffer;
use crate::device::{AdapterDescriptor, FeatureLevel};
use crate::error::Result;

// ── plain descriptors ─────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BufferUsage {
    Vertex,
    Index,
    Uniform,
}

/// Color format of the swap surface images.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba8UnormSrgb,
    Bgra8UnormSrgb,
}

impl SurfaceFormat {
    pub fn is_srgb(self) -> bool {
        matches!(self, SurfaceFormat::Rgba8UnormSrgb | SurfaceFormat::Bgra8UnormSrgb)
    }
}

/// Presentation pacing.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum SyncInterval {
    /// Present as soon as possible; tearing allowed.
    Immediate,
    /// Wait for the next vertical blank.
    #[default]
    VerticalSync,
}

impl SyncInterval {
    /// Maps a numeric swap interval: `0` is immediate, anything else waits for vblank.
    pub fn from_interval(interval: u32) -> Self {
        if interval == 0 {
            SyncInterval::Immediate
        } else {
            SyncInterval::VerticalSync
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SwapSurfaceDesc {
    pub width: u32,
    pub height: u32,
    pub image_count: u32,
    pub format: SurfaceFormat,
    pub sync: SyncInterval,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum VertexFormat {
    Float32x3,
}

impl VertexFormat {
    pub fn size(self) -> u32 {
        match self {
            VertexFormat::Float32x3 => 12,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

/// Input-assembler layout of one interleaved vertex stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum PrimitiveTopology {
    #[default]
    TriangleList,
}

pub struct PipelineDesc<'a, D: Device> {
    pub label: &'a str,
    pub vertex_shader: &'a D::Shader,
    pub pixel_shader: &'a D::Shader,
    pub vertex_layout: &'a VertexLayout,
    pub root_signature: &'a D::RootSignature,
    pub topology: PrimitiveTopology,
    pub target_format: SurfaceFormat,
}

// ── traits ────────────────────────────────────────────────────────────────

/// API entry point: adapter enumeration and device creation.
pub trait Instance {
    type Device: Device;

    /// Lists adapters in driver order.
    fn enumerate_adapters(&self) -> Vec<AdapterDescriptor>;

    /// Reports whether a device could be created on `adapter` at `level`.
    fn probe_device(&self, adapter: &AdapterDescriptor, level: FeatureLevel) -> bool;

    /// Attaches the validation layer to devices created afterwards.
    fn enable_debug_layer(&mut self) -> Result<()>;

    fn create_device(
        &self,
        adapter: &AdapterDescriptor,
        level: FeatureLevel,
    ) -> Result<(Self::Device, <Self::Device as Device>::Queue)>;
}

/// Logical device: creates objects and feeds the direct queue.
pub trait Device: Sized {
    type Queue;
    /// Native window the swap surface is bound to.
    type Window: ?Sized;
    type Surface: SwapChain<RenderTarget = Self::RenderTarget>;
    type RenderTarget: Clone + fmt::Debug;
    type Buffer: Clone + fmt::Debug;
    type Shader;
    type RootSignature: Clone + fmt::Debug;
    type Pipeline: Clone + fmt::Debug;
    type DescriptorTable: Clone + fmt::Debug;
    type Fence: GpuFence;

    fn create_swap_surface(
        &self,
        queue: &Self::Queue,
        window: &Self::Window,
        desc: &SwapSurfaceDesc,
    ) -> Result<Self::Surface>;

    /// Creates a CPU-visible buffer initialized with `contents`.
    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> Result<Self::Buffer>;

    /// Overwrites `bytes.len()` bytes of `buffer` starting at `offset`.
    fn write_buffer(&self, queue: &Self::Queue, buffer: &Self::Buffer, offset: u64, bytes: &[u8]) -> Result<()>;

    fn create_shader(&self, bytecode: &ShaderBytecode) -> Result<Self::Shader>;

    /// Root signature with one constant buffer of `uniform_size` bytes visible to the vertex stage.
    fn create_root_signature(&self, uniform_size: u64) -> Result<Self::RootSignature>;

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<Self::Pipeline>;

    /// Binds `uniform` to the root signature's constant buffer slot.
    fn create_descriptor_table(
        &self,
        root_signature: &Self::RootSignature,
        uniform: &Self::Buffer,
    ) -> Result<Self::DescriptorTable>;

    fn create_fence(&self, initial: u64) -> Result<Self::Fence>;

    /// Queues an executable command buffer.
    fn submit(&self, queue: &Self::Queue, commands: &CommandBuffer<Self>) -> Result<()>;

    /// Queues a fence signal after all previously submitted work.
    fn signal(&self, queue: &Self::Queue, fence: &Self::Fence, value: u64) -> Result<()>;
}

/// Presentation engine bound to one window.
pub trait SwapChain {
    type RenderTarget;

    fn image_count(&self) -> u32;

    /// Current size in physical pixels.
    fn extent(&self) -> (u32, u32);

    fn format(&self) -> SurfaceFormat;

    /// One render-target view per image, in image order.
    fn render_targets(&self) -> Result<Vec<Self::RenderTarget>>;

    fn acquire_next_image(&mut self) -> Result<u32>;

    fn present(&mut self, sync: SyncInterval) -> Result<()>;

    /// Resizes the images. All views of the old images must be released first.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
}

/// GPU-signaled monotonic counter.
pub trait GpuFence {
    fn completed_value(&self) -> u64;

    /// Blocks until the completed value reaches `value`.
    ///
    /// `None` waits forever. Expiry is reported as device loss.
    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_interval_mapping() {
        assert_eq!(SyncInterval::from_interval(0), SyncInterval::Immediate);
        assert_eq!(SyncInterval::from_interval(1), SyncInterval::VerticalSync);
        assert_eq!(SyncInterval::from_interval(4), SyncInterval::VerticalSync);
        assert_eq!(SyncInterval::default(), SyncInterval::VerticalSync);
    }
}
