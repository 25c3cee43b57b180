use std::fmt;

use prism_shaderc::{ShaderBytecode, ShaderStage};

use crate::backend::{BufferUsage, Device, PipelineDesc, PrimitiveTopology, SurfaceFormat, VertexLayout};
use crate::device::DeviceContext;
use crate::error::{RenderError, Result};
use crate::geometry::Vertex;
use crate::state::{ResourceState, StateTracker, TrackedResource};

use super::ResourceHandle;

/// Width of the indices in an index buffer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Input-assembler binding of a vertex buffer.
pub struct VertexBufferView<D: Device> {
    pub buffer: D::Buffer,
    pub stride: u32,
    pub size: u64,
}

impl<D: Device> Clone for VertexBufferView<D> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            stride: self.stride,
            size: self.size,
        }
    }
}

impl<D: Device> fmt::Debug for VertexBufferView<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexBufferView")
            .field("buffer", &self.buffer)
            .field("stride", &self.stride)
            .field("size", &self.size)
            .finish()
    }
}

/// Input-assembler binding of an index buffer.
pub struct IndexBufferView<D: Device> {
    pub buffer: D::Buffer,
    pub format: IndexFormat,
    pub size: u64,
}

impl<D: Device> Clone for IndexBufferView<D> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            format: self.format,
            size: self.size,
        }
    }
}

impl<D: Device> fmt::Debug for IndexBufferView<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexBufferView")
            .field("buffer", &self.buffer)
            .field("format", &self.format)
            .field("size", &self.size)
            .finish()
    }
}

pub struct VertexBuffer<D: Device> {
    handle: ResourceHandle<D>,
    stride: u32,
}

impl<D: Device> VertexBuffer<D> {
    pub fn view(&self) -> VertexBufferView<D> {
        VertexBufferView {
            buffer: self.handle.buffer().clone(),
            stride: self.stride,
            size: self.handle.size(),
        }
    }

    pub fn handle(&self) -> &ResourceHandle<D> {
        &self.handle
    }
}

pub struct IndexBuffer<D: Device> {
    handle: ResourceHandle<D>,
    count: u32,
}

impl<D: Device> IndexBuffer<D> {
    pub fn view(&self) -> IndexBufferView<D> {
        IndexBufferView {
            buffer: self.handle.buffer().clone(),
            format: IndexFormat::Uint32,
            size: self.handle.size(),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn handle(&self) -> &ResourceHandle<D> {
        &self.handle
    }
}

/// Immutable shader object created from a compiled blob.
pub struct ShaderModule<D: Device> {
    stage: ShaderStage,
    entry_point: String,
    shader: D::Shader,
}

impl<D: Device> ShaderModule<D> {
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn shader(&self) -> &D::Shader {
        &self.shader
    }
}

/// Creates static resources and writes their contents exactly once.
pub struct StaticUploader<'a, D: Device> {
    ctx: &'a DeviceContext<D>,
}

impl<'a, D: Device> StaticUploader<'a, D> {
    pub fn new(ctx: &'a DeviceContext<D>) -> Self {
        Self { ctx }
    }

    /// Creates a buffer sized to `bytes`, copies them in and starts tracking it
    /// in `GenericRead`.
    pub fn upload_immutable(
        &self,
        label: &str,
        bytes: &[u8],
        usage: BufferUsage,
        tracker: &mut StateTracker,
    ) -> Result<ResourceHandle<D>> {
        if bytes.is_empty() {
            return Err(RenderError::OutOfDeviceMemory {
                label: label.to_string(),
                requested: 0,
            });
        }

        let buffer = self.ctx.device().create_buffer(label, usage, bytes)?;
        let handle = ResourceHandle::new(label, usage, bytes.len() as u64, buffer);
        tracker.register(
            TrackedResource::Buffer(handle.id()),
            ResourceState::GenericRead,
            ResourceState::GenericRead,
        );

        log::debug!("uploaded {label} {} ({} bytes)", handle.id(), handle.size());
        Ok(handle)
    }

    pub fn vertex_buffer(&self, vertices: &[Vertex], tracker: &mut StateTracker) -> Result<VertexBuffer<D>> {
        let handle = self.upload_immutable(
            "vertex buffer",
            bytemuck::cast_slice(vertices),
            BufferUsage::Vertex,
            tracker,
        )?;
        Ok(VertexBuffer {
            handle,
            stride: Vertex::STRIDE,
        })
    }

    pub fn index_buffer(&self, indices: &[u32], tracker: &mut StateTracker) -> Result<IndexBuffer<D>> {
        let handle = self.upload_immutable(
            "index buffer",
            bytemuck::cast_slice(indices),
            BufferUsage::Index,
            tracker,
        )?;
        Ok(IndexBuffer {
            handle,
            count: indices.len() as u32,
        })
    }

    pub fn create_shader(&self, bytecode: &ShaderBytecode) -> Result<ShaderModule<D>> {
        let shader = self.ctx.device().create_shader(bytecode)?;
        log::debug!(
            "created {} shader `{}` ({}, {} bytes)",
            bytecode.stage,
            bytecode.entry_point,
            bytecode.profile,
            bytecode.len()
        );
        Ok(ShaderModule {
            stage: bytecode.stage,
            entry_point: bytecode.entry_point.clone(),
            shader,
        })
    }
}

/// Pipeline state object plus the root signature it was built against.
///
/// The pipeline is declared first so it is released before its signature.
pub struct PipelineState<D: Device> {
    pipeline: D::Pipeline,
    root_signature: D::RootSignature,
}

impl<D: Device> PipelineState<D> {
    pub fn create(
        ctx: &DeviceContext<D>,
        vertex_shader: &ShaderModule<D>,
        pixel_shader: &ShaderModule<D>,
        vertex_layout: &VertexLayout,
        target_format: SurfaceFormat,
        uniform_size: u64,
    ) -> Result<Self> {
        if vertex_shader.stage() != ShaderStage::Vertex || pixel_shader.stage() != ShaderStage::Pixel {
            return Err(RenderError::PipelineCreationFailed(format!(
                "expected vertex + pixel shaders, got {} + {}",
                vertex_shader.stage(),
                pixel_shader.stage()
            )));
        }

        let device = ctx.device();
        let root_signature = device.create_root_signature(uniform_size)?;
        let pipeline = device.create_pipeline(&PipelineDesc {
            label: "triangle pipeline",
            vertex_shader: vertex_shader.shader(),
            pixel_shader: pixel_shader.shader(),
            vertex_layout,
            root_signature: &root_signature,
            topology: PrimitiveTopology::TriangleList,
            target_format,
        })?;

        Ok(Self {
            pipeline,
            root_signature,
        })
    }

    pub fn pipeline(&self) -> &D::Pipeline {
        &self.pipeline
    }

    pub fn root_signature(&self) -> &D::RootSignature {
        &self.root_signature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessConfig, HeadlessDevice, HeadlessInstance};
    use crate::device::DeviceInit;
    use crate::geometry::{TRIANGLE_INDICES, TRIANGLE_VERTICES};

    fn context(config: HeadlessConfig) -> DeviceContext<HeadlessDevice> {
        let mut instance = HeadlessInstance::new(config);
        DeviceContext::create(&mut instance, &DeviceInit::default()).unwrap()
    }

    #[test]
    fn uploads_start_in_generic_read() {
        let ctx = context(HeadlessConfig::default());
        let mut tracker = StateTracker::new();
        let uploader = StaticUploader::new(&ctx);

        let vb = uploader.vertex_buffer(&TRIANGLE_VERTICES, &mut tracker).unwrap();
        let ib = uploader.index_buffer(&TRIANGLE_INDICES, &mut tracker).unwrap();

        assert_eq!(vb.handle().size(), 72);
        assert_eq!(vb.view().stride, 24);
        assert_eq!(ib.count(), 3);
        assert_eq!(ib.view().format, IndexFormat::Uint32);
        assert_eq!(
            tracker.state(TrackedResource::Buffer(vb.handle().id())),
            Some(ResourceState::GenericRead)
        );
        assert_eq!(
            tracker.state(TrackedResource::Buffer(ib.handle().id())),
            Some(ResourceState::GenericRead)
        );
    }

    #[test]
    fn empty_upload_is_rejected() {
        let ctx = context(HeadlessConfig::default());
        let mut tracker = StateTracker::new();
        let err = StaticUploader::new(&ctx)
            .upload_immutable("empty", &[], BufferUsage::Vertex, &mut tracker)
            .unwrap_err();
        assert!(matches!(err, RenderError::OutOfDeviceMemory { requested: 0, .. }));
        assert!(tracker.is_empty());
    }

    #[test]
    fn budget_exhaustion_is_out_of_memory() {
        let ctx = context(HeadlessConfig {
            memory_budget: 64,
            ..HeadlessConfig::default()
        });
        let mut tracker = StateTracker::new();
        let err = StaticUploader::new(&ctx)
            .vertex_buffer(&TRIANGLE_VERTICES, &mut tracker)
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::OutOfDeviceMemory { requested: 72, .. }));
    }

    #[test]
    fn pipeline_rejects_swapped_stages() {
        let ctx = context(HeadlessConfig::default());
        let shaders = crate::renderer::ShaderSet::triangle().unwrap();
        let uploader = StaticUploader::new(&ctx);
        let vs = uploader.create_shader(&shaders.vertex).unwrap();
        let ps = uploader.create_shader(&shaders.pixel).unwrap();

        let err = PipelineState::create(&ctx, &ps, &vs, &Vertex::layout(), SurfaceFormat::Rgba8Unorm, 256)
            .err()
            .unwrap();
        assert!(matches!(err, RenderError::PipelineCreationFailed(_)));

        PipelineState::create(&ctx, &vs, &ps, &Vertex::layout(), SurfaceFormat::Rgba8Unorm, 256).unwrap();
    }
}
