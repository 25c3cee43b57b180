//! The triangle renderer: composes the device, frame resources, uploads,
//! uniforms, tracker, recorder and fence, and runs the per-frame flow.
//!
//! Per frame:
//! 1. check the fence proves the uniform buffer idle
//! 2. acquire the next swap image and write the transform block
//! 3. record `Present -> RenderTarget`, clear, draw, `RenderTarget -> Present`
//! 4. submit, present, signal the fence

use std::time::Duration;

use prism_shaderc::ShaderBytecode;

use crate::backend::{Device, Instance, SyncInterval};
use crate::command::{CommandRecorder, FrameInputs};
use crate::device::{DeviceContext, DeviceInit};
use crate::error::{InitStage, RenderError, Result};
use crate::frame::{FrameResourceSet, SurfaceInit};
use crate::geometry::{UniformBlock, Vertex, CLEAR_COLOR, TRIANGLE_INDICES, TRIANGLE_VERTICES};
use crate::resource::{IndexBuffer, PipelineState, ShaderModule, StaticUploader, UniformBuffer, VertexBuffer};
use crate::state::StateTracker;
use crate::sync::{FenceTicket, FrameFence};

/// Vertex stage source of the triangle program.
pub const TRIANGLE_VS: &str = include_str!("shaders/triangle.vs.wgsl");

/// Pixel stage source of the triangle program.
pub const TRIANGLE_PS: &str = include_str!("shaders/triangle.ps.wgsl");

/// Compiled vertex and pixel blobs, both with entry point `main`.
#[derive(Debug, Clone)]
pub struct ShaderSet {
    pub vertex: ShaderBytecode,
    pub pixel: ShaderBytecode,
}

impl ShaderSet {
    /// Compiles both stages against the `vs_5_0` / `ps_5_0` profiles.
    pub fn compile(vertex_source: &str, pixel_source: &str) -> Result<Self> {
        let vertex = prism_shaderc::compile(vertex_source, "main", "vs_5_0")
            .map_err(|e| RenderError::from(e).at_stage(InitStage::Shader))?;
        let pixel = prism_shaderc::compile(pixel_source, "main", "ps_5_0")
            .map_err(|e| RenderError::from(e).at_stage(InitStage::Shader))?;
        Ok(Self { vertex, pixel })
    }

    /// The built-in triangle program.
    pub fn triangle() -> Result<Self> {
        Self::compile(TRIANGLE_VS, TRIANGLE_PS)
    }
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub device: DeviceInit,
    pub surface: SurfaceInit,
    pub clear_color: [f32; 4],
    /// Upper bound on any single fence wait; `None` waits forever.
    pub fence_timeout: Option<Duration>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            device: DeviceInit::default(),
            surface: SurfaceInit::default(),
            clear_color: CLEAR_COLOR,
            fence_timeout: None,
        }
    }
}

/// Owns every object the triangle needs.
///
/// Fields are declared in reverse construction order so they are released
/// newest first, after `Drop` has drained the queue.
pub struct TriangleRenderer<D: Device> {
    recorder: CommandRecorder<D>,
    descriptor_table: D::DescriptorTable,
    uniforms: UniformBuffer<D>,
    pipeline: PipelineState<D>,
    pixel_shader: ShaderModule<D>,
    vertex_shader: ShaderModule<D>,
    index_buffer: IndexBuffer<D>,
    vertex_buffer: VertexBuffer<D>,
    frames: FrameResourceSet<D>,
    fence: FrameFence<D>,
    tracker: StateTracker,
    context: DeviceContext<D>,

    uniform_block: UniformBlock,
    sync: SyncInterval,
    frame_count: u64,
}

impl<D: Device> TriangleRenderer<D> {
    /// Builds the device, swap surface, static resources and pipeline.
    ///
    /// On failure everything created so far is released in reverse order and
    /// the error carries the stage that failed.
    pub fn new<I>(
        instance: &mut I,
        window: &D::Window,
        width: u32,
        height: u32,
        config: &RendererConfig,
        shaders: &ShaderSet,
    ) -> Result<Self>
    where
        I: Instance<Device = D>,
    {
        let context = DeviceContext::create(instance, &config.device)?;
        let mut tracker = StateTracker::new();

        let fence = FrameFence::new(&context, config.fence_timeout).map_err(|e| e.at_stage(InitStage::Device))?;

        let frames = FrameResourceSet::create(&context, window, width, height, &config.surface, &mut tracker)
            .map_err(|e| e.at_stage(InitStage::SwapSurface))?;

        let uploader = StaticUploader::new(&context);
        let vertex_buffer = uploader
            .vertex_buffer(&TRIANGLE_VERTICES, &mut tracker)
            .map_err(|e| e.at_stage(InitStage::Resources))?;
        let index_buffer = uploader
            .index_buffer(&TRIANGLE_INDICES, &mut tracker)
            .map_err(|e| e.at_stage(InitStage::Resources))?;

        let vertex_shader = uploader
            .create_shader(&shaders.vertex)
            .map_err(|e| e.at_stage(InitStage::Shader))?;
        let pixel_shader = uploader
            .create_shader(&shaders.pixel)
            .map_err(|e| e.at_stage(InitStage::Shader))?;

        let uniform_block = UniformBlock::IDENTITY;
        let uniform_size = std::mem::size_of::<UniformBlock>() as u64;

        let pipeline = PipelineState::create(
            &context,
            &vertex_shader,
            &pixel_shader,
            &Vertex::layout(),
            frames.format(),
            uniform_size,
        )
        .map_err(|e| e.at_stage(InitStage::Pipeline))?;

        let uniforms = UniformBuffer::create(&context, &uniform_block, &mut tracker)
            .map_err(|e| e.at_stage(InitStage::Resources))?;

        let descriptor_table = context
            .device()
            .create_descriptor_table(pipeline.root_signature(), uniforms.handle().buffer())
            .map_err(|e| e.at_stage(InitStage::Resources))?;

        let recorder = CommandRecorder::new(config.clear_color);

        log::info!("renderer ready");

        Ok(Self {
            recorder,
            descriptor_table,
            uniforms,
            pipeline,
            pixel_shader,
            vertex_shader,
            index_buffer,
            vertex_buffer,
            frames,
            fence,
            tracker,
            context,
            uniform_block,
            sync: config.surface.sync(),
            frame_count: 0,
        })
    }

    /// Records, submits and presents one frame without waiting for the GPU.
    ///
    /// While the surface is minimized nothing is rendered and the ticket of the
    /// last submitted frame is returned.
    pub fn submit_frame(&mut self) -> Result<FenceTicket> {
        if self.frames.is_minimized() {
            log::trace!("surface minimized; frame skipped");
            return Ok(self.fence.last_ticket());
        }

        // Before acquiring, so a refused frame leaves no image checked out.
        self.uniforms.ensure_idle(&self.fence)?;
        let image = self.frames.acquire_next_image()?;

        self.uniforms
            .map(&self.context, &self.fence)?
            .write_and_unmap(&self.uniform_block)?;

        let commands = self.recorder.record_frame(
            &mut self.tracker,
            &self.fence,
            FrameInputs {
                image_index: image,
                target: self.frames.render_target(image)?,
                pipeline: &self.pipeline,
                descriptor_table: &self.descriptor_table,
                viewport: self.frames.viewport(),
                scissor: self.frames.scissor(),
                vertex_view: self.vertex_buffer.view(),
                index_view: self.index_buffer.view(),
                index_count: self.index_buffer.count(),
                uniform: &self.uniforms,
            },
        )?;

        self.context.submit(commands)?;
        self.frames.present(self.sync, &self.tracker)?;

        let ticket = self.fence.signal(&self.context)?;
        self.recorder.retire(ticket)?;
        self.uniforms.mark_in_use(ticket);
        self.frame_count += 1;

        Ok(ticket)
    }

    /// Renders one frame and blocks until the GPU has finished it.
    pub fn render_frame(&mut self) -> Result<FenceTicket> {
        let ticket = self.submit_frame()?;
        self.fence.wait_until(ticket)?;
        Ok(ticket)
    }

    /// Resizes the swap surface. Fails if submitted work is still in flight.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.frames.resize(width, height, &self.fence, &mut self.tracker)
    }

    /// Drains the queue, then resizes.
    pub fn handle_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.fence.drain()?;
        self.resize(width, height)
    }

    /// Transforms used from the next submitted frame on.
    pub fn set_uniforms(&mut self, block: UniformBlock) {
        self.uniform_block = block;
    }

    pub fn uniforms(&self) -> &UniformBlock {
        &self.uniform_block
    }

    pub fn uniform_buffer(&self) -> &UniformBuffer<D> {
        &self.uniforms
    }

    pub fn context(&self) -> &DeviceContext<D> {
        &self.context
    }

    pub fn fence(&self) -> &FrameFence<D> {
        &self.fence
    }

    pub fn frames(&self) -> &FrameResourceSet<D> {
        &self.frames
    }

    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    pub fn recorder(&self) -> &CommandRecorder<D> {
        &self.recorder
    }

    pub fn shaders(&self) -> (&ShaderModule<D>, &ShaderModule<D>) {
        (&self.vertex_shader, &self.pixel_shader)
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl<D: Device> Drop for TriangleRenderer<D> {
    fn drop(&mut self) {
        match self.fence.drain() {
            Ok(()) => log::debug!("renderer shut down after {} frames", self.frame_count),
            Err(e) => log::error!("failed to drain the queue on shutdown: {e}"),
        }
    }
}
