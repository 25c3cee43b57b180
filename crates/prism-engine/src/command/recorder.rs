use crate::backend::{Device, PrimitiveTopology};
use crate::error::Result;
use crate::geometry::{ScissorRect, Viewport, CLEAR_COLOR};
use crate::resource::{IndexBufferView, PipelineState, UniformBuffer, VertexBufferView};
use crate::state::{ResourceState, StateTracker, TrackedResource};
use crate::sync::{FenceTicket, FrameFence};

use super::{Command, CommandBuffer};

/// Everything one frame binds.
pub struct FrameInputs<'a, D: Device> {
    pub image_index: u32,
    pub target: &'a D::RenderTarget,
    pub pipeline: &'a PipelineState<D>,
    pub descriptor_table: &'a D::DescriptorTable,
    pub viewport: Viewport,
    pub scissor: ScissorRect,
    pub vertex_view: VertexBufferView<D>,
    pub index_view: IndexBufferView<D>,
    pub index_count: u32,
    pub uniform: &'a UniformBuffer<D>,
}

/// Records the per-frame command buffer.
///
/// The sequence is fixed:
/// 1. barrier `Present -> RenderTarget`
/// 2. bind the render target
/// 3. viewport and scissor
/// 4. clear
/// 5. pipeline, root signature, descriptor table, vertex/index buffers, topology
/// 6. indexed draw, one instance
/// 7. barrier `RenderTarget -> Present`
pub struct CommandRecorder<D: Device> {
    buffer: CommandBuffer<D>,
    clear_color: [f32; 4],
}

impl<D: Device> Default for CommandRecorder<D> {
    fn default() -> Self {
        Self::new(CLEAR_COLOR)
    }
}

impl<D: Device> CommandRecorder<D> {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            buffer: CommandBuffer::new(),
            clear_color,
        }
    }

    pub fn buffer(&self) -> &CommandBuffer<D> {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut CommandBuffer<D> {
        &mut self.buffer
    }

    pub fn record_frame(
        &mut self,
        tracker: &mut StateTracker,
        fence: &FrameFence<D>,
        inputs: FrameInputs<'_, D>,
    ) -> Result<&mut CommandBuffer<D>> {
        inputs.uniform.ensure_idle(fence)?;
        self.buffer.reset(fence)?;

        let image = inputs.image_index;
        let swap_image = TrackedResource::SwapImage(image);
        let cb = &mut self.buffer;

        cb.begin(image, inputs.target.clone())?;

        if let Some(barrier) = tracker.transition(swap_image, ResourceState::Present, ResourceState::RenderTarget)? {
            cb.push(Command::Barrier(barrier))?;
        }

        cb.push(Command::SetRenderTarget {
            image,
            view: inputs.target.clone(),
        })?;
        cb.push(Command::SetViewport(inputs.viewport))?;
        cb.push(Command::SetScissor(inputs.scissor))?;
        cb.push(Command::ClearRenderTarget {
            image,
            color: self.clear_color,
        })?;

        cb.push(Command::SetPipelineState(inputs.pipeline.pipeline().clone()))?;
        cb.push(Command::SetRootSignature(inputs.pipeline.root_signature().clone()))?;
        cb.push(Command::SetDescriptorTable {
            slot: 0,
            table: inputs.descriptor_table.clone(),
        })?;
        cb.push(Command::SetVertexBuffer {
            slot: 0,
            view: inputs.vertex_view,
        })?;
        cb.push(Command::SetIndexBuffer(inputs.index_view))?;
        cb.push(Command::SetPrimitiveTopology(PrimitiveTopology::TriangleList))?;

        cb.push(Command::DrawIndexed {
            index_count: inputs.index_count,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        })?;

        if let Some(barrier) = tracker.transition(swap_image, ResourceState::RenderTarget, ResourceState::Present)? {
            cb.push(Command::Barrier(barrier))?;
        }

        cb.close()?;
        log::trace!("recorded {} commands for image {image}", cb.commands().len());
        Ok(cb)
    }

    /// Ties the submitted buffer to the fence value signaled after it.
    pub fn retire(&mut self, ticket: FenceTicket) -> Result<()> {
        self.buffer.retire(ticket)
    }
}
