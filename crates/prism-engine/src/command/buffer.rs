use std::fmt;

use crate::backend::{Device, PrimitiveTopology};
use crate::error::{RenderError, Result};
use crate::geometry::{ScissorRect, Viewport};
use crate::resource::{IndexBufferView, VertexBufferView};
use crate::state::Barrier;
use crate::sync::{FenceTicket, FrameFence};

/// One recorded GPU operation.
pub enum Command<D: Device> {
    Barrier(Barrier),
    /// Binds the color target; no depth view is bound.
    SetRenderTarget { image: u32, view: D::RenderTarget },
    SetViewport(Viewport),
    SetScissor(ScissorRect),
    ClearRenderTarget { image: u32, color: [f32; 4] },
    SetPipelineState(D::Pipeline),
    SetRootSignature(D::RootSignature),
    SetDescriptorTable { slot: u32, table: D::DescriptorTable },
    SetVertexBuffer { slot: u32, view: VertexBufferView<D> },
    SetIndexBuffer(IndexBufferView<D>),
    SetPrimitiveTopology(PrimitiveTopology),
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    },
}

/// Payload-free tag of a [`Command`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandKind {
    Barrier,
    SetRenderTarget,
    SetViewport,
    SetScissor,
    ClearRenderTarget,
    SetPipelineState,
    SetRootSignature,
    SetDescriptorTable,
    SetVertexBuffer,
    SetIndexBuffer,
    SetPrimitiveTopology,
    DrawIndexed,
}

impl<D: Device> Command<D> {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Barrier(_) => CommandKind::Barrier,
            Command::SetRenderTarget { .. } => CommandKind::SetRenderTarget,
            Command::SetViewport(_) => CommandKind::SetViewport,
            Command::SetScissor(_) => CommandKind::SetScissor,
            Command::ClearRenderTarget { .. } => CommandKind::ClearRenderTarget,
            Command::SetPipelineState(_) => CommandKind::SetPipelineState,
            Command::SetRootSignature(_) => CommandKind::SetRootSignature,
            Command::SetDescriptorTable { .. } => CommandKind::SetDescriptorTable,
            Command::SetVertexBuffer { .. } => CommandKind::SetVertexBuffer,
            Command::SetIndexBuffer(_) => CommandKind::SetIndexBuffer,
            Command::SetPrimitiveTopology(_) => CommandKind::SetPrimitiveTopology,
            Command::DrawIndexed { .. } => CommandKind::DrawIndexed,
        }
    }
}

impl<D: Device> Clone for Command<D> {
    fn clone(&self) -> Self {
        match self {
            Command::Barrier(b) => Command::Barrier(*b),
            Command::SetRenderTarget { image, view } => Command::SetRenderTarget {
                image: *image,
                view: view.clone(),
            },
            Command::SetViewport(v) => Command::SetViewport(*v),
            Command::SetScissor(s) => Command::SetScissor(*s),
            Command::ClearRenderTarget { image, color } => Command::ClearRenderTarget {
                image: *image,
                color: *color,
            },
            Command::SetPipelineState(p) => Command::SetPipelineState(p.clone()),
            Command::SetRootSignature(r) => Command::SetRootSignature(r.clone()),
            Command::SetDescriptorTable { slot, table } => Command::SetDescriptorTable {
                slot: *slot,
                table: table.clone(),
            },
            Command::SetVertexBuffer { slot, view } => Command::SetVertexBuffer {
                slot: *slot,
                view: view.clone(),
            },
            Command::SetIndexBuffer(v) => Command::SetIndexBuffer(v.clone()),
            Command::SetPrimitiveTopology(t) => Command::SetPrimitiveTopology(*t),
            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                first_instance,
            } => Command::DrawIndexed {
                index_count: *index_count,
                instance_count: *instance_count,
                first_index: *first_index,
                base_vertex: *base_vertex,
                first_instance: *first_instance,
            },
        }
    }
}

impl<D: Device> fmt::Debug for Command<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Barrier(b) => write!(f, "Barrier({} {} -> {})", b.resource, b.before, b.after),
            Command::ClearRenderTarget { image, color } => write!(f, "ClearRenderTarget({image}, {color:?})"),
            Command::DrawIndexed {
                index_count,
                instance_count,
                ..
            } => write!(f, "DrawIndexed({index_count} x {instance_count})"),
            other => write!(f, "{:?}", other.kind()),
        }
    }
}

/// Lifecycle of a [`CommandBuffer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CommandBufferState {
    Initial,
    Recording,
    Executable,
    /// Submitted; `ticket` is known once the fence has been signaled after it.
    Pending { ticket: Option<FenceTicket> },
}

impl CommandBufferState {
    fn name(self) -> &'static str {
        match self {
            CommandBufferState::Initial => "initial",
            CommandBufferState::Recording => "recording",
            CommandBufferState::Executable => "executable",
            CommandBufferState::Pending { .. } => "pending",
        }
    }
}

/// Sequential recording of GPU work targeting one swap image.
pub struct CommandBuffer<D: Device> {
    state: CommandBufferState,
    target: Option<(u32, D::RenderTarget)>,
    commands: Vec<Command<D>>,
}

impl<D: Device> Default for CommandBuffer<D> {
    fn default() -> Self {
        Self {
            state: CommandBufferState::Initial,
            target: None,
            commands: Vec::new(),
        }
    }
}

impl<D: Device> CommandBuffer<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CommandBufferState {
        self.state
    }

    pub fn commands(&self) -> &[Command<D>] {
        &self.commands
    }

    /// Image index and view this buffer renders into.
    pub fn target(&self) -> Option<(u32, &D::RenderTarget)> {
        self.target.as_ref().map(|(i, v)| (*i, v))
    }

    /// Returns the buffer to `Initial`.
    ///
    /// A pending buffer may only be reset once the fence has passed its ticket.
    pub fn reset(&mut self, fence: &FrameFence<D>) -> Result<()> {
        if let CommandBufferState::Pending { ticket } = self.state {
            match ticket {
                Some(t) if fence.is_complete(t) => {}
                Some(t) => {
                    return Err(RenderError::ResourceInFlight {
                        resource: "command buffer",
                        ticket: t.value(),
                    });
                }
                None => {
                    return Err(RenderError::CommandBufferState {
                        expected: "retired",
                        actual: "pending",
                    });
                }
            }
        }

        self.state = CommandBufferState::Initial;
        self.target = None;
        self.commands.clear();
        Ok(())
    }

    /// Starts recording against swap image `image`.
    pub fn begin(&mut self, image: u32, view: D::RenderTarget) -> Result<()> {
        self.expect(CommandBufferState::Initial)?;
        self.state = CommandBufferState::Recording;
        self.target = Some((image, view));
        Ok(())
    }

    pub fn push(&mut self, command: Command<D>) -> Result<()> {
        self.expect(CommandBufferState::Recording)?;
        self.commands.push(command);
        Ok(())
    }

    /// Ends recording.
    pub fn close(&mut self) -> Result<()> {
        self.expect(CommandBufferState::Recording)?;
        self.state = CommandBufferState::Executable;
        Ok(())
    }

    pub(crate) fn ensure_executable(&self) -> Result<()> {
        self.expect(CommandBufferState::Executable)
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.state = CommandBufferState::Pending { ticket: None };
    }

    /// Associates a pending buffer with the fence value signaled after it.
    pub fn retire(&mut self, ticket: FenceTicket) -> Result<()> {
        match self.state {
            CommandBufferState::Pending { ticket: None } => {
                self.state = CommandBufferState::Pending { ticket: Some(ticket) };
                Ok(())
            }
            other => Err(RenderError::CommandBufferState {
                expected: "pending",
                actual: other.name(),
            }),
        }
    }

    fn expect(&self, wanted: CommandBufferState) -> Result<()> {
        if self.state == wanted {
            Ok(())
        } else {
            Err(RenderError::CommandBufferState {
                expected: wanted.name(),
                actual: self.state.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessConfig, HeadlessDevice, HeadlessInstance};
    use crate::device::{DeviceContext, DeviceInit};

    fn context() -> DeviceContext<HeadlessDevice> {
        let mut instance = HeadlessInstance::new(HeadlessConfig::default());
        DeviceContext::create(&mut instance, &DeviceInit::default()).unwrap()
    }

    fn draw() -> Command<HeadlessDevice> {
        Command::DrawIndexed {
            index_count: 3,
            instance_count: 1,
            first_index: 0,
            base_vertex: 0,
            first_instance: 0,
        }
    }

    #[test]
    fn push_requires_recording() {
        let mut cb = CommandBuffer::<HeadlessDevice>::new();
        let err = cb.push(draw()).unwrap_err();
        assert!(matches!(
            err,
            RenderError::CommandBufferState {
                expected: "recording",
                actual: "initial"
            }
        ));
    }

    #[test]
    fn submitting_an_open_buffer_is_rejected() {
        let ctx = context();
        let mut cb = CommandBuffer::<HeadlessDevice>::new();
        cb.begin(0, crate::backend::headless::HeadlessRenderTarget::detached(0)).unwrap();
        cb.push(draw()).unwrap();

        let err = ctx.submit(&mut cb).unwrap_err();
        assert!(matches!(
            err,
            RenderError::CommandBufferState {
                expected: "executable",
                actual: "recording"
            }
        ));
    }

    #[test]
    fn pending_buffer_resets_only_after_its_ticket() {
        let ctx = context();
        let mut fence = FrameFence::new(&ctx, None).unwrap();
        let mut cb = CommandBuffer::<HeadlessDevice>::new();
        cb.begin(0, crate::backend::headless::HeadlessRenderTarget::detached(0)).unwrap();
        cb.close().unwrap();

        ctx.submit(&mut cb).unwrap();
        assert!(matches!(cb.reset(&fence), Err(RenderError::CommandBufferState { .. })));

        let ticket = fence.signal(&ctx).unwrap();
        cb.retire(ticket).unwrap();
        assert!(matches!(
            cb.reset(&fence),
            Err(RenderError::ResourceInFlight {
                resource: "command buffer",
                ..
            })
        ));

        fence.wait_until(ticket).unwrap();
        cb.reset(&fence).unwrap();
        assert_eq!(cb.state(), CommandBufferState::Initial);
        assert!(cb.commands().is_empty());
    }
}
