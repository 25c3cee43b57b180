//! The headless queue and its command executor.
//!
//! Submitted work is only queued. It runs when the CPU waits on a fence or the
//! host explicitly advances the GPU, which is what lets tests observe work in
//! flight. The executor checks resource states the way a validation layer
//! would; any violation loses the device.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec3;

use crate::backend::VertexAttribute;
use crate::command::Command;
use crate::error::{RenderError, Result};
use crate::geometry::{ScissorRect, UniformBlock, Viewport};
use crate::resource::{IndexBufferView, IndexFormat, VertexBufferView};
use crate::state::{ResourceState, TrackedResource};

use super::raster::{fill_triangle, ClipVertex, Image};
use super::{FenceState, HeadlessDevice, HeadlessDescriptorTable, HeadlessPipeline, HeadlessRenderTarget, SurfaceState};

pub(super) enum QueueOp {
    Execute {
        target: Option<HeadlessRenderTarget>,
        commands: Vec<Command<HeadlessDevice>>,
    },
    Present {
        surface: Rc<RefCell<SurfaceState>>,
        image: u32,
    },
    Signal {
        fence: Rc<FenceState>,
        value: u64,
    },
}

#[derive(Default)]
pub(super) struct GpuCore {
    queue: VecDeque<QueueOp>,
    lost: Option<String>,
    presented: Option<Image>,
    present_count: u64,
    executed: u64,
    stalled: bool,
}

impl GpuCore {
    pub fn check_alive(&self) -> Result<()> {
        match &self.lost {
            Some(reason) => Err(RenderError::device_lost(reason.clone())),
            None => Ok(()),
        }
    }

    pub fn enqueue(&mut self, op: QueueOp) -> Result<()> {
        self.check_alive()?;
        self.queue.push_back(op);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn presented(&self) -> Option<&Image> {
        self.presented.as_ref()
    }

    pub fn present_count(&self) -> u64 {
        self.present_count
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn lost_reason(&self) -> Option<&str> {
        self.lost.as_deref()
    }

    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Runs queued work until `fence` reaches `value`.
    ///
    /// A stalled queue runs nothing, so the wait expires after `timeout`.
    pub fn run_until(&mut self, fence: &FenceState, value: u64, timeout: Option<Duration>) -> Result<()> {
        self.check_alive()?;
        if self.stalled && fence.completed.get() < value {
            return Err(match timeout {
                Some(timeout) => RenderError::device_lost(format!(
                    "fence wait for {value} timed out after {timeout:?} (completed {})",
                    fence.completed.get()
                )),
                None => RenderError::device_lost(format!("fence wait for {value} blocks forever on a stalled queue")),
            });
        }
        while fence.completed.get() < value {
            let Some(op) = self.queue.pop_front() else {
                return Err(RenderError::device_lost(format!(
                    "fence wait for {value} can never complete (completed {})",
                    fence.completed.get()
                )));
            };
            self.run(op)?;
        }
        Ok(())
    }

    /// Runs everything queued.
    pub fn flush(&mut self) -> Result<()> {
        self.check_alive()?;
        if self.stalled {
            return Ok(());
        }
        while let Some(op) = self.queue.pop_front() {
            self.run(op)?;
        }
        Ok(())
    }

    fn run(&mut self, op: QueueOp) -> Result<()> {
        let result = match op {
            QueueOp::Execute { target, commands } => {
                self.executed += 1;
                execute(target.as_ref(), &commands)
            }
            QueueOp::Present { surface, image } => self.present(&surface, image),
            QueueOp::Signal { fence, value } => {
                fence.completed.set(fence.completed.get().max(value));
                Ok(())
            }
        };

        if let Err(RenderError::DeviceLost { reason }) = &result {
            log::error!("headless device lost: {reason}");
            self.lost = Some(reason.clone());
            self.queue.clear();
        }
        result
    }

    fn present(&mut self, surface: &RefCell<SurfaceState>, image: u32) -> Result<()> {
        let state = surface.borrow();
        let actual = state.gpu_state(image)?;
        if actual != ResourceState::Present {
            return Err(RenderError::device_lost(format!(
                "swap image {image} presented while in {actual}"
            )));
        }

        self.presented = state.images.get(image as usize).cloned();
        self.present_count += 1;
        Ok(())
    }
}

/// Pipeline bindings accumulated while walking a command list.
#[derive(Default)]
struct Bindings {
    target: Option<HeadlessRenderTarget>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    pipeline: Option<HeadlessPipeline>,
    table: Option<HeadlessDescriptorTable>,
    vertices: Option<VertexBufferView<HeadlessDevice>>,
    indices: Option<IndexBufferView<HeadlessDevice>>,
}

fn execute(submitted_target: Option<&HeadlessRenderTarget>, commands: &[Command<HeadlessDevice>]) -> Result<()> {
    let mut bind = Bindings::default();

    for command in commands {
        match command {
            Command::Barrier(barrier) => {
                let TrackedResource::SwapImage(image) = barrier.resource else {
                    // Buffers live in GENERIC_READ; nothing to move.
                    continue;
                };
                let target = submitted_target
                    .ok_or_else(|| RenderError::device_lost("barrier on a swap image without a target"))?;
                let surface = target.surface()?;
                let mut state = surface.borrow_mut();
                target.check_generation(&state)?;

                let actual = state.gpu_state(image)?;
                if actual != barrier.before {
                    return Err(RenderError::device_lost(format!(
                        "barrier on swap image {image} claims {} but the image is in {actual}",
                        barrier.before
                    )));
                }
                state.set_gpu_state(image, barrier.after)?;
            }

            Command::SetRenderTarget { view, .. } => {
                let surface = view.surface()?;
                view.check_generation(&surface.borrow())?;
                bind.target = Some(view.clone());
            }

            Command::SetViewport(v) => bind.viewport = Some(*v),
            Command::SetScissor(s) => bind.scissor = Some(*s),

            Command::ClearRenderTarget { image, color } => {
                let target = bound(&bind.target, "render target")?;
                let surface = target.surface()?;
                let mut state = surface.borrow_mut();
                require_render_target(&state, *image)?;
                state.image_mut(*image)?.fill(*color);
            }

            Command::SetPipelineState(p) => bind.pipeline = Some(p.clone()),
            // The signature is baked into the pipeline; nothing else to bind.
            Command::SetRootSignature(_) => {}
            Command::SetDescriptorTable { table, .. } => bind.table = Some(table.clone()),
            Command::SetVertexBuffer { view, .. } => bind.vertices = Some(view.clone()),
            Command::SetIndexBuffer(view) => bind.indices = Some(view.clone()),
            Command::SetPrimitiveTopology(_) => {}

            Command::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                base_vertex,
                ..
            } => {
                if *instance_count == 0 {
                    continue;
                }
                draw_indexed(&bind, *index_count, *first_index, *base_vertex)?;
            }
        }
    }
    Ok(())
}

fn draw_indexed(bind: &Bindings, index_count: u32, first_index: u32, base_vertex: i32) -> Result<()> {
    let target = bound(&bind.target, "render target")?;
    let pipeline = bound(&bind.pipeline, "pipeline state")?;
    let table = bound(&bind.table, "descriptor table")?;
    let vertices = bound(&bind.vertices, "vertex buffer")?;
    let indices = bound(&bind.indices, "index buffer")?;
    let viewport = bound(&bind.viewport, "viewport")?;
    let scissor = bound(&bind.scissor, "scissor rect")?;

    let transform = {
        let data = table.uniform().data();
        let size = std::mem::size_of::<UniformBlock>();
        if data.len() < size {
            return Err(RenderError::device_lost("constant buffer smaller than the transform block"));
        }
        bytemuck::pod_read_unaligned::<UniformBlock>(&data[..size]).clip_from_object()
    };

    let position_attr = pipeline.attribute(0)?;
    let color_attr = pipeline.attribute(1)?;

    let index_data = indices.buffer.data();
    let vertex_data = vertices.buffer.data();

    let surface = target.surface()?;
    let mut state = surface.borrow_mut();
    require_render_target(&state, target.image())?;
    let image = state.image_mut(target.image())?;

    for tri in 0..index_count / 3 {
        let mut corners = [ClipVertex {
            position: glam::Vec4::ZERO,
            color: Vec3::ZERO,
        }; 3];

        for (corner, slot) in corners.iter_mut().enumerate() {
            let i = first_index + tri * 3 + corner as u32;
            let index = read_index(&index_data, indices.format, i)? as i64 + base_vertex as i64;
            let base = usize::try_from(index)
                .map_err(|_| RenderError::device_lost(format!("negative vertex index {index}")))?
                * vertices.stride as usize;

            let position = read_vec3(&vertex_data, base, &position_attr)?;
            let color = read_vec3(&vertex_data, base, &color_attr)?;
            *slot = ClipVertex {
                position: transform * position.extend(1.0),
                color,
            };
        }

        fill_triangle(image, corners, &viewport, &scissor);
    }
    Ok(())
}

fn bound<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
    slot.clone()
        .ok_or_else(|| RenderError::device_lost(format!("draw without a bound {what}")))
}

fn require_render_target(state: &SurfaceState, image: u32) -> Result<()> {
    let actual = state.gpu_state(image)?;
    if actual != ResourceState::RenderTarget {
        return Err(RenderError::device_lost(format!(
            "swap image {image} written while in {actual}"
        )));
    }
    Ok(())
}

fn read_index(data: &[u8], format: IndexFormat, i: u32) -> Result<u32> {
    let width = match format {
        IndexFormat::Uint16 => 2,
        IndexFormat::Uint32 => 4,
    };
    let start = i as usize * width;
    let bytes = data
        .get(start..start + width)
        .ok_or_else(|| RenderError::device_lost(format!("index {i} is outside the index buffer")))?;

    Ok(match format {
        IndexFormat::Uint16 => bytemuck::pod_read_unaligned::<u16>(bytes) as u32,
        IndexFormat::Uint32 => bytemuck::pod_read_unaligned::<u32>(bytes),
    })
}

fn read_vec3(data: &[u8], base: usize, attr: &VertexAttribute) -> Result<Vec3> {
    let start = base + attr.offset as usize;
    let bytes = data
        .get(start..start + 12)
        .ok_or_else(|| RenderError::device_lost(format!("vertex fetch at byte {start} is out of bounds")))?;
    Ok(Vec3::from_array(bytemuck::pod_read_unaligned::<[f32; 3]>(bytes)))
}
