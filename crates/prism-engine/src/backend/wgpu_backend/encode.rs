//! Lowers a recorded [`Command`] list onto a wgpu command encoder.
//!
//! wgpu tracks resource states itself, so barriers are only logged. A clear
//! followed by draws becomes one render pass whose load op does the clear.

use crate::command::Command;
use crate::error::{RenderError, Result};
use crate::geometry::{ScissorRect, Viewport};
use crate::resource::{IndexBufferView, IndexFormat, VertexBufferView};

use super::{WgpuDescriptorTable, WgpuDevice, WgpuPipeline};

struct Draw {
    pipeline: WgpuPipeline,
    table: WgpuDescriptorTable,
    vertices: VertexBufferView<WgpuDevice>,
    indices: IndexBufferView<WgpuDevice>,
    viewport: Viewport,
    scissor: ScissorRect,
    index_count: u32,
    instance_count: u32,
    first_index: u32,
    base_vertex: i32,
    first_instance: u32,
}

#[derive(Default)]
struct Bindings {
    target: Option<wgpu::TextureView>,
    viewport: Option<Viewport>,
    scissor: Option<ScissorRect>,
    pipeline: Option<WgpuPipeline>,
    table: Option<WgpuDescriptorTable>,
    vertices: Option<VertexBufferView<WgpuDevice>>,
    indices: Option<IndexBufferView<WgpuDevice>>,
}

fn bound<T: Clone>(slot: &Option<T>, what: &str) -> Result<T> {
    slot.clone()
        .ok_or_else(|| RenderError::device_lost(format!("draw without a bound {what}")))
}

pub(super) fn encode(device: &wgpu::Device, commands: &[Command<WgpuDevice>]) -> Result<wgpu::CommandBuffer> {
    let mut bind = Bindings::default();
    let mut clear = None;
    let mut draws = Vec::new();

    for command in commands {
        match command {
            Command::Barrier(barrier) => {
                log::trace!(
                    "barrier {}: {} -> {}",
                    barrier.resource,
                    barrier.before,
                    barrier.after
                );
            }
            Command::SetRenderTarget { view, .. } => bind.target = Some(view.view()?),
            Command::SetViewport(v) => bind.viewport = Some(*v),
            Command::SetScissor(s) => bind.scissor = Some(*s),
            Command::ClearRenderTarget { color, .. } => {
                clear = Some(wgpu::Color {
                    r: color[0] as f64,
                    g: color[1] as f64,
                    b: color[2] as f64,
                    a: color[3] as f64,
                });
            }
            Command::SetPipelineState(p) => bind.pipeline = Some(p.clone()),
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
                first_instance,
            } => draws.push(Draw {
                pipeline: bound(&bind.pipeline, "pipeline state")?,
                table: bound(&bind.table, "descriptor table")?,
                vertices: bound(&bind.vertices, "vertex buffer")?,
                indices: bound(&bind.indices, "index buffer")?,
                viewport: bound(&bind.viewport, "viewport")?,
                scissor: bound(&bind.scissor, "scissor rect")?,
                index_count: *index_count,
                instance_count: *instance_count,
                first_index: *first_index,
                base_vertex: *base_vertex,
                first_instance: *first_instance,
            }),
        }
    }

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("prism frame encoder"),
    });

    if let Some(target) = &bind.target {
        let load = match clear {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("prism frame pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        for draw in &draws {
            let v = draw.viewport;
            rpass.set_viewport(v.x, v.y, v.width, v.height, v.min_depth, v.max_depth);
            let s = draw.scissor;
            rpass.set_scissor_rect(s.x, s.y, s.width, s.height);

            rpass.set_pipeline(draw.pipeline.raw());
            rpass.set_bind_group(0, draw.table.raw(), &[]);
            rpass.set_vertex_buffer(0, draw.vertices.buffer.raw().slice(..draw.vertices.size));

            let format = match draw.indices.format {
                IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
                IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
            };
            rpass.set_index_buffer(draw.indices.buffer.raw().slice(..draw.indices.size), format);

            rpass.draw_indexed(
                draw.first_index..draw.first_index + draw.index_count,
                draw.base_vertex,
                draw.first_instance..draw.first_instance + draw.instance_count,
            );
        }
    } else if !draws.is_empty() || clear.is_some() {
        return Err(RenderError::device_lost("render commands recorded without a render target"));
    }

    Ok(encoder.finish())
}
