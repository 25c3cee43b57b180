//! Fixed scene data: the triangle, its indices, the clear color and the
//! transform block.
//!
//! Convention:
//! - positions are already in clip space (identity transforms by default)
//! - vertex colors are linear RGB
//! - winding is counter-clockwise as authored; culling is disabled

use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::backend::{VertexAttribute, VertexFormat, VertexLayout};

/// Constant-buffer placement alignment required by the device.
pub const UNIFORM_ALIGNMENT: u64 = 256;

/// Background color cleared at the start of every frame.
pub const CLEAR_COLOR: [f32; 4] = [0.2, 0.2, 0.2, 1.0];

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    /// Byte distance between consecutive vertices.
    pub const STRIDE: u32 = std::mem::size_of::<Vertex>() as u32;

    /// Byte offset of `color` within a vertex.
    pub const COLOR_OFFSET: u32 = 12;

    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::STRIDE,
            attributes: vec![
                VertexAttribute { location: 0, format: VertexFormat::Float32x3, offset: 0 },
                VertexAttribute { location: 1, format: VertexFormat::Float32x3, offset: Self::COLOR_OFFSET },
            ],
        }
    }
}

pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex { position: [1.0, -1.0, 0.0], color: [1.0, 0.0, 0.0] },
    Vertex { position: [-1.0, -1.0, 0.0], color: [0.0, 1.0, 0.0] },
    Vertex { position: [0.0, 1.0, 0.0], color: [0.0, 0.0, 1.0] },
];

pub const TRIANGLE_INDICES: [u32; 3] = [0, 1, 2];

// ── uniform block ─────────────────────────────────────────────────────────

/// Per-frame transforms read by the vertex stage.
///
/// Three matrices take 192 bytes; the tail pads the block to the 256-byte
/// constant-buffer alignment so the buffer size and the view size agree.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct UniformBlock {
    pub projection: Mat4,
    pub model: Mat4,
    pub view: Mat4,
    pub _pad: [f32; 16],
}

const _: () = assert!(std::mem::size_of::<UniformBlock>() as u64 == UNIFORM_ALIGNMENT);

impl UniformBlock {
    pub const IDENTITY: Self = Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY);

    pub const fn new(projection: Mat4, model: Mat4, view: Mat4) -> Self {
        Self {
            projection,
            model,
            view,
            _pad: [0.0; 16],
        }
    }

    /// Combined object-to-clip transform as applied by the vertex stage.
    pub fn clip_from_object(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for UniformBlock {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rounds `size` up to the next multiple of [`UNIFORM_ALIGNMENT`].
pub fn align_uniform_size(size: u64) -> u64 {
    (size + UNIFORM_ALIGNMENT - 1) & !(UNIFORM_ALIGNMENT - 1)
}

// ── viewport / scissor ────────────────────────────────────────────────────

/// Rasterizer viewport in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-surface viewport with the `[0, 1]` depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Scissor rectangle in physical pixels.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_position_plus_color() {
        assert_eq!(Vertex::STRIDE, 24);
        let v = TRIANGLE_VERTICES[0];
        let bytes = bytemuck::bytes_of(&v);
        let color: [f32; 3] = bytemuck::pod_read_unaligned(&bytes[Vertex::COLOR_OFFSET as usize..]);
        assert_eq!(color, [1.0, 0.0, 0.0]);

        let layout = Vertex::layout();
        let end = layout.attributes.iter().map(|a| a.offset + a.format.size()).max();
        assert_eq!(end, Some(layout.stride));
    }

    #[test]
    fn uniform_block_fills_one_aligned_slot() {
        assert_eq!(UniformBlock::IDENTITY.as_bytes().len(), 256);
        assert_eq!(UniformBlock::default().clip_from_object(), Mat4::IDENTITY);
    }

    #[test]
    fn uniform_alignment_rounding() {
        assert_eq!(align_uniform_size(0), 0);
        assert_eq!(align_uniform_size(1), 256);
        assert_eq!(align_uniform_size(192), 256);
        assert_eq!(align_uniform_size(256), 256);
        assert_eq!(align_uniform_size(257), 512);
    }

    #[test]
    fn full_scissor_is_not_empty() {
        assert!(!ScissorRect::full(800, 600).is_empty());
        assert!(ScissorRect::full(0, 600).is_empty());
    }
}
