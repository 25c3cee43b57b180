//! Software rasterization of one triangle into an RGBA f32 image.

use glam::{Vec3, Vec4};

use crate::geometry::{ScissorRect, Viewport};

/// CPU-side image, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Image {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![[0.0, 0.0, 0.0, 1.0]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub(super) fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    fn set(&mut self, x: u32, y: u32, color: [f32; 4]) {
        if let Some(p) = self.pixels.get_mut((y * self.width + x) as usize) {
            *p = color;
        }
    }
}

/// One transformed vertex as the rasterizer sees it.
#[derive(Debug, Copy, Clone)]
pub(super) struct ClipVertex {
    pub position: Vec4,
    pub color: Vec3,
}

/// Rasterizes a triangle with barycentric color interpolation.
///
/// Pixel centers sit at `+0.5`. Both windings are filled. Triangles with a
/// vertex at or behind the eye (`w <= 0`) are dropped.
pub(super) fn fill_triangle(
    image: &mut Image,
    vertices: [ClipVertex; 3],
    viewport: &Viewport,
    scissor: &ScissorRect,
) {
    if vertices.iter().any(|v| v.position.w <= 0.0) {
        return;
    }

    let screen = vertices.map(|v| {
        let ndc = v.position.truncate() / v.position.w;
        (
            viewport.x + (ndc.x + 1.0) * 0.5 * viewport.width,
            viewport.y + (1.0 - ndc.y) * 0.5 * viewport.height,
        )
    });

    let area = edge(screen[0], screen[1], screen[2]);
    if area == 0.0 {
        return;
    }

    let x_end = (scissor.x.saturating_add(scissor.width)).min(image.width);
    let y_end = (scissor.y.saturating_add(scissor.height)).min(image.height);

    let min_x = screen.iter().map(|p| p.0).fold(f32::INFINITY, f32::min).floor().max(scissor.x as f32) as u32;
    let min_y = screen.iter().map(|p| p.1).fold(f32::INFINITY, f32::min).floor().max(scissor.y as f32) as u32;
    let max_x = (screen.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max).ceil().max(0.0) as u32).min(x_end);
    let max_y = (screen.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max).ceil().max(0.0) as u32).min(y_end);

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(screen[1], screen[2], p) / area;
            let w1 = edge(screen[2], screen[0], p) / area;
            let w2 = edge(screen[0], screen[1], p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let c = vertices[0].color * w0 + vertices[1].color * w1 + vertices[2].color * w2;
            image.set(x, y, [c.x, c.y, c.z, 1.0]);
        }
    }
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Option<[f32; 4]>, b: [f32; 4]) -> bool {
        a.is_some_and(|a| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5))
    }

    fn vertex(x: f32, y: f32, color: Vec3) -> ClipVertex {
        ClipVertex {
            position: Vec4::new(x, y, 0.0, 1.0),
            color,
        }
    }

    #[test]
    fn fills_inside_and_leaves_outside() {
        let mut image = Image::new(8, 8);
        image.fill([0.2, 0.2, 0.2, 1.0]);

        let red = Vec3::X;
        fill_triangle(
            &mut image,
            [vertex(-1.0, -1.0, red), vertex(1.0, -1.0, red), vertex(-1.0, 1.0, red)],
            &Viewport::full(8, 8),
            &ScissorRect::full(8, 8),
        );

        // Lower-left half is covered, upper-right corner is not.
        assert!(close(image.pixel(0, 7), [1.0, 0.0, 0.0, 1.0]));
        assert_eq!(image.pixel(7, 0), Some([0.2, 0.2, 0.2, 1.0]));
    }

    #[test]
    fn scissor_clips_writes() {
        let mut image = Image::new(4, 4);
        let c = Vec3::ONE;
        fill_triangle(
            &mut image,
            [vertex(-3.0, -3.0, c), vertex(3.0, -3.0, c), vertex(0.0, 3.0, c)],
            &Viewport::full(4, 4),
            &ScissorRect { x: 0, y: 0, width: 2, height: 4 },
        );
        assert!(close(image.pixel(1, 2), [1.0, 1.0, 1.0, 1.0]));
        assert_eq!(image.pixel(3, 2), Some([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn out_of_range_pixel_is_none() {
        assert_eq!(Image::new(2, 2).pixel(2, 0), None);
    }
}
