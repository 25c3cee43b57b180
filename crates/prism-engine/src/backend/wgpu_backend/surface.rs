use std::fmt;
use std::sync::{Arc, Mutex};

use crate::backend::{SurfaceFormat, SwapChain, SyncInterval};
use crate::error::{RenderError, Result};

pub(crate) fn to_wgpu_format(format: SurfaceFormat) -> wgpu::TextureFormat {
    match format {
        SurfaceFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        SurfaceFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
        SurfaceFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        SurfaceFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
    }
}

fn from_wgpu_format(format: wgpu::TextureFormat) -> Option<SurfaceFormat> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Some(SurfaceFormat::Rgba8Unorm),
        wgpu::TextureFormat::Bgra8Unorm => Some(SurfaceFormat::Bgra8Unorm),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(SurfaceFormat::Rgba8UnormSrgb),
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(SurfaceFormat::Bgra8UnormSrgb),
        _ => None,
    }
}

/// Picks `requested` when the surface supports it, otherwise a supported
/// 8-bit format with the same sRGB-ness, otherwise any 8-bit format.
pub(crate) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    requested: SurfaceFormat,
) -> Option<SurfaceFormat> {
    let supported: Vec<SurfaceFormat> = caps.formats.iter().filter_map(|f| from_wgpu_format(*f)).collect();

    if supported.contains(&requested) {
        return Some(requested);
    }

    supported
        .iter()
        .copied()
        .find(|f| f.is_srgb() == requested.is_srgb())
        .or_else(|| supported.first().copied())
}

pub(crate) fn choose_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    [wgpu::CompositeAlphaMode::Opaque]
        .into_iter()
        .find(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

pub(crate) fn present_mode(sync: SyncInterval) -> wgpu::PresentMode {
    match sync {
        SyncInterval::Immediate => wgpu::PresentMode::AutoNoVsync,
        SyncInterval::VerticalSync => wgpu::PresentMode::AutoVsync,
    }
}

/// The swap image currently held by the application.
pub(crate) struct AcquiredImage {
    pub index: u32,
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

type AcquiredSlot = Arc<Mutex<Option<AcquiredImage>>>;

/// Render-target view of swap image `index`.
///
/// wgpu hands out one surface texture at a time, so every view shares the
/// acquisition slot and resolves to a texture view only while its image is
/// the acquired one.
#[derive(Clone)]
pub struct WgpuRenderTarget {
    index: u32,
    slot: AcquiredSlot,
}

impl WgpuRenderTarget {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub(crate) fn view(&self) -> Result<wgpu::TextureView> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| RenderError::device_lost("swap image slot poisoned"))?;
        match slot.as_ref() {
            Some(acquired) if acquired.index == self.index => Ok(acquired.view.clone()),
            _ => Err(RenderError::NoAcquiredImage),
        }
    }
}

impl fmt::Debug for WgpuRenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuRenderTarget").field("index", &self.index).finish()
    }
}

pub struct WgpuSurface {
    // Declared before `surface`: the acquired texture must go first.
    slot: AcquiredSlot,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    config: wgpu::SurfaceConfiguration,
    format: SurfaceFormat,
    image_count: u32,
    next_index: u32,
}

impl WgpuSurface {
    pub(crate) fn new(
        surface: wgpu::Surface<'static>,
        device: wgpu::Device,
        config: wgpu::SurfaceConfiguration,
        format: SurfaceFormat,
        image_count: u32,
    ) -> Self {
        surface.configure(&device, &config);
        Self {
            slot: Arc::new(Mutex::new(None)),
            surface,
            device,
            config,
            format,
            image_count,
            next_index: 0,
        }
    }

    fn reconfigure(&self) {
        if self.config.width > 0 && self.config.height > 0 {
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<AcquiredImage>>> {
        self.slot
            .lock()
            .map_err(|_| RenderError::device_lost("swap image slot poisoned"))
    }

    fn current_texture(&self) -> Result<wgpu::SurfaceTexture> {
        match self.surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("swap surface out of date; reconfiguring");
                self.reconfigure();
                self.surface.get_current_texture().map_err(map_surface_error)
            }
            Err(e) => Err(map_surface_error(e)),
        }
    }
}

fn map_surface_error(err: wgpu::SurfaceError) -> RenderError {
    match err {
        wgpu::SurfaceError::OutOfMemory => RenderError::OutOfDeviceMemory {
            label: "swap surface".to_string(),
            requested: 0,
        },
        wgpu::SurfaceError::Timeout => {
            RenderError::SwapImageUnavailable("timed out waiting for the next swap image".to_string())
        }
        other => RenderError::SwapImageUnavailable(format!("acquisition failed: {other}")),
    }
}

impl SwapChain for WgpuSurface {
    type RenderTarget = WgpuRenderTarget;

    fn image_count(&self) -> u32 {
        self.image_count
    }

    fn extent(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn format(&self) -> SurfaceFormat {
        self.format
    }

    fn render_targets(&self) -> Result<Vec<WgpuRenderTarget>> {
        Ok((0..self.image_count)
            .map(|index| WgpuRenderTarget {
                index,
                slot: Arc::clone(&self.slot),
            })
            .collect())
    }

    fn acquire_next_image(&mut self) -> Result<u32> {
        if self.slot()?.is_some() {
            return Err(RenderError::CommandBufferState {
                expected: "presented",
                actual: "acquired",
            });
        }

        let texture = self.current_texture()?;
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.image_count;
        *self.slot()? = Some(AcquiredImage { index, texture, view });
        Ok(index)
    }

    fn present(&mut self, sync: SyncInterval) -> Result<()> {
        let acquired = self.slot()?.take().ok_or(RenderError::NoAcquiredImage)?;
        acquired.texture.present();

        let mode = present_mode(sync);
        if mode != self.config.present_mode {
            self.config.present_mode = mode;
            self.reconfigure();
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.slot()?.is_some() {
            return Err(RenderError::SurfaceCreationFailed(
                "cannot resize while a swap image is acquired".to_string(),
            ));
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
        self.next_index = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_failures_are_not_device_loss() {
        let timeout = map_surface_error(wgpu::SurfaceError::Timeout);
        assert!(matches!(&timeout, RenderError::SwapImageUnavailable(msg) if msg.contains("timed out")));

        for err in [wgpu::SurfaceError::Lost, wgpu::SurfaceError::Outdated, wgpu::SurfaceError::Other] {
            assert!(matches!(map_surface_error(err), RenderError::SwapImageUnavailable(_)));
        }

        assert!(matches!(
            map_surface_error(wgpu::SurfaceError::OutOfMemory),
            RenderError::OutOfDeviceMemory { .. }
        ));
    }
}
