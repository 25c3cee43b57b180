use crate::backend::{Device, SurfaceFormat, SwapChain, SwapSurfaceDesc, SyncInterval};
use crate::device::DeviceContext;
use crate::error::{RenderError, Result};
use crate::geometry::{ScissorRect, Viewport};
use crate::state::{StateTracker, TrackedResource};
use crate::sync::FrameFence;

use super::SurfaceInit;

/// Swap surface plus one render-target view per image.
///
/// Views are declared before the surface so they are released first.
pub struct FrameResourceSet<D: Device> {
    views: Vec<D::RenderTarget>,
    surface: D::Surface,
    width: u32,
    height: u32,
    image_count: u32,
    current: Option<u32>,
}

impl<D: Device> FrameResourceSet<D> {
    /// Creates the swap surface for `window` and registers its images with the
    /// tracker in `Present`.
    pub fn create(
        ctx: &DeviceContext<D>,
        window: &D::Window,
        width: u32,
        height: u32,
        init: &SurfaceInit,
        tracker: &mut StateTracker,
    ) -> Result<Self> {
        if init.image_count < 2 {
            return Err(RenderError::SurfaceCreationFailed(format!(
                "at least 2 swap images are required, got {}",
                init.image_count
            )));
        }
        if width == 0 || height == 0 {
            return Err(RenderError::SurfaceCreationFailed(format!(
                "surface size {width}x{height} has a zero dimension"
            )));
        }

        let desc = SwapSurfaceDesc {
            width,
            height,
            image_count: init.image_count,
            format: init.format,
            sync: init.sync(),
        };
        let surface = ctx.device().create_swap_surface(ctx.queue(), window, &desc)?;
        let views = surface.render_targets()?;
        let image_count = surface.image_count();

        tracker.reset_swap_images(image_count);

        log::info!(
            "swap surface created: {width}x{height}, {image_count} images, {:?}",
            surface.format()
        );

        Ok(Self {
            views,
            surface,
            width,
            height,
            image_count,
            current: None,
        })
    }

    pub fn image_count(&self) -> u32 {
        self.image_count
    }

    /// Format the surface actually negotiated; may differ from the requested one.
    pub fn format(&self) -> SurfaceFormat {
        self.surface.format()
    }

    /// Size in physical pixels, as last requested.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// `true` while a zero-sized resize is deferring reconfiguration.
    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Image index acquired and not yet presented.
    pub fn current_image(&self) -> Option<u32> {
        self.current
    }

    pub fn acquire_next_image(&mut self) -> Result<u32> {
        let index = self.surface.acquire_next_image()?;
        self.current = Some(index);
        Ok(index)
    }

    pub fn render_target(&self, index: u32) -> Result<&D::RenderTarget> {
        self.views.get(index as usize).ok_or(RenderError::NoAcquiredImage)
    }

    /// Hands the acquired image back to the presentation engine.
    ///
    /// The tracker must already have it back in `Present`.
    pub fn present(&mut self, sync: SyncInterval, tracker: &StateTracker) -> Result<()> {
        let Some(index) = self.current else {
            return Err(RenderError::NoAcquiredImage);
        };

        tracker.check_balanced(TrackedResource::SwapImage(index))?;
        self.surface.present(sync)?;
        self.current = None;
        Ok(())
    }

    /// Resizes the swap images.
    ///
    /// No submitted work may still be in flight. A zero-sized request only
    /// records the size; the surface is reconfigured by the next non-zero one.
    pub fn resize(&mut self, width: u32, height: u32, fence: &FrameFence<D>, tracker: &mut StateTracker) -> Result<()> {
        if fence.has_pending() {
            return Err(RenderError::ResizeWhileInFlight {
                pending: fence.last_signaled(),
                completed: fence.completed(),
            });
        }

        if (width, height) == (self.width, self.height) && !self.views.is_empty() {
            return Ok(());
        }

        self.current = None;
        self.views.clear();
        self.width = width;
        self.height = height;

        if self.is_minimized() {
            log::debug!("surface resize to {width}x{height} deferred");
            return Ok(());
        }

        self.surface.resize(width, height)?;
        self.views = self.surface.render_targets()?;
        tracker.reset_swap_images(self.image_count);

        log::info!("swap surface resized to {width}x{height}");
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::full(self.width, self.height)
    }

    pub fn scissor(&self) -> ScissorRect {
        ScissorRect::full(self.width, self.height)
    }
}
