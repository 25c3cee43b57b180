use crate::backend::{SurfaceFormat, SyncInterval};

/// Swap surface parameters.
#[derive(Debug, Clone)]
pub struct SurfaceInit {
    /// Number of swap images. Must be at least 2.
    pub image_count: u32,

    /// Preferred image format. Backends fall back to a supported one when the
    /// window cannot present it.
    pub format: SurfaceFormat,

    /// `0` presents immediately, `1` waits for vblank.
    pub sync_interval: u32,
}

impl SurfaceInit {
    pub fn sync(&self) -> SyncInterval {
        SyncInterval::from_interval(self.sync_interval)
    }
}

impl Default for SurfaceInit {
    fn default() -> Self {
        Self {
            image_count: 2,
            format: SurfaceFormat::Rgba8Unorm,
            sync_interval: 1,
        }
    }
}
