//! Error taxonomy for the rendering core.
//!
//! Every fallible engine operation returns [`Result<T>`]. Initialization
//! failures are tagged with the [`InitStage`] that produced them so the host can
//! tell a driver problem from a bad window handle or a broken shader.

use std::fmt;

use thiserror::Error;

use crate::state::{ResourceState, TrackedResource};

pub type Result<T, E = RenderError> = std::result::Result<T, E>;

/// Startup stage a failure belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InitStage {
    Adapter,
    Device,
    SwapSurface,
    Resources,
    Shader,
    Pipeline,
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InitStage::Adapter => "adapter",
            InitStage::Device => "device",
            InitStage::SwapSurface => "swap surface",
            InitStage::Resources => "resources",
            InitStage::Shader => "shader",
            InitStage::Pipeline => "pipeline",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Initialization
    // ========================================================================
    /// No enumerated adapter is hardware-backed and supports the minimum level.
    #[error("no capable adapter supports feature level {min_level}")]
    NoCapableAdapter { min_level: crate::device::FeatureLevel },

    /// The adapter refused to create a logical device.
    #[error("device creation failed: {0}")]
    DeviceCreationFailed(String),

    /// The validation layer could not be attached. Logged, never propagated.
    #[error("debug layer unavailable: {0}")]
    DebugLayerUnavailable(String),

    /// The windowing API rejected the swap surface request.
    #[error("swap surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// A device allocation could not be satisfied.
    #[error("out of device memory allocating {requested} bytes for {label}")]
    OutOfDeviceMemory { label: String, requested: u64 },

    /// Shader compilation or bytecode ingestion failed.
    #[error("shader compilation failed: {diagnostics}")]
    ShaderCompilationFailed { diagnostics: String },

    /// Pipeline state or root signature creation failed.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// Wraps an initialization failure with the stage it happened in.
    #[error("initialization failed at the {stage} stage: {source}")]
    Initialization {
        stage: InitStage,
        #[source]
        source: Box<RenderError>,
    },

    // ========================================================================
    // Resource state and synchronization
    // ========================================================================
    /// A resource was about to be handed back outside its expected state.
    #[error("{resource} left in state {actual}, expected {expected}")]
    UnbalancedResourceState {
        resource: TrackedResource,
        expected: ResourceState,
        actual: ResourceState,
    },

    /// A transition named a before-state that does not match the record.
    #[error("illegal transition on {resource}: recorded state is {recorded:?}, barrier claims {claimed}")]
    InvalidTransition {
        resource: TrackedResource,
        recorded: Option<ResourceState>,
        claimed: ResourceState,
    },

    /// The CPU tried to touch a resource the GPU may still be reading.
    #[error("{resource} is still referenced by work up to fence value {ticket}")]
    ResourceInFlight { resource: &'static str, ticket: u64 },

    /// A command buffer was used out of its lifecycle order.
    #[error("command buffer is {actual}, expected {expected}")]
    CommandBufferState {
        expected: &'static str,
        actual: &'static str,
    },

    /// The presentation engine did not hand out a swap image. The device
    /// itself is still usable.
    #[error("swap image unavailable: {0}")]
    SwapImageUnavailable(String),

    /// `present` was called without a previously acquired image.
    #[error("no swap image is currently acquired")]
    NoAcquiredImage,

    /// The swap surface was resized while the GPU could still read its images.
    #[error("resize requested while fence value {pending} is unresolved (completed {completed})")]
    ResizeWhileInFlight { pending: u64, completed: u64 },

    /// The device stopped responding or reported removal.
    #[error("device lost: {reason}")]
    DeviceLost { reason: String },
}

impl RenderError {
    /// Tags this error with the startup stage it belongs to.
    ///
    /// Already-tagged errors keep their original stage.
    pub fn at_stage(self, stage: InitStage) -> Self {
        match self {
            e @ RenderError::Initialization { .. } => e,
            other => RenderError::Initialization {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the startup stage, if this is an initialization failure.
    pub fn stage(&self) -> Option<InitStage> {
        match self {
            RenderError::Initialization { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Returns the untagged error.
    pub fn root(&self) -> &RenderError {
        match self {
            RenderError::Initialization { source, .. } => source.root(),
            other => other,
        }
    }

    /// `true` for failures that abort startup.
    pub fn is_fatal_init(&self) -> bool {
        matches!(self, RenderError::Initialization { .. })
    }

    pub(crate) fn device_lost(reason: impl Into<String>) -> Self {
        RenderError::DeviceLost { reason: reason.into() }
    }
}

impl From<prism_shaderc::CompileError> for RenderError {
    fn from(err: prism_shaderc::CompileError) -> Self {
        RenderError::ShaderCompilationFailed {
            diagnostics: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_tagging_is_sticky() {
        let err = RenderError::SurfaceCreationFailed("bad hwnd".into())
            .at_stage(InitStage::SwapSurface)
            .at_stage(InitStage::Pipeline);

        assert_eq!(err.stage(), Some(InitStage::SwapSurface));
        assert!(matches!(err.root(), RenderError::SurfaceCreationFailed(_)));
        assert!(err.is_fatal_init());
    }

    #[test]
    fn message_names_the_stage() {
        let err = RenderError::PipelineCreationFailed("stage mismatch".into()).at_stage(InitStage::Pipeline);
        let msg = err.to_string();
        assert!(msg.contains("pipeline stage"), "{msg}");
        assert!(msg.contains("stage mismatch"), "{msg}");
    }

    #[test]
    fn compile_errors_keep_diagnostics() {
        let err: RenderError = prism_shaderc::compile("fn (", "main", "vs_5_0").unwrap_err().into();
        let RenderError::ShaderCompilationFailed { diagnostics } = err else {
            panic!("wrong variant");
        };
        assert!(diagnostics.contains("parse"));
    }
}
