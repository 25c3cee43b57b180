//! Command buffers and the per-frame recorder.

mod buffer;
mod recorder;

pub use buffer::{Command, CommandBuffer, CommandBufferState, CommandKind};
pub use recorder::{CommandRecorder, FrameInputs};
