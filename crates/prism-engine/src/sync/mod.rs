//! CPU/GPU synchronization.
//!
//! The fence is the only synchronization primitive: the CPU never touches a
//! resource referenced by work whose fence value it has not observed.

mod fence;

pub use fence::{FenceTicket, FrameFence};
