//! Resource state tracking.
//!
//! The tracker mirrors the GPU-visible state of every resource the frame
//! touches and turns "I need this resource in state X" into the minimal set of
//! transition barriers. It is the only place barrier before-states come from.

mod tracker;

pub use tracker::{Barrier, ResourceState, StateTracker, TrackedResource};
