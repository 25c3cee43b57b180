use std::collections::BTreeMap;
use std::fmt;

use crate::error::{RenderError, Result};
use crate::resource::ResourceId;

/// GPU-visible usage state of a resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceState {
    /// Owned by the presentation engine.
    Present,
    /// Bound as a color attachment.
    RenderTarget,
    /// Readable by any shader stage or the input assembler.
    GenericRead,
    CopySource,
    CopyDest,
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceState::Present => "PRESENT",
            ResourceState::RenderTarget => "RENDER_TARGET",
            ResourceState::GenericRead => "GENERIC_READ",
            ResourceState::CopySource => "COPY_SOURCE",
            ResourceState::CopyDest => "COPY_DEST",
        };
        f.write_str(s)
    }
}

/// Key identifying a tracked resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TrackedResource {
    /// Swap surface image by index.
    SwapImage(u32),
    Buffer(ResourceId),
}

impl fmt::Display for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedResource::SwapImage(i) => write!(f, "swap image {i}"),
            TrackedResource::Buffer(id) => write!(f, "buffer {id}"),
        }
    }
}

/// A single transition barrier.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Barrier {
    pub resource: TrackedResource,
    pub before: ResourceState,
    pub after: ResourceState,
}

#[derive(Debug, Copy, Clone)]
struct Entry {
    current: ResourceState,
    /// State the resource must be in when handed back to its external owner.
    expected: ResourceState,
}

/// Per-resource state machine.
///
/// The recorded state describes the resource as of the end of the most
/// recently recorded command stream, not the GPU's progress through it.
#[derive(Debug, Default)]
pub struct StateTracker {
    entries: BTreeMap<TrackedResource, Entry>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `resource` in `initial`; `expected` is its hand-back state.
    ///
    /// Re-registering replaces the previous record.
    pub fn register(&mut self, resource: TrackedResource, initial: ResourceState, expected: ResourceState) {
        self.entries.insert(resource, Entry { current: initial, expected });
    }

    pub fn state(&self, resource: TrackedResource) -> Option<ResourceState> {
        self.entries.get(&resource).map(|e| e.current)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves `resource` from `from` to `to`.
    ///
    /// `from` must equal the recorded state. Returns `None` when no barrier is
    /// needed (`from == to`).
    pub fn transition(
        &mut self,
        resource: TrackedResource,
        from: ResourceState,
        to: ResourceState,
    ) -> Result<Option<Barrier>> {
        let Some(entry) = self.entries.get_mut(&resource) else {
            return Err(RenderError::InvalidTransition {
                resource,
                recorded: None,
                claimed: from,
            });
        };

        if entry.current != from {
            return Err(RenderError::InvalidTransition {
                resource,
                recorded: Some(entry.current),
                claimed: from,
            });
        }

        if from == to {
            return Ok(None);
        }

        entry.current = to;
        log::trace!("barrier {resource}: {from} -> {to}");
        Ok(Some(Barrier { resource, before: from, after: to }))
    }

    /// Moves `resource` from whatever it is recorded in to `to`.
    pub fn require(&mut self, resource: TrackedResource, to: ResourceState) -> Result<Option<Barrier>> {
        let from = self.state(resource).ok_or(RenderError::InvalidTransition {
            resource,
            recorded: None,
            claimed: to,
        })?;
        self.transition(resource, from, to)
    }

    /// Checks that `resource` is back in its hand-back state.
    ///
    /// Debug builds reject an unbalanced resource; release builds log it and
    /// carry on.
    pub fn check_balanced(&self, resource: TrackedResource) -> Result<()> {
        let Some(entry) = self.entries.get(&resource) else {
            return Ok(());
        };

        if entry.current == entry.expected {
            return Ok(());
        }

        if cfg!(debug_assertions) {
            Err(RenderError::UnbalancedResourceState {
                resource,
                expected: entry.expected,
                actual: entry.current,
            })
        } else {
            log::error!(
                "{resource} handed back in {} (expected {})",
                entry.current,
                entry.expected
            );
            Ok(())
        }
    }

    /// Resources whose recorded state differs from their hand-back state.
    pub fn unbalanced(&self) -> impl Iterator<Item = TrackedResource> + '_ {
        self.entries
            .iter()
            .filter(|(_, e)| e.current != e.expected)
            .map(|(r, _)| *r)
    }

    /// Drops all swap image records and registers `count` fresh images in `Present`.
    pub fn reset_swap_images(&mut self, count: u32) {
        self.entries.retain(|r, _| !matches!(r, TrackedResource::SwapImage(_)));
        for i in 0..count {
            self.register(TrackedResource::SwapImage(i), ResourceState::Present, ResourceState::Present);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMG0: TrackedResource = TrackedResource::SwapImage(0);
    const IMG1: TrackedResource = TrackedResource::SwapImage(1);

    fn tracker_with_images(n: u32) -> StateTracker {
        let mut t = StateTracker::new();
        t.reset_swap_images(n);
        t
    }

    #[test]
    fn transition_emits_barrier_and_updates_record() {
        let mut t = tracker_with_images(2);
        let b = t
            .transition(IMG0, ResourceState::Present, ResourceState::RenderTarget)
            .unwrap()
            .unwrap();

        assert_eq!(b.before, ResourceState::Present);
        assert_eq!(b.after, ResourceState::RenderTarget);
        assert_eq!(t.state(IMG0), Some(ResourceState::RenderTarget));
        assert_eq!(t.state(IMG1), Some(ResourceState::Present));
    }

    #[test]
    fn same_state_transition_is_elided() {
        let mut t = tracker_with_images(2);
        let b = t.transition(IMG0, ResourceState::Present, ResourceState::Present).unwrap();
        assert!(b.is_none());
    }

    #[test]
    fn wrong_before_state_is_rejected() {
        let mut t = tracker_with_images(2);
        let err = t
            .transition(IMG0, ResourceState::RenderTarget, ResourceState::Present)
            .unwrap_err();

        assert!(matches!(
            err,
            RenderError::InvalidTransition {
                recorded: Some(ResourceState::Present),
                claimed: ResourceState::RenderTarget,
                ..
            }
        ));
        // The failed transition leaves the record untouched.
        assert_eq!(t.state(IMG0), Some(ResourceState::Present));
    }

    #[test]
    fn untracked_resource_is_rejected() {
        let mut t = StateTracker::new();
        let err = t.require(IMG0, ResourceState::RenderTarget).unwrap_err();
        assert!(matches!(err, RenderError::InvalidTransition { recorded: None, .. }));
    }

    #[test]
    fn require_uses_recorded_state() {
        let mut t = tracker_with_images(2);
        t.require(IMG1, ResourceState::RenderTarget).unwrap();
        let b = t.require(IMG1, ResourceState::Present).unwrap().unwrap();
        assert_eq!(b.before, ResourceState::RenderTarget);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn missing_closing_transition_is_unbalanced() {
        let mut t = tracker_with_images(2);
        t.require(IMG0, ResourceState::RenderTarget).unwrap();

        let err = t.check_balanced(IMG0).unwrap_err();
        assert!(matches!(
            err,
            RenderError::UnbalancedResourceState {
                expected: ResourceState::Present,
                actual: ResourceState::RenderTarget,
                ..
            }
        ));
        assert_eq!(t.unbalanced().collect::<Vec<_>>(), vec![IMG0]);
    }

    #[test]
    fn balanced_round_trip_for_any_image_count() {
        for n in 2..=4 {
            let mut t = tracker_with_images(n);
            for i in 0..n {
                let img = TrackedResource::SwapImage(i);
                t.transition(img, ResourceState::Present, ResourceState::RenderTarget).unwrap();
                t.transition(img, ResourceState::RenderTarget, ResourceState::Present).unwrap();
                t.check_balanced(img).unwrap();
            }
            assert_eq!(t.unbalanced().count(), 0);
        }
    }

    #[test]
    fn reset_swap_images_keeps_buffers() {
        let mut t = tracker_with_images(2);
        let buf = TrackedResource::Buffer(ResourceId::from_raw(7));
        t.register(buf, ResourceState::GenericRead, ResourceState::GenericRead);
        t.require(IMG0, ResourceState::RenderTarget).unwrap();

        t.reset_swap_images(3);

        assert_eq!(t.len(), 4);
        assert_eq!(t.state(IMG0), Some(ResourceState::Present));
        assert_eq!(t.state(buf), Some(ResourceState::GenericRead));
    }
}
