use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{BufferUsage, Device};

/// Process-unique identifier of a GPU resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ResourceId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl ResourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Builds an id from a raw value. Only meaningful for lookups and tests.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Exclusive owner of one device buffer.
///
/// The backend object is released when the handle is dropped.
pub struct ResourceHandle<D: Device> {
    id: ResourceId,
    label: String,
    usage: BufferUsage,
    size: u64,
    buffer: D::Buffer,
}

impl<D: Device> ResourceHandle<D> {
    pub(crate) fn new(label: &str, usage: BufferUsage, size: u64, buffer: D::Buffer) -> Self {
        Self {
            id: ResourceId::next(),
            label: label.to_string(),
            usage,
            size,
            buffer,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }
}

impl<D: Device> fmt::Debug for ResourceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("usage", &self.usage)
            .field("size", &self.size)
            .finish()
    }
}

impl<D: Device> Drop for ResourceHandle<D> {
    fn drop(&mut self) {
        log::trace!("releasing {} {} ({} bytes)", self.label, self.id, self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_increasing() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(ResourceId::from_raw(42).to_string(), "#42");
    }
}
