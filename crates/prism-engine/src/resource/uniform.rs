use crate::backend::{BufferUsage, Device};
use crate::device::DeviceContext;
use crate::error::{RenderError, Result};
use crate::geometry::{align_uniform_size, UniformBlock};
use crate::state::{ResourceState, StateTracker, TrackedResource};
use crate::sync::{FenceTicket, FrameFence};

use super::ResourceHandle;

/// Single-buffered constant buffer holding the frame transforms.
///
/// The CPU copy mirrors what was last written to the device. Writing is only
/// allowed once the fence proves the previous frame's reads are done.
pub struct UniformBuffer<D: Device> {
    handle: ResourceHandle<D>,
    contents: Vec<u8>,
    in_use_by: Option<FenceTicket>,
}

impl<D: Device> UniformBuffer<D> {
    pub fn create(ctx: &DeviceContext<D>, initial: &UniformBlock, tracker: &mut StateTracker) -> Result<Self> {
        let size = align_uniform_size(std::mem::size_of::<UniformBlock>() as u64);
        let mut contents = vec![0u8; size as usize];
        contents[..initial.as_bytes().len()].copy_from_slice(initial.as_bytes());

        let buffer = ctx
            .device()
            .create_buffer("uniform buffer", BufferUsage::Uniform, &contents)?;
        let handle = ResourceHandle::new("uniform buffer", BufferUsage::Uniform, size, buffer);

        // Upload-heap memory lives in GENERIC_READ for its whole life.
        tracker.register(
            TrackedResource::Buffer(handle.id()),
            ResourceState::GenericRead,
            ResourceState::GenericRead,
        );

        Ok(Self {
            handle,
            contents,
            in_use_by: None,
        })
    }

    /// Fails with `ResourceInFlight` while submitted work may still read the buffer.
    pub fn ensure_idle(&self, fence: &FrameFence<D>) -> Result<()> {
        match self.in_use_by {
            Some(ticket) if !fence.is_complete(ticket) => Err(RenderError::ResourceInFlight {
                resource: "uniform buffer",
                ticket: ticket.value(),
            }),
            _ => Ok(()),
        }
    }

    /// Opens the buffer for writing.
    pub fn map<'a>(&'a mut self, ctx: &'a DeviceContext<D>, fence: &FrameFence<D>) -> Result<MappedUniform<'a, D>> {
        self.ensure_idle(fence)?;
        Ok(MappedUniform { uniform: self, ctx })
    }

    /// Records that work up to `ticket` reads the current contents.
    pub fn mark_in_use(&mut self, ticket: FenceTicket) {
        self.in_use_by = Some(ticket);
    }

    pub fn in_use_by(&self) -> Option<FenceTicket> {
        self.in_use_by
    }

    /// Bytes last written, including the alignment tail.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    pub fn handle(&self) -> &ResourceHandle<D> {
        &self.handle
    }
}

/// Writable view of a [`UniformBuffer`], obtained through [`UniformBuffer::map`].
pub struct MappedUniform<'a, D: Device> {
    uniform: &'a mut UniformBuffer<D>,
    ctx: &'a DeviceContext<D>,
}

impl<D: Device> MappedUniform<'_, D> {
    /// Current mapped contents.
    pub fn bytes(&self) -> &[u8] {
        &self.uniform.contents
    }

    /// Copies `block` into the buffer and closes the mapping.
    pub fn write_and_unmap(self, block: &UniformBlock) -> Result<()> {
        let bytes = block.as_bytes();
        self.uniform.contents[..bytes.len()].copy_from_slice(bytes);
        self.ctx
            .device()
            .write_buffer(self.ctx.queue(), self.uniform.handle.buffer(), 0, &self.uniform.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessConfig, HeadlessInstance};
    use crate::device::DeviceInit;
    use glam::Mat4;

    #[test]
    fn write_then_map_reads_back_identical_bytes() {
        let mut instance = HeadlessInstance::new(HeadlessConfig::default());
        let ctx = DeviceContext::create(&mut instance, &DeviceInit::default()).unwrap();
        let fence = FrameFence::new(&ctx, None).unwrap();
        let mut tracker = StateTracker::new();
        let mut uniform = UniformBuffer::create(&ctx, &UniformBlock::IDENTITY, &mut tracker).unwrap();

        let block = UniformBlock::new(
            Mat4::perspective_rh(1.0, 4.0 / 3.0, 0.1, 100.0),
            Mat4::from_rotation_z(0.5),
            Mat4::from_translation(glam::vec3(0.0, 0.0, -3.0)),
        );

        uniform.map(&ctx, &fence).unwrap().write_and_unmap(&block).unwrap();

        let mapped = uniform.map(&ctx, &fence).unwrap();
        assert_eq!(&mapped.bytes()[..256], block.as_bytes());
        assert_eq!(uniform.contents().len(), 256);
    }

    #[test]
    fn mapping_while_referenced_is_rejected() {
        let mut instance = HeadlessInstance::new(HeadlessConfig::default());
        let ctx = DeviceContext::create(&mut instance, &DeviceInit::default()).unwrap();
        let mut fence = FrameFence::new(&ctx, None).unwrap();
        let mut tracker = StateTracker::new();
        let mut uniform = UniformBuffer::create(&ctx, &UniformBlock::IDENTITY, &mut tracker).unwrap();

        let ticket = fence.signal(&ctx).unwrap();
        uniform.mark_in_use(ticket);

        let err = uniform.map(&ctx, &fence).err().unwrap();
        assert!(matches!(err, RenderError::ResourceInFlight { resource: "uniform buffer", ticket: 1 }));

        fence.wait_until(ticket).unwrap();
        assert!(uniform.map(&ctx, &fence).is_ok());
    }
}
