use crate::backend::{Device, Instance};
use crate::command::CommandBuffer;
use crate::error::{InitStage, Result};

use super::{select_adapter, AdapterDescriptor, DeviceInit};

/// Owns the logical device and its single direct queue.
///
/// Field order is release order: the queue goes before the device that
/// created it.
pub struct DeviceContext<D: Device> {
    queue: D::Queue,
    device: D,
    adapter: AdapterDescriptor,
    debug_layer: bool,
}

impl<D: Device> DeviceContext<D> {
    /// Selects an adapter and creates the device and queue on it.
    pub fn create<I>(instance: &mut I, init: &DeviceInit) -> Result<Self>
    where
        I: Instance<Device = D>,
    {
        let mut debug_layer = false;
        if init.debug_layer {
            match instance.enable_debug_layer() {
                Ok(()) => {
                    debug_layer = true;
                    log::info!("debug layer enabled");
                }
                Err(e) => log::warn!("{e}; continuing without validation"),
            }
        }

        let adapter = select_adapter(instance, init.min_feature_level)
            .map_err(|e| e.at_stage(InitStage::Adapter))?;

        let (device, queue) = instance
            .create_device(&adapter, init.min_feature_level)
            .map_err(|e| e.at_stage(InitStage::Device))?;

        log::info!(
            "device created on {} ({:?}, {}) at feature level {}",
            adapter.name,
            adapter.kind,
            adapter.backend,
            init.min_feature_level
        );

        Ok(Self {
            queue,
            device,
            adapter,
            debug_layer,
        })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn queue(&self) -> &D::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &AdapterDescriptor {
        &self.adapter
    }

    /// Whether the validation layer was actually attached.
    pub fn debug_layer(&self) -> bool {
        self.debug_layer
    }

    /// Queues an executable command buffer; it becomes pending until retired.
    pub fn submit(&self, commands: &mut CommandBuffer<D>) -> Result<()> {
        commands.ensure_executable()?;
        self.device.submit(&self.queue, commands)?;
        commands.mark_submitted();
        Ok(())
    }
}
