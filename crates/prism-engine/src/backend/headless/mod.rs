//! In-process device for tests and tooling.
//!
//! The headless backend implements the full object model without a GPU:
//! - adapters, memory budget and surface formats come from [`HeadlessConfig`]
//! - swap images are RGBA f32 [`Image`]s rendered by a software rasterizer
//! - queued work is deferred until a fence wait or [`GpuProbe::advance`]
//! - barrier before-states and present states are validated on execution
//! - [`ReleaseLog`] records creation and destruction order of every object

mod gpu;
mod raster;

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use prism_shaderc::{ShaderBytecode, ShaderStage};

use crate::backend::{
    BufferUsage, Device, GpuFence, Instance, PipelineDesc, SurfaceFormat, SwapChain, SwapSurfaceDesc, SyncInterval,
    VertexAttribute,
};
use crate::command::CommandBuffer;
use crate::device::{AdapterDescriptor, AdapterKind, FeatureLevel};
use crate::error::{RenderError, Result};
use crate::state::ResourceState;

use gpu::{GpuCore, QueueOp};

pub use raster::Image;

// ── configuration ─────────────────────────────────────────────────────────

/// One simulated physical adapter.
#[derive(Debug, Clone)]
pub struct HeadlessAdapter {
    pub name: String,
    pub kind: AdapterKind,
    pub max_feature_level: FeatureLevel,
    pub vendor: u32,
    pub device: u32,
}

impl HeadlessAdapter {
    pub fn hardware(name: &str, max_feature_level: FeatureLevel) -> Self {
        Self {
            name: name.to_string(),
            kind: AdapterKind::Discrete,
            max_feature_level,
            vendor: 0x10de,
            device: 0x2684,
        }
    }

    /// A CPU rasterizer adapter. Supports every feature level but is never selected.
    pub fn software(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: AdapterKind::Software,
            max_feature_level: FeatureLevel::L12_1,
            vendor: 0x1414,
            device: 0x008c,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Adapters in enumeration order.
    pub adapters: Vec<HeadlessAdapter>,
    /// Total bytes all live buffers may occupy.
    pub memory_budget: u64,
    /// Formats a window accepts for its swap surface.
    pub surface_formats: Vec<SurfaceFormat>,
    pub debug_layer_available: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            adapters: vec![HeadlessAdapter::hardware("Headless Reference GPU", FeatureLevel::L12_1)],
            memory_budget: 256 * 1024 * 1024,
            surface_formats: vec![SurfaceFormat::Rgba8Unorm, SurfaceFormat::Bgra8Unorm],
            debug_layer_available: true,
        }
    }
}

/// Stand-in for a native window.
#[derive(Debug, Clone)]
pub struct HeadlessWindow {
    /// When `false` the window rejects swap surface creation.
    pub accepts_surfaces: bool,
}

impl Default for HeadlessWindow {
    fn default() -> Self {
        Self { accepts_surfaces: true }
    }
}

// ── object lifetime log ───────────────────────────────────────────────────

#[derive(Default)]
struct LogState {
    created: Vec<String>,
    released: Vec<String>,
}

/// Creation and release order of every headless object, shared by all of them.
#[derive(Clone, Default)]
pub struct ReleaseLog(Rc<RefCell<LogState>>);

impl ReleaseLog {
    /// Object labels in creation order.
    pub fn created(&self) -> Vec<String> {
        self.0.borrow().created.clone()
    }

    /// Object labels in release order.
    pub fn released(&self) -> Vec<String> {
        self.0.borrow().released.clone()
    }
}

impl fmt::Debug for ReleaseLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.borrow();
        f.debug_struct("ReleaseLog")
            .field("created", &state.created)
            .field("released", &state.released)
            .finish()
    }
}

/// Lifetime token: logs creation on construction and release on drop.
struct Tracked {
    label: String,
    log: ReleaseLog,
}

impl Tracked {
    fn new(label: impl Into<String>, log: &ReleaseLog) -> Self {
        let label = label.into();
        log.0.borrow_mut().created.push(label.clone());
        Self { label, log: log.clone() }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        log::trace!("headless release: {}", self.label);
        self.log.0.borrow_mut().released.push(std::mem::take(&mut self.label));
    }
}

// ── instance ──────────────────────────────────────────────────────────────

pub struct HeadlessInstance {
    config: HeadlessConfig,
    debug_layer: bool,
    log: ReleaseLog,
    core: Rc<RefCell<GpuCore>>,
}

impl HeadlessInstance {
    pub fn new(config: HeadlessConfig) -> Self {
        Self {
            config,
            debug_layer: false,
            log: ReleaseLog::default(),
            core: Rc::new(RefCell::new(GpuCore::default())),
        }
    }

    pub fn release_log(&self) -> ReleaseLog {
        self.log.clone()
    }

    /// Inspection handle on the simulated GPU.
    pub fn probe(&self) -> GpuProbe {
        GpuProbe {
            core: Rc::clone(&self.core),
        }
    }

    pub fn debug_layer_enabled(&self) -> bool {
        self.debug_layer
    }
}

impl Instance for HeadlessInstance {
    type Device = HeadlessDevice;

    fn enumerate_adapters(&self) -> Vec<AdapterDescriptor> {
        self.config
            .adapters
            .iter()
            .enumerate()
            .map(|(ordinal, a)| AdapterDescriptor {
                ordinal,
                name: a.name.clone(),
                vendor: a.vendor,
                device: a.device,
                kind: a.kind,
                backend: "headless".to_string(),
                max_feature_level: a.max_feature_level,
            })
            .collect()
    }

    fn probe_device(&self, adapter: &AdapterDescriptor, level: FeatureLevel) -> bool {
        self.config
            .adapters
            .get(adapter.ordinal)
            .is_some_and(|a| a.max_feature_level >= level)
    }

    fn enable_debug_layer(&mut self) -> Result<()> {
        if !self.config.debug_layer_available {
            return Err(RenderError::DebugLayerUnavailable(
                "headless validation layer is not installed".to_string(),
            ));
        }
        self.debug_layer = true;
        Ok(())
    }

    fn create_device(&self, adapter: &AdapterDescriptor, level: FeatureLevel) -> Result<(HeadlessDevice, HeadlessQueue)> {
        if !self.probe_device(adapter, level) {
            return Err(RenderError::DeviceCreationFailed(format!(
                "{} cannot create a device at feature level {level}",
                adapter.name
            )));
        }

        let device = HeadlessDevice {
            core: Rc::clone(&self.core),
            log: self.log.clone(),
            budget: self.config.memory_budget,
            allocated: Rc::new(Cell::new(0)),
            formats: self.config.surface_formats.clone(),
            _tracked: Tracked::new("device", &self.log),
        };
        let queue = HeadlessQueue {
            _core: Rc::clone(&self.core),
            _tracked: Tracked::new("queue", &self.log),
        };
        Ok((device, queue))
    }
}

/// Read access to the simulated GPU's progress and output.
#[derive(Clone)]
pub struct GpuProbe {
    core: Rc<RefCell<GpuCore>>,
}

impl GpuProbe {
    /// Queue operations submitted but not yet executed.
    pub fn pending_ops(&self) -> usize {
        self.core.borrow().pending()
    }

    /// Lets the GPU catch up on everything queued, without a CPU fence wait.
    pub fn advance(&self) -> Result<()> {
        self.core.borrow_mut().flush()
    }

    /// Contents of the most recently presented image.
    pub fn presented_image(&self) -> Option<Image> {
        self.core.borrow().presented().cloned()
    }

    pub fn present_count(&self) -> u64 {
        self.core.borrow().present_count()
    }

    /// Command buffers executed so far.
    pub fn executed_command_buffers(&self) -> u64 {
        self.core.borrow().executed()
    }

    pub fn lost_reason(&self) -> Option<String> {
        self.core.borrow().lost_reason().map(str::to_string)
    }

    /// Freezes the queue: nothing queued runs until the stall is lifted, and
    /// fence waits expire instead of completing.
    pub fn stall(&self) {
        self.core.borrow_mut().set_stalled(true);
    }

    pub fn resume(&self) {
        self.core.borrow_mut().set_stalled(false);
    }

    pub fn is_stalled(&self) -> bool {
        self.core.borrow().is_stalled()
    }
}

// ── objects ───────────────────────────────────────────────────────────────

pub struct HeadlessQueue {
    _core: Rc<RefCell<GpuCore>>,
    _tracked: Tracked,
}

struct BufferInner {
    label: String,
    usage: BufferUsage,
    data: RefCell<Vec<u8>>,
    allocated: Rc<Cell<u64>>,
    _tracked: Tracked,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        let size = self.data.borrow().len() as u64;
        self.allocated.set(self.allocated.get().saturating_sub(size));
    }
}

#[derive(Clone)]
pub struct HeadlessBuffer(Rc<BufferInner>);

impl HeadlessBuffer {
    fn data(&self) -> Ref<'_, Vec<u8>> {
        self.0.data.borrow()
    }
}

impl fmt::Debug for HeadlessBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessBuffer")
            .field("label", &self.0.label)
            .field("usage", &self.0.usage)
            .field("size", &self.0.data.borrow().len())
            .finish()
    }
}

pub struct HeadlessShader {
    stage: ShaderStage,
    entry_point: String,
    _tracked: Tracked,
}

struct RootSignatureInner {
    uniform_size: u64,
    _tracked: Tracked,
}

#[derive(Clone)]
pub struct HeadlessRootSignature(Rc<RootSignatureInner>);

impl fmt::Debug for HeadlessRootSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessRootSignature")
            .field("uniform_size", &self.0.uniform_size)
            .finish()
    }
}

struct PipelineInner {
    attributes: Vec<VertexAttribute>,
    format: SurfaceFormat,
    _tracked: Tracked,
}

#[derive(Clone)]
pub struct HeadlessPipeline(Rc<PipelineInner>);

impl HeadlessPipeline {
    fn attribute(&self, location: u32) -> Result<VertexAttribute> {
        self.0
            .attributes
            .iter()
            .find(|a| a.location == location)
            .copied()
            .ok_or_else(|| RenderError::device_lost(format!("pipeline has no attribute at location {location}")))
    }
}

impl fmt::Debug for HeadlessPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessPipeline")
            .field("attributes", &self.0.attributes.len())
            .field("format", &self.0.format)
            .finish()
    }
}

struct DescriptorTableInner {
    uniform: HeadlessBuffer,
    _tracked: Tracked,
}

#[derive(Clone)]
pub struct HeadlessDescriptorTable(Rc<DescriptorTableInner>);

impl HeadlessDescriptorTable {
    fn uniform(&self) -> &HeadlessBuffer {
        &self.0.uniform
    }
}

impl fmt::Debug for HeadlessDescriptorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HeadlessDescriptorTable").field(&self.0.uniform).finish()
    }
}

pub(crate) struct FenceState {
    completed: Cell<u64>,
}

pub struct HeadlessFence {
    state: Rc<FenceState>,
    core: Rc<RefCell<GpuCore>>,
    _tracked: Tracked,
}

impl GpuFence for HeadlessFence {
    fn completed_value(&self) -> u64 {
        self.state.completed.get()
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<()> {
        self.core.borrow_mut().run_until(&self.state, value, timeout)
    }
}

// ── swap surface ──────────────────────────────────────────────────────────

pub(crate) struct SurfaceState {
    width: u32,
    height: u32,
    format: SurfaceFormat,
    images: Vec<Image>,
    /// State of each image as the GPU has executed it so far.
    gpu_states: Vec<ResourceState>,
    generation: u64,
    back_buffer: u32,
    acquired: Option<u32>,
}

impl SurfaceState {
    fn new(width: u32, height: u32, count: u32, format: SurfaceFormat, generation: u64) -> Self {
        Self {
            width,
            height,
            format,
            images: (0..count).map(|_| Image::new(width, height)).collect(),
            gpu_states: vec![ResourceState::Present; count as usize],
            generation,
            back_buffer: 0,
            acquired: None,
        }
    }

    fn gpu_state(&self, image: u32) -> Result<ResourceState> {
        self.gpu_states
            .get(image as usize)
            .copied()
            .ok_or_else(|| RenderError::device_lost(format!("swap image {image} does not exist")))
    }

    fn set_gpu_state(&mut self, image: u32, state: ResourceState) -> Result<()> {
        let slot = self
            .gpu_states
            .get_mut(image as usize)
            .ok_or_else(|| RenderError::device_lost(format!("swap image {image} does not exist")))?;
        *slot = state;
        Ok(())
    }

    fn image_mut(&mut self, image: u32) -> Result<&mut Image> {
        self.images
            .get_mut(image as usize)
            .ok_or_else(|| RenderError::device_lost(format!("swap image {image} does not exist")))
    }
}

/// Render-target view of one swap image.
#[derive(Clone)]
pub struct HeadlessRenderTarget {
    image: u32,
    generation: u64,
    surface: Option<Rc<RefCell<SurfaceState>>>,
}

impl HeadlessRenderTarget {
    /// A view bound to no surface. Recording against it works; executing it
    /// loses the device.
    pub fn detached(image: u32) -> Self {
        Self {
            image,
            generation: 0,
            surface: None,
        }
    }

    pub fn image(&self) -> u32 {
        self.image
    }

    fn surface(&self) -> Result<Rc<RefCell<SurfaceState>>> {
        self.surface
            .clone()
            .ok_or_else(|| RenderError::device_lost("render target is not bound to a swap surface"))
    }

    fn check_generation(&self, state: &SurfaceState) -> Result<()> {
        if self.generation != state.generation {
            return Err(RenderError::device_lost(format!(
                "view of swap image {} outlived a resize",
                self.image
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for HeadlessRenderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeadlessRenderTarget")
            .field("image", &self.image)
            .field("generation", &self.generation)
            .field("attached", &self.surface.is_some())
            .finish()
    }
}

pub struct HeadlessSurface {
    state: Rc<RefCell<SurfaceState>>,
    core: Rc<RefCell<GpuCore>>,
    _tracked: Tracked,
}

impl SwapChain for HeadlessSurface {
    type RenderTarget = HeadlessRenderTarget;

    fn image_count(&self) -> u32 {
        self.state.borrow().images.len() as u32
    }

    fn extent(&self) -> (u32, u32) {
        let s = self.state.borrow();
        (s.width, s.height)
    }

    fn format(&self) -> SurfaceFormat {
        self.state.borrow().format
    }

    fn render_targets(&self) -> Result<Vec<HeadlessRenderTarget>> {
        let s = self.state.borrow();
        Ok((0..s.images.len() as u32)
            .map(|image| HeadlessRenderTarget {
                image,
                generation: s.generation,
                surface: Some(Rc::clone(&self.state)),
            })
            .collect())
    }

    fn acquire_next_image(&mut self) -> Result<u32> {
        self.core.borrow().check_alive()?;
        let mut s = self.state.borrow_mut();
        let index = s.back_buffer;
        s.acquired = Some(index);
        Ok(index)
    }

    fn present(&mut self, sync: SyncInterval) -> Result<()> {
        let image = {
            let mut s = self.state.borrow_mut();
            let image = s.acquired.take().ok_or(RenderError::NoAcquiredImage)?;
            s.back_buffer = (s.back_buffer + 1) % s.images.len() as u32;
            image
        };

        log::trace!("headless present of image {image} ({sync:?})");
        self.core.borrow_mut().enqueue(QueueOp::Present {
            surface: Rc::clone(&self.state),
            image,
        })
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if self.core.borrow().pending() > 0 {
            return Err(RenderError::SurfaceCreationFailed(
                "swap images are still referenced by queued work".to_string(),
            ));
        }

        let mut s = self.state.borrow_mut();
        let count = s.images.len() as u32;
        *s = SurfaceState::new(width, height, count, s.format, s.generation + 1);
        Ok(())
    }
}

// ── device ────────────────────────────────────────────────────────────────

pub struct HeadlessDevice {
    core: Rc<RefCell<GpuCore>>,
    log: ReleaseLog,
    budget: u64,
    allocated: Rc<Cell<u64>>,
    formats: Vec<SurfaceFormat>,
    _tracked: Tracked,
}

impl HeadlessDevice {
    /// Bytes held by live buffers.
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated.get()
    }
}

impl Device for HeadlessDevice {
    type Queue = HeadlessQueue;
    type Window = HeadlessWindow;
    type Surface = HeadlessSurface;
    type RenderTarget = HeadlessRenderTarget;
    type Buffer = HeadlessBuffer;
    type Shader = HeadlessShader;
    type RootSignature = HeadlessRootSignature;
    type Pipeline = HeadlessPipeline;
    type DescriptorTable = HeadlessDescriptorTable;
    type Fence = HeadlessFence;

    fn create_swap_surface(
        &self,
        _queue: &HeadlessQueue,
        window: &HeadlessWindow,
        desc: &SwapSurfaceDesc,
    ) -> Result<HeadlessSurface> {
        if !window.accepts_surfaces {
            return Err(RenderError::SurfaceCreationFailed(
                "window refused the swap surface".to_string(),
            ));
        }
        if !self.formats.contains(&desc.format) {
            return Err(RenderError::SurfaceCreationFailed(format!(
                "{:?} render targets are not presentable on this window",
                desc.format
            )));
        }
        if desc.image_count < 2 || desc.width == 0 || desc.height == 0 {
            return Err(RenderError::SurfaceCreationFailed(format!(
                "invalid swap surface {}x{} with {} images",
                desc.width, desc.height, desc.image_count
            )));
        }

        Ok(HeadlessSurface {
            state: Rc::new(RefCell::new(SurfaceState::new(
                desc.width,
                desc.height,
                desc.image_count,
                desc.format,
                0,
            ))),
            core: Rc::clone(&self.core),
            _tracked: Tracked::new("swap surface", &self.log),
        })
    }

    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> Result<HeadlessBuffer> {
        let requested = contents.len() as u64;
        if requested == 0 || self.allocated.get() + requested > self.budget {
            return Err(RenderError::OutOfDeviceMemory {
                label: label.to_string(),
                requested,
            });
        }

        self.allocated.set(self.allocated.get() + requested);
        Ok(HeadlessBuffer(Rc::new(BufferInner {
            label: label.to_string(),
            usage,
            data: RefCell::new(contents.to_vec()),
            allocated: Rc::clone(&self.allocated),
            _tracked: Tracked::new(label, &self.log),
        })))
    }

    fn write_buffer(&self, _queue: &HeadlessQueue, buffer: &HeadlessBuffer, offset: u64, bytes: &[u8]) -> Result<()> {
        let mut data = buffer.0.data.borrow_mut();
        let start = offset as usize;
        let end = start + bytes.len();
        let len = data.len();
        let dst = data.get_mut(start..end).ok_or_else(|| {
            RenderError::device_lost(format!(
                "write of {} bytes at {offset} overruns {} ({len} bytes)",
                bytes.len(),
                buffer.0.label
            ))
        })?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    fn create_shader(&self, bytecode: &ShaderBytecode) -> Result<HeadlessShader> {
        if bytecode.is_empty() {
            return Err(RenderError::ShaderCompilationFailed {
                diagnostics: format!("empty {} shader bytecode", bytecode.stage),
            });
        }
        if bytecode.entry_point.is_empty() {
            return Err(RenderError::ShaderCompilationFailed {
                diagnostics: "shader bytecode has no entry point".to_string(),
            });
        }

        Ok(HeadlessShader {
            stage: bytecode.stage,
            entry_point: bytecode.entry_point.clone(),
            _tracked: Tracked::new(format!("{} shader", bytecode.stage), &self.log),
        })
    }

    fn create_root_signature(&self, uniform_size: u64) -> Result<HeadlessRootSignature> {
        if uniform_size == 0 {
            return Err(RenderError::PipelineCreationFailed(
                "root signature constant buffer has zero size".to_string(),
            ));
        }
        Ok(HeadlessRootSignature(Rc::new(RootSignatureInner {
            uniform_size,
            _tracked: Tracked::new("root signature", &self.log),
        })))
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<HeadlessPipeline> {
        if desc.vertex_shader.stage != ShaderStage::Vertex || desc.pixel_shader.stage != ShaderStage::Pixel {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{}: shader stages do not match their slots",
                desc.label
            )));
        }

        let layout = desc.vertex_layout;
        if let Some(bad) = layout.attributes.iter().find(|a| a.offset + a.format.size() > layout.stride) {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{}: attribute {} overruns the {}-byte stride",
                desc.label, bad.location, layout.stride
            )));
        }

        if !self.formats.contains(&desc.target_format) {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{}: {:?} is not a renderable format",
                desc.label, desc.target_format
            )));
        }

        log::debug!(
            "pipeline {} uses `{}` / `{}`",
            desc.label,
            desc.vertex_shader.entry_point,
            desc.pixel_shader.entry_point
        );

        Ok(HeadlessPipeline(Rc::new(PipelineInner {
            attributes: layout.attributes.clone(),
            format: desc.target_format,
            _tracked: Tracked::new("pipeline", &self.log),
        })))
    }

    fn create_descriptor_table(
        &self,
        root_signature: &HeadlessRootSignature,
        uniform: &HeadlessBuffer,
    ) -> Result<HeadlessDescriptorTable> {
        let size = uniform.data().len() as u64;
        if uniform.0.usage != BufferUsage::Uniform || size < root_signature.0.uniform_size {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{} ({size} bytes) cannot back a {}-byte constant buffer slot",
                uniform.0.label, root_signature.0.uniform_size
            )));
        }

        Ok(HeadlessDescriptorTable(Rc::new(DescriptorTableInner {
            uniform: uniform.clone(),
            _tracked: Tracked::new("descriptor table", &self.log),
        })))
    }

    fn create_fence(&self, initial: u64) -> Result<HeadlessFence> {
        Ok(HeadlessFence {
            state: Rc::new(FenceState {
                completed: Cell::new(initial),
            }),
            core: Rc::clone(&self.core),
            _tracked: Tracked::new("fence", &self.log),
        })
    }

    fn submit(&self, _queue: &HeadlessQueue, commands: &CommandBuffer<Self>) -> Result<()> {
        self.core.borrow_mut().enqueue(QueueOp::Execute {
            target: commands.target().map(|(_, view)| view.clone()),
            commands: commands.commands().to_vec(),
        })
    }

    fn signal(&self, _queue: &HeadlessQueue, fence: &HeadlessFence, value: u64) -> Result<()> {
        self.core.borrow_mut().enqueue(QueueOp::Signal {
            fence: Rc::clone(&fence.state),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_in_configured_order() {
        let instance = HeadlessInstance::new(HeadlessConfig {
            adapters: vec![
                HeadlessAdapter::software("Basic Render Driver"),
                HeadlessAdapter::hardware("Discrete", FeatureLevel::L12_0),
            ],
            ..HeadlessConfig::default()
        });

        let adapters = instance.enumerate_adapters();
        assert_eq!(adapters.len(), 2);
        assert!(adapters[0].is_software());
        assert_eq!(adapters[1].ordinal, 1);
        assert!(instance.probe_device(&adapters[1], FeatureLevel::L12_0));
        assert!(!instance.probe_device(&adapters[1], FeatureLevel::L12_1));
    }

    #[test]
    fn released_buffers_return_their_budget() {
        let instance = HeadlessInstance::new(HeadlessConfig::default());
        let adapter = instance.enumerate_adapters().remove(0);
        let (device, _queue) = instance.create_device(&adapter, FeatureLevel::L12_0).unwrap();

        let buffer = device.create_buffer("scratch", BufferUsage::Vertex, &[0u8; 64]).unwrap();
        assert_eq!(device.allocated_bytes(), 64);
        drop(buffer);
        assert_eq!(device.allocated_bytes(), 0);
        assert_eq!(instance.release_log().released(), vec!["scratch".to_string()]);
    }

    #[test]
    fn missing_debug_layer_is_reported() {
        let mut instance = HeadlessInstance::new(HeadlessConfig {
            debug_layer_available: false,
            ..HeadlessConfig::default()
        });
        assert!(matches!(
            instance.enable_debug_layer(),
            Err(RenderError::DebugLayerUnavailable(_))
        ));
        assert!(!instance.debug_layer_enabled());
    }
}
