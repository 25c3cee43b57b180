//! Windowed backend on top of wgpu.
//!
//! Feature levels map onto wgpu limit tiers: `11_x` requests the downlevel
//! defaults, `12_x` the WebGPU defaults on a fully compliant adapter. The
//! validation layer is wgpu's instance validation.

mod encode;
mod surface;

use std::collections::VecDeque;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prism_shaderc::{ShaderBytecode, ShaderStage};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;

use crate::backend::{
    BufferUsage, Device, GpuFence, Instance, PipelineDesc, PrimitiveTopology, SwapSurfaceDesc, VertexFormat,
};
use crate::command::CommandBuffer;
use crate::device::{AdapterDescriptor, AdapterKind, FeatureLevel};
use crate::error::{RenderError, Result};

pub use surface::{WgpuRenderTarget, WgpuSurface};

/// Anything wgpu can build a surface for.
pub trait NativeWindow: HasWindowHandle + HasDisplayHandle + Send + Sync {}

impl<T: HasWindowHandle + HasDisplayHandle + Send + Sync> NativeWindow for T {}

fn adapter_kind(device_type: wgpu::DeviceType) -> AdapterKind {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => AdapterKind::Discrete,
        wgpu::DeviceType::IntegratedGpu => AdapterKind::Integrated,
        wgpu::DeviceType::VirtualGpu => AdapterKind::Virtual,
        wgpu::DeviceType::Cpu => AdapterKind::Software,
        wgpu::DeviceType::Other => AdapterKind::Other,
    }
}

fn max_feature_level(adapter: &wgpu::Adapter) -> FeatureLevel {
    if !adapter.get_downlevel_capabilities().is_webgpu_compliant() {
        return FeatureLevel::L11_0;
    }

    let limits = adapter.limits();
    let defaults = wgpu::Limits::default();
    if limits.max_texture_dimension_2d < defaults.max_texture_dimension_2d
        || limits.max_bind_groups < defaults.max_bind_groups
        || limits.max_uniform_buffer_binding_size < defaults.max_uniform_buffer_binding_size
    {
        return FeatureLevel::L11_1;
    }

    if adapter.features().contains(wgpu::Features::INDIRECT_FIRST_INSTANCE) {
        FeatureLevel::L12_1
    } else {
        FeatureLevel::L12_0
    }
}

fn required_limits(level: FeatureLevel) -> wgpu::Limits {
    match level {
        FeatureLevel::L11_0 | FeatureLevel::L11_1 => wgpu::Limits::downlevel_defaults(),
        FeatureLevel::L12_0 | FeatureLevel::L12_1 => wgpu::Limits::default(),
    }
}

// ── instance ──────────────────────────────────────────────────────────────

pub struct WgpuInstance {
    instance: Arc<wgpu::Instance>,
    adapters: Vec<wgpu::Adapter>,
    validation: bool,
}

impl WgpuInstance {
    pub fn new() -> Self {
        Self::with_flags(wgpu::InstanceFlags::default())
    }

    fn with_flags(flags: wgpu::InstanceFlags) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags,
            ..Default::default()
        });
        let adapters = pollster::block_on(instance.enumerate_adapters(wgpu::Backends::all()));
        log::debug!("wgpu reported {} adapters", adapters.len());

        Self {
            instance: Arc::new(instance),
            adapters,
            validation: flags.contains(wgpu::InstanceFlags::VALIDATION),
        }
    }

    pub fn validation(&self) -> bool {
        self.validation
    }
}

impl Default for WgpuInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl Instance for WgpuInstance {
    type Device = WgpuDevice;

    fn enumerate_adapters(&self) -> Vec<AdapterDescriptor> {
        self.adapters
            .iter()
            .enumerate()
            .map(|(ordinal, adapter)| {
                let info = adapter.get_info();
                AdapterDescriptor {
                    ordinal,
                    name: info.name,
                    vendor: info.vendor,
                    device: info.device,
                    kind: adapter_kind(info.device_type),
                    backend: format!("{:?}", info.backend),
                    max_feature_level: max_feature_level(adapter),
                }
            })
            .collect()
    }

    fn probe_device(&self, adapter: &AdapterDescriptor, level: FeatureLevel) -> bool {
        self.adapters
            .get(adapter.ordinal)
            .is_some_and(|a| max_feature_level(a) >= level)
    }

    fn enable_debug_layer(&mut self) -> Result<()> {
        if self.validation {
            return Ok(());
        }
        // Devices only pick up validation from the instance they come from.
        *self = Self::with_flags(wgpu::InstanceFlags::debugging());
        if !self.validation {
            return Err(RenderError::DebugLayerUnavailable(
                "wgpu validation is disabled in this build".to_string(),
            ));
        }
        Ok(())
    }

    fn create_device(&self, adapter: &AdapterDescriptor, level: FeatureLevel) -> Result<(WgpuDevice, wgpu::Queue)> {
        let raw = self
            .adapters
            .get(adapter.ordinal)
            .ok_or_else(|| RenderError::DeviceCreationFailed(format!("no adapter with ordinal {}", adapter.ordinal)))?;

        let (device, queue) = pollster::block_on(raw.request_device(&wgpu::DeviceDescriptor {
            label: Some("prism device"),
            required_features: wgpu::Features::empty(),
            required_limits: required_limits(level),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| RenderError::DeviceCreationFailed(format!("{}: {e}", adapter.name)))?;

        let lost = Arc::new(Mutex::new(None));
        let lost_slot = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            if let Ok(mut slot) = lost_slot.lock() {
                *slot = Some(message);
            }
        });

        Ok((
            WgpuDevice {
                device,
                adapter: raw.clone(),
                instance: Arc::clone(&self.instance),
                lost,
            },
            queue,
        ))
    }
}

// ── objects ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WgpuBuffer {
    buffer: wgpu::Buffer,
    usage: BufferUsage,
}

impl WgpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

#[derive(Debug)]
pub struct WgpuShader {
    module: wgpu::ShaderModule,
    stage: ShaderStage,
    entry_point: String,
}

#[derive(Debug, Clone)]
pub struct WgpuRootSignature {
    bind_group_layout: wgpu::BindGroupLayout,
    layout: wgpu::PipelineLayout,
    uniform_size: u64,
}

#[derive(Debug, Clone)]
pub struct WgpuPipeline(wgpu::RenderPipeline);

impl WgpuPipeline {
    pub fn raw(&self) -> &wgpu::RenderPipeline {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct WgpuDescriptorTable(wgpu::BindGroup);

impl WgpuDescriptorTable {
    pub fn raw(&self) -> &wgpu::BindGroup {
        &self.0
    }
}

/// Fence emulated with queue completion callbacks.
pub struct WgpuFence {
    device: wgpu::Device,
    completed: Arc<AtomicU64>,
    submissions: Mutex<VecDeque<(u64, wgpu::SubmissionIndex)>>,
}

impl GpuFence for WgpuFence {
    fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn wait(&self, value: u64, timeout: Option<Duration>) -> Result<()> {
        if self.completed_value() >= value {
            return Ok(());
        }

        let index = {
            let mut submissions = self
                .submissions
                .lock()
                .map_err(|_| RenderError::device_lost("fence submission list poisoned"))?;
            let completed = self.completed_value();
            submissions.retain(|(v, _)| *v > completed);
            submissions
                .iter()
                .find(|(v, _)| *v >= value)
                .map(|(_, index)| index.clone())
                .ok_or_else(|| RenderError::device_lost(format!("fence value {value} was never signaled")))?
        };

        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(index),
                timeout,
            })
            .map_err(|e| RenderError::device_lost(format!("fence wait for {value} failed: {e}")))?;

        if self.completed_value() < value {
            return Err(RenderError::device_lost(format!(
                "fence wait for {value} returned at {}",
                self.completed_value()
            )));
        }
        Ok(())
    }
}

// ── device ────────────────────────────────────────────────────────────────

pub struct WgpuDevice {
    device: wgpu::Device,
    adapter: wgpu::Adapter,
    instance: Arc<wgpu::Instance>,
    lost: Arc<Mutex<Option<String>>>,
}

impl WgpuDevice {
    pub fn raw(&self) -> &wgpu::Device {
        &self.device
    }

    fn check_alive(&self) -> Result<()> {
        match self.lost.lock().ok().and_then(|slot| slot.clone()) {
            Some(reason) => Err(RenderError::DeviceLost { reason }),
            None => Ok(()),
        }
    }
}

impl Device for WgpuDevice {
    type Queue = wgpu::Queue;
    type Window = Arc<dyn NativeWindow>;
    type Surface = WgpuSurface;
    type RenderTarget = WgpuRenderTarget;
    type Buffer = WgpuBuffer;
    type Shader = WgpuShader;
    type RootSignature = WgpuRootSignature;
    type Pipeline = WgpuPipeline;
    type DescriptorTable = WgpuDescriptorTable;
    type Fence = WgpuFence;

    fn create_swap_surface(
        &self,
        _queue: &wgpu::Queue,
        window: &Arc<dyn NativeWindow>,
        desc: &SwapSurfaceDesc,
    ) -> Result<WgpuSurface> {
        let surface = self
            .instance
            .create_surface(Arc::clone(window))
            .map_err(|e| RenderError::SurfaceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&self.adapter);
        let format = surface::choose_surface_format(&caps, desc.format).ok_or_else(|| {
            RenderError::SurfaceCreationFailed("window supports no 8-bit RGBA surface format".to_string())
        })?;
        if format != desc.format {
            log::warn!("{:?} is not presentable here; using {format:?}", desc.format);
        }

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface::to_wgpu_format(format),
            width: desc.width,
            height: desc.height,
            present_mode: surface::present_mode(desc.sync),
            desired_maximum_frame_latency: desc.image_count.saturating_sub(1).max(1),
            alpha_mode: surface::choose_alpha_mode(&caps),
            view_formats: vec![],
        };

        Ok(WgpuSurface::new(
            surface,
            self.device.clone(),
            config,
            format,
            desc.image_count,
        ))
    }

    fn create_buffer(&self, label: &str, usage: BufferUsage, contents: &[u8]) -> Result<WgpuBuffer> {
        let requested = contents.len() as u64;
        if requested == 0 || requested > self.device.limits().max_buffer_size {
            return Err(RenderError::OutOfDeviceMemory {
                label: label.to_string(),
                requested,
            });
        }

        let usages = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
            BufferUsage::Uniform => wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        };

        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents,
            usage: usages,
        });
        Ok(WgpuBuffer { buffer, usage })
    }

    fn write_buffer(&self, queue: &wgpu::Queue, buffer: &WgpuBuffer, offset: u64, bytes: &[u8]) -> Result<()> {
        if offset + bytes.len() as u64 > buffer.buffer.size() {
            return Err(RenderError::device_lost(format!(
                "write of {} bytes at {offset} overruns a {}-byte buffer",
                bytes.len(),
                buffer.buffer.size()
            )));
        }
        queue.write_buffer(&buffer.buffer, offset, bytes);
        Ok(())
    }

    fn create_shader(&self, bytecode: &ShaderBytecode) -> Result<WgpuShader> {
        let source = bytecode
            .as_wgsl()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RenderError::ShaderCompilationFailed {
                diagnostics: format!("{} shader blob is not WGSL text", bytecode.stage),
            })?;

        let label = format!("prism {} shader", bytecode.stage);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label.as_str()),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok(WgpuShader {
            module,
            stage: bytecode.stage,
            entry_point: bytecode.entry_point.clone(),
        })
    }

    fn create_root_signature(&self, uniform_size: u64) -> Result<WgpuRootSignature> {
        let min_binding_size = NonZeroU64::new(uniform_size).ok_or_else(|| {
            RenderError::PipelineCreationFailed("root signature constant buffer has zero size".to_string())
        })?;

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prism transforms bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(min_binding_size),
                },
                count: None,
            }],
        });

        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prism pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        Ok(WgpuRootSignature {
            bind_group_layout,
            layout,
            uniform_size,
        })
    }

    fn create_pipeline(&self, desc: &PipelineDesc<'_, Self>) -> Result<WgpuPipeline> {
        if desc.vertex_shader.stage != ShaderStage::Vertex || desc.pixel_shader.stage != ShaderStage::Pixel {
            return Err(RenderError::PipelineCreationFailed(format!(
                "{}: shader stages do not match their slots",
                desc.label
            )));
        }

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: match a.format {
                    VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
                },
                offset: a.offset as u64,
                shader_location: a.location,
            })
            .collect();

        let topology = match desc.topology {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&desc.root_signature.layout),

            vertex: wgpu::VertexState {
                module: &desc.vertex_shader.module,
                entry_point: Some(desc.vertex_shader.entry_point.as_str()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: desc.vertex_layout.stride as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &desc.pixel_shader.module,
                entry_point: Some(desc.pixel_shader.entry_point.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface::to_wgpu_format(desc.target_format),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(WgpuPipeline(pipeline))
    }

    fn create_descriptor_table(
        &self,
        root_signature: &WgpuRootSignature,
        uniform: &WgpuBuffer,
    ) -> Result<WgpuDescriptorTable> {
        if uniform.usage != BufferUsage::Uniform || uniform.buffer.size() < root_signature.uniform_size {
            return Err(RenderError::PipelineCreationFailed(format!(
                "a {}-byte {:?} buffer cannot back a {}-byte constant buffer slot",
                uniform.buffer.size(),
                uniform.usage,
                root_signature.uniform_size
            )));
        }

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prism transforms bind group"),
            layout: &root_signature.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.buffer.as_entire_binding(),
            }],
        });
        Ok(WgpuDescriptorTable(bind_group))
    }

    fn create_fence(&self, initial: u64) -> Result<WgpuFence> {
        Ok(WgpuFence {
            device: self.device.clone(),
            completed: Arc::new(AtomicU64::new(initial)),
            submissions: Mutex::new(VecDeque::new()),
        })
    }

    fn submit(&self, queue: &wgpu::Queue, commands: &CommandBuffer<Self>) -> Result<()> {
        self.check_alive()?;
        let cb = encode::encode(&self.device, commands.commands())?;
        queue.submit(Some(cb));
        Ok(())
    }

    fn signal(&self, queue: &wgpu::Queue, fence: &WgpuFence, value: u64) -> Result<()> {
        self.check_alive()?;
        let index = queue.submit(std::iter::empty());

        let completed = Arc::clone(&fence.completed);
        queue.on_submitted_work_done(move || {
            completed.fetch_max(value, Ordering::AcqRel);
        });

        fence
            .submissions
            .lock()
            .map_err(|_| RenderError::device_lost("fence submission list poisoned"))?
            .push_back((value, index));
        Ok(())
    }
}
