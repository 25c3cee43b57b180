use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::backend::wgpu_backend::{NativeWindow, WgpuDevice, WgpuInstance};
use crate::renderer::{RendererConfig, ShaderSet, TriangleRenderer};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "prism".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
        }
    }
}

/// Entry point for the windowed triangle.
pub struct Runtime;

impl Runtime {
    /// Opens one window and renders the triangle into it until it is closed.
    pub fn run(window: RuntimeConfig, renderer: RendererConfig, shaders: ShaderSet) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(window, renderer, shaders);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct WindowEntry {
    // Declared first: the renderer drains the queue before the window goes away.
    renderer: TriangleRenderer<WgpuDevice>,
    window: Arc<Window>,
}

struct AppState {
    config: RuntimeConfig,
    renderer_config: RendererConfig,
    shaders: ShaderSet,

    entry: Option<WindowEntry>,
    failure: Option<anyhow::Error>,
}

impl AppState {
    fn new(config: RuntimeConfig, renderer_config: RendererConfig, shaders: ShaderSet) -> Self {
        Self {
            config,
            renderer_config,
            shaders,
            entry: None,
            failure: None,
        }
    }

    fn create_window_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);
        let size = window.inner_size();

        let mut instance = WgpuInstance::new();
        let native: Arc<dyn NativeWindow> = window.clone();
        let renderer = TriangleRenderer::new(
            &mut instance,
            &native,
            size.width,
            size.height,
            &self.renderer_config,
            &self.shaders,
        )
        .context("renderer initialization failed")?;

        Ok(WindowEntry { renderer, window })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.failure = Some(error);
        self.entry = None;
        event_loop.exit();
    }

    fn resize(&mut self, event_loop: &ActiveEventLoop, size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else { return };
        match entry.renderer.handle_resize(size.width, size.height) {
            Ok(()) => entry.window.request_redraw(),
            Err(e) => self.fail(event_loop, anyhow::Error::new(e).context("resize failed")),
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() {
            return;
        }

        match self.create_window_entry(event_loop) {
            Ok(entry) => {
                entry.window.request_redraw();
                self.entry = Some(entry);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(entry) = self.entry.take() {
                    log::info!("window closed after {} frames", entry.renderer.frame_count());
                }
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => self.resize(event_loop, new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                let Some(size) = self.entry.as_ref().map(|e| e.window.inner_size()) else {
                    return;
                };
                self.resize(event_loop, size);
            }

            WindowEvent::RedrawRequested => {
                let Some(entry) = self.entry.as_mut() else { return };
                if let Err(e) = entry.renderer.render_frame() {
                    self.fail(event_loop, anyhow::Error::new(e).context("frame failed"));
                }
            }

            _ => {}
        }
    }
}
