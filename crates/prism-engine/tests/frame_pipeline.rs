use std::time::Duration;

use prism_engine::backend::headless::{
    HeadlessAdapter, HeadlessConfig, HeadlessDevice, HeadlessInstance, HeadlessWindow, Image,
};
use prism_engine::command::CommandKind;
use prism_engine::device::{DeviceInit, FeatureLevel};
use prism_engine::frame::SurfaceInit;
use prism_engine::geometry::UniformBlock;
use prism_engine::renderer::TRIANGLE_PS;
use prism_engine::state::{ResourceState, TrackedResource};
use prism_engine::{InitStage, RenderError, RendererConfig, ShaderSet, TriangleRenderer};
use prism_shaderc::{ShaderBytecode, ShaderStage};

fn renderer(
    instance: &mut HeadlessInstance,
    width: u32,
    height: u32,
) -> Result<TriangleRenderer<HeadlessDevice>, RenderError> {
    let shaders = ShaderSet::triangle()?;
    TriangleRenderer::new(
        instance,
        &HeadlessWindow::default(),
        width,
        height,
        &RendererConfig::default(),
        &shaders,
    )
}

fn pixel(image: &Image, x: u32, y: u32) -> [f32; 4] {
    image.pixel(x, y).unwrap()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

#[test]
fn draws_the_triangle_over_the_clear_color() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let mut r = renderer(&mut instance, 800, 600).unwrap();

    r.render_frame().unwrap();

    let image = probe.presented_image().unwrap();
    assert_eq!((image.width(), image.height()), (800, 600));

    // Center: blue vertex weighs about half, red and green a quarter each.
    let [red, green, blue, alpha] = pixel(&image, 400, 300);
    assert!(blue > red && blue > green, "center is {red} {green} {blue}");
    assert!((blue - 0.5).abs() < 0.01 && (red - 0.25).abs() < 0.01 && (green - 0.25).abs() < 0.01);
    assert_eq!(alpha, 1.0);

    for (x, y) in [(0, 0), (799, 0)] {
        let [r, g, b, a] = pixel(&image, x, y);
        assert!(approx(r, 0.2) && approx(g, 0.2) && approx(b, 0.2) && approx(a, 1.0));
    }
}

#[test]
fn selects_hardware_over_an_earlier_software_adapter() {
    let mut instance = HeadlessInstance::new(HeadlessConfig {
        adapters: vec![
            HeadlessAdapter::software("Basic Render Driver"),
            HeadlessAdapter::hardware("Discrete GPU", FeatureLevel::L12_0),
        ],
        ..HeadlessConfig::default()
    });
    let r = renderer(&mut instance, 64, 64).unwrap();

    let adapter = r.context().adapter();
    assert_eq!(adapter.name, "Discrete GPU");
    assert_eq!(adapter.ordinal, 1);
    assert!(!adapter.is_software());
}

#[test]
fn no_capable_adapter_is_a_fatal_adapter_stage_error() {
    let mut instance = HeadlessInstance::new(HeadlessConfig {
        adapters: vec![
            HeadlessAdapter::software("Basic Render Driver"),
            HeadlessAdapter::hardware("Old GPU", FeatureLevel::L11_0),
        ],
        ..HeadlessConfig::default()
    });

    let err = renderer(&mut instance, 64, 64).err().unwrap();
    assert!(err.is_fatal_init());
    assert_eq!(err.stage(), Some(InitStage::Adapter));
    assert!(matches!(
        err.root(),
        RenderError::NoCapableAdapter {
            min_level: FeatureLevel::L12_0
        }
    ));
    assert!(instance.release_log().created().is_empty());
}

#[test]
fn resize_with_work_in_flight_is_rejected() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let mut r = renderer(&mut instance, 320, 240).unwrap();

    r.submit_frame().unwrap();
    let err = r.resize(160, 120).unwrap_err();
    assert!(matches!(err, RenderError::ResizeWhileInFlight { pending: 1, completed: 0 }));
    assert_eq!(r.frames().size(), (320, 240));

    r.handle_resize(160, 120).unwrap();
    assert_eq!(r.frames().size(), (160, 120));

    r.render_frame().unwrap();
    let image = probe.presented_image().unwrap();
    assert_eq!((image.width(), image.height()), (160, 120));
}

#[test]
fn every_swap_image_is_back_in_present_after_presenting() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let mut r = renderer(&mut instance, 64, 64).unwrap();

    for _ in 0..3 {
        r.render_frame().unwrap();
    }

    let tracker = r.tracker();
    for image in 0..r.frames().image_count() {
        assert_eq!(
            tracker.state(TrackedResource::SwapImage(image)),
            Some(ResourceState::Present)
        );
    }
    assert_eq!(tracker.unbalanced().count(), 0);
    assert_eq!(r.frame_count(), 3);
}

#[test]
fn uniform_rewrite_before_the_fence_is_refused() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let mut r = renderer(&mut instance, 64, 64).unwrap();

    let first = r.submit_frame().unwrap();
    let err = r.submit_frame().unwrap_err();
    assert!(matches!(
        err,
        RenderError::ResourceInFlight {
            resource: "uniform buffer",
            ticket: 1
        }
    ));
    assert_eq!(r.frame_count(), 1);
    assert_eq!(r.frames().current_image(), None);

    r.fence().wait_until(first).unwrap();
    let second = r.submit_frame().unwrap();
    assert_eq!(second.value(), 2);
}

#[test]
fn uniform_changes_reach_the_next_frame() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let mut r = renderer(&mut instance, 100, 100).unwrap();

    // Pushed fully behind the eye: nothing but the clear color is left.
    let mut block = UniformBlock::IDENTITY;
    block.model = glam::Mat4::from_cols(
        glam::Vec4::X,
        glam::Vec4::Y,
        glam::Vec4::Z,
        glam::Vec4::new(0.0, 0.0, 0.0, -1.0),
    );
    r.set_uniforms(block);
    r.render_frame().unwrap();

    let [red, green, blue, _] = pixel(&probe.presented_image().unwrap(), 50, 50);
    assert!(approx(red, 0.2) && approx(green, 0.2) && approx(blue, 0.2));
    assert_eq!(r.uniform_buffer().contents(), bytemuck::bytes_of(&block));
}

#[test]
fn shader_failure_releases_everything_in_reverse() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let log = instance.release_log();

    let mut shaders = ShaderSet::triangle().unwrap();
    shaders.pixel = ShaderBytecode::from_raw(ShaderStage::Pixel, "main", "ps_5_0", Vec::new());

    let err = TriangleRenderer::<HeadlessDevice>::new(
        &mut instance,
        &HeadlessWindow::default(),
        64,
        64,
        &RendererConfig::default(),
        &shaders,
    )
    .err()
    .unwrap();

    assert_eq!(err.stage(), Some(InitStage::Shader));
    assert!(matches!(err.root(), RenderError::ShaderCompilationFailed { .. }));

    let created = log.created();
    assert_eq!(created.last().map(String::as_str), Some("vertex shader"));
    let mut expected = created.clone();
    expected.reverse();
    assert_eq!(log.released(), expected);
}

#[test]
fn surface_failure_is_tagged_with_its_stage() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let shaders = ShaderSet::triangle().unwrap();

    let err = TriangleRenderer::<HeadlessDevice>::new(
        &mut instance,
        &HeadlessWindow {
            accepts_surfaces: false,
        },
        64,
        64,
        &RendererConfig::default(),
        &shaders,
    )
    .err()
    .unwrap();

    assert_eq!(err.stage(), Some(InitStage::SwapSurface));
    assert!(matches!(err.root(), RenderError::SurfaceCreationFailed(_)));
    assert_eq!(instance.release_log().released(), vec!["fence", "queue", "device"]);
}

#[test]
fn shutdown_drains_the_queue_and_releases_in_reverse() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let log = instance.release_log();

    let mut r = renderer(&mut instance, 64, 64).unwrap();
    r.submit_frame().unwrap();
    assert!(probe.pending_ops() > 0);
    assert_eq!(probe.present_count(), 0);

    drop(r);

    assert_eq!(probe.pending_ops(), 0);
    assert_eq!(probe.present_count(), 1);
    assert_eq!(probe.lost_reason(), None);

    let mut expected = log.created();
    expected.reverse();
    assert_eq!(log.released(), expected);
    assert_eq!(log.released().first().map(String::as_str), Some("descriptor table"));
}

#[test]
fn missing_debug_layer_only_warns() {
    let mut instance = HeadlessInstance::new(HeadlessConfig {
        debug_layer_available: false,
        ..HeadlessConfig::default()
    });
    let config = RendererConfig {
        device: DeviceInit {
            debug_layer: true,
            ..DeviceInit::default()
        },
        ..RendererConfig::default()
    };

    let shaders = ShaderSet::triangle().unwrap();
    let mut r =
        TriangleRenderer::<HeadlessDevice>::new(&mut instance, &HeadlessWindow::default(), 64, 64, &config, &shaders)
            .unwrap();

    assert!(!r.context().debug_layer());
    r.render_frame().unwrap();
}

#[test]
fn records_the_fixed_frame_sequence() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let mut r = renderer(&mut instance, 64, 64).unwrap();
    r.render_frame().unwrap();

    let kinds: Vec<CommandKind> = r.recorder().buffer().commands().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            CommandKind::Barrier,
            CommandKind::SetRenderTarget,
            CommandKind::SetViewport,
            CommandKind::SetScissor,
            CommandKind::ClearRenderTarget,
            CommandKind::SetPipelineState,
            CommandKind::SetRootSignature,
            CommandKind::SetDescriptorTable,
            CommandKind::SetVertexBuffer,
            CommandKind::SetIndexBuffer,
            CommandKind::SetPrimitiveTopology,
            CommandKind::DrawIndexed,
            CommandKind::Barrier,
        ]
    );
}

#[test]
fn minimized_surface_skips_frames() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let mut r = renderer(&mut instance, 64, 64).unwrap();

    let first = r.render_frame().unwrap();
    r.handle_resize(0, 0).unwrap();
    assert!(r.frames().is_minimized());

    let skipped = r.render_frame().unwrap();
    assert_eq!(skipped, first);
    assert_eq!(probe.present_count(), 1);

    r.handle_resize(64, 64).unwrap();
    r.render_frame().unwrap();
    assert_eq!(probe.present_count(), 2);
}

#[test]
fn alternates_swap_images() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let mut r = renderer(&mut instance, 32, 32).unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        r.render_frame().unwrap();
        seen.push(r.recorder().buffer().target().map(|(image, _)| image));
    }
    assert_eq!(seen, vec![Some(0), Some(1), Some(0), Some(1)]);
}

#[test]
fn three_swap_images_rotate_and_return_to_present() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let config = RendererConfig {
        surface: SurfaceInit {
            image_count: 3,
            ..SurfaceInit::default()
        },
        ..RendererConfig::default()
    };
    let shaders = ShaderSet::triangle().unwrap();
    let mut r =
        TriangleRenderer::<HeadlessDevice>::new(&mut instance, &HeadlessWindow::default(), 32, 32, &config, &shaders)
            .unwrap();
    assert_eq!(r.frames().image_count(), 3);

    let mut seen = Vec::new();
    for _ in 0..6 {
        r.render_frame().unwrap();
        seen.push(r.recorder().buffer().target().map(|(image, _)| image));
    }
    assert_eq!(seen, vec![Some(0), Some(1), Some(2), Some(0), Some(1), Some(2)]);

    for image in 0..3 {
        assert_eq!(
            r.tracker().state(TrackedResource::SwapImage(image)),
            Some(ResourceState::Present)
        );
    }
}

#[test]
fn broken_shader_source_fails_at_the_shader_stage() {
    let err = ShaderSet::compile("fn (", TRIANGLE_PS).unwrap_err();

    assert!(err.is_fatal_init());
    assert_eq!(err.stage(), Some(InitStage::Shader));
    assert!(matches!(err.root(), RenderError::ShaderCompilationFailed { .. }));
}

#[test]
fn fence_timeout_on_a_stalled_gpu_is_device_loss() {
    let mut instance = HeadlessInstance::new(HeadlessConfig::default());
    let probe = instance.probe();
    let config = RendererConfig {
        fence_timeout: Some(Duration::from_millis(5)),
        ..RendererConfig::default()
    };
    let shaders = ShaderSet::triangle().unwrap();
    let mut r =
        TriangleRenderer::<HeadlessDevice>::new(&mut instance, &HeadlessWindow::default(), 64, 64, &config, &shaders)
            .unwrap();

    probe.stall();
    let err = r.render_frame().unwrap_err();
    assert!(matches!(err, RenderError::DeviceLost { .. }), "got {err}");
    assert_eq!(r.fence().completed(), 0);
    assert!(probe.pending_ops() > 0);
    assert_eq!(probe.present_count(), 0);

    probe.resume();
    r.fence().drain().unwrap();
    assert_eq!(r.fence().completed(), 1);
    assert_eq!(probe.present_count(), 1);
}
