use anyhow::Result;
use prism_engine::logging::{init_logging, LoggingConfig};
use prism_engine::renderer::{RendererConfig, ShaderSet, TRIANGLE_PS, TRIANGLE_VS};
use prism_engine::window::{Runtime, RuntimeConfig};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let shaders = ShaderSet::compile(TRIANGLE_VS, TRIANGLE_PS)?;
    log::info!(
        "shaders compiled: {} + {} bytes",
        shaders.vertex.len(),
        shaders.pixel.len()
    );

    Runtime::run(RuntimeConfig::default(), RendererConfig::default(), shaders)
}
