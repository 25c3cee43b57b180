use std::sync::Once;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// How the process-wide logger is set up.
///
/// An explicit `env_filter` (`env_logger` directive syntax, for example
/// `"prism_engine=trace,wgpu_core=warn"`) beats `RUST_LOG`. With neither set,
/// prism logs at `info` and the wgpu internals at `warn`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    /// Terminal coloring.
    pub write_style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs `env_logger` behind the `log` facade.
///
/// Only the first call in a process has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = Builder::new();
        apply_filter(&mut builder, config.env_filter.or_else(|| std::env::var("RUST_LOG").ok()));
        builder.write_style(config.write_style);

        // Test binaries may have installed a logger already.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}

fn apply_filter(builder: &mut Builder, directives: Option<String>) {
    match directives {
        Some(directives) => {
            builder.parse_filters(&directives);
        }
        None => {
            builder.filter_level(LevelFilter::Info);
            for module in ["wgpu_core", "wgpu_hal", "naga"] {
                builder.filter_module(module, LevelFilter::Warn);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn max_level(directives: Option<&str>) -> LevelFilter {
        let mut builder = Builder::new();
        apply_filter(&mut builder, directives.map(str::to_string));
        builder.build().filter()
    }

    #[test]
    fn defaults_to_info() {
        assert_eq!(max_level(None), LevelFilter::Info);
    }

    #[test]
    fn explicit_directives_replace_the_default() {
        assert_eq!(max_level(Some("prism_engine=trace")), LevelFilter::Trace);
        assert_eq!(max_level(Some("error")), LevelFilter::Error);
    }

    #[test]
    fn second_init_is_ignored() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig {
            env_filter: Some("trace".to_string()),
            ..LoggingConfig::default()
        });
        log::info!("logger still usable");
    }
}
