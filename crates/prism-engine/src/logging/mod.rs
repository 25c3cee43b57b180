//! Logger setup for binaries built on prism.
//!
//! The engine only emits through `log`; this module is where `env_logger` gets
//! installed as the sink.

mod init;

pub use init::{init_logging, LoggingConfig};
