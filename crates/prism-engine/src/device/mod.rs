//! Adapter selection and logical device management.
//!
//! This module is responsible for:
//! - enumerating adapters and picking the first capable hardware one
//! - creating the logical device and its direct queue
//! - attaching the validation layer in diagnostic builds

mod adapter;
mod context;
mod init;

pub use adapter::{select_adapter, AdapterDescriptor, AdapterKind, FeatureLevel};
pub use context::DeviceContext;
pub use init::DeviceInit;
