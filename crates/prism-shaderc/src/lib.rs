//! Shader compiler front end for **prism**.
//!
//! Turns WGSL source text into an opaque [`ShaderBytecode`] blob addressed by an
//! entry point name and a target profile string (`vs_5_0`, `ps_5_0`, ...).
//! The renderer never looks inside the blob; it only hands it to the device.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`profile`] | `Profile`, `ShaderStage` |
//! | [`error`] | `CompileError` |
//! | [`compile`] | `compile` entry point, `ShaderBytecode` |
//!
//! # Quick start
//!
//! ```rust
//! use prism_shaderc::{compile, ShaderStage};
//!
//! let src = r#"
//!     @vertex
//!     fn main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
//!         return vec4<f32>(pos, 1.0);
//!     }
//! "#;
//!
//! let blob = compile(src, "main", "vs_5_0").unwrap();
//! assert_eq!(blob.stage, ShaderStage::Vertex);
//! ```

pub mod compile;
pub mod error;
pub mod profile;

pub use compile::{compile, ShaderBytecode};
pub use error::{CompileError, CompileErrorKind};
pub use profile::{Profile, ShaderStage};
