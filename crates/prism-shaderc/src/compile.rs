use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::{CompileError, CompileErrorKind};
use crate::profile::{Profile, ShaderStage};

/// A compiled shader blob.
///
/// `code` is the validated module in the device's native input format (WGSL
/// text for the wgpu device). Consumers treat it as opaque bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderBytecode {
    pub stage: ShaderStage,
    pub entry_point: String,
    pub profile: String,
    pub code: Vec<u8>,
}

impl ShaderBytecode {
    /// Wraps an already-compiled blob without validation.
    ///
    /// Useful for devices that do not interpret bytecode at all.
    pub fn from_raw(stage: ShaderStage, entry_point: &str, profile: &str, code: Vec<u8>) -> Self {
        Self {
            stage,
            entry_point: entry_point.to_string(),
            profile: profile.to_string(),
            code,
        }
    }

    /// Returns the blob as WGSL text, if it is valid UTF-8.
    pub fn as_wgsl(&self) -> Option<&str> {
        std::str::from_utf8(&self.code).ok()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// Compiles `source` for `profile`, requiring an entry point named `entry_point`.
pub fn compile(source: &str, entry_point: &str, profile: &str) -> Result<ShaderBytecode, CompileError> {
    let parsed = Profile::parse(profile)?;

    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| CompileError::new(CompileErrorKind::Parse, e.emit_to_string(source)))?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| CompileError::new(CompileErrorKind::Validation, e.into_inner().to_string()))?;

    let wanted = match parsed.stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Pixel => naga::ShaderStage::Fragment,
    };

    let found = module
        .entry_points
        .iter()
        .any(|ep| ep.name == entry_point && ep.stage == wanted);
    if !found {
        return Err(CompileError::new(
            CompileErrorKind::EntryPoint,
            format!("no {} entry point named `{entry_point}`", parsed.stage),
        ));
    }

    Ok(ShaderBytecode {
        stage: parsed.stage,
        entry_point: entry_point.to_string(),
        profile: parsed.to_string(),
        code: source.as_bytes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = r#"
        @vertex
        fn main(@location(0) pos: vec3<f32>) -> @builtin(position) vec4<f32> {
            return vec4<f32>(pos, 1.0);
        }
    "#;

    const PS: &str = r#"
        @fragment
        fn main() -> @location(0) vec4<f32> {
            return vec4<f32>(1.0, 0.0, 0.0, 1.0);
        }
    "#;

    #[test]
    fn compiles_vertex_stage() {
        let blob = compile(VS, "main", "vs_5_0").unwrap();
        assert_eq!(blob.stage, ShaderStage::Vertex);
        assert_eq!(blob.entry_point, "main");
        assert_eq!(blob.as_wgsl(), Some(VS));
    }

    #[test]
    fn compiles_pixel_stage() {
        let blob = compile(PS, "main", "ps_5_0").unwrap();
        assert_eq!(blob.stage, ShaderStage::Pixel);
        assert_eq!(blob.profile, "ps_5_0");
    }

    #[test]
    fn stage_mismatch_is_an_entry_point_error() {
        let err = compile(VS, "main", "ps_5_0").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::EntryPoint);
    }

    #[test]
    fn missing_entry_point() {
        let err = compile(VS, "vs_main", "vs_5_0").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::EntryPoint);
        assert!(err.diagnostics.contains("vs_main"));
    }

    #[test]
    fn syntax_error_carries_diagnostics() {
        let err = compile("fn main( {", "main", "vs_5_0").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Parse);
        assert!(!err.diagnostics.is_empty());
    }

    #[test]
    fn type_error_is_rejected() {
        // Depending on where naga catches it this is a lowering or validation failure.
        let src = r#"
            @fragment
            fn main() -> @location(0) vec4<f32> {
                return 1.0;
            }
        "#;
        let err = compile(src, "main", "ps_5_0").unwrap_err();
        assert!(matches!(err.kind, CompileErrorKind::Parse | CompileErrorKind::Validation));
    }
}
