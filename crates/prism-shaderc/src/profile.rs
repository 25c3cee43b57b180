use std::fmt;

use crate::error::{CompileError, CompileErrorKind};

/// Pipeline stage a blob is compiled for.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Pixel => f.write_str("pixel"),
        }
    }
}

/// Parsed target profile, e.g. `vs_5_0`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Profile {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl Profile {
    /// Parses `<stage>_<major>_<minor>`.
    ///
    /// Stage prefixes: `vs` (vertex), `ps` / `fs` (pixel).
    pub fn parse(s: &str) -> Result<Self, CompileError> {
        let bad = || CompileError::new(CompileErrorKind::Profile, format!("unrecognized profile `{s}`"));

        let mut parts = s.split('_');
        let stage = match parts.next() {
            Some("vs") => ShaderStage::Vertex,
            Some("ps") | Some("fs") => ShaderStage::Pixel,
            _ => return Err(bad()),
        };
        let major = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        let minor = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
        if parts.next().is_some() {
            return Err(bad());
        }

        Ok(Self { stage, major, minor })
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.stage {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        };
        write!(f, "{prefix}_{}_{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vertex_profile() {
        let p = Profile::parse("vs_5_0").unwrap();
        assert_eq!(p.stage, ShaderStage::Vertex);
        assert_eq!((p.major, p.minor), (5, 0));
    }

    #[test]
    fn fs_is_an_alias_for_pixel() {
        assert_eq!(Profile::parse("fs_6_1").unwrap().stage, ShaderStage::Pixel);
        assert_eq!(Profile::parse("ps_5_1").unwrap().to_string(), "ps_5_1");
    }

    #[test]
    fn rejects_malformed_profiles() {
        for s in ["", "cs_5_0", "vs_5", "vs_x_0", "vs_5_0_1"] {
            let err = Profile::parse(s).unwrap_err();
            assert_eq!(err.kind, CompileErrorKind::Profile, "{s}");
        }
    }
}
