use std::fmt;

use crate::backend::Instance;
use crate::error::{RenderError, Result};

/// Capability tier of a device, ordered from least to most capable.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FeatureLevel {
    L11_0,
    L11_1,
    L12_0,
    L12_1,
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FeatureLevel::L11_0 => "11_0",
            FeatureLevel::L11_1 => "11_1",
            FeatureLevel::L12_0 => "12_0",
            FeatureLevel::L12_1 => "12_1",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AdapterKind {
    Discrete,
    Integrated,
    Virtual,
    /// CPU rasterizer; never selected.
    Software,
    Other,
}

/// One enumerated physical adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterDescriptor {
    /// Position in driver enumeration order.
    pub ordinal: usize,
    pub name: String,
    pub vendor: u32,
    pub device: u32,
    pub kind: AdapterKind,
    /// Backend API name as reported by the driver ("Vulkan", "Dx12", "headless", ...).
    pub backend: String,
    pub max_feature_level: FeatureLevel,
}

impl AdapterDescriptor {
    pub fn is_software(&self) -> bool {
        self.kind == AdapterKind::Software
    }
}

/// Picks the first hardware adapter whose device probe succeeds at `min_level`.
///
/// Adapters are walked in driver order; the result only depends on what the
/// instance enumerates, so repeated calls return the same adapter.
pub fn select_adapter<I: Instance>(instance: &I, min_level: FeatureLevel) -> Result<AdapterDescriptor> {
    for adapter in instance.enumerate_adapters() {
        if adapter.is_software() {
            log::debug!("skipping software adapter {} ({})", adapter.name, adapter.backend);
            continue;
        }

        if instance.probe_device(&adapter, min_level) {
            return Ok(adapter);
        }

        log::debug!(
            "adapter {} does not support feature level {min_level} (max {})",
            adapter.name,
            adapter.max_feature_level
        );
    }

    Err(RenderError::NoCapableAdapter { min_level })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessAdapter, HeadlessConfig, HeadlessInstance};

    fn instance(adapters: Vec<HeadlessAdapter>) -> HeadlessInstance {
        HeadlessInstance::new(HeadlessConfig {
            adapters,
            ..HeadlessConfig::default()
        })
    }

    #[test]
    fn selection_is_stable_across_calls() {
        let instance = instance(vec![
            HeadlessAdapter::software("Basic Render Driver"),
            HeadlessAdapter::hardware("Integrated", FeatureLevel::L11_1),
            HeadlessAdapter::hardware("Discrete", FeatureLevel::L12_1),
        ]);

        let first = select_adapter(&instance, FeatureLevel::L12_0).unwrap();
        let second = select_adapter(&instance, FeatureLevel::L12_0).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "Discrete");

        let relaxed = select_adapter(&instance, FeatureLevel::L11_0).unwrap();
        assert_eq!(relaxed.name, "Integrated");
    }

    #[test]
    fn software_only_is_not_capable() {
        let instance = instance(vec![HeadlessAdapter::software("Basic Render Driver")]);
        let err = select_adapter(&instance, FeatureLevel::L11_0).unwrap_err();
        assert!(matches!(
            err,
            RenderError::NoCapableAdapter {
                min_level: FeatureLevel::L11_0
            }
        ));
    }

    #[test]
    fn feature_levels_are_ordered() {
        assert!(FeatureLevel::L11_0 < FeatureLevel::L11_1);
        assert!(FeatureLevel::L11_1 < FeatureLevel::L12_0);
        assert!(FeatureLevel::L12_0 < FeatureLevel::L12_1);
        assert_eq!(FeatureLevel::L12_0.to_string(), "12_0");
    }
}
