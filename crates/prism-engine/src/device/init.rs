use super::FeatureLevel;

/// Initialization parameters for the device layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct DeviceInit {
    /// Lowest feature level an adapter must support to be selected.
    pub min_feature_level: FeatureLevel,

    /// Attach the validation layer before the device is created.
    ///
    /// Failure to attach is logged and otherwise ignored.
    pub debug_layer: bool,
}

impl Default for DeviceInit {
    fn default() -> Self {
        Self {
            min_feature_level: FeatureLevel::L12_0,
            debug_layer: cfg!(debug_assertions),
        }
    }
}
