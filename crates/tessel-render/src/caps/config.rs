use super::{CapsOverrideSource, DxLevel, HardwareCaps, HardwareFeatures, force_caps_to_dx_level};
use crate::launch::{LaunchOptions, ShaderDeviceInfo};

/// The three capability generations of a configured device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareConfig {
    actual: HardwareCaps,
    requested: HardwareCaps,
    unoverridden: HardwareCaps,
}

impl HardwareConfig {
    /// Computes the requested caps for a mode set.
    ///
    /// Out-of-range levels are clamped with a warning, never rejected.
    pub fn setup(
        actual: HardwareCaps,
        mode: &ShaderDeviceInfo,
        overrides: &dyn CapsOverrideSource,
        launch: &LaunchOptions,
    ) -> Self {
        let mut level = mode.dx_level.unwrap_or(actual.dx_support_level);

        if level > actual.max_dx_support_level {
            tracing::warn!(
                "Requested dx level {} exceeds the card maximum of {}; clamping",
                level,
                actual.max_dx_support_level
            );
            level = actual.max_dx_support_level;
        }
        if let Some(max) = launch.max_dx_level
            && level > max
        {
            tracing::info!("Clamping dx level {} to -maxdxlevel {}", level, max);
            level = max;
        }
        if level < actual.min_dx_support_level {
            tracing::warn!(
                "Requested dx level {} is below the card minimum of {}; raising",
                level,
                actual.min_dx_support_level
            );
            level = actual.min_dx_support_level;
        }
        let level = level.closest_supported();

        let mut requested = force_caps_to_dx_level(&actual, level);
        overrides.read_hardware_caps(&mut requested, level);
        if launch.disallow_hw_morph {
            requested.features.remove(HardwareFeatures::HARDWARE_MORPH);
        }
        if launch.no_glsl_control_flow {
            requested.features.remove(HardwareFeatures::GLSL_CONTROL_FLOW);
        }
        // Overrides may remove features; they may not add any the card lacks.
        requested.features &= actual.features;

        tracing::info!(
            "Hardware config for '{}': dx level {} (card range {}..={})",
            actual.description,
            requested.dx_support_level,
            actual.min_dx_support_level,
            actual.max_dx_support_level
        );

        Self {
            unoverridden: requested.clone(),
            requested,
            actual,
        }
    }

    /// Caps as probed (after config overrides at the card's max level).
    pub fn actual(&self) -> &HardwareCaps {
        &self.actual
    }

    /// Caps the engine runs with.
    pub fn requested(&self) -> &HardwareCaps {
        &self.requested
    }

    /// Requested caps before any runtime override.
    pub fn unoverridden(&self) -> &HardwareCaps {
        &self.unoverridden
    }

    pub fn dx_support_level(&self) -> DxLevel {
        self.requested.dx_support_level
    }

    pub fn supports(&self, features: HardwareFeatures) -> bool {
        self.requested.supports(features)
    }

    /// Toggles stream offset support at runtime.
    ///
    /// With the override enabled, support follows `enable` but can never
    /// exceed what the card actually has. Disabling the override restores
    /// the unoverridden value.
    pub fn override_stream_offset_support(&mut self, override_enabled: bool, enable: bool) {
        let value = if override_enabled {
            enable && self.actual.supports(HardwareFeatures::STREAM_OFFSET)
        } else {
            self.unoverridden.supports(HardwareFeatures::STREAM_OFFSET)
        };
        self.requested.features.set(HardwareFeatures::STREAM_OFFSET, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{CapsOverride, CapsOverrideRule, CapsOverrideTable, NoCapsOverrides};

    fn sm3_card() -> HardwareCaps {
        HardwareCaps {
            description: "test".into(),
            features: HardwareFeatures::PIXEL_SHADER_2_B
                | HardwareFeatures::SHADER_MODEL_3_0
                | HardwareFeatures::SRGB
                | HardwareFeatures::STREAM_OFFSET
                | HardwareFeatures::VERTEX_TEXTURES
                | HardwareFeatures::GLSL_CONTROL_FLOW,
            dx_support_level: DxLevel::DX95,
            min_dx_support_level: DxLevel::DX90,
            max_dx_support_level: DxLevel::DX95,
            ..Default::default()
        }
    }

    #[test]
    fn test_requested_level_clamped_to_card_max() {
        let config = HardwareConfig::setup(
            sm3_card(),
            &ShaderDeviceInfo::with_dx_level(DxLevel::DX100),
            &NoCapsOverrides,
            &LaunchOptions::default(),
        );
        assert_eq!(config.dx_support_level(), DxLevel::DX95);
    }

    #[test]
    fn test_launch_clamp_and_removals() {
        let launch = LaunchOptions {
            max_dx_level: Some(DxLevel::DX92),
            no_glsl_control_flow: true,
            ..Default::default()
        };
        let config =
            HardwareConfig::setup(sm3_card(), &ShaderDeviceInfo::default(), &NoCapsOverrides, &launch);
        assert_eq!(config.dx_support_level(), DxLevel::DX92);
        assert!(!config.supports(HardwareFeatures::SHADER_MODEL_3_0));
        assert!(!config.supports(HardwareFeatures::GLSL_CONTROL_FLOW));
        assert!(config.actual().supports(HardwareFeatures::SHADER_MODEL_3_0));
    }

    #[test]
    fn test_overrides_read_at_clamped_level() {
        let table = CapsOverrideTable::new().with_rule(CapsOverrideRule {
            dx_level: Some(DxLevel::DX90),
            overrides: CapsOverride {
                disable: HardwareFeatures::SRGB,
                ..Default::default()
            },
            ..Default::default()
        });
        let config = HardwareConfig::setup(
            sm3_card(),
            &ShaderDeviceInfo::with_dx_level(DxLevel::DX90),
            &table,
            &LaunchOptions::default(),
        );
        assert!(!config.supports(HardwareFeatures::SRGB));

        let config = HardwareConfig::setup(
            sm3_card(),
            &ShaderDeviceInfo::with_dx_level(DxLevel::DX95),
            &table,
            &LaunchOptions::default(),
        );
        assert!(config.supports(HardwareFeatures::SRGB));
    }

    #[test]
    fn test_requested_is_subset_of_actual() {
        let config = HardwareConfig::setup(
            sm3_card(),
            &ShaderDeviceInfo::with_dx_level(DxLevel::DX90),
            &NoCapsOverrides,
            &LaunchOptions::default(),
        );
        assert!(config.requested().is_subset_of(config.actual()));
        assert_eq!(config.requested(), config.unoverridden());
    }

    #[test]
    fn test_stream_offset_override() {
        let mut config = HardwareConfig::setup(
            sm3_card(),
            &ShaderDeviceInfo::default(),
            &NoCapsOverrides,
            &LaunchOptions::default(),
        );
        config.override_stream_offset_support(true, false);
        assert!(!config.supports(HardwareFeatures::STREAM_OFFSET));
        config.override_stream_offset_support(false, false);
        assert!(config.supports(HardwareFeatures::STREAM_OFFSET));

        let mut card = sm3_card();
        card.features.remove(HardwareFeatures::STREAM_OFFSET);
        let mut config = HardwareConfig::setup(
            card,
            &ShaderDeviceInfo::default(),
            &NoCapsOverrides,
            &LaunchOptions::default(),
        );
        config.override_stream_offset_support(true, true);
        assert!(!config.supports(HardwareFeatures::STREAM_OFFSET));
    }
}
