//! DirectX feature tiers and the per-tier capability clamp.

use std::fmt;

use super::{HardwareCaps, HardwareFeatures};

/// A hardware capability tier, encoded as `dx_version * 10 + sub_level`.
///
/// - 90: shader model 2.0
/// - 92: shader model 2.0b
/// - 95: shader model 3.0 with vertex textures
/// - 100: DX10-class hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DxLevel(u16);

impl DxLevel {
    pub const DX90: DxLevel = DxLevel(90);
    pub const DX92: DxLevel = DxLevel(92);
    pub const DX95: DxLevel = DxLevel(95);
    pub const DX100: DxLevel = DxLevel(100);

    /// All tiers the engine has fallbacks for, lowest first.
    pub const SUPPORTED: [DxLevel; 4] = [Self::DX90, Self::DX92, Self::DX95, Self::DX100];

    pub const fn new(level: u16) -> Self {
        Self(level)
    }

    pub const fn get(self) -> u16 {
        self.0
    }

    /// Snaps an arbitrary level down to the nearest supported tier.
    ///
    /// Anything below 90 maps to 90.
    pub fn closest_supported(self) -> DxLevel {
        Self::SUPPORTED
            .iter()
            .rev()
            .copied()
            .find(|tier| *tier <= self)
            .unwrap_or(Self::DX90)
    }

    pub fn is_supported_tier(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

impl fmt::Display for DxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a tier is allowed to expose.
struct TierLimits {
    features: HardwareFeatures,
    max_texture_size: u32,
    max_lights: u32,
    max_anisotropy: u32,
}

fn tier_limits(level: DxLevel) -> TierLimits {
    let dx90 = HardwareFeatures::SRGB | HardwareFeatures::STREAM_OFFSET | HardwareFeatures::BORDER_COLOR;
    let dx92 = dx90
        | HardwareFeatures::PIXEL_SHADER_2_B
        | HardwareFeatures::SHADOW_DEPTH_TEXTURES
        | HardwareFeatures::FETCH4;
    let dx95 = dx92
        | HardwareFeatures::SHADER_MODEL_3_0
        | HardwareFeatures::VERTEX_TEXTURES
        | HardwareFeatures::HARDWARE_MORPH
        | HardwareFeatures::CASCADED_SHADOW_MAPPING
        | HardwareFeatures::GLSL_CONTROL_FLOW;

    match level.closest_supported() {
        DxLevel::DX90 => TierLimits {
            features: dx90,
            max_texture_size: 2048,
            max_lights: 2,
            max_anisotropy: 4,
        },
        DxLevel::DX92 => TierLimits {
            features: dx92,
            max_texture_size: 4096,
            max_lights: 4,
            max_anisotropy: 8,
        },
        DxLevel::DX95 => TierLimits {
            features: dx95,
            max_texture_size: 4096,
            max_lights: 4,
            max_anisotropy: 16,
        },
        _ => TierLimits {
            features: HardwareFeatures::all(),
            max_texture_size: u32::MAX,
            max_lights: u32::MAX,
            max_anisotropy: u32::MAX,
        },
    }
}

/// Clamps `caps` down to what `level` permits.
///
/// Features are intersected with the tier's allowed set and numeric limits
/// are lowered to the tier ceiling, so the result never exceeds the input.
pub fn force_caps_to_dx_level(caps: &HardwareCaps, level: DxLevel) -> HardwareCaps {
    let level = level.closest_supported();
    let limits = tier_limits(level);

    let mut clamped = caps.clone();
    clamped.features &= limits.features;
    clamped.max_texture_width = clamped.max_texture_width.min(limits.max_texture_size);
    clamped.max_texture_height = clamped.max_texture_height.min(limits.max_texture_size);
    clamped.max_lights = clamped.max_lights.min(limits.max_lights);
    clamped.max_anisotropy = clamped.max_anisotropy.min(limits.max_anisotropy);
    clamped.dx_support_level = level.min(caps.max_dx_support_level);
    clamped
}
