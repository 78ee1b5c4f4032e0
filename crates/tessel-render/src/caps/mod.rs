//! Hardware capability table.
//!
//! A [`HardwareCaps`] record is produced once per adapter by probing
//! ([`HardwareCaps::from_adapter`]) and then refined into the three
//! generations kept by [`HardwareConfig`]:
//!
//! - **actual**: what the adapter reported, after config overrides at its max level
//! - **requested**: actual clamped to the chosen DX level plus launch-option removals
//! - **unoverridden**: requested before any runtime override
//!
//! Refinement only ever removes features or lowers limits.

mod config;
mod dx_level;
mod overrides;

pub use config::HardwareConfig;
pub use dx_level::{DxLevel, force_caps_to_dx_level};
pub use overrides::{CapsOverride, CapsOverrideRule, CapsOverrideSource, CapsOverrideTable, NoCapsOverrides};

use bitflags::bitflags;
use tessel_test_utils::AdapterProperties;

use crate::launch::LaunchOptions;

/// PCI vendor id of ATI/AMD.
pub const VENDOR_ID_ATI: u32 = 0x1002;
/// PCI vendor id of NVIDIA.
pub const VENDOR_ID_NVIDIA: u32 = 0x10DE;
/// PCI vendor id of Intel.
pub const VENDOR_ID_INTEL: u32 = 0x8086;

/// First vertex shader constant register available for bone matrices.
const MODEL_CONSTANT_BASE: u32 = 58;
/// Upper bound on skinning matrices regardless of constant count.
const MAX_MODEL_TRANSFORMS: u32 = 53;

bitflags! {
    /// Boolean hardware features.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HardwareFeatures: u32 {
        /// Pixel shader model 2.0b.
        const PIXEL_SHADER_2_B = 1 << 0;
        /// Vertex and pixel shader model 3.0.
        const SHADER_MODEL_3_0 = 1 << 1;
        /// DX10-class part running through this API.
        const DX10_CARD = 1 << 2;
        /// sRGB reads and writes.
        const SRGB = 1 << 3;
        /// Non-zero byte offsets when binding vertex streams.
        const STREAM_OFFSET = 1 << 4;
        /// Texture fetches from vertex shaders.
        const VERTEX_TEXTURES = 1 << 5;
        /// GPU vertex morphing (needs vertex textures).
        const HARDWARE_MORPH = 1 << 6;
        /// Depth textures usable as shadow maps.
        const SHADOW_DEPTH_TEXTURES = 1 << 7;
        /// ATI Fetch4 shadow filtering.
        const FETCH4 = 1 << 8;
        /// Border colour texture addressing.
        const BORDER_COLOR = 1 << 9;
        /// Cascaded shadow maps. Overrides may only disable this.
        const CASCADED_SHADOW_MAPPING = 1 << 10;
        /// Dynamic control flow in translated GLSL shaders.
        const GLSL_CONTROL_FLOW = 1 << 11;
    }
}

/// How shadow depth maps are filtered on this hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowFilterMode {
    /// No shadow depth textures; shadows are disabled.
    None,
    /// Hardware percentage-closer filtering.
    Pcf,
    /// ATI Fetch4 four-sample gather.
    Fetch4,
}

/// A flat record of adapter capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareCaps {
    /// False if probing failed; such adapters cannot be used.
    pub device_ok: bool,
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub dx_support_level: DxLevel,
    pub min_dx_support_level: DxLevel,
    pub max_dx_support_level: DxLevel,
    pub features: HardwareFeatures,
    pub max_texture_width: u32,
    pub max_texture_height: u32,
    pub max_anisotropy: u32,
    pub max_lights: u32,
    pub max_vertex_streams: u32,
    pub max_user_clip_planes: u32,
    pub max_simultaneous_render_targets: u32,
    pub num_vertex_shader_constants: u32,
    pub max_vertex_shader_blend_matrices: u32,
    pub video_memory_mb: u32,
}

impl Default for HardwareCaps {
    fn default() -> Self {
        Self {
            device_ok: true,
            description: String::new(),
            vendor_id: 0,
            device_id: 0,
            dx_support_level: DxLevel::DX90,
            min_dx_support_level: DxLevel::DX90,
            max_dx_support_level: DxLevel::DX90,
            features: HardwareFeatures::empty(),
            max_texture_width: 2048,
            max_texture_height: 2048,
            max_anisotropy: 1,
            max_lights: 2,
            max_vertex_streams: 16,
            max_user_clip_planes: 0,
            max_simultaneous_render_targets: 1,
            num_vertex_shader_constants: 256,
            max_vertex_shader_blend_matrices: 0,
            video_memory_mb: 0,
        }
    }
}

impl HardwareCaps {
    /// Builds a capability record from raw adapter properties.
    ///
    /// Config overrides are not applied here; the device manager reads them
    /// at the resulting max level.
    pub fn from_adapter(props: &AdapterProperties, launch: &LaunchOptions) -> Self {
        let mut features = HardwareFeatures::empty();
        features.set(HardwareFeatures::PIXEL_SHADER_2_B, props.pixel_shader_model >= 21);
        features.set(
            HardwareFeatures::SHADER_MODEL_3_0,
            props.pixel_shader_model >= 30 && props.vertex_shader_model >= 30,
        );
        features.set(HardwareFeatures::DX10_CARD, props.dx10_card);
        features.set(HardwareFeatures::SRGB, props.supports_srgb);
        features.set(HardwareFeatures::STREAM_OFFSET, props.supports_stream_offset);
        features.set(HardwareFeatures::VERTEX_TEXTURES, props.supports_vertex_textures);
        features.set(
            HardwareFeatures::HARDWARE_MORPH,
            props.dx10_card && props.supports_vertex_textures,
        );
        features.set(HardwareFeatures::SHADOW_DEPTH_TEXTURES, props.supports_shadow_depth_textures);
        features.set(
            HardwareFeatures::CASCADED_SHADOW_MAPPING,
            props.supports_shadow_depth_textures,
        );
        features.set(HardwareFeatures::BORDER_COLOR, props.supports_border_color);
        features.set(
            HardwareFeatures::GLSL_CONTROL_FLOW,
            features.contains(HardwareFeatures::SHADER_MODEL_3_0),
        );

        // ATI ps_2_b parts gather four shadow samples with Fetch4, but their
        // DX10 parts are faster on the PCF path unless explicitly forced.
        let fetch4 = props.vendor_id == VENDOR_ID_ATI
            && features.contains(HardwareFeatures::PIXEL_SHADER_2_B)
            && props.supports_fetch4_format
            && (!props.dx10_card || launch.force_ati_fetch4);
        features.set(HardwareFeatures::FETCH4, fetch4);

        let max_vertex_shader_blend_matrices = (props
            .num_vertex_shader_constants
            .saturating_sub(MODEL_CONSTANT_BASE)
            / 3)
        .min(MAX_MODEL_TRANSFORMS);

        let mut caps = Self {
            device_ok: true,
            description: props.description.clone(),
            vendor_id: props.vendor_id,
            device_id: props.device_id,
            features,
            max_texture_width: props.max_texture_width,
            max_texture_height: props.max_texture_height,
            max_anisotropy: props.max_anisotropy,
            max_lights: props.max_lights,
            max_vertex_streams: props.max_vertex_streams,
            max_user_clip_planes: props.max_user_clip_planes,
            max_simultaneous_render_targets: props.max_simultaneous_render_targets,
            num_vertex_shader_constants: props.num_vertex_shader_constants,
            max_vertex_shader_blend_matrices,
            video_memory_mb: props.video_memory_mb,
            ..Default::default()
        };
        caps.compute_dx_support_level();
        caps
    }

    /// Derives the min/max DX levels from the feature set.
    pub fn compute_dx_support_level(&mut self) {
        let (min, max) = if self.features.contains(HardwareFeatures::DX10_CARD) {
            (DxLevel::DX92, DxLevel::DX100)
        } else if self.features.contains(HardwareFeatures::SHADER_MODEL_3_0) {
            (DxLevel::DX90, DxLevel::DX95)
        } else if self.features.contains(HardwareFeatures::PIXEL_SHADER_2_B) {
            (DxLevel::DX90, DxLevel::DX92)
        } else {
            if !self.features.contains(HardwareFeatures::SRGB) {
                tracing::warn!(
                    "Adapter '{}' lacks sRGB support; running at the lowest tier",
                    self.description
                );
            }
            (DxLevel::DX90, DxLevel::DX90)
        };
        self.min_dx_support_level = min;
        self.max_dx_support_level = max;
        self.dx_support_level = max;
    }

    pub fn supports(&self, features: HardwareFeatures) -> bool {
        self.features.contains(features)
    }

    pub fn shadow_filter_mode(&self) -> ShadowFilterMode {
        if !self.supports(HardwareFeatures::SHADOW_DEPTH_TEXTURES) {
            ShadowFilterMode::None
        } else if self.supports(HardwareFeatures::FETCH4) {
            ShadowFilterMode::Fetch4
        } else {
            ShadowFilterMode::Pcf
        }
    }

    /// Parts without user clip planes clip through the projection matrix instead.
    pub fn use_fast_clipping(&self) -> bool {
        self.max_user_clip_planes == 0
    }

    /// True if every feature and limit of `self` is also present in `other`.
    pub fn is_subset_of(&self, other: &HardwareCaps) -> bool {
        other.features.contains(self.features)
            && self.max_texture_width <= other.max_texture_width
            && self.max_texture_height <= other.max_texture_height
            && self.max_anisotropy <= other.max_anisotropy
            && self.max_lights <= other.max_lights
            && self.dx_support_level <= other.max_dx_support_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dx10_ati() -> AdapterProperties {
        AdapterProperties {
            description: "Radeon".into(),
            vendor_id: VENDOR_ID_ATI,
            device_id: 0x9400,
            pixel_shader_model: 40,
            vertex_shader_model: 40,
            dx10_card: true,
            supports_vertex_textures: true,
            supports_shadow_depth_textures: true,
            supports_fetch4_format: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_dx10_levels() {
        let caps = HardwareCaps::from_adapter(&dx10_ati(), &LaunchOptions::default());
        assert_eq!(caps.min_dx_support_level, DxLevel::DX92);
        assert_eq!(caps.max_dx_support_level, DxLevel::DX100);
        assert_eq!(caps.dx_support_level, DxLevel::DX100);
        assert!(caps.supports(HardwareFeatures::HARDWARE_MORPH));
    }

    #[test]
    fn test_fetch4_dropped_on_dx10_ati_unless_forced() {
        let caps = HardwareCaps::from_adapter(&dx10_ati(), &LaunchOptions::default());
        assert!(!caps.supports(HardwareFeatures::FETCH4));
        assert_eq!(caps.shadow_filter_mode(), ShadowFilterMode::Pcf);

        let forced = LaunchOptions {
            force_ati_fetch4: true,
            ..Default::default()
        };
        let caps = HardwareCaps::from_adapter(&dx10_ati(), &forced);
        assert!(caps.supports(HardwareFeatures::FETCH4));
        assert_eq!(caps.shadow_filter_mode(), ShadowFilterMode::Fetch4);
    }

    #[test]
    fn test_ps20_levels() {
        let props = AdapterProperties {
            pixel_shader_model: 20,
            vertex_shader_model: 20,
            ..Default::default()
        };
        let caps = HardwareCaps::from_adapter(&props, &LaunchOptions::default());
        assert_eq!(caps.max_dx_support_level, DxLevel::DX90);
        assert_eq!(caps.shadow_filter_mode(), ShadowFilterMode::None);
    }

    #[test]
    fn test_blend_matrices() {
        let caps = HardwareCaps::from_adapter(&AdapterProperties::default(), &LaunchOptions::default());
        assert_eq!(caps.max_vertex_shader_blend_matrices, 53);

        let props = AdapterProperties {
            num_vertex_shader_constants: 96,
            ..Default::default()
        };
        let caps = HardwareCaps::from_adapter(&props, &LaunchOptions::default());
        assert_eq!(caps.max_vertex_shader_blend_matrices, 12);
    }
}
