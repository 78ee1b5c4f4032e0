//! Per-hardware capability overrides.
//!
//! The engine consumes overrides as a black box: a [`CapsOverrideSource`]
//! mutates a [`HardwareCaps`] record in place for a given DX level. The
//! bundled [`CapsOverrideTable`] only ever removes features or lowers limits.

use std::ops::RangeInclusive;

use super::{DxLevel, HardwareCaps, HardwareFeatures};

/// Source of hardware-specific capability overrides.
pub trait CapsOverrideSource: Send + Sync {
    /// Apply every override matching `caps` at `level`.
    fn read_hardware_caps(&self, caps: &mut HardwareCaps, level: DxLevel);
}

/// Applies no overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapsOverrides;

impl CapsOverrideSource for NoCapsOverrides {
    fn read_hardware_caps(&self, _caps: &mut HardwareCaps, _level: DxLevel) {}
}

/// What a matching rule does to the capability record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsOverride {
    /// Features to remove.
    pub disable: HardwareFeatures,
    /// Lower the max DX level to at most this.
    pub max_dx_level: Option<DxLevel>,
    /// Clamp both texture dimensions.
    pub max_texture_size: Option<u32>,
    pub max_lights: Option<u32>,
    pub max_anisotropy: Option<u32>,
}

impl CapsOverride {
    fn apply(&self, caps: &mut HardwareCaps) {
        caps.features.remove(self.disable);
        if let Some(level) = self.max_dx_level {
            let level = level.max(caps.min_dx_support_level);
            caps.max_dx_support_level = caps.max_dx_support_level.min(level);
            caps.dx_support_level = caps.dx_support_level.min(caps.max_dx_support_level);
        }
        if let Some(size) = self.max_texture_size {
            caps.max_texture_width = caps.max_texture_width.min(size);
            caps.max_texture_height = caps.max_texture_height.min(size);
        }
        if let Some(lights) = self.max_lights {
            caps.max_lights = caps.max_lights.min(lights);
        }
        if let Some(anisotropy) = self.max_anisotropy {
            caps.max_anisotropy = caps.max_anisotropy.min(anisotropy);
        }
    }
}

/// One section of the override table. `None` selectors match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapsOverrideRule {
    pub dx_level: Option<DxLevel>,
    pub vendor_id: Option<u32>,
    pub device_ids: Option<RangeInclusive<u32>>,
    /// Matches adapters with at most this much video memory.
    pub max_video_memory_mb: Option<u32>,
    pub overrides: CapsOverride,
}

impl CapsOverrideRule {
    pub fn matches(&self, caps: &HardwareCaps, level: DxLevel) -> bool {
        self.dx_level.is_none_or(|l| l == level)
            && self.vendor_id.is_none_or(|v| v == caps.vendor_id)
            && self
                .device_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&caps.device_id))
            && self
                .max_video_memory_mb
                .is_none_or(|mb| caps.video_memory_mb <= mb)
    }
}

/// An in-memory override table, applied in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CapsOverrideTable {
    rules: Vec<CapsOverrideRule>,
}

impl CapsOverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: CapsOverrideRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: CapsOverrideRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl CapsOverrideSource for CapsOverrideTable {
    fn read_hardware_caps(&self, caps: &mut HardwareCaps, level: DxLevel) {
        for rule in &self.rules {
            if !rule.matches(caps, level) {
                continue;
            }
            tracing::debug!(
                "Applying caps override for {:04x}:{:04x} at dx level {}",
                caps.vendor_id,
                caps.device_id,
                level
            );
            rule.overrides.apply(caps);
        }
    }
}
