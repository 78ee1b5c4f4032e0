//! Adapter enumeration and per-mode hardware configuration.

use std::fmt;
use std::sync::Arc;

use tessel_test_utils::AdapterSource;

use crate::caps::{CapsOverrideSource, HardwareCaps, HardwareConfig};
use crate::launch::{LaunchOptions, ShaderDeviceInfo};

/// Device setup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No adapter with this index exists.
    NoSuchAdapter(usize),
    /// The adapter exists but could not be probed.
    AdapterUnusable(usize),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchAdapter(index) => write!(f, "No adapter with index {}", index),
            Self::AdapterUnusable(index) => write!(f, "Adapter {} could not be probed", index),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Probes every adapter once and hands out hardware configs per mode set.
pub struct ShaderDeviceManager {
    adapters: Vec<HardwareCaps>,
    overrides: Arc<dyn CapsOverrideSource>,
    launch: LaunchOptions,
}

impl ShaderDeviceManager {
    /// Probes all adapters of `source`.
    ///
    /// Config overrides are applied to each adapter at its max DX level.
    /// Adapters whose properties cannot be read are kept but marked unusable.
    pub fn new(
        source: &dyn AdapterSource,
        overrides: Arc<dyn CapsOverrideSource>,
        launch: LaunchOptions,
    ) -> Self {
        let adapters = (0..source.adapter_count())
            .map(|index| match source.adapter_properties(index) {
                Some(props) => {
                    let mut caps = HardwareCaps::from_adapter(&props, &launch);
                    let level = caps.max_dx_support_level;
                    overrides.read_hardware_caps(&mut caps, level);
                    tracing::info!(
                        "Adapter {}: '{}' ({:04x}:{:04x}), dx levels {}..={}",
                        index,
                        caps.description,
                        caps.vendor_id,
                        caps.device_id,
                        caps.min_dx_support_level,
                        caps.max_dx_support_level
                    );
                    caps
                }
                None => {
                    tracing::warn!("Failed to query properties of adapter {}", index);
                    HardwareCaps {
                        device_ok: false,
                        ..Default::default()
                    }
                }
            })
            .collect();

        Self {
            adapters,
            overrides,
            launch,
        }
    }

    pub fn adapter_count(&self) -> usize {
        self.adapters.len()
    }

    /// Actual caps of an adapter.
    pub fn adapter_caps(&self, adapter: usize) -> Option<&HardwareCaps> {
        self.adapters.get(adapter)
    }

    pub fn launch_options(&self) -> &LaunchOptions {
        &self.launch
    }

    /// Computes the hardware config for running `adapter` in `mode`.
    pub fn set_mode(
        &self,
        adapter: usize,
        mode: &ShaderDeviceInfo,
    ) -> Result<HardwareConfig, DeviceError> {
        let actual = self
            .adapters
            .get(adapter)
            .ok_or(DeviceError::NoSuchAdapter(adapter))?;
        if !actual.device_ok {
            return Err(DeviceError::AdapterUnusable(adapter));
        }
        Ok(HardwareConfig::setup(
            actual.clone(),
            mode,
            self.overrides.as_ref(),
            &self.launch,
        ))
    }
}
