//! Adapter probing, mode setup and launch options.

mod common;

use std::sync::Arc;

use common::mock_adapter;
use tessel_render::caps::VENDOR_ID_ATI;
use tessel_render::{
    CapsOverride, CapsOverrideRule, CapsOverrideTable, DeviceError, DxLevel, HardwareFeatures,
    LaunchOptions, NoCapsOverrides, ShaderDeviceInfo, ShaderDeviceManager, ShadowFilterMode,
};
use tessel_test_utils::{AdapterProperties, MockNativeDevice};

fn manager(mock: &MockNativeDevice, launch: LaunchOptions) -> ShaderDeviceManager {
    ShaderDeviceManager::new(mock, Arc::new(NoCapsOverrides), launch)
}

fn ati_dx10_adapter() -> AdapterProperties {
    AdapterProperties {
        description: "ATI DX10".into(),
        vendor_id: VENDOR_ID_ATI,
        device_id: 0x9400,
        pixel_shader_model: 40,
        vertex_shader_model: 40,
        dx10_card: true,
        supports_fetch4_format: true,
        supports_shadow_depth_textures: true,
        supports_vertex_textures: true,
        ..Default::default()
    }
}

#[test]
fn test_adapter_caps_compute_dx_range() {
    let mock = MockNativeDevice::with_adapters(vec![mock_adapter(), ati_dx10_adapter()]);
    let manager = manager(&mock, LaunchOptions::default());
    assert_eq!(manager.adapter_count(), 2);

    let sm3 = manager.adapter_caps(0).unwrap();
    assert_eq!(sm3.min_dx_support_level, DxLevel::DX90);
    assert_eq!(sm3.max_dx_support_level, DxLevel::DX95);
    assert!(sm3.supports(HardwareFeatures::STREAM_OFFSET));

    let dx10 = manager.adapter_caps(1).unwrap();
    assert_eq!(dx10.min_dx_support_level, DxLevel::DX92);
    assert_eq!(dx10.max_dx_support_level, DxLevel::DX100);
}

#[test]
fn test_fetch4_needs_flag_on_dx10_ati() {
    let mock = MockNativeDevice::with_adapters(vec![ati_dx10_adapter()]);

    let caps = manager(&mock, LaunchOptions::default()).adapter_caps(0).cloned().unwrap();
    assert!(!caps.supports(HardwareFeatures::FETCH4));
    assert_eq!(caps.shadow_filter_mode(), ShadowFilterMode::Pcf);

    let forced = LaunchOptions::from_args(["-forceatifetch4"]);
    let caps = manager(&mock, forced).adapter_caps(0).cloned().unwrap();
    assert!(caps.supports(HardwareFeatures::FETCH4));
    assert_eq!(caps.shadow_filter_mode(), ShadowFilterMode::Fetch4);
}

#[test]
fn test_set_mode_errors() {
    let mock = MockNativeDevice::with_adapters(vec![mock_adapter()]);
    mock.push_broken_adapter();
    let manager = manager(&mock, LaunchOptions::default());

    assert!(!manager.adapter_caps(1).unwrap().device_ok);
    assert_eq!(
        manager.set_mode(1, &ShaderDeviceInfo::default()),
        Err(DeviceError::AdapterUnusable(1))
    );
    assert_eq!(
        manager.set_mode(5, &ShaderDeviceInfo::default()),
        Err(DeviceError::NoSuchAdapter(5))
    );
}

#[test]
fn test_requested_level_is_clamped() {
    let mock = MockNativeDevice::with_adapters(vec![mock_adapter()]);
    let manager = manager(&mock, LaunchOptions::default());

    let config = manager
        .set_mode(0, &ShaderDeviceInfo::with_dx_level(DxLevel::DX100))
        .unwrap();
    assert_eq!(config.dx_support_level(), DxLevel::DX95);

    let config = manager
        .set_mode(0, &ShaderDeviceInfo::with_dx_level(DxLevel::new(80)))
        .unwrap();
    assert_eq!(config.dx_support_level(), DxLevel::DX90);
    assert!(!config.supports(HardwareFeatures::SHADER_MODEL_3_0));
    assert!(config.actual().supports(HardwareFeatures::SHADER_MODEL_3_0));
}

#[test]
fn test_max_dx_level_flag() {
    let mock = MockNativeDevice::with_adapters(vec![mock_adapter()]);
    let launch = LaunchOptions::from_args(["-maxdxlevel", "92"]);
    assert_eq!(launch.max_dx_level, Some(DxLevel::DX92));

    let config = manager(&mock, launch)
        .set_mode(0, &ShaderDeviceInfo::default())
        .unwrap();
    assert_eq!(config.dx_support_level(), DxLevel::DX92);
    assert!(config.supports(HardwareFeatures::STREAM_OFFSET));
    assert!(!config.supports(HardwareFeatures::GLSL_CONTROL_FLOW));
}

#[test]
fn test_launch_flags_remove_features() {
    let mock = MockNativeDevice::with_adapters(vec![ati_dx10_adapter()]);
    let launch = LaunchOptions::from_args(["-DisallowHwMorph", "-noglslcontrolflow", "-unknown"]);
    assert!(launch.disallow_hw_morph);
    assert!(launch.no_glsl_control_flow);

    let config = manager(&mock, launch)
        .set_mode(0, &ShaderDeviceInfo::default())
        .unwrap();
    assert!(config.actual().supports(HardwareFeatures::HARDWARE_MORPH));
    assert!(!config.supports(HardwareFeatures::HARDWARE_MORPH));
    assert!(!config.supports(HardwareFeatures::GLSL_CONTROL_FLOW));
}

#[test]
fn test_override_table_applies_to_adapter_caps() {
    let mock = MockNativeDevice::with_adapters(vec![mock_adapter()]);
    let table = CapsOverrideTable::new().with_rule(CapsOverrideRule {
        vendor_id: Some(0x10DE),
        device_ids: Some(0x0400..=0x04FF),
        overrides: CapsOverride {
            max_texture_size: Some(1024),
            disable: HardwareFeatures::STREAM_OFFSET,
            ..Default::default()
        },
        ..Default::default()
    });
    let manager = ShaderDeviceManager::new(&mock, Arc::new(table), LaunchOptions::default());

    let caps = manager.adapter_caps(0).unwrap();
    assert_eq!(caps.max_texture_width, 1024);
    assert!(!caps.supports(HardwareFeatures::STREAM_OFFSET));

    let config = manager.set_mode(0, &ShaderDeviceInfo::default()).unwrap();
    assert!(!config.supports(HardwareFeatures::STREAM_OFFSET));
    assert!(config.requested().is_subset_of(config.actual()));
}

#[test]
fn test_stream_offset_override_cannot_exceed_card() {
    let mock = MockNativeDevice::with_adapters(vec![AdapterProperties {
        supports_stream_offset: false,
        ..mock_adapter()
    }]);
    let mut config = manager(&mock, LaunchOptions::default())
        .set_mode(0, &ShaderDeviceInfo::default())
        .unwrap();

    config.override_stream_offset_support(true, true);
    assert!(!config.supports(HardwareFeatures::STREAM_OFFSET));
}
