//! Shared setup for shader API integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::lock_api::RawMutex;
use tessel_render::{
    HardwareConfig, LaunchOptions, NoCapsOverrides, ShaderApi, ShaderDeviceInfo, ShaderDeviceManager,
    SharedShaderApi,
};
use tessel_test_utils::{AdapterProperties, MockNativeDevice, NativeCall};

pub fn mock_adapter() -> AdapterProperties {
    AdapterProperties {
        description: "Mock Adapter".into(),
        vendor_id: 0x10DE,
        device_id: 0x0400,
        ..Default::default()
    }
}

/// Probes the mock adapter and sets a default mode.
pub fn mock_config(mock: &MockNativeDevice) -> HardwareConfig {
    let manager = ShaderDeviceManager::new(mock, Arc::new(NoCapsOverrides), LaunchOptions::default());
    manager
        .set_mode(0, &ShaderDeviceInfo::default())
        .expect("mock adapter should be usable")
}

/// A fresh thread-safe engine on a mock device, with the setup calls cleared.
pub fn setup() -> (Arc<MockNativeDevice>, SharedShaderApi) {
    setup_with_lock()
}

pub fn setup_with_lock<R: RawMutex>() -> (Arc<MockNativeDevice>, ShaderApi<R>) {
    let _ = tessel_core::logging::try_init();
    let mock = Arc::new(MockNativeDevice::with_adapters(vec![mock_adapter()]));
    let config = mock_config(&mock);
    let api = ShaderApi::new(mock.clone(), config).expect("engine creation should succeed");
    mock.clear_calls();
    (mock, api)
}

pub fn is_set_vertex_buffers(call: &NativeCall) -> bool {
    matches!(call, NativeCall::SetVertexBuffers { .. })
}

/// Vertex buffer bind calls as `(start_slot, binding_count)`.
pub fn vertex_buffer_ranges(mock: &MockNativeDevice) -> Vec<(u32, usize)> {
    mock.calls()
        .into_iter()
        .filter_map(|call| match call {
            NativeCall::SetVertexBuffers { start_slot, bindings } => Some((start_slot, bindings.len())),
            _ => None,
        })
        .collect()
}
