//! Tessel Render
//!
//! A deferred, diffed render-state commit engine. Callers bind shaders,
//! buffers and fixed-function state freely; nothing reaches the native device
//! until a draw or clear commits the pending changes, and then only the
//! values that actually differ are sent.
//!
//! - [`ShaderApi`] - binding, commits, draws and resource lifetimes
//! - [`ShaderDeviceManager`] / [`HardwareConfig`] - adapter probing and per-mode caps
//! - [`VertexFormat`] - vertex stream layouts and the fallback stream
//! - [`LaunchOptions`] - command line switches that influence caps

pub mod buffer;
pub mod caps;
pub mod commit;
pub mod device_manager;
pub mod error;
pub mod handles;
pub mod input_layout;
pub mod launch;
pub mod lock;
pub mod shader;
pub mod shader_api;
pub mod state;
pub mod state_objects;
pub mod vertex_format;

pub use buffer::{BufferStatus, LockDesc, LockError};
pub use caps::{
    CapsOverride, CapsOverrideRule, CapsOverrideSource, CapsOverrideTable, DxLevel, HardwareCaps,
    HardwareConfig, HardwareFeatures, NoCapsOverrides, ShadowFilterMode,
};
pub use commit::{CommitFunc, CommitMask};
pub use device_manager::{DeviceError, ShaderDeviceManager};
pub use error::ShaderApiError;
pub use handles::*;
pub use launch::{LaunchOptions, ShaderDeviceInfo};
pub use lock::NullRawMutex;
pub use shader_api::{IndexBufferLock, LocalShaderApi, ShaderApi, SharedShaderApi, VertexBufferLock};
pub use state::{FALLBACK_STREAM, MAX_VERTEX_STREAMS, PipelineState, StreamFormats};
pub use vertex_format::{VertexField, VertexFlags, VertexFormat};
