//! The shader API: binding calls, deferred state commits and draws.
//!
//! Binding calls only write the desired pipeline state and queue a commit
//! function when a value changes. Draws set the topology, run the queued
//! commit functions (each issuing the minimal native calls needed to make the
//! device match) and then draw.
//!
//! # Locking
//!
//! Every entry point takes one engine-wide lock. The lock type is a type
//! parameter chosen at construction:
//!
//! - [`SharedShaderApi`] uses `parking_lot::RawMutex` and can be shared across threads
//! - [`LocalShaderApi`] uses [`NullRawMutex`](crate::lock::NullRawMutex) and cannot
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use std::sync::Arc;
//! use tessel_render::{
//!     HardwareCaps, HardwareConfig, LaunchOptions, NoCapsOverrides, SharedShaderApi, ShaderDeviceInfo,
//!     VertexFormat,
//! };
//! use tessel_test_utils::{mock_bytecode, MockNativeDevice, NativeCall};
//!
//! let mock = Arc::new(MockNativeDevice::new());
//! let config = HardwareConfig::setup(
//!     HardwareCaps::default(),
//!     &ShaderDeviceInfo::default(),
//!     &NoCapsOverrides,
//!     &LaunchOptions::default(),
//! );
//! let api = SharedShaderApi::new(mock.clone(), config).unwrap();
//!
//! let shader = api.create_vertex_shader(&mock_bytecode(&["POSITION"])).unwrap();
//! let vertices = api.create_vertex_buffer(Some(VertexFormat::position()), 3, false).unwrap();
//! api.bind_vertex_shader(Some(shader)).unwrap();
//! api.bind_vertex_buffer(0, Some(vertices), 0).unwrap();
//! api.draw_vertices(wgpu::PrimitiveTopology::TriangleList, 0, 3);
//!
//! assert_eq!(mock.count(|c| matches!(c, NativeCall::Draw { vertex_count: 3, .. })), 1);
//! # }
//! ```

mod buffer_lock;
mod commit_funcs;
mod resources;
mod state;

pub use buffer_lock::{IndexBufferLock, VertexBufferLock};

use std::sync::Arc;

use parking_lot::lock_api::{Mutex, RawMutex};
use tessel_test_utils::{
    BlendDesc, DepthStencilDesc, NativeDevice, NativeInputLayout, RasterizerDesc, Viewport,
};

use crate::buffer::{BufferStatus, LockError};
use crate::caps::HardwareConfig;
use crate::commit::CommitFunc;
use crate::error::ShaderApiError;
use crate::handles::{
    GeometryShaderHandle, IndexBufferHandle, PixelShaderHandle, VertexBufferHandle, VertexShaderHandle,
};
use crate::lock::NullRawMutex;
use crate::state::{PipelineState, StreamFormats};
use crate::vertex_format::VertexFormat;
use state::ShaderApiState;

/// Shader API usable from any thread.
pub type SharedShaderApi = ShaderApi<parking_lot::RawMutex>;

/// Shader API for single-threaded use; its lock never blocks.
pub type LocalShaderApi = ShaderApi<NullRawMutex>;

/// The render state commit and resource binding engine.
pub struct ShaderApi<R: RawMutex = parking_lot::RawMutex> {
    state: Mutex<R, ShaderApiState>,
}

impl<R: RawMutex> ShaderApi<R> {
    /// Creates the engine on `device` and performs a full state reset.
    pub fn new(device: Arc<dyn NativeDevice>, config: HardwareConfig) -> Result<Self, ShaderApiError> {
        let state = ShaderApiState::new(device, config)?;
        tracing::info!("Shader API initialized at dx level {}", state.config.dx_support_level());
        Ok(Self {
            state: Mutex::new(state),
        })
    }

    pub fn hardware_config(&self) -> HardwareConfig {
        self.state.lock().config.clone()
    }

    /// See [`HardwareConfig::override_stream_offset_support`].
    pub fn override_stream_offset_support(&self, override_enabled: bool, enable: bool) {
        self.state
            .lock()
            .config
            .override_stream_offset_support(override_enabled, enable);
    }

    // Shaders

    pub fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<VertexShaderHandle, ShaderApiError> {
        self.state.lock().create_vertex_shader(bytecode)
    }

    pub fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<PixelShaderHandle, ShaderApiError> {
        self.state.lock().create_pixel_shader(bytecode)
    }

    pub fn create_geometry_shader(&self, bytecode: &[u8]) -> Result<GeometryShaderHandle, ShaderApiError> {
        self.state.lock().create_geometry_shader(bytecode)
    }

    /// Unbinds the shader everywhere, then releases it and its input layouts.
    pub fn destroy_vertex_shader(&self, shader: VertexShaderHandle) -> Result<(), ShaderApiError> {
        self.state.lock().destroy_vertex_shader(shader)
    }

    pub fn destroy_pixel_shader(&self, shader: PixelShaderHandle) -> Result<(), ShaderApiError> {
        self.state.lock().destroy_pixel_shader(shader)
    }

    pub fn destroy_geometry_shader(&self, shader: GeometryShaderHandle) -> Result<(), ShaderApiError> {
        self.state.lock().destroy_geometry_shader(shader)
    }

    /// Binds a vertex shader. Binding a stale handle changes nothing.
    pub fn bind_vertex_shader(&self, shader: Option<VertexShaderHandle>) -> Result<(), ShaderApiError> {
        let mut state = self.state.lock();
        if let Some(handle) = shader
            && !state.vertex_shaders.contains(handle)
        {
            tracing::warn!("Ignoring bind of invalid vertex shader {:?}", handle);
            return Err(ShaderApiError::InvalidHandle);
        }
        state.set_vertex_shader(shader);
        Ok(())
    }

    pub fn bind_pixel_shader(&self, shader: Option<PixelShaderHandle>) -> Result<(), ShaderApiError> {
        let mut state = self.state.lock();
        if let Some(handle) = shader
            && !state.pixel_shaders.contains(handle)
        {
            tracing::warn!("Ignoring bind of invalid pixel shader {:?}", handle);
            return Err(ShaderApiError::InvalidHandle);
        }
        state.set_pixel_shader(shader);
        Ok(())
    }

    pub fn bind_geometry_shader(&self, shader: Option<GeometryShaderHandle>) -> Result<(), ShaderApiError> {
        let mut state = self.state.lock();
        if let Some(handle) = shader
            && !state.geometry_shaders.contains(handle)
        {
            tracing::warn!("Ignoring bind of invalid geometry shader {:?}", handle);
            return Err(ShaderApiError::InvalidHandle);
        }
        state.set_geometry_shader(shader);
        Ok(())
    }

    /// Native input layout for a shader reading `formats`.
    ///
    /// Returns `None` for an invalid shader or if the layout cannot be built.
    pub fn get_input_layout(
        &self,
        shader: VertexShaderHandle,
        formats: &StreamFormats,
    ) -> Option<NativeInputLayout> {
        self.state.lock().input_layout(Some(shader), formats)
    }

    /// Number of input layouts cached for `shader`, or `None` if it is invalid.
    pub fn cached_input_layouts(&self, shader: VertexShaderHandle) -> Option<usize> {
        self.state
            .lock()
            .vertex_shaders
            .get(shader)
            .map(|s| s.layouts.len())
    }

    // Buffers

    /// Creates a vertex buffer of `count` vertices.
    ///
    /// Without a format, `count` is a byte size and the buffer must be cast
    /// with [`begin_cast_vertex_buffer`](Self::begin_cast_vertex_buffer)
    /// before it can be locked.
    pub fn create_vertex_buffer(
        &self,
        format: Option<VertexFormat>,
        count: u32,
        dynamic: bool,
    ) -> Result<VertexBufferHandle, ShaderApiError> {
        self.state.lock().create_vertex_buffer(format, count, dynamic)
    }

    pub fn create_index_buffer(
        &self,
        format: Option<wgpu::IndexFormat>,
        count: u32,
        dynamic: bool,
    ) -> Result<IndexBufferHandle, ShaderApiError> {
        self.state.lock().create_index_buffer(format, count, dynamic)
    }

    pub fn destroy_vertex_buffer(&self, buffer: VertexBufferHandle) -> Result<(), ShaderApiError> {
        self.state.lock().destroy_vertex_buffer(buffer)
    }

    pub fn destroy_index_buffer(&self, buffer: IndexBufferHandle) -> Result<(), ShaderApiError> {
        self.state.lock().destroy_index_buffer(buffer)
    }

    /// Binds `buffer` to `stream` at `byte_offset`.
    ///
    /// The last stream is reserved for constant fallback data.
    pub fn bind_vertex_buffer(
        &self,
        stream: usize,
        buffer: Option<VertexBufferHandle>,
        byte_offset: u32,
    ) -> Result<(), ShaderApiError> {
        self.state.lock().bind_vertex_buffer(stream, buffer, byte_offset)
    }

    pub fn bind_index_buffer(
        &self,
        buffer: Option<IndexBufferHandle>,
        byte_offset: u32,
    ) -> Result<(), ShaderApiError> {
        self.state.lock().bind_index_buffer(buffer, byte_offset)
    }

    /// Locks room for up to `max_vertices` vertices.
    ///
    /// The returned guard holds the engine lock until it is unlocked or dropped.
    pub fn lock_vertex_buffer(
        &self,
        buffer: VertexBufferHandle,
        max_vertices: u32,
        append: bool,
    ) -> Result<VertexBufferLock<'_, R>, LockError> {
        let mut state = self.state.lock();
        let desc = state.lock_vertex_buffer(buffer, max_vertices, append)?;
        Ok(VertexBufferLock::new(state, buffer, desc))
    }

    pub fn lock_index_buffer(
        &self,
        buffer: IndexBufferHandle,
        max_indices: u32,
        append: bool,
    ) -> Result<IndexBufferLock<'_, R>, LockError> {
        let mut state = self.state.lock();
        let desc = state.lock_index_buffer(buffer, max_indices, append)?;
        Ok(IndexBufferLock::new(state, buffer, desc))
    }

    /// Makes the next lock of a dynamic vertex buffer discard its contents.
    pub fn flush_vertex_buffer(&self, buffer: VertexBufferHandle) {
        if let Some(entry) = self.state.lock().vertex_buffers.get_mut(buffer) {
            entry.core.flush();
        }
    }

    pub fn flush_index_buffer(&self, buffer: IndexBufferHandle) {
        if let Some(entry) = self.state.lock().index_buffers.get_mut(buffer) {
            entry.core.flush();
        }
    }

    /// Views a format-less vertex buffer as `format` until
    /// [`end_cast_vertex_buffer`](Self::end_cast_vertex_buffer).
    ///
    /// Streams that already bind the buffer pick up the new stride and format.
    pub fn begin_cast_vertex_buffer(&self, buffer: VertexBufferHandle, format: VertexFormat) -> bool {
        self.state.lock().begin_cast_vertex_buffer(buffer, format)
    }

    pub fn end_cast_vertex_buffer(&self, buffer: VertexBufferHandle) {
        self.state.lock().end_cast_vertex_buffer(buffer);
    }

    pub fn begin_cast_index_buffer(&self, buffer: IndexBufferHandle, format: wgpu::IndexFormat) -> bool {
        self.state.lock().begin_cast_index_buffer(buffer, format)
    }

    pub fn end_cast_index_buffer(&self, buffer: IndexBufferHandle) {
        self.state.lock().end_cast_index_buffer(buffer);
    }

    /// Vertices that still fit after the write cursor.
    pub fn vertex_buffer_room(&self, buffer: VertexBufferHandle) -> Option<u32> {
        self.state
            .lock()
            .vertex_buffers
            .get(buffer)
            .map(|entry| entry.core.room_remaining())
    }

    pub fn index_buffer_room(&self, buffer: IndexBufferHandle) -> Option<u32> {
        self.state
            .lock()
            .index_buffers
            .get(buffer)
            .map(|entry| entry.core.room_remaining())
    }

    pub fn vertex_buffer_status(&self, buffer: VertexBufferHandle) -> Option<BufferStatus> {
        self.state.lock().vertex_buffer_status(buffer)
    }

    pub fn index_buffer_status(&self, buffer: IndexBufferHandle) -> Option<BufferStatus> {
        self.state.lock().index_buffer_status(buffer)
    }

    /// Frees the native objects of all dynamic buffers after a device loss.
    pub fn release_dynamic_resources(&self) {
        self.state.lock().release_dynamic_resources();
    }

    // Fixed-function state

    pub fn set_rasterizer_state(&self, desc: RasterizerDesc) {
        self.state.lock().set_rasterizer_state(desc);
    }

    pub fn set_depth_stencil_state(&self, desc: DepthStencilDesc) {
        self.state.lock().set_depth_stencil_state(desc);
    }

    pub fn set_blend_state(&self, desc: BlendDesc) {
        self.state.lock().set_blend_state(desc);
    }

    pub fn set_viewports(&self, viewports: &[Viewport]) {
        self.state.lock().set_viewports(viewports);
    }

    pub fn set_topology(&self, topology: wgpu::PrimitiveTopology) {
        self.state.lock().set_topology(Some(topology));
    }

    pub fn set_clear_color(&self, color: wgpu::Color) {
        self.state.lock().desired.clear_color = color;
    }

    // Commits and draws

    /// Runs the queued commit functions. Does nothing while deactivated.
    pub fn commit_state_changes(&self, force: bool) {
        self.state.lock().commit_state_changes(force);
    }

    /// Commit functions queued for the next commit, in order.
    pub fn pending_commits(&self) -> Vec<CommitFunc> {
        self.state.lock().registry.pending().to_vec()
    }

    /// Draws `index_count` indices starting at `first_index`.
    pub fn draw(&self, topology: wgpu::PrimitiveTopology, first_index: u32, index_count: u32) {
        self.state.lock().draw(topology, first_index, index_count);
    }

    /// Draws without an index buffer.
    pub fn draw_vertices(&self, topology: wgpu::PrimitiveTopology, first_vertex: u32, vertex_count: u32) {
        self.state.lock().draw_vertices(topology, first_vertex, vertex_count);
    }

    /// Clears the render target to the clear colour and/or depth and stencil.
    pub fn clear_buffers(&self, color: bool, depth: Option<f32>, stencil: Option<u8>) {
        self.state.lock().clear_buffers(color, depth, stencil);
    }

    pub fn reset_render_state(&self, full: bool) {
        self.state.lock().reset_render_state(full);
    }

    /// Marks the device deactivated (e.g. minimized) or active again.
    ///
    /// Reactivation forces a full state reset.
    pub fn set_deactivated(&self, deactivated: bool) {
        self.state.lock().set_deactivated(deactivated);
    }

    pub fn is_deactivated(&self) -> bool {
        self.state.lock().deactivated
    }

    pub fn desired_state(&self) -> PipelineState {
        self.state.lock().desired.clone()
    }

    pub fn current_state(&self) -> PipelineState {
        self.state.lock().current.clone()
    }

    /// The internal buffer bound to the fallback stream.
    pub fn fallback_vertex_buffer(&self) -> VertexBufferHandle {
        self.state.lock().fallback_buffer
    }
}

impl<R: RawMutex> Drop for ShaderApi<R> {
    fn drop(&mut self) {
        self.state.get_mut().shutdown();
    }
}
