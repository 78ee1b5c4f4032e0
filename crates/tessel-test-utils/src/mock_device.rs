//! Mock implementation of [`NativeDevice`] for testing.
//!
//! This module provides a mock native device that records every call
//! without touching a GPU.
//!
//! # Mock bytecode
//!
//! Shader "bytecode" handed to the mock is interpreted as text:
//!
//! - empty bytecode fails native shader creation with [`NativeError::InvalidBytecode`]
//! - bytecode that is not UTF-8 creates a shader but fails reflection
//! - otherwise it is a whitespace-separated list of input semantics such as
//!   `POSITION NORMAL TEXCOORD0 TEXCOORD1`; trailing digits are the semantic index
//!
//! [`mock_bytecode`] builds such a blob.

use crate::{native_device::*, native_types::*};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};

/// Records a native call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    CreateVertexShader { shader: NativeShader },
    CreatePixelShader { shader: NativeShader },
    CreateGeometryShader { shader: NativeShader },
    ReflectShader,
    ReleaseShader { shader: NativeShader },
    CreateBuffer { buffer: NativeBuffer, size: u64, dynamic: bool },
    MapBuffer { buffer: NativeBuffer, offset: u64, size: u64, mode: MapMode },
    UnmapBuffer { buffer: NativeBuffer, offset: u64, len: usize },
    ReleaseBuffer { buffer: NativeBuffer },
    CreateInputLayout { layout: NativeInputLayout, elements: Vec<InputElement> },
    ReleaseInputLayout { layout: NativeInputLayout },
    CreateRasterizerState { state: NativeRasterizerState, desc: RasterizerDesc },
    CreateDepthStencilState { state: NativeDepthStencilState },
    CreateBlendState { state: NativeBlendState },
    ReleaseStateObject { object: NativeStateObject },
    SetViewports { viewports: Vec<Viewport> },
    SetVertexShader { shader: Option<NativeShader> },
    SetGeometryShader { shader: Option<NativeShader> },
    SetPixelShader { shader: Option<NativeShader> },
    SetVertexBuffers { start_slot: u32, bindings: Vec<NativeVertexBinding> },
    SetIndexBuffer { buffer: Option<NativeBuffer>, format: wgpu::IndexFormat, offset: u32 },
    SetInputLayout { layout: Option<NativeInputLayout> },
    SetRasterizerState { state: Option<NativeRasterizerState> },
    SetDepthStencilState { state: Option<NativeDepthStencilState> },
    SetBlendState { state: Option<NativeBlendState> },
    SetPrimitiveTopology { topology: wgpu::PrimitiveTopology },
    ClearRenderTarget { color: wgpu::Color },
    ClearDepthStencil { depth: Option<f32>, stencil: Option<u8> },
    Draw { vertex_count: u32, start_vertex: u32 },
    DrawIndexed { index_count: u32, start_index: u32, base_vertex: i32 },
}

impl NativeCall {
    /// Whether the call changes bound pipeline state or draws.
    pub fn is_pipeline_call(&self) -> bool {
        matches!(
            self,
            NativeCall::SetViewports { .. }
                | NativeCall::SetVertexShader { .. }
                | NativeCall::SetGeometryShader { .. }
                | NativeCall::SetPixelShader { .. }
                | NativeCall::SetVertexBuffers { .. }
                | NativeCall::SetIndexBuffer { .. }
                | NativeCall::SetInputLayout { .. }
                | NativeCall::SetRasterizerState { .. }
                | NativeCall::SetDepthStencilState { .. }
                | NativeCall::SetBlendState { .. }
                | NativeCall::SetPrimitiveTopology { .. }
                | NativeCall::Draw { .. }
                | NativeCall::DrawIndexed { .. }
        )
    }
}

/// Builds mock bytecode whose reflected input signature lists `semantics`.
pub fn mock_bytecode(semantics: &[&str]) -> Vec<u8> {
    let mut text = String::new();
    for (i, semantic) in semantics.iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(semantic);
    }
    if text.is_empty() {
        // Keep a non-empty blob so creation succeeds for shaders without inputs.
        text.push(' ');
    }
    text.into_bytes()
}

fn parse_semantic(token: &str) -> SignatureParameter {
    let name = token.trim_end_matches(|c: char| c.is_ascii_digit());
    let index = token[name.len()..].parse().unwrap_or(0);
    SignatureParameter::new(name, index)
}

#[derive(Default)]
struct MockState {
    calls: Vec<NativeCall>,
    next_id: u64,
    live: BTreeSet<u64>,
    buffer_contents: HashMap<NativeBuffer, Vec<u8>>,
    adapters: Vec<Option<AdapterProperties>>,
    fail_next_buffer_create: bool,
    fail_next_map: bool,
    fail_next_input_layout: bool,
    fail_next_state_object: bool,
}

impl MockState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.live.insert(self.next_id);
        self.next_id
    }

    fn release(&mut self, id: u64) {
        self.live.remove(&id);
    }
}

/// Mock implementation of [`NativeDevice`] and [`AdapterSource`].
///
/// # Example
///
/// ```rust
/// use tessel_test_utils::{mock_bytecode, MockNativeDevice, NativeCall, NativeDevice};
///
/// let mock = MockNativeDevice::new();
/// let shader = mock.create_vertex_shader(&mock_bytecode(&["POSITION"])).unwrap();
/// mock.set_vertex_shader(Some(shader));
///
/// assert_eq!(mock.count(|c| matches!(c, NativeCall::SetVertexShader { .. })), 1);
/// ```
pub struct MockNativeDevice {
    state: Mutex<MockState>,
}

impl MockNativeDevice {
    /// Create a mock device with a single default adapter.
    pub fn new() -> Self {
        Self::with_adapters(vec![AdapterProperties::default()])
    }

    /// Create a mock device exposing the given adapters.
    pub fn with_adapters(adapters: Vec<AdapterProperties>) -> Self {
        Self {
            state: Mutex::new(MockState {
                adapters: adapters.into_iter().map(Some).collect(),
                ..Default::default()
            }),
        }
    }

    /// Add an adapter whose property query fails.
    pub fn push_broken_adapter(&self) {
        self.state.lock().adapters.push(None);
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().calls.clone()
    }

    /// Count recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&NativeCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Position of the first recorded call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&NativeCall) -> bool) -> Option<usize> {
        self.state.lock().calls.iter().position(|call| predicate(call))
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of native objects created and not yet released.
    pub fn live_object_count(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn is_live_buffer(&self, buffer: NativeBuffer) -> bool {
        self.state.lock().live.contains(&buffer.0)
    }

    pub fn is_live_shader(&self, shader: NativeShader) -> bool {
        self.state.lock().live.contains(&shader.0)
    }

    pub fn is_live_input_layout(&self, layout: NativeInputLayout) -> bool {
        self.state.lock().live.contains(&layout.0)
    }

    /// Bytes written into `buffer` so far, as assembled from unmaps.
    pub fn buffer_contents(&self, buffer: NativeBuffer) -> Option<Vec<u8>> {
        self.state.lock().buffer_contents.get(&buffer).cloned()
    }

    /// Make the next `create_buffer` call fail.
    pub fn fail_next_buffer_create(&self) {
        self.state.lock().fail_next_buffer_create = true;
    }

    /// Make the next `map_buffer` call fail.
    pub fn fail_next_map(&self) {
        self.state.lock().fail_next_map = true;
    }

    /// Make the next `create_input_layout` call fail.
    pub fn fail_next_input_layout(&self) {
        self.state.lock().fail_next_input_layout = true;
    }

    /// Make the next rasterizer/depth-stencil/blend creation fail.
    pub fn fail_next_state_object(&self) {
        self.state.lock().fail_next_state_object = true;
    }

    fn record(&self, call: NativeCall) {
        self.state.lock().calls.push(call);
    }

    fn create_shader(
        &self,
        bytecode: &[u8],
        make_call: impl FnOnce(NativeShader) -> NativeCall,
    ) -> Result<NativeShader, NativeError> {
        if bytecode.is_empty() {
            return Err(NativeError::InvalidBytecode);
        }
        let mut state = self.state.lock();
        let shader = NativeShader(state.allocate_id());
        state.calls.push(make_call(shader));
        Ok(shader)
    }

    fn take_state_object_failure(&self) -> bool {
        std::mem::take(&mut self.state.lock().fail_next_state_object)
    }
}

impl Default for MockNativeDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeDevice for MockNativeDevice {
    fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError> {
        self.create_shader(bytecode, |shader| NativeCall::CreateVertexShader { shader })
    }

    fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError> {
        self.create_shader(bytecode, |shader| NativeCall::CreatePixelShader { shader })
    }

    fn create_geometry_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError> {
        self.create_shader(bytecode, |shader| NativeCall::CreateGeometryShader { shader })
    }

    fn reflect_shader(&self, bytecode: &[u8]) -> Result<ShaderReflection, NativeError> {
        self.record(NativeCall::ReflectShader);
        let text = std::str::from_utf8(bytecode)
            .map_err(|e| NativeError::ReflectionFailed(e.to_string()))?;
        Ok(ShaderReflection {
            inputs: text.split_whitespace().map(parse_semantic).collect(),
        })
    }

    fn release_shader(&self, shader: NativeShader) {
        let mut state = self.state.lock();
        state.release(shader.0);
        state.calls.push(NativeCall::ReleaseShader { shader });
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<NativeBuffer, NativeError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_buffer_create) {
            return Err(NativeError::OutOfMemory);
        }
        let buffer = NativeBuffer(state.allocate_id());
        state
            .buffer_contents
            .insert(buffer, vec![0; desc.size as usize]);
        state.calls.push(NativeCall::CreateBuffer {
            buffer,
            size: desc.size,
            dynamic: desc.dynamic,
        });
        Ok(buffer)
    }

    fn map_buffer(
        &self,
        buffer: NativeBuffer,
        offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<(), NativeError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_map) {
            return Err(NativeError::MapFailed);
        }
        if !state.live.contains(&buffer.0) {
            return Err(NativeError::DeviceRemoved);
        }
        state.calls.push(NativeCall::MapBuffer {
            buffer,
            offset,
            size,
            mode,
        });
        Ok(())
    }

    fn unmap_buffer(&self, buffer: NativeBuffer, offset: u64, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(contents) = state.buffer_contents.get_mut(&buffer) {
            let start = offset as usize;
            let end = (start + data.len()).min(contents.len());
            if start < end {
                contents[start..end].copy_from_slice(&data[..end - start]);
            }
        }
        state.calls.push(NativeCall::UnmapBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn release_buffer(&self, buffer: NativeBuffer) {
        let mut state = self.state.lock();
        state.release(buffer.0);
        state.buffer_contents.remove(&buffer);
        state.calls.push(NativeCall::ReleaseBuffer { buffer });
    }

    fn create_input_layout(
        &self,
        elements: &[InputElement],
        _vertex_shader_bytecode: &[u8],
    ) -> Result<NativeInputLayout, NativeError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_input_layout) {
            return Err(NativeError::Other("input layout rejected".into()));
        }
        let layout = NativeInputLayout(state.allocate_id());
        state.calls.push(NativeCall::CreateInputLayout {
            layout,
            elements: elements.to_vec(),
        });
        Ok(layout)
    }

    fn release_input_layout(&self, layout: NativeInputLayout) {
        let mut state = self.state.lock();
        state.release(layout.0);
        state.calls.push(NativeCall::ReleaseInputLayout { layout });
    }

    fn create_rasterizer_state(
        &self,
        desc: &RasterizerDesc,
    ) -> Result<NativeRasterizerState, NativeError> {
        if self.take_state_object_failure() {
            return Err(NativeError::OutOfMemory);
        }
        let mut state = self.state.lock();
        let object = NativeRasterizerState(state.allocate_id());
        state.calls.push(NativeCall::CreateRasterizerState {
            state: object,
            desc: *desc,
        });
        Ok(object)
    }

    fn create_depth_stencil_state(
        &self,
        _desc: &DepthStencilDesc,
    ) -> Result<NativeDepthStencilState, NativeError> {
        if self.take_state_object_failure() {
            return Err(NativeError::OutOfMemory);
        }
        let mut state = self.state.lock();
        let object = NativeDepthStencilState(state.allocate_id());
        state
            .calls
            .push(NativeCall::CreateDepthStencilState { state: object });
        Ok(object)
    }

    fn create_blend_state(&self, _desc: &BlendDesc) -> Result<NativeBlendState, NativeError> {
        if self.take_state_object_failure() {
            return Err(NativeError::OutOfMemory);
        }
        let mut state = self.state.lock();
        let object = NativeBlendState(state.allocate_id());
        state.calls.push(NativeCall::CreateBlendState { state: object });
        Ok(object)
    }

    fn release_state_object(&self, object: NativeStateObject) {
        let mut state = self.state.lock();
        let id = match object {
            NativeStateObject::Rasterizer(s) => s.0,
            NativeStateObject::DepthStencil(s) => s.0,
            NativeStateObject::Blend(s) => s.0,
        };
        state.release(id);
        state.calls.push(NativeCall::ReleaseStateObject { object });
    }

    fn set_viewports(&self, viewports: &[Viewport]) {
        self.record(NativeCall::SetViewports {
            viewports: viewports.to_vec(),
        });
    }

    fn set_vertex_shader(&self, shader: Option<NativeShader>) {
        self.record(NativeCall::SetVertexShader { shader });
    }

    fn set_geometry_shader(&self, shader: Option<NativeShader>) {
        self.record(NativeCall::SetGeometryShader { shader });
    }

    fn set_pixel_shader(&self, shader: Option<NativeShader>) {
        self.record(NativeCall::SetPixelShader { shader });
    }

    fn set_vertex_buffers(&self, start_slot: u32, bindings: &[NativeVertexBinding]) {
        self.record(NativeCall::SetVertexBuffers {
            start_slot,
            bindings: bindings.to_vec(),
        });
    }

    fn set_index_buffer(&self, buffer: Option<NativeBuffer>, format: wgpu::IndexFormat, offset: u32) {
        self.record(NativeCall::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    fn set_input_layout(&self, layout: Option<NativeInputLayout>) {
        self.record(NativeCall::SetInputLayout { layout });
    }

    fn set_rasterizer_state(&self, state: Option<NativeRasterizerState>) {
        self.record(NativeCall::SetRasterizerState { state });
    }

    fn set_depth_stencil_state(&self, state: Option<NativeDepthStencilState>) {
        self.record(NativeCall::SetDepthStencilState { state });
    }

    fn set_blend_state(&self, state: Option<NativeBlendState>) {
        self.record(NativeCall::SetBlendState { state });
    }

    fn set_primitive_topology(&self, topology: wgpu::PrimitiveTopology) {
        self.record(NativeCall::SetPrimitiveTopology { topology });
    }

    fn clear_render_target(&self, color: wgpu::Color) {
        self.record(NativeCall::ClearRenderTarget { color });
    }

    fn clear_depth_stencil(&self, depth: Option<f32>, stencil: Option<u8>) {
        self.record(NativeCall::ClearDepthStencil { depth, stencil });
    }

    fn draw(&self, vertex_count: u32, start_vertex: u32) {
        self.record(NativeCall::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.record(NativeCall::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }
}

impl AdapterSource for MockNativeDevice {
    fn adapter_count(&self) -> usize {
        self.state.lock().adapters.len()
    }

    fn adapter_properties(&self, index: usize) -> Option<AdapterProperties> {
        self.state.lock().adapters.get(index).cloned().flatten()
    }
}
