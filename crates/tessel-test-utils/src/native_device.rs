//! Traits abstracting the native graphics API.

use crate::native_types::*;

/// Native device operations used by the shader API.
///
/// Every creation call returns an owned id; the implementation owns the
/// underlying object until the matching `release_*` call. Pipeline calls
/// (`set_*`, `draw*`) are immediate-mode, mirroring a D3D10-style context.
///
/// # Object Safety
///
/// The trait is object-safe so the engine can hold an `Arc<dyn NativeDevice>`
/// and tests can swap in `MockNativeDevice`.
pub trait NativeDevice: Send + Sync {
    // Shader operations

    fn create_vertex_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError>;
    fn create_pixel_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError>;
    fn create_geometry_shader(&self, bytecode: &[u8]) -> Result<NativeShader, NativeError>;

    /// Extract the input signature from shader bytecode.
    fn reflect_shader(&self, bytecode: &[u8]) -> Result<ShaderReflection, NativeError>;

    fn release_shader(&self, shader: NativeShader);

    // Buffer operations

    fn create_buffer(&self, desc: &BufferDesc) -> Result<NativeBuffer, NativeError>;

    /// Map `size` bytes at `offset` for CPU writes.
    fn map_buffer(
        &self,
        buffer: NativeBuffer,
        offset: u64,
        size: u64,
        mode: MapMode,
    ) -> Result<(), NativeError>;

    /// Finish a mapping started by [`NativeDevice::map_buffer`], handing over
    /// the bytes written at `offset`.
    fn unmap_buffer(&self, buffer: NativeBuffer, offset: u64, data: &[u8]);

    fn release_buffer(&self, buffer: NativeBuffer);

    // Input layouts

    /// Create an input layout validated against the vertex shader bytecode.
    fn create_input_layout(
        &self,
        elements: &[InputElement],
        vertex_shader_bytecode: &[u8],
    ) -> Result<NativeInputLayout, NativeError>;

    fn release_input_layout(&self, layout: NativeInputLayout);

    // Immutable state objects

    fn create_rasterizer_state(
        &self,
        desc: &RasterizerDesc,
    ) -> Result<NativeRasterizerState, NativeError>;
    fn create_depth_stencil_state(
        &self,
        desc: &DepthStencilDesc,
    ) -> Result<NativeDepthStencilState, NativeError>;
    fn create_blend_state(&self, desc: &BlendDesc) -> Result<NativeBlendState, NativeError>;
    fn release_state_object(&self, object: NativeStateObject);

    // Pipeline binding

    fn set_viewports(&self, viewports: &[Viewport]);
    fn set_vertex_shader(&self, shader: Option<NativeShader>);
    fn set_geometry_shader(&self, shader: Option<NativeShader>);
    fn set_pixel_shader(&self, shader: Option<NativeShader>);

    /// Bind `bindings.len()` consecutive streams starting at `start_slot`.
    fn set_vertex_buffers(&self, start_slot: u32, bindings: &[NativeVertexBinding]);

    fn set_index_buffer(&self, buffer: Option<NativeBuffer>, format: wgpu::IndexFormat, offset: u32);
    fn set_input_layout(&self, layout: Option<NativeInputLayout>);
    fn set_rasterizer_state(&self, state: Option<NativeRasterizerState>);
    fn set_depth_stencil_state(&self, state: Option<NativeDepthStencilState>);
    fn set_blend_state(&self, state: Option<NativeBlendState>);
    fn set_primitive_topology(&self, topology: wgpu::PrimitiveTopology);

    // Clears and draws

    fn clear_render_target(&self, color: wgpu::Color);
    fn clear_depth_stencil(&self, depth: Option<f32>, stencil: Option<u8>);
    fn draw(&self, vertex_count: u32, start_vertex: u32);
    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: i32);
}

/// Enumerates display adapters and reports their raw properties.
pub trait AdapterSource {
    fn adapter_count(&self) -> usize;

    /// Properties of adapter `index`, or `None` if the adapter could not be queried.
    fn adapter_properties(&self, index: usize) -> Option<AdapterProperties>;
}
