//! Pipeline state snapshots.
//!
//! The shader API keeps two [`PipelineState`] values: the desired state
//! written by binding calls and the current state last submitted to the
//! device. Snapshots hold handles, never native objects, so a destroyed
//! resource can never be reached through a stale snapshot.

use tessel_test_utils::{BlendDesc, DepthStencilDesc, RasterizerDesc, Viewport};

use crate::handles::{GeometryShaderHandle, IndexBufferHandle, PixelShaderHandle, VertexBufferHandle, VertexShaderHandle};
use crate::vertex_format::VertexFormat;

/// Number of vertex stream slots, including the reserved fallback stream.
pub const MAX_VERTEX_STREAMS: usize = 16;

/// Stream slot that carries constant defaults for shader inputs the bound
/// geometry does not provide.
pub const FALLBACK_STREAM: usize = MAX_VERTEX_STREAMS - 1;

/// Per-stream vertex formats as seen by the input layout.
pub type StreamFormats = [Option<VertexFormat>; MAX_VERTEX_STREAMS];

/// One vertex stream binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexBufferBinding {
    pub buffer: Option<VertexBufferHandle>,
    pub stride: u32,
    pub byte_offset: u32,
}

impl VertexBufferBinding {
    pub const UNBOUND: Self = Self {
        buffer: None,
        stride: 0,
        byte_offset: 0,
    };
}

/// The index buffer binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexBufferBinding {
    pub buffer: Option<IndexBufferHandle>,
    pub format: wgpu::IndexFormat,
    pub byte_offset: u32,
}

impl Default for IndexBufferBinding {
    fn default() -> Self {
        Self {
            buffer: None,
            format: wgpu::IndexFormat::Uint16,
            byte_offset: 0,
        }
    }
}

/// What an input layout is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputLayoutKey {
    pub vertex_shader: Option<VertexShaderHandle>,
    pub formats: StreamFormats,
}

/// A full pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub viewports: Vec<Viewport>,
    pub clear_color: wgpu::Color,
    pub rasterizer: RasterizerDesc,
    pub depth_stencil: DepthStencilDesc,
    pub blend: BlendDesc,
    pub vertex_shader: Option<VertexShaderHandle>,
    pub geometry_shader: Option<GeometryShaderHandle>,
    pub pixel_shader: Option<PixelShaderHandle>,
    pub vertex_buffers: [VertexBufferBinding; MAX_VERTEX_STREAMS],
    pub index_buffer: IndexBufferBinding,
    pub input_layout: InputLayoutKey,
    /// `None` until a draw sets it; never sent to the device.
    pub topology: Option<wgpu::PrimitiveTopology>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            viewports: Vec::new(),
            clear_color: wgpu::Color::BLACK,
            rasterizer: RasterizerDesc::default(),
            depth_stencil: DepthStencilDesc::default(),
            blend: BlendDesc::default(),
            vertex_shader: None,
            geometry_shader: None,
            pixel_shader: None,
            vertex_buffers: [VertexBufferBinding::UNBOUND; MAX_VERTEX_STREAMS],
            index_buffer: IndexBufferBinding::default(),
            input_layout: InputLayoutKey::default(),
            topology: None,
        }
    }
}

impl PipelineState {
    /// Whether any vertex stream binds `buffer`.
    pub fn references_vertex_buffer(&self, buffer: VertexBufferHandle) -> bool {
        self.vertex_buffers
            .iter()
            .any(|binding| binding.buffer == Some(buffer))
    }

    pub fn references_index_buffer(&self, buffer: IndexBufferHandle) -> bool {
        self.index_buffer.buffer == Some(buffer)
    }

    /// Whether the shader is bound, or an input layout built for it is.
    pub fn references_vertex_shader(&self, shader: VertexShaderHandle) -> bool {
        self.vertex_shader == Some(shader) || self.input_layout.vertex_shader == Some(shader)
    }
}
