//! Native object ids and descriptors shared by every [`NativeDevice`] implementation.
//!
//! [`NativeDevice`]: crate::NativeDevice

use std::fmt;

macro_rules! native_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

native_id!(
    /// A native shader object of any stage.
    NativeShader
);
native_id!(
    /// A native vertex or index buffer.
    NativeBuffer
);
native_id!(
    /// A native input-layout object.
    NativeInputLayout
);
native_id!(NativeRasterizerState);
native_id!(NativeDepthStencilState);
native_id!(NativeBlendState);

/// Any of the immutable pipeline state objects, for release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeStateObject {
    Rasterizer(NativeRasterizerState),
    DepthStencil(NativeDepthStencilState),
    Blend(NativeBlendState),
}

/// Failures reported by the native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The bytecode could not be turned into a shader object.
    InvalidBytecode,
    /// Reflection data could not be extracted from the bytecode.
    ReflectionFailed(String),
    /// The driver ran out of memory for the object.
    OutOfMemory,
    /// Mapping a buffer for CPU writes failed.
    MapFailed,
    /// The device was removed or reset underneath us.
    DeviceRemoved,
    /// Any other creation failure.
    Other(String),
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeError::InvalidBytecode => write!(f, "invalid shader bytecode"),
            NativeError::ReflectionFailed(reason) => {
                write!(f, "shader reflection failed: {}", reason)
            }
            NativeError::OutOfMemory => write!(f, "out of video memory"),
            NativeError::MapFailed => write!(f, "failed to map buffer"),
            NativeError::DeviceRemoved => write!(f, "device removed"),
            NativeError::Other(reason) => write!(f, "{}", reason),
        }
    }
}

impl std::error::Error for NativeError {}

/// One input parameter of a shader's reflected input signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignatureParameter {
    pub semantic_name: String,
    pub semantic_index: u32,
}

impl SignatureParameter {
    pub fn new(semantic_name: impl Into<String>, semantic_index: u32) -> Self {
        Self {
            semantic_name: semantic_name.into(),
            semantic_index,
        }
    }
}

/// Reflection metadata extracted from shader bytecode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderReflection {
    pub inputs: Vec<SignatureParameter>,
}

impl ShaderReflection {
    /// Whether the input signature reads `semantic_name` at `semantic_index`.
    ///
    /// Semantic names compare case-insensitively, as HLSL does.
    pub fn expects(&self, semantic_name: &str, semantic_index: u32) -> bool {
        self.inputs.iter().any(|param| {
            param.semantic_index == semantic_index
                && param.semantic_name.eq_ignore_ascii_case(semantic_name)
        })
    }
}

/// Descriptor for native buffer creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: wgpu::BufferUsages,
    /// Dynamic buffers are CPU-writable every frame and support no-overwrite maps.
    pub dynamic: bool,
}

impl<'a> BufferDesc<'a> {
    pub fn vertex(label: Option<&'a str>, size: u64, dynamic: bool) -> Self {
        Self {
            label,
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            dynamic,
        }
    }

    pub fn index(label: Option<&'a str>, size: u64, dynamic: bool) -> Self {
        Self {
            label,
            size,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            dynamic,
        }
    }
}

/// How a buffer region is mapped for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Prior contents are invalidated; writing from offset zero is safe.
    Discard,
    /// The caller promises not to touch regions the GPU may still read.
    NoOverwrite,
}

/// Per-element data classification of an input-layout element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputClassification {
    PerVertex,
    PerInstance { step_rate: u32 },
}

/// One element of a native input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputElement {
    pub semantic_name: &'static str,
    pub semantic_index: u32,
    pub format: wgpu::VertexFormat,
    pub stream: u32,
    pub byte_offset: u32,
    pub classification: InputClassification,
}

/// A single stream binding as handed to [`NativeDevice::set_vertex_buffers`].
///
/// [`NativeDevice::set_vertex_buffers`]: crate::NativeDevice::set_vertex_buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NativeVertexBinding {
    pub buffer: Option<NativeBuffer>,
    pub stride: u32,
    pub offset: u32,
}

/// A viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

/// Rasterizer state description.
///
/// `wgpu` has no hashable rasterizer descriptor, and float fields do not
/// implement `Hash`, so the slope-scaled bias is stored as raw bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerDesc {
    pub fill_mode: wgpu::PolygonMode,
    pub cull_mode: Option<wgpu::Face>,
    pub front_face: wgpu::FrontFace,
    pub depth_bias: i32,
    /// Slope-scaled depth bias (f32 bits)
    pub slope_scaled_depth_bias: u32,
    pub depth_clip: bool,
    pub scissor: bool,
    pub multisample: bool,
}

impl RasterizerDesc {
    pub fn with_cull_mode(mut self, cull_mode: Option<wgpu::Face>) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    pub fn with_fill_mode(mut self, fill_mode: wgpu::PolygonMode) -> Self {
        self.fill_mode = fill_mode;
        self
    }

    pub fn with_depth_bias(mut self, depth_bias: i32, slope_scaled: f32) -> Self {
        self.depth_bias = depth_bias;
        self.slope_scaled_depth_bias = slope_scaled.to_bits();
        self
    }

    pub fn slope_scaled_depth_bias(&self) -> f32 {
        f32::from_bits(self.slope_scaled_depth_bias)
    }
}

impl Default for RasterizerDesc {
    fn default() -> Self {
        Self {
            fill_mode: wgpu::PolygonMode::Fill,
            cull_mode: Some(wgpu::Face::Back),
            front_face: wgpu::FrontFace::Cw,
            depth_bias: 0,
            slope_scaled_depth_bias: 0.0f32.to_bits(),
            depth_clip: true,
            scissor: false,
            multisample: true,
        }
    }
}

/// Depth-stencil state description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilDesc {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: wgpu::CompareFunction,
    pub stencil_enable: bool,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_write: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil_enable: false,
            stencil_read_mask: 0xFF,
            stencil_write_mask: 0xFF,
        }
    }
}

/// Blend state description for the single bound render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendDesc {
    /// `None` disables blending.
    pub blend: Option<wgpu::BlendState>,
    pub write_mask: wgpu::ColorWrites,
    pub alpha_to_coverage: bool,
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
            alpha_to_coverage: false,
        }
    }
}

/// Raw adapter properties as probed from the driver.
///
/// Shader models are encoded as `major * 10 + minor`, with pixel shader
/// model 2.0b reported as 21.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProperties {
    pub description: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub pixel_shader_model: u32,
    pub vertex_shader_model: u32,
    pub max_texture_width: u32,
    pub max_texture_height: u32,
    pub max_anisotropy: u32,
    pub max_vertex_streams: u32,
    pub max_user_clip_planes: u32,
    pub max_simultaneous_render_targets: u32,
    pub num_vertex_shader_constants: u32,
    pub max_lights: u32,
    pub dx10_card: bool,
    pub supports_srgb: bool,
    pub supports_stream_offset: bool,
    pub supports_vertex_textures: bool,
    pub supports_shadow_depth_textures: bool,
    pub supports_fetch4_format: bool,
    pub supports_border_color: bool,
    pub video_memory_mb: u32,
}

impl Default for AdapterProperties {
    fn default() -> Self {
        Self {
            description: String::new(),
            vendor_id: 0,
            device_id: 0,
            pixel_shader_model: 30,
            vertex_shader_model: 30,
            max_texture_width: 4096,
            max_texture_height: 4096,
            max_anisotropy: 16,
            max_vertex_streams: 16,
            max_user_clip_planes: 6,
            max_simultaneous_render_targets: 4,
            num_vertex_shader_constants: 256,
            max_lights: 4,
            dx10_card: false,
            supports_srgb: true,
            supports_stream_offset: true,
            supports_vertex_textures: false,
            supports_shadow_depth_textures: false,
            supports_fetch4_format: false,
            supports_border_color: true,
            video_memory_mb: 512,
        }
    }
}
