//! Typed handles for shader API resources.

use tessel_core::alloc::Handle;

use crate::buffer::{IndexBuffer, VertexBuffer};
use crate::shader::{GeometryShader, PixelShader, VertexShader};

pub type VertexShaderHandle = Handle<VertexShader>;
pub type PixelShaderHandle = Handle<PixelShader>;
pub type GeometryShaderHandle = Handle<GeometryShader>;
pub type VertexBufferHandle = Handle<VertexBuffer>;
pub type IndexBufferHandle = Handle<IndexBuffer>;
