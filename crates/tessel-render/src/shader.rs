//! Shader resources held in the shader API's handle tables.

use tessel_test_utils::{NativeDevice, NativeShader, ShaderReflection};

use crate::error::ShaderApiError;
use crate::input_layout::InputLayoutCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
}

/// A native shader with its reflected inputs and a copy of its bytecode.
pub struct ShaderEntry {
    native: NativeShader,
    reflection: ShaderReflection,
    bytecode: Box<[u8]>,
}

impl ShaderEntry {
    /// Creates the native shader and reflects it.
    ///
    /// A shader that fails reflection is released before returning.
    pub(crate) fn create(
        device: &dyn NativeDevice,
        stage: ShaderStage,
        bytecode: &[u8],
    ) -> Result<Self, ShaderApiError> {
        let native = match stage {
            ShaderStage::Vertex => device.create_vertex_shader(bytecode),
            ShaderStage::Pixel => device.create_pixel_shader(bytecode),
            ShaderStage::Geometry => device.create_geometry_shader(bytecode),
        }
        .map_err(|e| {
            tracing::warn!("Failed to create {:?} shader: {}", stage, e);
            ShaderApiError::ShaderCreation(e)
        })?;

        let reflection = match device.reflect_shader(bytecode) {
            Ok(reflection) => reflection,
            Err(e) => {
                tracing::warn!("Failed to reflect {:?} shader: {}", stage, e);
                device.release_shader(native);
                return Err(ShaderApiError::Reflection(e));
            }
        };

        Ok(Self {
            native,
            reflection,
            bytecode: bytecode.into(),
        })
    }

    pub fn native(&self) -> NativeShader {
        self.native
    }

    pub fn reflection(&self) -> &ShaderReflection {
        &self.reflection
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }
}

/// A vertex shader and the input layouts built for it.
pub struct VertexShader {
    pub(crate) entry: ShaderEntry,
    pub(crate) layouts: InputLayoutCache,
}

impl VertexShader {
    pub(crate) fn new(entry: ShaderEntry) -> Self {
        Self {
            entry,
            layouts: InputLayoutCache::new(),
        }
    }

    /// Releases the cached layouts, then the shader itself.
    pub(crate) fn release(&mut self, device: &dyn NativeDevice) {
        self.layouts.release_all(device);
        device.release_shader(self.entry.native);
    }
}

pub struct PixelShader {
    pub(crate) entry: ShaderEntry,
}

pub struct GeometryShader {
    pub(crate) entry: ShaderEntry,
}
