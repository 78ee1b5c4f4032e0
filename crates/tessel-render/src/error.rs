use std::fmt;

use tessel_test_utils::NativeError;

/// Errors returned by the shader API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderApiError {
    /// The handle was never issued or its resource has been destroyed.
    InvalidHandle,
    /// The native shader object could not be created.
    ShaderCreation(NativeError),
    /// The shader's input signature could not be reflected.
    Reflection(NativeError),
    /// The native buffer could not be created.
    BufferCreation(NativeError),
    /// The stream is out of range or reserved for constant fallback data.
    ReservedStream(usize),
}

impl fmt::Display for ShaderApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "Invalid or stale resource handle"),
            Self::ShaderCreation(e) => write!(f, "Shader creation failed: {}", e),
            Self::Reflection(e) => write!(f, "Shader reflection failed: {}", e),
            Self::BufferCreation(e) => write!(f, "Buffer creation failed: {}", e),
            Self::ReservedStream(stream) => {
                write!(f, "Vertex stream {} is reserved or out of range", stream)
            }
        }
    }
}

impl std::error::Error for ShaderApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ShaderCreation(e) | Self::Reflection(e) | Self::BufferCreation(e) => Some(e),
            _ => None,
        }
    }
}
