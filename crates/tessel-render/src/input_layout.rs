//! Input layout construction and the per-vertex-shader layout cache.

use indexmap::IndexMap;
use tessel_core::alloc::RandomState;
use tessel_core::profiling::profile_function;
use tessel_test_utils::{
    InputClassification, InputElement, NativeDevice, NativeInputLayout, ShaderReflection,
};

use crate::state::{FALLBACK_STREAM, StreamFormats};
use crate::vertex_format::{FALLBACK_ELEMENT_SIZE, VertexField};

/// Builds the element list for `formats` as read by a shader with `reflection`.
///
/// Present fields come from their stream at accumulating offsets. Fields the
/// shader reads but no stream provides are read from the fallback stream,
/// stepped once per `u32::MAX` instances so every vertex sees the same value.
pub fn build_input_elements(formats: &StreamFormats, reflection: &ShaderReflection) -> Vec<InputElement> {
    profile_function!();

    let mut elements = Vec::new();
    let mut provided = [false; VertexField::ALL.len()];

    for (stream, format) in formats.iter().enumerate() {
        let Some(format) = format else { continue };
        if stream == FALLBACK_STREAM {
            continue;
        }
        for element in format.elements() {
            let slot = element.field.slot();
            // First stream wins when two streams carry the same field.
            if provided[slot] {
                continue;
            }
            provided[slot] = true;
            elements.push(InputElement {
                semantic_name: element.field.semantic_name(),
                semantic_index: element.field.semantic_index(),
                format: element.format,
                stream: stream as u32,
                byte_offset: element.offset,
                classification: InputClassification::PerVertex,
            });
        }
    }

    for field in VertexField::ALL {
        if provided[field.slot()] || !reflection.expects(field.semantic_name(), field.semantic_index()) {
            continue;
        }
        elements.push(InputElement {
            semantic_name: field.semantic_name(),
            semantic_index: field.semantic_index(),
            format: field.fallback_format(),
            stream: FALLBACK_STREAM as u32,
            byte_offset: field.slot() as u32 * FALLBACK_ELEMENT_SIZE,
            classification: InputClassification::PerInstance {
                step_rate: u32::MAX,
            },
        });
    }

    elements
}

/// Native input layouts built for one vertex shader, keyed by stream formats.
///
/// Entries live exactly as long as the owning shader.
#[derive(Default)]
pub struct InputLayoutCache {
    layouts: IndexMap<StreamFormats, NativeInputLayout, RandomState>,
}

impl InputLayoutCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    pub fn get(&self, formats: &StreamFormats) -> Option<NativeInputLayout> {
        self.layouts.get(formats).copied()
    }

    /// Returns the cached layout, building it on a miss.
    ///
    /// Creation failures are logged and not cached.
    pub fn get_or_create(
        &mut self,
        device: &dyn NativeDevice,
        formats: &StreamFormats,
        reflection: &ShaderReflection,
        bytecode: &[u8],
    ) -> Option<NativeInputLayout> {
        if let Some(layout) = self.layouts.get(formats) {
            return Some(*layout);
        }

        let elements = build_input_elements(formats, reflection);
        match device.create_input_layout(&elements, bytecode) {
            Ok(layout) => {
                tracing::debug!(
                    "Created input layout {:?} with {} elements",
                    layout,
                    elements.len()
                );
                self.layouts.insert(*formats, layout);
                Some(layout)
            }
            Err(e) => {
                tracing::warn!("Failed to create input layout: {}", e);
                None
            }
        }
    }

    /// Releases every cached layout.
    pub fn release_all(&mut self, device: &dyn NativeDevice) {
        for (_, layout) in self.layouts.drain(..) {
            device.release_input_layout(layout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MAX_VERTEX_STREAMS;
    use crate::vertex_format::{VertexFlags, VertexFormat};
    use tessel_test_utils::{MockNativeDevice, NativeCall, NativeDevice, mock_bytecode};

    fn reflect(semantics: &[&str]) -> ShaderReflection {
        MockNativeDevice::new()
            .reflect_shader(&mock_bytecode(semantics))
            .unwrap()
    }

    #[test]
    fn test_present_fields_accumulate_offsets() {
        let mut formats: StreamFormats = [None; MAX_VERTEX_STREAMS];
        formats[0] = Some(VertexFormat::new(VertexFlags::POSITION | VertexFlags::NORMAL).with_texcoord(0, 2));

        let elements = build_input_elements(&formats, &reflect(&["POSITION", "NORMAL", "TEXCOORD0"]));
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].semantic_name, "POSITION");
        assert_eq!(elements[1].byte_offset, 12);
        assert_eq!(elements[2].semantic_name, "TEXCOORD");
        assert_eq!(elements[2].byte_offset, 24);
        assert!(elements.iter().all(|e| e.stream == 0));
    }

    #[test]
    fn test_missing_semantics_use_fallback_stream() {
        let mut formats: StreamFormats = [None; MAX_VERTEX_STREAMS];
        formats[0] = Some(VertexFormat::position());

        let elements = build_input_elements(&formats, &reflect(&["POSITION", "COLOR0", "TEXCOORD3"]));
        assert_eq!(elements.len(), 3);

        let color = &elements[1];
        assert_eq!(color.semantic_name, "COLOR");
        assert_eq!(color.stream, FALLBACK_STREAM as u32);
        assert_eq!(color.byte_offset, VertexField::Color.slot() as u32 * 16);
        assert_eq!(
            color.classification,
            InputClassification::PerInstance { step_rate: u32::MAX }
        );
        assert_eq!(elements[2].semantic_index, 3);
    }

    #[test]
    fn test_second_stream_fields() {
        let mut formats: StreamFormats = [None; MAX_VERTEX_STREAMS];
        formats[0] = Some(VertexFormat::position());
        formats[1] = Some(VertexFormat::new(VertexFlags::POSITION | VertexFlags::COLOR));

        let elements = build_input_elements(&formats, &reflect(&["POSITION", "COLOR"]));
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].stream, 0);
        assert_eq!(elements[1].stream, 1);
        assert_eq!(elements[1].byte_offset, 12);
    }

    #[test]
    fn test_cache_builds_once() {
        let mock = MockNativeDevice::new();
        let reflection = reflect(&["POSITION"]);
        let mut formats: StreamFormats = [None; MAX_VERTEX_STREAMS];
        formats[0] = Some(VertexFormat::position());

        let mut cache = InputLayoutCache::new();
        let first = cache.get_or_create(&mock, &formats, &reflection, b"POSITION");
        let second = cache.get_or_create(&mock, &formats, &reflection, b"POSITION");
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(mock.count(|c| matches!(c, NativeCall::CreateInputLayout { .. })), 1);

        cache.release_all(&mock);
        assert!(cache.is_empty());
        assert_eq!(mock.live_object_count(), 0);
    }

    #[test]
    fn test_failed_creation_not_cached() {
        let mock = MockNativeDevice::new();
        let reflection = reflect(&["POSITION"]);
        let formats: StreamFormats = [None; MAX_VERTEX_STREAMS];

        let mut cache = InputLayoutCache::new();
        mock.fail_next_input_layout();
        assert!(cache.get_or_create(&mock, &formats, &reflection, b"POSITION").is_none());
        assert!(cache.is_empty());
        assert!(cache.get_or_create(&mock, &formats, &reflection, b"POSITION").is_some());
    }
}
