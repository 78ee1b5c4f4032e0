//! Vertex format descriptors and the field-to-semantic table.
//!
//! A [`VertexFormat`] says which fields a vertex carries and how wide the
//! variable-width ones are. Fields are always laid out in [`VertexField::ALL`]
//! order, tightly packed.

use bitflags::bitflags;

bitflags! {
    /// Fixed-width vertex fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertexFlags: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const COLOR = 1 << 2;
        const SPECULAR = 1 << 3;
        const TANGENT_S = 1 << 4;
        const TANGENT_T = 1 << 5;
        const BONE_INDEX = 1 << 6;
    }
}

/// Number of texture coordinate sets a vertex may carry.
pub const MAX_TEXCOORDS: usize = 8;
/// Most bone weights per vertex.
pub const MAX_BONE_WEIGHTS: u8 = 4;
/// Widest user data field, in floats.
pub const MAX_USER_DATA_SIZE: u8 = 4;

/// Size in bytes of each default value in the fallback constant stream.
pub const FALLBACK_ELEMENT_SIZE: u32 = 16;

/// One entry of the static field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexField {
    Position,
    BoneWeights,
    BoneIndices,
    Normal,
    Color,
    Specular,
    TexCoord(u8),
    TangentS,
    TangentT,
    UserData,
}

impl VertexField {
    /// Every field, in layout order.
    pub const ALL: [VertexField; 17] = [
        VertexField::Position,
        VertexField::BoneWeights,
        VertexField::BoneIndices,
        VertexField::Normal,
        VertexField::Color,
        VertexField::Specular,
        VertexField::TexCoord(0),
        VertexField::TexCoord(1),
        VertexField::TexCoord(2),
        VertexField::TexCoord(3),
        VertexField::TexCoord(4),
        VertexField::TexCoord(5),
        VertexField::TexCoord(6),
        VertexField::TexCoord(7),
        VertexField::TangentS,
        VertexField::TangentT,
        VertexField::UserData,
    ];

    pub fn semantic_name(self) -> &'static str {
        match self {
            VertexField::Position => "POSITION",
            VertexField::BoneWeights => "BLENDWEIGHT",
            VertexField::BoneIndices => "BLENDINDICES",
            VertexField::Normal => "NORMAL",
            VertexField::Color | VertexField::Specular => "COLOR",
            VertexField::TexCoord(_) => "TEXCOORD",
            VertexField::TangentS => "TANGENT",
            VertexField::TangentT => "BINORMAL",
            VertexField::UserData => "USERDATA",
        }
    }

    pub fn semantic_index(self) -> u32 {
        match self {
            VertexField::Specular => 1,
            VertexField::TexCoord(stage) => stage as u32,
            _ => 0,
        }
    }

    /// Position of this field in [`VertexField::ALL`].
    pub fn slot(self) -> usize {
        match self {
            VertexField::Position => 0,
            VertexField::BoneWeights => 1,
            VertexField::BoneIndices => 2,
            VertexField::Normal => 3,
            VertexField::Color => 4,
            VertexField::Specular => 5,
            VertexField::TexCoord(stage) => 6 + stage as usize,
            VertexField::TangentS => 14,
            VertexField::TangentT => 15,
            VertexField::UserData => 16,
        }
    }

    /// Format used when the field is read from the fallback constant stream.
    pub fn fallback_format(self) -> wgpu::VertexFormat {
        match self {
            VertexField::BoneIndices => wgpu::VertexFormat::Uint8x4,
            _ => wgpu::VertexFormat::Float32x4,
        }
    }

    /// Default value read by shaders whose geometry lacks this field.
    ///
    /// Colours default to opaque white, everything else to zero.
    pub fn fallback_value(self) -> [u8; FALLBACK_ELEMENT_SIZE as usize] {
        match self {
            VertexField::Color | VertexField::Specular => bytemuck::cast([1.0f32; 4]),
            _ => [0; FALLBACK_ELEMENT_SIZE as usize],
        }
    }
}

/// Contents of the fallback constant stream: one default per field slot.
pub fn fallback_stream_data() -> Vec<u8> {
    VertexField::ALL
        .iter()
        .flat_map(|field| field.fallback_value())
        .collect()
}

/// A field present in a vertex format, with its resolved layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexElement {
    pub field: VertexField,
    pub format: wgpu::VertexFormat,
    pub offset: u32,
}

/// Describes the fields of one vertex stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexFormat {
    flags: VertexFlags,
    bone_weights: u8,
    texcoord_sizes: [u8; MAX_TEXCOORDS],
    user_data_size: u8,
}

impl VertexFormat {
    pub const fn new(flags: VertexFlags) -> Self {
        Self {
            flags,
            bone_weights: 0,
            texcoord_sizes: [0; MAX_TEXCOORDS],
            user_data_size: 0,
        }
    }

    /// Position only.
    pub const fn position() -> Self {
        Self::new(VertexFlags::POSITION)
    }

    pub fn with_bone_weights(mut self, count: u8) -> Self {
        self.bone_weights = count.min(MAX_BONE_WEIGHTS);
        self
    }

    /// Sets the component count (0-4) of texture coordinate set `stage`.
    pub fn with_texcoord(mut self, stage: usize, components: u8) -> Self {
        if let Some(size) = self.texcoord_sizes.get_mut(stage) {
            *size = components.min(4);
        }
        self
    }

    pub fn with_user_data(mut self, components: u8) -> Self {
        self.user_data_size = components.min(MAX_USER_DATA_SIZE);
        self
    }

    pub fn flags(&self) -> VertexFlags {
        self.flags
    }

    pub fn bone_weight_count(&self) -> u8 {
        self.bone_weights
    }

    pub fn texcoord_size(&self, stage: usize) -> u8 {
        self.texcoord_sizes.get(stage).copied().unwrap_or(0)
    }

    pub fn user_data_size(&self) -> u8 {
        self.user_data_size
    }

    /// Native element format of `field`, or `None` if the format lacks it.
    pub fn field_format(&self, field: VertexField) -> Option<wgpu::VertexFormat> {
        match field {
            VertexField::Position => self.flag_format(VertexFlags::POSITION, wgpu::VertexFormat::Float32x3),
            VertexField::BoneWeights => float_format(self.bone_weights),
            VertexField::BoneIndices => self.flag_format(VertexFlags::BONE_INDEX, wgpu::VertexFormat::Uint8x4),
            VertexField::Normal => self.flag_format(VertexFlags::NORMAL, wgpu::VertexFormat::Float32x3),
            VertexField::Color => self.flag_format(VertexFlags::COLOR, wgpu::VertexFormat::Unorm8x4),
            VertexField::Specular => self.flag_format(VertexFlags::SPECULAR, wgpu::VertexFormat::Unorm8x4),
            VertexField::TexCoord(stage) => float_format(self.texcoord_size(stage as usize)),
            VertexField::TangentS => self.flag_format(VertexFlags::TANGENT_S, wgpu::VertexFormat::Float32x3),
            VertexField::TangentT => self.flag_format(VertexFlags::TANGENT_T, wgpu::VertexFormat::Float32x3),
            VertexField::UserData => float_format(self.user_data_size),
        }
    }

    fn flag_format(&self, flag: VertexFlags, format: wgpu::VertexFormat) -> Option<wgpu::VertexFormat> {
        self.flags.contains(flag).then_some(format)
    }

    /// Present fields with their byte offsets, in layout order.
    pub fn elements(&self) -> impl Iterator<Item = VertexElement> + '_ {
        let mut offset = 0u32;
        VertexField::ALL.into_iter().filter_map(move |field| {
            let format = self.field_format(field)?;
            let element = VertexElement {
                field,
                format,
                offset,
            };
            offset += format.size() as u32;
            Some(element)
        })
    }

    /// Size of one vertex in bytes.
    pub fn vertex_size(&self) -> u32 {
        VertexField::ALL
            .into_iter()
            .filter_map(|field| self.field_format(field))
            .map(|format| format.size() as u32)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_size() == 0
    }
}

fn float_format(components: u8) -> Option<wgpu::VertexFormat> {
    match components {
        1 => Some(wgpu::VertexFormat::Float32),
        2 => Some(wgpu::VertexFormat::Float32x2),
        3 => Some(wgpu::VertexFormat::Float32x3),
        4 => Some(wgpu::VertexFormat::Float32x4),
        _ => None,
    }
}
