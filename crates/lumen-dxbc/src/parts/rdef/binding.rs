//! Resource bindings and their enumerations.

use lumen_common::{BinaryReader, Keyed};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::RdefWriter;
use crate::Result;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawBinding {
    name_offset: u32,
    input_type: u32,
    return_type: u32,
    view_dimension: u32,
    sample_count: u32,
    bind_point: u32,
    bind_count: u32,
    flags: u32,
}

pub(super) const BINDING_SIZE: usize = std::mem::size_of::<RawBinding>();

/// Kind of shader input a binding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderInputType(pub u32);

impl ShaderInputType {
    pub const CBUFFER: Self = Self(0);
    pub const TBUFFER: Self = Self(1);
    pub const TEXTURE: Self = Self(2);
    pub const SAMPLER: Self = Self(3);
    pub const UAV_RW_TYPED: Self = Self(4);
    pub const STRUCTURED: Self = Self(5);
    pub const UAV_RW_STRUCTURED: Self = Self(6);
    pub const BYTE_ADDRESS: Self = Self(7);
    pub const UAV_RW_BYTE_ADDRESS: Self = Self(8);
    pub const UAV_APPEND_STRUCTURED: Self = Self(9);
    pub const UAV_CONSUME_STRUCTURED: Self = Self(10);
    pub const UAV_RW_STRUCTURED_WITH_COUNTER: Self = Self(11);
    pub const RT_ACCELERATION_STRUCTURE: Self = Self(12);
    pub const UAV_FEEDBACK_TEXTURE: Self = Self(13);

    /// Read-only resources bound to `t#` registers.
    pub fn is_shader_resource(self) -> bool {
        matches!(
            self,
            Self::TBUFFER | Self::TEXTURE | Self::STRUCTURED | Self::BYTE_ADDRESS
        )
    }

    /// Resources bound to `u#` registers.
    pub fn is_unordered_access(self) -> bool {
        matches!(
            self,
            Self::UAV_RW_TYPED
                | Self::UAV_RW_STRUCTURED
                | Self::UAV_RW_BYTE_ADDRESS
                | Self::UAV_APPEND_STRUCTURED
                | Self::UAV_CONSUME_STRUCTURED
                | Self::UAV_RW_STRUCTURED_WITH_COUNTER
        )
    }
}

/// Dimension of a resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ViewDimension(pub u32);

impl ViewDimension {
    pub const UNKNOWN: Self = Self(0);
    pub const BUFFER: Self = Self(1);
    pub const TEXTURE_1D: Self = Self(2);
    pub const TEXTURE_1D_ARRAY: Self = Self(3);
    pub const TEXTURE_2D: Self = Self(4);
    pub const TEXTURE_2D_ARRAY: Self = Self(5);
    pub const TEXTURE_2D_MS: Self = Self(6);
    pub const TEXTURE_2D_MS_ARRAY: Self = Self(7);
    pub const TEXTURE_3D: Self = Self(8);
    pub const TEXTURE_CUBE: Self = Self(9);
    pub const TEXTURE_CUBE_ARRAY: Self = Self(10);
    pub const BUFFER_EX: Self = Self(11);

    pub fn is_buffer(self) -> bool {
        matches!(self, Self::BUFFER | Self::BUFFER_EX)
    }
}

/// Per-component return type of a texture or typed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceReturnType(pub u32);

impl ResourceReturnType {
    pub const UNORM: Self = Self(1);
    pub const SNORM: Self = Self(2);
    pub const SINT: Self = Self(3);
    pub const UINT: Self = Self(4);
    pub const FLOAT: Self = Self(5);
    pub const MIXED: Self = Self(6);
    pub const DOUBLE: Self = Self(7);
    pub const CONTINUED: Self = Self(8);
}

/// `D3D_SHADER_INPUT_FLAGS` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ShaderInputFlags(pub u32);

impl ShaderInputFlags {
    pub const USER_PACKED: u32 = 0x1;
    pub const COMPARISON_SAMPLER: u32 = 0x2;
    pub const TEXTURE_COMPONENT_0: u32 = 0x4;
    pub const TEXTURE_COMPONENT_1: u32 = 0x8;
    pub const UNUSED: u32 = 0x10;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// A named resource bound to a register range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceBinding {
    pub name: String,
    pub input_type: ShaderInputType,
    pub return_type: ResourceReturnType,
    pub view_dimension: ViewDimension,
    pub sample_count: u32,
    pub bind_point: u32,
    pub bind_count: u32,
    pub flags: ShaderInputFlags,
}

impl Keyed for ResourceBinding {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl ResourceBinding {
    pub(super) fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let raw = reader.read_struct::<RawBinding>()?;
        Ok(Self {
            name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
            input_type: ShaderInputType(raw.input_type),
            return_type: ResourceReturnType(raw.return_type),
            view_dimension: ViewDimension(raw.view_dimension),
            sample_count: raw.sample_count,
            bind_point: raw.bind_point,
            bind_count: raw.bind_count,
            flags: ShaderInputFlags(raw.flags),
        })
    }

    pub(super) fn write(&self, writer: &mut RdefWriter<'_>) -> Result<()> {
        let name = writer.pointer(0)?;
        let offset = writer.pool()?.find_or_add_str(&self.name, true)?;
        writer.retarget(name, offset)?;

        let stream = writer.stream()?;
        for value in [
            self.input_type.0,
            self.return_type.0,
            self.view_dimension.0,
            self.sample_count,
            self.bind_point,
            self.bind_count,
            self.flags.0,
        ] {
            stream.write_u32_le(value)?;
        }
        Ok(())
    }

    /// Name up to the first `.`, which drops member suffixes of structured
    /// bindings.
    pub fn base_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}
