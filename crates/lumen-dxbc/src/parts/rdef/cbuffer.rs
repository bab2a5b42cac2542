//! Constant buffers and the variables they hold.

use std::io::Write;

use lumen_common::{BinaryReader, IndexedList, Keyed};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::types::{TypeId, TypeReader};
use super::RdefWriter;
use crate::Result;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawConstantBuffer {
    name_offset: u32,
    variable_count: u32,
    variable_offset: u32,
    size: u32,
    flags: u32,
    buffer_type: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawVariable {
    name_offset: u32,
    start: u32,
    size: u32,
    flags: u32,
    type_offset: u32,
    default_offset: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawVariableRd11 {
    texture_start: u32,
    texture_size: u32,
    sampler_start: u32,
    sampler_size: u32,
}

pub(super) const CBUFFER_SIZE: usize = std::mem::size_of::<RawConstantBuffer>();
const VARIABLE_SIZE: usize = std::mem::size_of::<RawVariable>();
const VARIABLE_RD11_SIZE: usize = std::mem::size_of::<RawVariableRd11>();

/// `D3D_CBUFFER_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConstantBufferType(pub u32);

impl ConstantBufferType {
    pub const CBUFFER: Self = Self(0);
    pub const TBUFFER: Self = Self(1);
    pub const INTERFACE_POINTERS: Self = Self(2);
    pub const RESOURCE_BIND_INFO: Self = Self(3);

    /// HLSL keyword used when declaring a buffer of this type.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::TBUFFER => "tbuffer",
            Self::INTERFACE_POINTERS => "interfaces",
            Self::RESOURCE_BIND_INFO => "Resource bind info for",
            _ => "cbuffer",
        }
    }
}

/// `D3D_SHADER_VARIABLE_FLAGS` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VariableFlags(pub u32);

impl VariableFlags {
    pub const USER_PACKED: u32 = 0x1;
    pub const USED: u32 = 0x2;
    pub const INTERFACE_POINTER: u32 = 0x4;
    pub const INTERFACE_PARAMETER: u32 = 0x8;

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variable {
    pub name: String,
    /// Byte offset within the buffer.
    pub start: u32,
    pub size: u32,
    pub flags: VariableFlags,
    pub type_id: Option<TypeId>,
    /// Initial value, at most `size` bytes of which are stored.
    pub default_value: Vec<u8>,
    pub texture_start: u32,
    pub texture_size: u32,
    pub sampler_start: u32,
    pub sampler_size: u32,
}

impl Keyed for Variable {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl Variable {
    fn read(reader: &mut BinaryReader<'_>, types: &mut TypeReader<'_>, rd11: bool) -> Result<Self> {
        let raw = reader.read_struct::<RawVariable>()?;

        let mut variable = Self {
            name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
            start: raw.start,
            size: raw.size,
            flags: VariableFlags(raw.flags),
            ..Default::default()
        };
        if raw.default_offset > 0 && raw.size > 0 {
            variable.default_value = reader
                .bytes_at(raw.default_offset as usize, raw.size as usize)?
                .to_vec();
        }
        if rd11 {
            let ext = reader.read_struct::<RawVariableRd11>()?;
            variable.texture_start = ext.texture_start;
            variable.texture_size = ext.texture_size;
            variable.sampler_start = ext.sampler_start;
            variable.sampler_size = ext.sampler_size;
        }
        variable.type_id = Some(types.read(raw.type_offset as usize)?);

        Ok(variable)
    }

    fn write(&self, writer: &mut RdefWriter<'_>) -> Result<()> {
        let name = writer.pointer(0)?;
        let stream = writer.stream()?;
        stream.write_u32_le(self.start)?;
        stream.write_u32_le(self.size)?;
        stream.write_u32_le(self.flags.0)?;

        let type_pointer = match self.type_id {
            Some(_) => Some(writer.pointer(0)?),
            None => {
                writer.stream()?.write_u32_le(0)?;
                None
            }
        };
        let default_pointer = if self.default_value.is_empty() {
            writer.stream()?.write_u32_le(0)?;
            None
        } else {
            Some(writer.pointer(0)?)
        };

        if writer.rd11 {
            let stream = writer.stream()?;
            stream.write_u32_le(self.texture_start)?;
            stream.write_u32_le(self.texture_size)?;
            stream.write_u32_le(self.sampler_start)?;
            stream.write_u32_le(self.sampler_size)?;
        }

        let saved = writer.stream()?.position();
        writer.stream()?.seek_end();

        let offset = writer.pool()?.find_or_add_str(&self.name, false)?;
        writer.retarget(name, offset)?;

        if let (Some(pointer), Some(id)) = (type_pointer, self.type_id) {
            let offset = writer.write_type(id)?;
            writer.retarget(pointer, offset)?;
        }

        if let Some(pointer) = default_pointer {
            let size = self.size as usize;
            let stream = writer.stream()?;
            stream.pad_to_alignment(4, 0xAB)?;
            let offset = stream.position();
            let stored = size.min(self.default_value.len());
            stream.write_all(&self.default_value[..stored])?;
            stream.write_repeat(size.saturating_sub(self.default_value.len()), 0xAB)?;
            writer.retarget(pointer, offset)?;
        }

        writer.stream()?.set_position(saved);
        Ok(())
    }
}

/// A named buffer of shader constants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConstantBuffer {
    pub name: String,
    pub variables: IndexedList<Variable>,
    /// Size in bytes.
    pub size: u32,
    pub flags: u32,
    pub buffer_type: ConstantBufferType,
}

impl Keyed for ConstantBuffer {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

impl ConstantBuffer {
    pub(super) fn read(
        reader: &mut BinaryReader<'_>,
        types: &mut TypeReader<'_>,
        rd11: bool,
    ) -> Result<Self> {
        let raw = reader.read_struct::<RawConstantBuffer>()?;

        let mut buffer = Self {
            name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
            size: raw.size,
            flags: raw.flags,
            buffer_type: ConstantBufferType(raw.buffer_type),
            ..Default::default()
        };

        let mut variables = reader.clone();
        variables.seek(raw.variable_offset as usize);
        for _ in 0..raw.variable_count {
            buffer
                .variables
                .push(Variable::read(&mut variables, types, rd11)?)?;
        }

        Ok(buffer)
    }

    pub(super) fn write(&self, writer: &mut RdefWriter<'_>) -> Result<()> {
        let name = writer.pointer(0)?;
        let offset = writer.pool()?.find_or_add_str(&self.name, true)?;
        writer.retarget(name, offset)?;

        writer.stream()?.write_u32_le(self.variables.len() as u32)?;
        let variables = writer.pointer(0)?;
        let stream = writer.stream()?;
        stream.write_u32_le(self.size)?;
        stream.write_u32_le(self.flags)?;
        stream.write_u32_le(self.buffer_type.0)?;

        let saved = stream.position();
        stream.seek_end();
        stream.pad_to_alignment(4, 0xAB)?;
        let position = stream.position();
        let record = VARIABLE_SIZE + if writer.rd11 { VARIABLE_RD11_SIZE } else { 0 };
        writer.stream()?.reserve(self.variables.len() * record);
        writer.retarget(variables, position)?;

        for variable in &self.variables {
            variable.write(writer)?;
        }

        writer.stream()?.set_position(saved);
        Ok(())
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get_by_key(&name.to_owned())
    }
}
