//! RDEF resource definitions: constant buffers, variable types and resource
//! bindings.
//!
//! Every record lives in a single region; names are pooled into the same
//! region as they are first referenced, so re-encoding a decoded part lays
//! strings and types out in their original order.

mod binding;
mod cbuffer;
mod types;

use std::io::Write;

use lumen_common::{
    BinaryReader, FxHashMap, FxHashSet, IndexedList, PointerId, StreamId, StringPool, SubStream,
    SubStreamOrchestrator,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

pub use binding::{
    ResourceBinding, ResourceReturnType, ShaderInputFlags, ShaderInputType, ViewDimension,
};
pub use cbuffer::{ConstantBuffer, ConstantBufferType, Variable, VariableFlags};
pub use types::{TypeId, VariableClass, VariableKind, VariableMember, VariableType};

use crate::{FourCC, Result};

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawHeader {
    cbuffer_count: u32,
    cbuffer_offset: u32,
    binding_count: u32,
    binding_offset: u32,
    minor_version: u8,
    major_version: u8,
    program_type: u16,
    compile_flags: u32,
    creator_offset: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<RawHeader>();
const RD11_SIZE: usize = 32;

/// Program type as recorded in RDEF, which differs from the SHEX encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RdefProgramType(pub u16);

impl RdefProgramType {
    pub const PIXEL: Self = Self(0xFFFF);
    pub const VERTEX: Self = Self(0xFFFE);
    pub const GEOMETRY: Self = Self(0x4753);
    pub const HULL: Self = Self(0x4853);
    pub const DOMAIN: Self = Self(0x4453);
    pub const COMPUTE: Self = Self(0x4353);

    pub fn abbreviation(self) -> Option<&'static str> {
        Some(match self {
            Self::PIXEL => "ps",
            Self::VERTEX => "vs",
            Self::GEOMETRY => "gs",
            Self::HULL => "hs",
            Self::DOMAIN => "ds",
            Self::COMPUTE => "cs",
            _ => return None,
        })
    }
}

/// Shader model 5 extension of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rd11Header {
    pub unknown: [u32; 6],
    pub interface_slot_count: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceDefinition {
    pub constant_buffers: IndexedList<ConstantBuffer>,
    pub bindings: IndexedList<ResourceBinding>,
    pub major_version: u8,
    pub minor_version: u8,
    pub program_type: RdefProgramType,
    pub compile_flags: u32,
    pub creator: String,
    pub rd11: Option<Rd11Header>,
    /// Arena of every type reachable from a variable.
    pub types: Vec<VariableType>,
}

impl ResourceDefinition {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let header = reader.read_struct::<RawHeader>()?;

        let rd11 = if reader.remaining() >= 4 && reader.peek_bytes(4)? == FourCC::RD11.as_bytes() {
            reader.skip(4);
            let mut unknown = [0; 6];
            for value in &mut unknown {
                *value = reader.read_u32()?;
            }
            Some(Rd11Header {
                unknown,
                interface_slot_count: reader.read_u32()?,
            })
        } else {
            None
        };

        let creator = reader.read_cstring_at(header.creator_offset as usize)?.to_owned();

        let mut types = types::TypeReader::new(BinaryReader::new(data), rd11.is_some());
        let mut constant_buffers = IndexedList::with_capacity(header.cbuffer_count as usize);
        reader.seek(header.cbuffer_offset as usize);
        for _ in 0..header.cbuffer_count {
            constant_buffers.push(ConstantBuffer::read(&mut reader, &mut types, rd11.is_some())?)?;
        }

        let mut bindings = IndexedList::with_capacity(header.binding_count as usize);
        reader.seek(header.binding_offset as usize);
        for _ in 0..header.binding_count {
            bindings.push(ResourceBinding::read(&mut reader)?)?;
        }

        tracing::debug!(
            cbuffers = constant_buffers.len(),
            bindings = bindings.len(),
            types = types.types.len(),
            rd11 = rd11.is_some(),
            "read resource definition"
        );

        Ok(Self {
            constant_buffers,
            bindings,
            major_version: header.major_version,
            minor_version: header.minor_version,
            program_type: RdefProgramType(header.program_type),
            compile_flags: header.compile_flags,
            creator,
            rd11,
            types: types.types,
        })
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        let mut writer = RdefWriter::new(self.rd11.is_some(), &self.types);

        let stream = writer.stream()?;
        stream.reserve(HEADER_SIZE + if self.rd11.is_some() { RD11_SIZE } else { 0 });
        stream.write_u32_le(self.constant_buffers.len() as u32)?;
        let cbuffers = writer.pointer(0)?;
        writer.stream()?.write_u32_le(self.bindings.len() as u32)?;
        let bindings = writer.pointer(0)?;
        let stream = writer.stream()?;
        stream.write_u8_le(self.minor_version)?;
        stream.write_u8_le(self.major_version)?;
        stream.write_u16_le(self.program_type.0)?;
        stream.write_u32_le(self.compile_flags)?;
        let creator = writer.pointer(0)?;

        if let Some(rd11) = &self.rd11 {
            let stream = writer.stream()?;
            stream.write_all(FourCC::RD11.as_bytes())?;
            for value in rd11.unknown {
                stream.write_u32_le(value)?;
            }
            stream.write_u32_le(rd11.interface_slot_count)?;
        }

        let stream = writer.stream()?;
        let position = stream.position();
        stream.reserve(self.bindings.len() * binding::BINDING_SIZE);
        writer.retarget(bindings, position)?;
        for binding in &self.bindings {
            binding.write(&mut writer)?;
        }

        if !self.constant_buffers.is_empty() {
            let stream = writer.stream()?;
            stream.seek_end();
            stream.pad_to_alignment(4, 0xAB)?;
            let position = stream.position();
            stream.reserve(self.constant_buffers.len() * cbuffer::CBUFFER_SIZE);
            writer.retarget(cbuffers, position)?;
            for buffer in &self.constant_buffers {
                buffer.write(&mut writer)?;
            }
        }

        let offset = writer.pool()?.find_or_add_str(&self.creator, false)?;
        writer.retarget(creator, offset)?;
        let stream = writer.stream()?;
        stream.seek_end();
        stream.pad_to_alignment(4, 0xAB)?;

        writer.orchestrator.write_all_to(destination)?;
        Ok(())
    }

    pub fn is_rd11(&self) -> bool {
        self.rd11.is_some()
    }

    pub fn variable_type(&self, id: TypeId) -> Option<&VariableType> {
        self.types.get(id.0)
    }

    pub fn constant_buffer(&self, name: &str) -> Option<&ConstantBuffer> {
        self.constant_buffers.get_by_key(&name.to_owned())
    }

    pub fn binding(&self, name: &str) -> Option<&ResourceBinding> {
        self.bindings.get_by_key(&name.to_owned())
    }
}

/// Shared state while encoding one resource definition.
pub(super) struct RdefWriter<'a> {
    orchestrator: SubStreamOrchestrator,
    data: StreamId,
    rd11: bool,
    types: &'a [VariableType],
    known_types: FxHashMap<TypeId, usize>,
    types_in_progress: FxHashSet<TypeId>,
    known_type_lists: Vec<(Vec<TypeId>, usize)>,
    known_member_lists: Vec<(Vec<VariableMember>, usize)>,
}

impl<'a> RdefWriter<'a> {
    fn new(rd11: bool, types: &'a [VariableType]) -> Self {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_pool(StringPool::new());
        Self {
            orchestrator,
            data,
            rd11,
            types,
            known_types: FxHashMap::default(),
            types_in_progress: FxHashSet::default(),
            known_type_lists: Vec::new(),
            known_member_lists: Vec::new(),
        }
    }

    /// Write a placeholder pointing at `target` within the region.
    fn pointer(&mut self, target: usize) -> Result<PointerId> {
        Ok(self
            .orchestrator
            .write_delayed_pointer::<u32>(self.data, self.data, target)?)
    }

    fn retarget(&mut self, pointer: PointerId, target: usize) -> Result<()> {
        Ok(self.orchestrator.set_pointee(pointer, target)?)
    }

    fn pool(&mut self) -> Result<&mut StringPool> {
        Ok(self.orchestrator.pool_mut(self.data)?)
    }

    fn stream(&mut self) -> Result<&mut SubStream> {
        Ok(self.orchestrator.stream_mut(self.data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn float4() -> VariableType {
        VariableType {
            class: VariableClass::VECTOR,
            kind: VariableKind::FLOAT,
            rows: 1,
            columns: 4,
            ..Default::default()
        }
    }

    fn simple() -> ResourceDefinition {
        let mut rdef = ResourceDefinition {
            major_version: 5,
            minor_version: 0,
            program_type: RdefProgramType::PIXEL,
            compile_flags: 0x8100,
            creator: "lumen".to_owned(),
            types: vec![float4()],
            ..Default::default()
        };

        rdef.bindings
            .push(ResourceBinding {
                name: "g_Tex".to_owned(),
                input_type: ShaderInputType::TEXTURE,
                return_type: ResourceReturnType::FLOAT,
                view_dimension: ViewDimension::TEXTURE_2D,
                sample_count: u32::MAX,
                bind_count: 1,
                flags: ShaderInputFlags(0xC),
                ..Default::default()
            })
            .unwrap();

        let mut buffer = ConstantBuffer {
            name: "g_Params".to_owned(),
            size: 16,
            ..Default::default()
        };
        buffer
            .variables
            .push(Variable {
                name: "g_Color".to_owned(),
                size: 16,
                flags: VariableFlags(VariableFlags::USED),
                type_id: Some(TypeId(0)),
                default_value: (0..16).collect(),
                ..Default::default()
            })
            .unwrap();
        rdef.constant_buffers.push(buffer).unwrap();
        rdef
    }

    #[test]
    fn test_layout() {
        let mut bytes = Vec::new();
        simple().write_to(&mut bytes).unwrap();

        assert_eq!(bytes.len(), 176);
        assert_eq!(u32_at(&bytes, 4), 68); // cbuffers after bindings and "g_Tex"
        assert_eq!(u32_at(&bytes, 12), 28); // bindings right after the header
        assert_eq!(u32_at(&bytes, 24), 168); // creator is pooled last
        assert_eq!(&bytes[60..66], b"g_Tex\0");
        assert_eq!(&bytes[66..68], [0xAB, 0xAB]);
        assert_eq!(u32_at(&bytes, 76), 104); // variable records
        assert_eq!(&bytes[92..101], b"g_Params\0");
        assert_eq!(u32_at(&bytes, 120), 136); // type
        assert_eq!(u32_at(&bytes, 124), 152); // default value
        assert_eq!(&bytes[152..168], (0..16).collect::<Vec<u8>>().as_slice());
        assert_eq!(&bytes[168..176], b"lumen\0\xAB\xAB");
    }

    #[test]
    fn test_round_trip() {
        let rdef = simple();
        let mut bytes = Vec::new();
        rdef.write_to(&mut bytes).unwrap();

        let decoded = ResourceDefinition::read(&bytes).unwrap();
        assert_eq!(decoded, rdef);
        assert_eq!(decoded.binding("g_Tex").map(|b| b.bind_count), Some(1));

        let mut again = Vec::new();
        decoded.write_to(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_short_default_is_padded() {
        let mut rdef = simple();
        let buffer = rdef.constant_buffers.get_mut(0).unwrap();
        buffer.variables.iter_mut().for_each(|v| {
            v.default_value = vec![1, 2, 3, 4];
        });

        let mut bytes = Vec::new();
        rdef.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[152..156], [1, 2, 3, 4]);
        assert!(bytes[156..168].iter().all(|&b| b == 0xAB));

        // The stored value is always `size` bytes long.
        let decoded = ResourceDefinition::read(&bytes).unwrap();
        let variable = decoded.constant_buffers[0].variable("g_Color").unwrap();
        assert_eq!(variable.default_value.len(), 16);
    }

    #[test]
    fn test_rd11_struct_types() {
        // A struct with two float4 members sharing one type, plus a named
        // interface it implements.
        let mut rdef = simple();
        rdef.major_version = 5;
        rdef.rd11 = Some(Rd11Header {
            unknown: [60, 24, 32, 40, 36, 12],
            interface_slot_count: 1,
        });

        let mut members = IndexedList::new();
        for (name, start) in [("Diffuse", 0), ("Specular", 16)] {
            members
                .push(VariableMember {
                    name: name.to_owned(),
                    type_id: TypeId(1),
                    start,
                })
                .unwrap();
        }
        rdef.types = vec![
            VariableType {
                class: VariableClass::STRUCT,
                kind: VariableKind::VOID,
                rows: 1,
                columns: 8,
                members,
                interfaces: vec![TypeId(2)],
                name: "Material".to_owned(),
                ..Default::default()
            },
            VariableType {
                name: "float4".to_owned(),
                ..float4()
            },
            VariableType {
                class: VariableClass::INTERFACE_CLASS,
                kind: VariableKind::INTERFACE_POINTER,
                name: "IShade".to_owned(),
                ..Default::default()
            },
        ];
        let buffer = rdef.constant_buffers.get_mut(0).unwrap();
        buffer.size = 32;
        buffer.variables.iter_mut().for_each(|v| {
            v.size = 32;
            v.default_value.clear();
            v.texture_start = u32::MAX;
            v.sampler_start = u32::MAX;
        });

        let mut bytes = Vec::new();
        rdef.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[28..32], b"RD11");
        assert_eq!(u32_at(&bytes, 12), 60);

        let decoded = ResourceDefinition::read(&bytes).unwrap();
        assert!(decoded.is_rd11());
        assert_eq!(decoded.types.len(), 3);
        let root = decoded.constant_buffers[0].variables[0].type_id.unwrap();
        let material = decoded.variable_type(root).unwrap();
        assert_eq!(material.name, "Material");
        assert_eq!(material.members.len(), 2);
        assert_eq!(material.members[0].type_id, material.members[1].type_id);
        assert_eq!(
            decoded.variable_type(material.interfaces[0]).map(|t| t.name.as_str()),
            Some("IShade")
        );

        let mut again = Vec::new();
        decoded.write_to(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_type_cycle_is_an_error() {
        let mut rdef = simple();
        let mut members = IndexedList::new();
        members
            .push(VariableMember {
                name: "next".to_owned(),
                type_id: TypeId(0),
                start: 0,
            })
            .unwrap();
        rdef.types[0].members = members;

        let mut bytes = Vec::new();
        assert!(matches!(
            rdef.write_to(&mut bytes),
            Err(crate::Error::TypeCycle(0))
        ));
    }
}
