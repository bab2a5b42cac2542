//! ISGN/OSGN/PCSG input, output and patch-constant signatures.

use std::io::Write;

use lumen_common::{BinaryReader, IndexedList, Keyed, StringPool, SubStreamOrchestrator};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

/// Raw 24-byte element record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawElement {
    name_offset: u32,
    semantic_index: u32,
    system_value: u32,
    component_type: u32,
    register: u32,
    mask: u8,
    read_write_mask: u8,
    stream: u8,
    reserved: u8,
}

const ELEMENT_SIZE: usize = std::mem::size_of::<RawElement>();

/// System-value semantic of a signature element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SystemValue(pub u32);

impl SystemValue {
    pub const UNDEFINED: Self = Self(0);
    pub const POSITION: Self = Self(1);
    pub const CLIP_DISTANCE: Self = Self(2);
    pub const CULL_DISTANCE: Self = Self(3);
    pub const RENDER_TARGET_ARRAY_INDEX: Self = Self(4);
    pub const VIEWPORT_ARRAY_INDEX: Self = Self(5);
    pub const VERTEX_ID: Self = Self(6);
    pub const PRIMITIVE_ID: Self = Self(7);
    pub const INSTANCE_ID: Self = Self(8);
    pub const IS_FRONT_FACE: Self = Self(9);
    pub const SAMPLE_INDEX: Self = Self(10);
    pub const TARGET: Self = Self(64);
    pub const DEPTH: Self = Self(65);
    pub const COVERAGE: Self = Self(66);
}

/// Scalar type of a signature register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegisterComponentType(pub u32);

impl RegisterComponentType {
    pub const UNKNOWN: Self = Self(0);
    pub const UINT32: Self = Self(1);
    pub const SINT32: Self = Self(2);
    pub const FLOAT32: Self = Self(3);
}

/// One semantic in a signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SignatureElement {
    pub name: String,
    pub semantic_index: u32,
    pub system_value: SystemValue,
    pub component_type: RegisterComponentType,
    pub register: u32,
    /// Declared components, one bit per xyzw.
    pub mask: u8,
    /// Components actually read (inputs) or never written (outputs).
    pub read_write_mask: u8,
    pub stream: u8,
}

impl Keyed for SignatureElement {
    type Key = (String, u32);

    fn key(&self) -> Self::Key {
        (self.name.clone(), self.semantic_index)
    }
}

impl SignatureElement {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let raw = reader.read_struct::<RawElement>()?;
        Ok(Self {
            name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
            semantic_index: raw.semantic_index,
            system_value: SystemValue(raw.system_value),
            component_type: RegisterComponentType(raw.component_type),
            register: raw.register,
            mask: raw.mask,
            read_write_mask: raw.read_write_mask,
            stream: raw.stream,
        })
    }
}

/// An input, output or patch-constant signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub unknown1: u32,
    pub elements: IndexedList<SignatureElement>,
}

impl Signature {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let count = reader.read_u32()?;
        let unknown1 = reader.read_u32()?;

        let mut elements = IndexedList::with_capacity(count as usize);
        for _ in 0..count {
            elements.push(SignatureElement::read(&mut reader)?)?;
        }

        tracing::trace!(elements = elements.len(), "read signature");
        Ok(Self { unknown1, elements })
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_pool(StringPool::new());

        let stream = orchestrator.stream_mut(data)?;
        stream.write_u32_le(self.elements.len() as u32)?;
        stream.write_u32_le(self.unknown1)?;
        stream.reserve(self.elements.len() * ELEMENT_SIZE);

        for element in &self.elements {
            let name = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;
            let pool = orchestrator.pool_mut(data)?;
            let offset = pool.find_or_add_str(&element.name, true)?;
            let stream = &mut pool.data;
            stream.write_u32_le(element.semantic_index)?;
            stream.write_u32_le(element.system_value.0)?;
            stream.write_u32_le(element.component_type.0)?;
            stream.write_u32_le(element.register)?;
            stream.write_all(&[element.mask, element.read_write_mask, element.stream, 0])?;
            orchestrator.set_pointee(name, offset)?;
        }

        let stream = orchestrator.stream_mut(data)?;
        stream.seek_end();
        stream.pad_to_alignment(4, 0xAB)?;

        orchestrator.write_all_to(destination)?;
        Ok(())
    }

    /// Look up an element by semantic name and index.
    pub fn element(&self, name: &str, semantic_index: u32) -> Option<&SignatureElement> {
        self.elements.get_by_key(&(name.to_owned(), semantic_index))
    }
}
