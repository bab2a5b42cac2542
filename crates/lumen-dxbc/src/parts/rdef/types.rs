//! Variable types and struct members.
//!
//! Types form a graph: struct members, base classes, super classes and
//! implemented interfaces all refer to other types, and the compiler shares
//! identical subgraphs. Decoded types therefore live in an arena owned by the
//! [`ResourceDefinition`](super::ResourceDefinition) and refer to each other by
//! [`TypeId`].

use lumen_common::{BinaryReader, FxHashMap, IndexedList, Keyed};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::RdefWriter;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawType {
    class: u16,
    kind: u16,
    rows: u16,
    columns: u16,
    elements: u16,
    member_count: u16,
    member_offset: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawTypeRd11 {
    base_type_offset: u32,
    super_type_offset: u32,
    interface_count: u32,
    interface_offset: u32,
    name_offset: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawMember {
    name_offset: u32,
    type_offset: u32,
    start: u32,
}

const TYPE_SIZE: usize = std::mem::size_of::<RawType>();
const TYPE_RD11_SIZE: usize = std::mem::size_of::<RawTypeRd11>();
const MEMBER_SIZE: usize = std::mem::size_of::<RawMember>();

/// Index of a type in a resource definition's type arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// `D3D_SHADER_VARIABLE_CLASS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VariableClass(pub u16);

impl VariableClass {
    pub const SCALAR: Self = Self(0);
    pub const VECTOR: Self = Self(1);
    pub const MATRIX_ROWS: Self = Self(2);
    pub const MATRIX_COLUMNS: Self = Self(3);
    pub const OBJECT: Self = Self(4);
    pub const STRUCT: Self = Self(5);
    pub const INTERFACE_CLASS: Self = Self(6);
    pub const INTERFACE_POINTER: Self = Self(7);
}

/// `D3D_SHADER_VARIABLE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VariableKind(pub u16);

impl VariableKind {
    pub const VOID: Self = Self(0);
    pub const BOOL: Self = Self(1);
    pub const INT: Self = Self(2);
    pub const FLOAT: Self = Self(3);
    pub const STRING: Self = Self(4);
    pub const TEXTURE: Self = Self(5);
    pub const SAMPLER: Self = Self(10);
    pub const UINT: Self = Self(19);
    pub const DOUBLE: Self = Self(39);
    pub const INTERFACE_POINTER: Self = Self(35);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableMember {
    pub name: String,
    pub type_id: TypeId,
    /// Byte offset within the parent struct.
    pub start: u32,
}

impl Keyed for VariableMember {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableType {
    pub class: VariableClass,
    pub kind: VariableKind,
    pub rows: u16,
    pub columns: u16,
    pub elements: u16,
    pub members: IndexedList<VariableMember>,
    pub base_type: Option<TypeId>,
    pub super_type: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    /// Only stored by the RD11 layout.
    pub name: String,
}

/// Reads types, sharing one arena slot per distinct offset.
pub(super) struct TypeReader<'a> {
    data: BinaryReader<'a>,
    rd11: bool,
    known: FxHashMap<usize, TypeId>,
    pub(super) types: Vec<VariableType>,
}

impl<'a> TypeReader<'a> {
    pub(super) fn new(data: BinaryReader<'a>, rd11: bool) -> Self {
        Self {
            data,
            rd11,
            known: FxHashMap::default(),
            types: Vec::new(),
        }
    }

    pub(super) fn read(&mut self, offset: usize) -> Result<TypeId> {
        if let Some(&id) = self.known.get(&offset) {
            return Ok(id);
        }

        let id = TypeId(self.types.len());
        self.types.push(VariableType::default());
        self.known.insert(offset, id);

        match self.read_at(offset) {
            Ok(decoded) => {
                self.types[id.0] = decoded;
                Ok(id)
            }
            Err(e) => {
                self.known.remove(&offset);
                Err(e)
            }
        }
    }

    fn read_at(&mut self, offset: usize) -> Result<VariableType> {
        let mut reader = self.data.clone();
        reader.seek(offset);
        let raw = reader.read_struct::<RawType>()?;

        let mut members = IndexedList::with_capacity(raw.member_count as usize);
        if raw.member_count > 0 {
            let mut member_reader = self.data.clone();
            member_reader.seek(raw.member_offset as usize);
            for _ in 0..raw.member_count {
                let member = member_reader.read_struct::<RawMember>()?;
                let name = self.data.read_cstring_at(member.name_offset as usize)?.to_owned();
                let type_id = self.read(member.type_offset as usize)?;
                members.push(VariableMember {
                    name,
                    type_id,
                    start: member.start,
                })?;
            }
        }

        let mut decoded = VariableType {
            class: VariableClass(raw.class),
            kind: VariableKind(raw.kind),
            rows: raw.rows,
            columns: raw.columns,
            elements: raw.elements,
            members,
            ..Default::default()
        };

        if self.rd11 {
            let ext = reader.read_struct::<RawTypeRd11>()?;
            if ext.base_type_offset > 0 {
                decoded.base_type = Some(self.read(ext.base_type_offset as usize)?);
            }
            if ext.super_type_offset > 0 {
                decoded.super_type = Some(self.read(ext.super_type_offset as usize)?);
            }
            if ext.interface_count > 0 && ext.interface_offset > 0 {
                let mut list = self.data.clone();
                list.seek(ext.interface_offset as usize);
                for offset in list.read_u32_vec(ext.interface_count as usize)? {
                    decoded.interfaces.push(self.read(offset as usize)?);
                }
            }
            decoded.name = self.data.read_cstring_at(ext.name_offset as usize)?.to_owned();
        }

        Ok(decoded)
    }
}

impl RdefWriter<'_> {
    /// Write a type and everything it refers to, returning its offset.
    pub(super) fn write_type(&mut self, id: TypeId) -> Result<usize> {
        if let Some(&position) = self.known_types.get(&id) {
            return Ok(position);
        }
        if !self.types_in_progress.insert(id) {
            return Err(Error::TypeCycle(id.0));
        }
        let types = self.types;
        let ty = types.get(id.0).ok_or_else(|| {
            Error::malformed("resource definition", format!("type {} is not in the arena", id.0))
        })?;

        let mut interface_position = 0;
        if self.rd11 {
            self.pool()?.find_or_add_str(&ty.name, false)?;
            if let Some(base) = ty.base_type {
                self.write_type(base)?;
            }
            if let Some(parent) = ty.super_type {
                self.write_type(parent)?;
            }
            if !ty.interfaces.is_empty() {
                interface_position = self.write_type_list(&ty.interfaces)?;
            }
        }

        for member in &ty.members {
            self.pool()?.find_or_add_str(&member.name, false)?;
            self.write_type(member.type_id)?;
        }

        let members_written = !ty.members.is_empty() || ty.class == VariableClass::INTERFACE_CLASS;
        let member_position = if members_written {
            self.write_member_list(&ty.members)?
        } else {
            0
        };

        let rd11 = self.rd11;
        let stream = self.stream()?;
        stream.pad_to_alignment(4, 0xAB)?;
        stream.reserve(TYPE_SIZE + if rd11 { TYPE_RD11_SIZE } else { 0 });
        let type_position = stream.position();
        self.known_types.insert(id, type_position);
        self.types_in_progress.remove(&id);

        let stream = self.stream()?;
        for value in [ty.class.0, ty.kind.0, ty.rows, ty.columns, ty.elements] {
            stream.write_u16_le(value)?;
        }
        stream.write_u16_le(ty.members.len() as u16)?;
        if members_written {
            self.pointer(member_position)?;
        } else {
            self.stream()?.write_u32_le(0)?;
        }

        if self.rd11 {
            for related in [ty.base_type, ty.super_type] {
                match related.and_then(|t| self.known_types.get(&t).copied()) {
                    Some(position) => {
                        self.pointer(position)?;
                    }
                    None => self.stream()?.write_u32_le(0)?,
                }
            }
            self.stream()?.write_u32_le(ty.interfaces.len() as u32)?;
            self.pointer(interface_position)?;
            let name = self.pool()?.find_str(&ty.name).unwrap_or(0);
            self.pointer(name)?;
        }

        Ok(type_position)
    }

    fn write_type_list(&mut self, list: &[TypeId]) -> Result<usize> {
        if let Some((_, position)) = self.known_type_lists.iter().find(|(l, _)| l == list) {
            return Ok(*position);
        }

        let positions = list
            .iter()
            .map(|&id| self.write_type(id))
            .collect::<Result<Vec<_>>>()?;

        self.stream()?.pad_to_alignment(4, 0xAB)?;
        let position = self.stream()?.position();
        for target in positions {
            self.pointer(target)?;
        }

        self.known_type_lists.push((list.to_vec(), position));
        Ok(position)
    }

    fn write_member_list(&mut self, members: &IndexedList<VariableMember>) -> Result<usize> {
        let snapshot: Vec<VariableMember> = members.iter().cloned().collect();
        if let Some((_, position)) = self
            .known_member_lists
            .iter()
            .find(|(l, _)| *l == snapshot)
        {
            return Ok(*position);
        }

        let stream = self.stream()?;
        stream.pad_to_alignment(4, 0xAB)?;
        stream.reserve(snapshot.len() * MEMBER_SIZE);
        let position = stream.position();

        for member in &snapshot {
            let name = self.pool()?.find_str(&member.name).unwrap_or(0);
            self.pointer(name)?;
            match self.known_types.get(&member.type_id).copied() {
                Some(target) => {
                    self.pointer(target)?;
                }
                None => self.stream()?.write_u32_le(0)?,
            }
            self.stream()?.write_u32_le(member.start)?;
        }

        self.known_member_lists.push((snapshot, position));
        Ok(position)
    }
}
