//! IFCE dynamic-linkage interfaces part.

use std::io::Write;

use lumen_common::{
    BinaryReader, IndexedList, Keyed, StreamId, StringPool, SubStream, SubStreamOrchestrator,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawHeader {
    class_instance_count: u32,
    class_type_count: u32,
    interface_slot_record_count: u32,
    interface_slot_count: u32,
    class_instance_offset: u32,
    class_type_offset: u32,
    interface_slot_offset: u32,
    unknown1: u32,
    unknown2: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawClassInstance {
    name_offset: u32,
    class_type: u16,
    unknown: u16,
    constant_buffer: u16,
    constant_buffer_offset: u16,
    texture: u16,
    sampler: u16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawClassType {
    name_offset: u32,
    id: u16,
    constant_buffer_stride: u16,
    texture: u16,
    sampler: u16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawInterfaceSlot {
    slot_span: u32,
    count: u32,
    type_ids_offset: u32,
    table_ids_offset: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<RawHeader>();
const CLASS_INSTANCE_SIZE: usize = std::mem::size_of::<RawClassInstance>();
const CLASS_TYPE_SIZE: usize = std::mem::size_of::<RawClassType>();
const INTERFACE_SLOT_SIZE: usize = std::mem::size_of::<RawInterfaceSlot>();

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInstance {
    pub name: String,
    pub class_type: u16,
    pub unknown: u16,
    pub constant_buffer: u16,
    pub constant_buffer_offset: u16,
    /// `0xFFFF` when unbound.
    pub texture: u16,
    /// `0xFFFF` when unbound.
    pub sampler: u16,
}

impl Keyed for ClassInstance {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassType {
    pub name: String,
    pub id: u16,
    pub constant_buffer_stride: u16,
    pub texture: u16,
    pub sampler: u16,
}

impl Keyed for ClassType {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// A run of interface slots and the class types/function tables bound to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceSlot {
    pub slot_span: u32,
    pub type_ids: Vec<u16>,
    pub table_ids: Vec<u32>,
}

impl InterfaceSlot {
    fn read(reader: &mut BinaryReader<'_>) -> Result<Self> {
        let raw = reader.read_struct::<RawInterfaceSlot>()?;
        let count = raw.count as usize;

        let mut ids = reader.clone();
        ids.seek(raw.type_ids_offset as usize);
        let type_ids = ids.read_u16_vec(count)?;
        ids.seek(raw.table_ids_offset as usize);
        let table_ids = ids.read_u32_vec(count)?;

        Ok(Self {
            slot_span: raw.slot_span,
            type_ids,
            table_ids,
        })
    }

    fn write(&self, orchestrator: &mut SubStreamOrchestrator, data: StreamId) -> Result<()> {
        let count = self.type_ids.len().min(self.table_ids.len());
        let stream = orchestrator.stream_mut(data)?;
        stream.write_u32_le(self.slot_span)?;
        stream.write_u32_le(count as u32)?;
        let type_ids = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;
        let table_ids = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;

        let stream = orchestrator.stream_mut(data)?;
        let saved = stream.position();
        stream.seek_end();

        stream.pad_to_alignment(4, 0xAB)?;
        let type_ids_position = stream.position();
        for &id in &self.type_ids[..count] {
            stream.write_u16_le(id)?;
        }

        stream.pad_to_alignment(4, 0xAB)?;
        let table_ids_position = stream.position();
        for &id in &self.table_ids[..count] {
            stream.write_u32_le(id)?;
        }
        stream.set_position(saved);

        orchestrator.set_pointee(type_ids, type_ids_position)?;
        orchestrator.set_pointee(table_ids, table_ids_position)?;
        Ok(())
    }
}

/// Class linkage metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Interfaces {
    pub class_instances: IndexedList<ClassInstance>,
    pub class_types: IndexedList<ClassType>,
    pub interface_slots: Vec<InterfaceSlot>,
    pub interface_slot_count: u32,
    pub unknown1: u32,
    pub unknown2: u32,
}

impl Interfaces {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let header = reader.read_struct::<RawHeader>()?;

        let mut class_instances = IndexedList::new();
        reader.seek(header.class_instance_offset as usize);
        for _ in 0..header.class_instance_count {
            let raw = reader.read_struct::<RawClassInstance>()?;
            class_instances.push(ClassInstance {
                name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
                class_type: raw.class_type,
                unknown: raw.unknown,
                constant_buffer: raw.constant_buffer,
                constant_buffer_offset: raw.constant_buffer_offset,
                texture: raw.texture,
                sampler: raw.sampler,
            })?;
        }

        let mut class_types = IndexedList::new();
        reader.seek(header.class_type_offset as usize);
        for _ in 0..header.class_type_count {
            let raw = reader.read_struct::<RawClassType>()?;
            class_types.push(ClassType {
                name: reader.read_cstring_at(raw.name_offset as usize)?.to_owned(),
                id: raw.id,
                constant_buffer_stride: raw.constant_buffer_stride,
                texture: raw.texture,
                sampler: raw.sampler,
            })?;
        }

        reader.seek(header.interface_slot_offset as usize);
        let interface_slots = (0..header.interface_slot_record_count)
            .map(|_| InterfaceSlot::read(&mut reader))
            .collect::<Result<Vec<_>>>()?;

        tracing::trace!(
            instances = class_instances.len(),
            types = class_types.len(),
            slots = interface_slots.len(),
            "read interfaces"
        );
        Ok(Self {
            class_instances,
            class_types,
            interface_slots,
            interface_slot_count: header.interface_slot_count,
            unknown1: header.unknown1,
            unknown2: header.unknown2,
        })
    }

    /// Layout: header, slot records, class types, class instances, then the
    /// slot id arrays, followed by the string table.
    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_stream(SubStream::new());
        let strings = orchestrator.add_pool(StringPool::new());

        let stream = orchestrator.stream_mut(data)?;
        stream.reserve(
            HEADER_SIZE
                + self.interface_slots.len() * INTERFACE_SLOT_SIZE
                + self.class_instances.len() * CLASS_INSTANCE_SIZE
                + self.class_types.len() * CLASS_TYPE_SIZE,
        );
        stream.write_u32_le(self.class_instances.len() as u32)?;
        stream.write_u32_le(self.class_types.len() as u32)?;
        stream.write_u32_le(self.interface_slots.len() as u32)?;
        stream.write_u32_le(self.interface_slot_count)?;
        let class_instance_offset = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;
        let class_type_offset = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;
        let interface_slot_offset = orchestrator.write_delayed_pointer::<u32>(data, data, 0)?;
        let stream = orchestrator.stream_mut(data)?;
        stream.write_u32_le(self.unknown1)?;
        stream.write_u32_le(self.unknown2)?;

        let position = stream.position();
        orchestrator.set_pointee(interface_slot_offset, position)?;
        for slot in &self.interface_slots {
            slot.write(&mut orchestrator, data)?;
        }

        // Instance names are pooled ahead of the type names.
        let pool = orchestrator.pool_mut(strings)?;
        for instance in &self.class_instances {
            pool.find_or_add_str(&instance.name, false)?;
            pool.data.pad_to_alignment(4, 0xAB)?;
        }

        let position = orchestrator.stream(data)?.position();
        orchestrator.set_pointee(class_type_offset, position)?;
        for class_type in &self.class_types {
            let name = orchestrator.pool_mut(strings)?.find_or_add_str(&class_type.name, false)?;
            orchestrator.write_delayed_pointer::<u32>(data, strings, name)?;
            orchestrator.pool_mut(strings)?.data.pad_to_alignment(4, 0xAB)?;
            let stream = orchestrator.stream_mut(data)?;
            stream.write_u16_le(class_type.id)?;
            stream.write_u16_le(class_type.constant_buffer_stride)?;
            stream.write_u16_le(class_type.texture)?;
            stream.write_u16_le(class_type.sampler)?;
        }

        let position = orchestrator.stream(data)?.position();
        orchestrator.set_pointee(class_instance_offset, position)?;
        for instance in &self.class_instances {
            let name = orchestrator
                .pool(strings)?
                .find_str(&instance.name)
                .unwrap_or(0);
            orchestrator.write_delayed_pointer::<u32>(data, strings, name)?;
            let stream = orchestrator.stream_mut(data)?;
            stream.write_u16_le(instance.class_type)?;
            stream.write_u16_le(instance.unknown)?;
            stream.write_u16_le(instance.constant_buffer)?;
            stream.write_u16_le(instance.constant_buffer_offset)?;
            stream.write_u16_le(instance.texture)?;
            stream.write_u16_le(instance.sampler)?;
        }

        orchestrator.write_all_to(destination)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Interfaces {
        let mut part = Interfaces {
            interface_slot_count: 2,
            ..Default::default()
        };
        part.class_types
            .push(ClassType {
                name: "cLight".to_owned(),
                id: 0,
                constant_buffer_stride: 16,
                texture: 0,
                sampler: 0,
            })
            .unwrap();
        part.class_types
            .push(ClassType {
                name: "cAmbient".to_owned(),
                id: 1,
                ..Default::default()
            })
            .unwrap();
        part.class_instances
            .push(ClassInstance {
                name: "g_light".to_owned(),
                texture: 0xFFFF,
                sampler: 0xFFFF,
                ..Default::default()
            })
            .unwrap();
        part.interface_slots.push(InterfaceSlot {
            slot_span: 2,
            type_ids: vec![0, 1, 1],
            table_ids: vec![0, 1, 2],
        });
        part
    }

    #[test]
    fn test_round_trip() {
        let part = sample();
        let mut bytes = Vec::new();
        part.write_to(&mut bytes).unwrap();

        let decoded = Interfaces::read(&bytes).unwrap();
        assert_eq!(decoded, part);

        let mut again = Vec::new();
        decoded.write_to(&mut again).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_layout() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();

        let reader = BinaryReader::new(&bytes);
        let header = BinaryReader::new(&bytes).read_struct::<RawHeader>().unwrap();
        assert_eq!({ header.interface_slot_offset }, 36);
        assert_eq!({ header.class_type_offset }, 52);
        assert_eq!({ header.class_instance_offset }, 76);

        // Ids follow the fixed records: 3 u16s padded with 0xAB, then 3 u32s.
        assert_eq!(&bytes[92..100], &[0, 0, 1, 0, 1, 0, 0xAB, 0xAB]);
        assert_eq!(&bytes[100..112], &[0, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0]);

        // Instance names are pooled first, so "g_light" opens the string table.
        assert_eq!(reader.read_cstring_at(112).unwrap(), "g_light");
        assert_eq!(reader.read_cstring_at(120).unwrap(), "cLight");
    }
}
