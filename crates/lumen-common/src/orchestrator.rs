//! Relocating multi-stream writer.
//!
//! Binary formats in this workspace point forward into data that has not
//! been laid out yet, often in another region of the file. The
//! [`SubStreamOrchestrator`] keeps one growable buffer per region, records
//! every pointer as a fixup against a (stream, offset) target, and only
//! resolves the fixups once all regions have their final lengths.
//!
//! # Example
//!
//! ```
//! use lumen_common::{StringPool, SubStreamOrchestrator};
//!
//! let mut orchestrator = SubStreamOrchestrator::new(0);
//! let data = orchestrator.add_stream(Default::default());
//! let strings = orchestrator.add_pool(StringPool::new());
//!
//! orchestrator.stream_mut(data)?.write_u32_le(2)?;
//! let name = orchestrator.pool_mut(strings)?.find_or_add(b"hello", false)?;
//! orchestrator.write_delayed_pointer::<u32>(data, strings, name)?;
//!
//! let mut out = Vec::new();
//! orchestrator.write_all_to(&mut out)?;
//! assert_eq!(out, b"\x02\0\0\0\x08\0\0\0hello\0");
//! # Ok::<(), lumen_common::Error>(())
//! ```

use std::io::Write;

use crate::stream::SubStream;
use crate::string_pool::StringPool;
use crate::{Error, Result};

/// Stable handle of a registered region.
///
/// Handles survive [`SubStreamOrchestrator::insert_before`]; only the
/// region's position in the output order changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(usize);

/// Handle to a recorded pointer whose target may still move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointerId(usize);

/// Integer widths a delayed pointer can be patched with.
pub trait PointerWidth {
    const SIZE: usize;
}

impl PointerWidth for u8 {
    const SIZE: usize = 1;
}

impl PointerWidth for u16 {
    const SIZE: usize = 2;
}

impl PointerWidth for u32 {
    const SIZE: usize = 4;
}

impl PointerWidth for u64 {
    const SIZE: usize = 8;
}

/// A region is either a plain stream or a string pool, whose bytes are
/// themselves a stream.
#[derive(Debug)]
enum Region {
    Plain(SubStream),
    Pool(StringPool),
}

impl Region {
    fn stream(&self) -> &SubStream {
        match self {
            Region::Plain(stream) => stream,
            Region::Pool(pool) => &pool.data,
        }
    }

    fn stream_mut(&mut self) -> &mut SubStream {
        match self {
            Region::Plain(stream) => stream,
            Region::Pool(pool) => &mut pool.data,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DelayedPointer {
    pointer_stream: usize,
    pointer_position: usize,
    size: usize,
    pointee_stream: usize,
    pointee_position: usize,
}

/// Owns the regions of one output and the fixups between them.
#[derive(Debug)]
pub struct SubStreamOrchestrator {
    base_offset: usize,
    regions: Vec<Region>,
    /// Output order: `order[i]` is the region index emitted i-th.
    order: Vec<usize>,
    pointers: Vec<DelayedPointer>,
}

impl SubStreamOrchestrator {
    /// Create an orchestrator whose first region starts at `base_offset` in
    /// the final output.
    pub fn new(base_offset: usize) -> Self {
        Self {
            base_offset,
            regions: Vec::new(),
            order: Vec::new(),
            pointers: Vec::new(),
        }
    }

    fn register(&mut self, region: Region) -> (StreamId, usize) {
        let id = self.regions.len();
        self.regions.push(region);
        (StreamId(id), id)
    }

    /// Append a plain stream to the output order.
    pub fn add_stream(&mut self, stream: SubStream) -> StreamId {
        let (id, index) = self.register(Region::Plain(stream));
        self.order.push(index);
        id
    }

    /// Append a string pool to the output order.
    pub fn add_pool(&mut self, pool: StringPool) -> StreamId {
        let (id, index) = self.register(Region::Pool(pool));
        self.order.push(index);
        id
    }

    /// Insert a plain stream before `existing`, shifting every recorded
    /// pointer that refers to a region at or after the insertion point.
    pub fn insert_before(&mut self, existing: StreamId, stream: SubStream) -> Result<StreamId> {
        let at = self.order_of(existing)?;
        let (id, index) = self.register(Region::Plain(stream));
        self.order.insert(at, index);
        for pointer in &mut self.pointers {
            if pointer.pointer_stream >= at {
                pointer.pointer_stream += 1;
            }
            if pointer.pointee_stream >= at {
                pointer.pointee_stream += 1;
            }
        }
        Ok(id)
    }

    fn order_of(&self, id: StreamId) -> Result<usize> {
        self.order
            .iter()
            .position(|&index| index == id.0)
            .ok_or_else(|| Error::InvalidArgument(format!("stream {:?} is not registered", id)))
    }

    /// Borrow a registered region's byte stream.
    pub fn stream(&self, id: StreamId) -> Result<&SubStream> {
        self.regions
            .get(id.0)
            .map(Region::stream)
            .ok_or_else(|| Error::InvalidArgument(format!("stream {:?} is not registered", id)))
    }

    /// Mutably borrow a registered region's byte stream.
    pub fn stream_mut(&mut self, id: StreamId) -> Result<&mut SubStream> {
        self.regions
            .get_mut(id.0)
            .map(Region::stream_mut)
            .ok_or_else(|| Error::InvalidArgument(format!("stream {:?} is not registered", id)))
    }

    /// Mutably borrow a registered string pool.
    pub fn pool_mut(&mut self, id: StreamId) -> Result<&mut StringPool> {
        match self.regions.get_mut(id.0) {
            Some(Region::Pool(pool)) => Ok(pool),
            _ => Err(Error::InvalidArgument(format!(
                "stream {:?} is not a string pool",
                id
            ))),
        }
    }

    /// Borrow a registered string pool.
    pub fn pool(&self, id: StreamId) -> Result<&StringPool> {
        match self.regions.get(id.0) {
            Some(Region::Pool(pool)) => Ok(pool),
            _ => Err(Error::InvalidArgument(format!(
                "stream {:?} is not a string pool",
                id
            ))),
        }
    }

    /// Reserve `T::SIZE` zero bytes at `pointer_stream`'s cursor and record
    /// that they must hold the final offset of `pointee_position` within
    /// `pointee_stream`.
    pub fn write_delayed_pointer<T: PointerWidth>(
        &mut self,
        pointer_stream: StreamId,
        pointee_stream: StreamId,
        pointee_position: usize,
    ) -> Result<PointerId> {
        let pointer_order = self.order_of(pointer_stream)?;
        let pointee_order = self.order_of(pointee_stream)?;

        let stream = self.stream_mut(pointer_stream)?;
        let pointer_position = stream.position();
        stream.write_all(&[0u8; 8][..T::SIZE])?;

        self.pointers.push(DelayedPointer {
            pointer_stream: pointer_order,
            pointer_position,
            size: T::SIZE,
            pointee_stream: pointee_order,
            pointee_position,
        });
        Ok(PointerId(self.pointers.len() - 1))
    }

    /// Retarget a recorded pointer within its pointee stream.
    pub fn set_pointee(&mut self, pointer: PointerId, position: usize) -> Result<()> {
        let pointer = self
            .pointers
            .get_mut(pointer.0)
            .ok_or_else(|| Error::InvalidArgument(format!("pointer {:?} is not recorded", pointer)))?;
        pointer.pointee_position = position;
        Ok(())
    }

    /// Total length of all regions.
    pub fn len(&self) -> usize {
        self.regions.iter().map(|r| r.stream().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve every pointer and write all regions, in order, to
    /// `destination`. Region cursors are left where they were.
    pub fn write_all_to<W: Write>(&mut self, destination: &mut W) -> Result<()> {
        let mut offsets = Vec::with_capacity(self.order.len());
        let mut next = self.base_offset;
        for &index in &self.order {
            offsets.push(next);
            next += self.regions[index].stream().len();
        }

        for pointer in &self.pointers {
            let value = (offsets[pointer.pointee_stream] + pointer.pointee_position) as u64;
            let stream = self.regions[self.order[pointer.pointer_stream]].stream_mut();
            let saved = stream.position();
            stream.set_position(pointer.pointer_position);
            stream.write_all(&value.to_le_bytes()[..pointer.size])?;
            stream.set_position(saved);
        }

        for &index in &self.order {
            destination.write_all(self.regions[index].stream().as_slice())?;
        }
        Ok(())
    }

    /// Resolve and concatenate into a fresh buffer.
    pub fn to_vec(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len());
        self.write_all_to(&mut out)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_pointer_resolved_late() {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_stream(SubStream::new());

        let pointer = orchestrator
            .write_delayed_pointer::<u32>(data, data, 0)
            .unwrap();
        let stream = orchestrator.stream_mut(data).unwrap();
        stream.write_u32_le(0xDEADBEEF).unwrap();
        let target = stream.position();
        stream.write_u16_le(0x1234).unwrap();
        orchestrator.set_pointee(pointer, target).unwrap();

        let out = orchestrator.to_vec().unwrap();
        assert_eq!(out, [8, 0, 0, 0, 0xEF, 0xBE, 0xAD, 0xDE, 0x34, 0x12]);
    }

    #[test]
    fn test_cross_stream_with_base_offset() {
        let mut orchestrator = SubStreamOrchestrator::new(0x100);
        let header = orchestrator.add_stream(SubStream::new());
        let body = orchestrator.add_stream(SubStream::new());

        orchestrator.stream_mut(body).unwrap().write_all(b"zz").unwrap();
        orchestrator.write_delayed_pointer::<u16>(header, body, 1).unwrap();
        orchestrator.write_delayed_pointer::<u32>(header, header, 0).unwrap();

        let out = orchestrator.to_vec().unwrap();
        // header is 6 bytes, so body starts at 0x106
        assert_eq!(out, [0x07, 0x01, 0x00, 0x01, 0x00, 0x00, b'z', b'z']);
    }

    #[test]
    fn test_insert_before_shifts_fixups() {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let first = orchestrator.add_stream(SubStream::new());
        let second = orchestrator.add_stream(SubStream::new());

        orchestrator.stream_mut(second).unwrap().write_all(b"ab").unwrap();
        orchestrator.write_delayed_pointer::<u8>(first, second, 1).unwrap();
        orchestrator.write_delayed_pointer::<u8>(second, first, 0).unwrap();

        let spliced = orchestrator
            .insert_before(first, SubStream::from_vec(b"HDR".to_vec()))
            .unwrap();
        assert_ne!(spliced, first);

        let out = orchestrator.to_vec().unwrap();
        // HDR(3) | first: [ptr -> second+1] | second: "ab" [ptr -> first]
        assert_eq!(out, [b'H', b'D', b'R', 5, b'a', b'b', 3]);
    }

    #[test]
    fn test_cursors_survive_resolution() {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_stream(SubStream::new());
        orchestrator.stream_mut(data).unwrap().reserve(4);
        orchestrator.write_delayed_pointer::<u32>(data, data, 2).unwrap();

        orchestrator.to_vec().unwrap();
        assert_eq!(orchestrator.stream(data).unwrap().position(), 4);
    }

    #[test]
    fn test_unregistered_stream_is_rejected() {
        let mut other = SubStreamOrchestrator::new(0);
        other.add_stream(SubStream::new());
        let foreign = other.add_stream(SubStream::new());

        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_stream(SubStream::new());

        assert!(matches!(
            orchestrator.write_delayed_pointer::<u32>(data, foreign, 0),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            orchestrator.pool_mut(data),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unrecorded_pointer_is_rejected() {
        let mut other = SubStreamOrchestrator::new(0);
        let scratch = other.add_stream(SubStream::new());
        other.write_delayed_pointer::<u32>(scratch, scratch, 0).unwrap();
        let foreign = other.write_delayed_pointer::<u32>(scratch, scratch, 0).unwrap();

        let mut orchestrator = SubStreamOrchestrator::new(0);
        let data = orchestrator.add_stream(SubStream::new());
        let pointer = orchestrator.write_delayed_pointer::<u32>(data, data, 0).unwrap();

        assert!(matches!(
            orchestrator.set_pointee(foreign, 0),
            Err(Error::InvalidArgument(_))
        ));
        orchestrator.set_pointee(pointer, 4).unwrap();
        assert_eq!(orchestrator.to_vec().unwrap(), [4, 0, 0, 0]);
    }
}
