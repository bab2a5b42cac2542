//! Binary reader for zero-copy parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! little-endian data from a byte slice without copying. Besides sequential
//! reads it can resolve strings at absolute offsets and carve out independent
//! sub-readers, since the formats handled here address most of their content
//! by offset rather than by stream order.

use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use crate::{Error, Result};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use lumen_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, b'h', b'i', 0x00];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_cstring_at(4).unwrap(), "hi");
/// assert_eq!(reader.position(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// The whole underlying buffer, regardless of position.
    #[inline]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Advance the position by a number of bytes.
    #[inline]
    pub fn skip(&mut self, count: usize) {
        self.position = self.position.saturating_add(count);
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Borrow `length` bytes at an absolute offset.
    pub fn bytes_at(&self, offset: usize, length: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(length)
            .filter(|&end| end <= self.data.len())
            .map(|end| &self.data[offset..end])
            .ok_or(Error::OutOfRange {
                offset,
                length,
                bound: self.data.len(),
            })
    }

    /// Create an independent reader over `count` bytes starting at `offset`.
    ///
    /// The sub-reader's offsets are relative to `offset`.
    pub fn slice_from(&self, offset: usize, count: usize) -> Result<BinaryReader<'a>> {
        self.bytes_at(offset, count).map(BinaryReader::new)
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available: self.remaining(),
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a little-endian u16.
    #[inline]
    pub fn read_u16(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Read a little-endian i32.
    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let offset = self.position;
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Borrow `count` consecutive records without copying.
    ///
    /// Only unaligned layouts (packed structs, bytes, zerocopy's
    /// little-endian integer wrappers) can be viewed in place.
    pub fn read_n<T>(&mut self, count: usize) -> Result<&'a [T]>
    where
        T: FromBytes + KnownLayout + Immutable + Unaligned,
    {
        let offset = self.position;
        let size = std::mem::size_of::<T>()
            .checked_mul(count)
            .ok_or(Error::OutOfRange {
                offset,
                length: usize::MAX,
                bound: self.data.len(),
            })?;
        let bytes = self.read_bytes(size)?;
        <[T]>::ref_from_bytes_with_elems(bytes, count).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Read `count` little-endian u16 values.
    pub fn read_u16_vec(&mut self, count: usize) -> Result<Vec<u16>> {
        Ok(self
            .read_bytes(count.saturating_mul(2))?
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Read `count` little-endian u32 values.
    pub fn read_u32_vec(&mut self, count: usize) -> Result<Vec<u32>> {
        Ok(self
            .read_bytes(count.saturating_mul(4))?
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Read a null-terminated UTF-8 string at an absolute offset.
    ///
    /// The cursor is not moved.
    pub fn read_cstring_at(&self, offset: usize) -> Result<&'a str> {
        let tail = self.data.get(offset..).ok_or(Error::OutOfRange {
            offset,
            length: 0,
            bound: self.data.len(),
        })?;
        let nul = memchr::memchr(0, tail).ok_or(Error::MissingNullTerminator(offset))?;
        std::str::from_utf8(&tail[..nul]).map_err(Error::Utf8)
    }

    /// Read a fixed-length UTF-8 string at an absolute offset.
    pub fn read_string_at(&self, offset: usize, length: usize) -> Result<&'a str> {
        std::str::from_utf8(self.bytes_at(offset, length)?).map_err(Error::Utf8)
    }

    /// Peek at a value without advancing.
    #[inline]
    pub fn peek_u32(&self) -> Result<u32> {
        let bytes = self.peek_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Expect specific magic bytes.
    pub fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}
