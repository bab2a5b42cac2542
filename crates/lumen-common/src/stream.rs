//! Growable, seekable in-memory byte streams.
//!
//! A [`SubStream`] behaves like a memory stream: writes at the cursor
//! overwrite existing bytes and extend the buffer when they run past its end,
//! and seeking past the end zero-fills the gap on the next write. It is the
//! unit the relocating writer concatenates.

use std::io::{self, Cursor, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};

/// One growable region of a multi-region binary output.
#[derive(Debug, Clone, Default)]
pub struct SubStream {
    cursor: Cursor<Vec<u8>>,
}

impl SubStream {
    /// Create an empty stream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stream over existing bytes, positioned at the end.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let position = data.len() as u64;
        let mut cursor = Cursor::new(data);
        cursor.set_position(position);
        Self { cursor }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.cursor.set_position(position as u64);
    }

    /// Move the cursor to the end of the stream and return the new position.
    #[inline]
    pub fn seek_end(&mut self) -> usize {
        let len = self.len();
        self.set_position(len);
        len
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }

    /// Make sure at least `count` bytes exist after the cursor, zero-extending
    /// the stream if needed. The cursor does not move.
    pub fn reserve(&mut self, count: usize) {
        let wanted = self.position() + count;
        if self.len() < wanted {
            self.cursor.get_mut().resize(wanted, 0);
        }
    }

    /// Write `count` copies of `value` at the cursor.
    pub fn write_repeat(&mut self, count: usize, value: u8) -> io::Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.write_all(&vec![value; count])
    }

    /// Pad the stream so its *length* becomes a multiple of `alignment`.
    ///
    /// The filler is written at the cursor, which is normally the end.
    pub fn pad_to_alignment(&mut self, alignment: usize, fill: u8) -> io::Result<()> {
        let misalignment = self.len() % alignment;
        if misalignment == 0 {
            return Ok(());
        }
        self.write_repeat(alignment - misalignment, fill)
    }

    pub fn write_u8_le(&mut self, value: u8) -> io::Result<()> {
        self.write_u8(value)
    }

    pub fn write_u16_le(&mut self, value: u16) -> io::Result<()> {
        self.write_u16::<LittleEndian>(value)
    }

    pub fn write_u32_le(&mut self, value: u32) -> io::Result<()> {
        self.write_u32::<LittleEndian>(value)
    }

    pub fn write_i32_le(&mut self, value: i32) -> io::Result<()> {
        self.write_i32::<LittleEndian>(value)
    }
}

impl Write for SubStream {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.cursor.write(buf)
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SubStream {
    #[inline]
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}
