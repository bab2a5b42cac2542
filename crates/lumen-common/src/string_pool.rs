//! Append-only pool of NUL-terminated strings.
//!
//! Identical strings are written once; later lookups return the offset of
//! the first copy. The pool's byte buffer is an ordinary [`SubStream`], so
//! fixed-size records and pooled strings can share one region.

use std::io::{self, Write};

use crate::stream::SubStream;
use crate::{Error, Result};

/// A deduplicating string table backed by a [`SubStream`].
#[derive(Debug, Clone, Default)]
pub struct StringPool {
    pub data: SubStream,
    starting_offsets: Vec<usize>,
}

impl StringPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the pool with an existing table of NUL-separated strings.
    ///
    /// A missing trailing terminator is appended.
    pub fn from_initial(initial: &[u8]) -> Self {
        let mut starting_offsets = vec![0];
        starting_offsets.extend(memchr::memchr_iter(0, initial).map(|i| i + 1));

        let mut data = initial.to_vec();
        if starting_offsets.last() == Some(&initial.len()) {
            starting_offsets.pop();
        } else {
            data.push(0);
        }

        Self {
            data: SubStream::from_vec(data),
            starting_offsets,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Offset of an exact previously written copy of `bytes`, if any.
    pub fn find(&self, bytes: &[u8]) -> Option<usize> {
        let data = self.data.as_slice();
        for &offset in &self.starting_offsets {
            let end = offset + bytes.len();
            if end >= data.len() {
                break;
            }
            if &data[offset..end] == bytes && data[end] == 0 {
                return Some(offset);
            }
        }
        None
    }

    pub fn find_str(&self, s: &str) -> Option<usize> {
        self.find(s.as_bytes())
    }

    /// Return the offset of `bytes`, appending it first if absent.
    ///
    /// Appending moves the cursor to the end of the pool unless
    /// `preserve_cursor` is set.
    pub fn find_or_add(&mut self, bytes: &[u8], preserve_cursor: bool) -> io::Result<usize> {
        match self.find(bytes) {
            Some(offset) => Ok(offset),
            None => self.add(bytes, preserve_cursor),
        }
    }

    pub fn find_or_add_str(&mut self, s: &str, preserve_cursor: bool) -> io::Result<usize> {
        self.find_or_add(s.as_bytes(), preserve_cursor)
    }

    fn add(&mut self, bytes: &[u8], preserve_cursor: bool) -> io::Result<usize> {
        let saved = self.data.position();
        let offset = self.data.seek_end();
        self.starting_offsets.push(offset);
        self.data.write_all(bytes)?;
        self.data.write_all(&[0])?;
        if preserve_cursor {
            self.data.set_position(saved);
        }
        Ok(offset)
    }

    /// Read back `length` bytes at `offset` as UTF-8.
    pub fn get_string(&self, offset: usize, length: usize) -> Result<&str> {
        let bytes = self
            .as_slice()
            .get(offset..offset.saturating_add(length))
            .ok_or(Error::OutOfRange {
                offset,
                length,
                bound: self.len(),
            })?;
        std::str::from_utf8(bytes).map_err(Error::Utf8)
    }

    /// Read back the string starting at `offset`, up to its terminator or the
    /// end of the pool.
    pub fn get_nul_terminated(&self, offset: usize) -> Result<&str> {
        let tail = self.as_slice().get(offset..).ok_or(Error::OutOfRange {
            offset,
            length: 0,
            bound: self.len(),
        })?;
        let end = memchr::memchr(0, tail).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).map_err(Error::Utf8)
    }

    /// Write the pool's bytes to `destination`.
    pub fn write_to<W: Write>(&self, destination: &mut W) -> io::Result<usize> {
        destination.write_all(self.as_slice())?;
        Ok(self.len())
    }
}
