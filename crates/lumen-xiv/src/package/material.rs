//! Material parameters and their default values.

use lumen_common::Keyed;

use crate::{Error, Name, Result};

/// A named slice of the material parameter constant buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MaterialParameter {
    pub name: Name,
    /// In bytes from the start of the buffer.
    pub offset: u16,
    /// In bytes.
    pub size: u16,
}

impl MaterialParameter {
    pub fn new(name: impl Into<Name>, offset: u16, size: u16) -> Self {
        Self {
            name: name.into(),
            offset,
            size,
        }
    }

    /// Parse an offset and size.
    ///
    /// An offset ending in a component letter, such as `3y`, is a register
    /// and component, and the size is then in components:
    /// `("3y", "2")` is byte offset `0x34`, 8 bytes. Otherwise both are bytes.
    pub fn parse_layout(offset: &str, size: &str) -> Result<(u16, u16)> {
        let invalid = |what: &str, value: &str| {
            Error::InvalidArgument(format!("invalid material parameter {} {:?}", what, value))
        };
        let parse = |what: &str, value: &str| value.parse::<u16>().map_err(|_| invalid(what, value));

        let component = match offset.chars().last().map(|c| c.to_ascii_lowercase()) {
            Some('x') => Some(0x0),
            Some('y') => Some(0x4),
            Some('z') => Some(0x8),
            Some('w') => Some(0xC),
            _ => None,
        };

        match component {
            Some(component) => {
                let register = parse("register", &offset[..offset.len() - 1])?;
                let components = parse("size", size)?;
                let byte_offset = register
                    .checked_mul(16)
                    .map(|bytes| bytes | component)
                    .ok_or_else(|| invalid("register", offset))?;
                let byte_size = components.checked_mul(4).ok_or_else(|| invalid("size", size))?;
                Ok((byte_offset, byte_size))
            }
            None => Ok((parse("offset", offset)?, parse("size", size)?)),
        }
    }

    pub fn end(&self) -> u32 {
        u32::from(self.offset) + u32::from(self.size)
    }
}

impl Keyed for MaterialParameter {
    type Key = Name;

    fn key(&self) -> Name {
        self.name.clone()
    }
}

/// Typed default values for a material parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValues {
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
}

impl DefaultValues {
    /// Parse comma-separated values of type `i` (or `s`), `u` or `f`.
    ///
    /// Integers may be written in hexadecimal with a `0x` prefix; signed ones
    /// also accept `-0x`. Unknown types are read as floats.
    pub fn parse(kind: &str, values: &str) -> Result<Self> {
        let items = values.split(',').map(str::trim);
        match kind.to_ascii_lowercase().as_str() {
            "i" | "s" => Ok(Self::Int(items.map(parse_i32).collect::<Result<_>>()?)),
            "u" => Ok(Self::UInt(items.map(parse_u32).collect::<Result<_>>()?)),
            _ => Ok(Self::Float(
                items
                    .map(|item| {
                        item.parse::<f32>()
                            .map_err(|_| Error::InvalidArgument(format!("invalid float {:?}", item)))
                    })
                    .collect::<Result<_>>()?,
            )),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::UInt(values) => values.len(),
            Self::Float(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store the values little-endian at the start of `destination`.
    pub fn write_into(&self, destination: &mut [u8]) -> Result<()> {
        let needed = self.len() * 4;
        if needed > destination.len() {
            return Err(Error::InvalidArgument(format!(
                "{} default values do not fit in {} bytes",
                self.len(),
                destination.len()
            )));
        }

        let words: Vec<[u8; 4]> = match self {
            Self::Int(values) => values.iter().map(|v| v.to_le_bytes()).collect(),
            Self::UInt(values) => values.iter().map(|v| v.to_le_bytes()).collect(),
            Self::Float(values) => values.iter().map(|v| v.to_le_bytes()).collect(),
        };
        for (chunk, word) in destination.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word);
        }
        Ok(())
    }
}

fn strip_hex_prefix(value: &str) -> Option<&str> {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
}

fn parse_u32(value: &str) -> Result<u32> {
    let parsed = match strip_hex_prefix(value) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    };
    parsed.ok_or_else(|| Error::InvalidArgument(format!("invalid unsigned integer {:?}", value)))
}

fn parse_i32(value: &str) -> Result<i32> {
    let invalid = || Error::InvalidArgument(format!("invalid integer {:?}", value));
    if let Some(hex) = value.strip_prefix('-').and_then(strip_hex_prefix) {
        return u32::from_str_radix(hex, 16)
            .map(|bits| (bits as i32).wrapping_neg())
            .map_err(|_| invalid());
    }
    match strip_hex_prefix(value) {
        Some(hex) => u32::from_str_radix(hex, 16)
            .map(|bits| bits as i32)
            .map_err(|_| invalid()),
        None => value.parse().map_err(|_| invalid()),
    }
}
