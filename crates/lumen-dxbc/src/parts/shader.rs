//! SHDR/SHEX shader bytecode part.

use std::fmt;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use lumen_common::BinaryReader;

use crate::sm5::Instructions;
use crate::{Error, Result};

/// Program type as encoded in the bytecode version token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProgramType(pub u16);

impl ProgramType {
    pub const PIXEL: Self = Self(0);
    pub const VERTEX: Self = Self(1);
    pub const GEOMETRY: Self = Self(2);
    pub const HULL: Self = Self(3);
    pub const DOMAIN: Self = Self(4);
    pub const COMPUTE: Self = Self(5);

    /// Two-letter prefix used by shader models, e.g. `ps`.
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

    pub fn from_abbreviation(abbreviation: &str) -> Option<Self> {
        Some(match abbreviation.to_ascii_lowercase().as_str() {
            "ps" => Self::PIXEL,
            "vs" => Self::VERTEX,
            "gs" => Self::GEOMETRY,
            "hs" => Self::HULL,
            "ds" => Self::DOMAIN,
            "cs" => Self::COMPUTE,
            _ => return None,
        })
    }
}

impl fmt::Debug for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.abbreviation() {
            Some(abbreviation) => write!(f, "ProgramType({})", abbreviation),
            None => write!(f, "ProgramType({:#x})", self.0),
        }
    }
}

/// Compiled shader token stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShaderPart {
    /// Shader model, `major << 4 | minor`.
    pub version: u16,
    pub program_type: ProgramType,
    /// Tokens after the two header tokens.
    pub tokens: Vec<u32>,
}

impl ShaderPart {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let version = reader.read_u16()?;
        let program_type = ProgramType(reader.read_u16()?);
        let token_count = reader.read_u32()? as usize;
        if token_count < 2 {
            return Err(Error::malformed(
                "shader part",
                format!("token count {} does not cover the header", token_count),
            ));
        }
        let tokens = reader.read_u32_vec(token_count - 2)?;

        tracing::trace!(version, tokens = tokens.len(), "read shader part");
        Ok(Self {
            version,
            program_type,
            tokens,
        })
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        destination.write_u16::<LittleEndian>(self.version)?;
        destination.write_u16::<LittleEndian>(self.program_type.0)?;
        destination.write_u32::<LittleEndian>(self.tokens.len() as u32 + 2)?;
        for &token in &self.tokens {
            destination.write_u32::<LittleEndian>(token)?;
        }
        Ok(())
    }

    pub fn major_version(&self) -> u16 {
        self.version >> 4
    }

    pub fn minor_version(&self) -> u16 {
        self.version & 0xF
    }

    /// Iterate over the decoded instructions.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions::new(&self.tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let part = ShaderPart {
            version: 0x50,
            program_type: ProgramType::PIXEL,
            tokens: vec![0x0100003E],
        };
        let mut bytes = Vec::new();
        part.write_to(&mut bytes).unwrap();

        assert_eq!(bytes, [0x50, 0, 0, 0, 3, 0, 0, 0, 0x3E, 0, 0, 1]);
        assert_eq!(ShaderPart::read(&bytes).unwrap(), part);
    }

    #[test]
    fn test_short_token_count() {
        let bytes = [0x50, 0, 1, 0, 1, 0, 0, 0];
        assert!(matches!(ShaderPart::read(&bytes), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_abbreviations() {
        assert_eq!(ProgramType::from_abbreviation("VS"), Some(ProgramType::VERTEX));
        assert_eq!(ProgramType::COMPUTE.abbreviation(), Some("cs"));
        assert_eq!(ProgramType(9).abbreviation(), None);
    }
}
