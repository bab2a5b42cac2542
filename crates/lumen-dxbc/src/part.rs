//! Part dispatch by tag.

use std::io::Write;

use crate::parts::{Interfaces, ResourceDefinition, ShaderPart, Signature, Stats};
use crate::{FourCC, Result};

/// The payload of one container part, either decoded or kept as raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    ResourceDefinition(ResourceDefinition),
    /// ISGN, OSGN or PCSG.
    Signature(Signature),
    Interfaces(Interfaces),
    /// SHDR or SHEX.
    Shader(ShaderPart),
    Stats(Stats),
    Opaque(Vec<u8>),
}

impl Part {
    /// Decode a payload with the codec registered for `tag`. Unknown tags
    /// are kept opaque.
    pub fn decode(tag: FourCC, data: &[u8]) -> Result<Self> {
        let part = match tag {
            FourCC::RDEF => Part::ResourceDefinition(ResourceDefinition::read(data)?),
            FourCC::ISGN | FourCC::OSGN | FourCC::PCSG => Part::Signature(Signature::read(data)?),
            FourCC::IFCE => Part::Interfaces(Interfaces::read(data)?),
            FourCC::SHDR | FourCC::SHEX => Part::Shader(ShaderPart::read(data)?),
            FourCC::STAT => Part::Stats(Stats::read(data)?),
            _ => Part::Opaque(data.to_vec()),
        };
        tracing::trace!(%tag, kind = part.kind(), bytes = data.len(), "decoded part");
        Ok(part)
    }

    /// Whether `tag` has a typed codec.
    pub fn is_known_tag(tag: FourCC) -> bool {
        matches!(
            tag,
            FourCC::RDEF
                | FourCC::ISGN
                | FourCC::OSGN
                | FourCC::PCSG
                | FourCC::IFCE
                | FourCC::SHDR
                | FourCC::SHEX
                | FourCC::STAT
        )
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        match self {
            Part::ResourceDefinition(part) => part.write_to(destination),
            Part::Signature(part) => part.write_to(destination),
            Part::Interfaces(part) => part.write_to(destination),
            Part::Shader(part) => part.write_to(destination),
            Part::Stats(part) => part.write_to(destination),
            Part::Opaque(bytes) => Ok(destination.write_all(bytes)?),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if let Part::Opaque(bytes) = self {
            return Ok(bytes.clone());
        }
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Part::Opaque(_))
    }

    /// Short name of the variant, for logs and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Part::ResourceDefinition(_) => "resource definition",
            Part::Signature(_) => "signature",
            Part::Interfaces(_) => "interfaces",
            Part::Shader(_) => "shader",
            Part::Stats(_) => "stats",
            Part::Opaque(_) => "opaque",
        }
    }
}

/// A decoded part type that can be pulled out of a [`Part`].
pub trait TypedPart: Clone {
    /// Borrow the typed payload if `part` already holds it.
    fn from_part(part: &Part) -> Option<&Self>;

    fn decode(data: &[u8]) -> Result<Self>;
}

macro_rules! typed_part {
    ($ty:ty, $variant:ident) => {
        impl TypedPart for $ty {
            fn from_part(part: &Part) -> Option<&Self> {
                match part {
                    Part::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn decode(data: &[u8]) -> Result<Self> {
                <$ty>::read(data)
            }
        }
    };
}

typed_part!(ResourceDefinition, ResourceDefinition);
typed_part!(Signature, Signature);
typed_part!(Interfaces, Interfaces);
typed_part!(ShaderPart, Shader);
typed_part!(Stats, Stats);
