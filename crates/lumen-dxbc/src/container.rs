//! DXBC container: a digest-protected table of tagged parts.
//!
//! # Layout
//!
//! ```text
//! 0x00  "DXBC"
//! 0x04  digest[16]     over 0x14..size
//! 0x14  u16 major (1), u16 minor
//! 0x18  u32 size
//! 0x1C  u32 part count
//! 0x20  u32 offsets[count], from the start of the container
//!       parts: tag, u32 length, payload
//! ```

use std::borrow::Cow;
use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use lumen_common::{BinaryReader, IndexedList, Keyed};

use crate::digest::{self, DIGEST_LEN};
use crate::part::{Part, TypedPart};
use crate::parts::{Interfaces, ResourceDefinition, ShaderPart, Signature, Stats};
use crate::{Error, FourCC, Result};

const HEADER_SIZE: usize = 0x20;
const DIGEST_OFFSET: usize = 0x04;
const DIGESTED_FROM: usize = 0x14;
const SIZE_OFFSET: usize = 0x18;

/// One entry of the part table.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerPart {
    pub tag: FourCC,
    pub part: Part,
}

impl Keyed for ContainerPart {
    type Key = FourCC;

    fn key(&self) -> FourCC {
        self.tag
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    /// Written back as read; the major version is always 1.
    pub minor_version: u16,
    pub parts: IndexedList<ContainerPart>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a container.
    ///
    /// With `opaque` set every part is kept as raw bytes; typed views are
    /// still available through the accessors or [`Container::upgrade_part`].
    pub fn from_bytes(bytes: &[u8], verify_digest: bool, opaque: bool) -> Result<Self> {
        let mut reader = BinaryReader::new(bytes);
        reader.expect_magic(&FourCC::DXBC.0)?;
        let stored: [u8; DIGEST_LEN] = reader.read_array()?;
        let major = reader.read_u16()?;
        let minor_version = reader.read_u16()?;
        if major != 1 {
            return Err(Error::UnsupportedVersion {
                major,
                minor: minor_version,
            });
        }

        let size = reader.read_u32()? as usize;
        if bytes.len() < size {
            return Err(Error::SizeMismatch {
                declared: size,
                actual: bytes.len(),
            });
        }
        if size < HEADER_SIZE {
            return Err(Error::malformed(
                "container",
                format!("declared size {:#x} is smaller than the header", size),
            ));
        }
        let bytes = &bytes[..size];

        if verify_digest && !digest::verify(&bytes[DIGESTED_FROM..], &stored) {
            return Err(Error::DigestMismatch {
                stored: digest::to_hex(&stored),
                computed: digest::to_hex(&digest::calculate(&bytes[DIGESTED_FROM..])),
            });
        }

        let mut reader = BinaryReader::new_at(bytes, SIZE_OFFSET + 4);
        let count = reader.read_u32()? as usize;
        let offsets = reader.read_u32_vec(count)?;

        let mut parts = IndexedList::with_capacity(count);
        for offset in offsets {
            let offset = offset as usize;
            let mut part_reader = reader.slice_from(offset, size.saturating_sub(offset))?;
            let tag = FourCC(part_reader.read_array::<4>()?);
            let length = part_reader.read_u32()? as usize;
            let payload = part_reader.read_bytes(length)?;

            if parts.contains_key(&tag) {
                return Err(Error::DuplicatePart(tag));
            }
            let part = if opaque {
                Part::Opaque(payload.to_vec())
            } else {
                Part::decode(tag, payload)?
            };
            parts.push(ContainerPart { tag, part })?;
        }

        tracing::debug!(parts = parts.len(), minor_version, size, "read DXBC container");
        Ok(Self {
            minor_version,
            parts,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(FourCC::DXBC.as_bytes());
        out.extend_from_slice(&[0; DIGEST_LEN]);
        out.write_u16::<LittleEndian>(1)?;
        out.write_u16::<LittleEndian>(self.minor_version)?;
        out.write_u32::<LittleEndian>(0)?;
        out.write_u32::<LittleEndian>(self.parts.len() as u32)?;
        let offsets_at = out.len();
        out.resize(offsets_at + 4 * self.parts.len(), 0);

        for (i, entry) in self.parts.iter().enumerate() {
            let offset = out.len() as u32;
            out[offsets_at + 4 * i..offsets_at + 4 * i + 4].copy_from_slice(&offset.to_le_bytes());

            out.extend_from_slice(entry.tag.as_bytes());
            let length_at = out.len();
            out.write_u32::<LittleEndian>(0)?;
            entry.part.write_to(&mut out)?;
            let length = (out.len() - length_at - 4) as u32;
            out[length_at..length_at + 4].copy_from_slice(&length.to_le_bytes());
        }

        let size = out.len() as u32;
        out[SIZE_OFFSET..SIZE_OFFSET + 4].copy_from_slice(&size.to_le_bytes());
        let digest = digest::calculate(&out[DIGESTED_FROM..]);
        out[DIGEST_OFFSET..DIGEST_OFFSET + DIGEST_LEN].copy_from_slice(&digest);

        tracing::debug!(parts = self.parts.len(), size, "wrote DXBC container");
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        destination.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    pub fn part(&self, tag: FourCC) -> Option<&Part> {
        self.parts.get_by_key(&tag).map(|entry| &entry.part)
    }

    pub fn part_mut(&mut self, tag: FourCC) -> Option<&mut Part> {
        self.parts.get_by_key_mut(&tag).map(|entry| &mut entry.part)
    }

    pub fn tags(&self) -> impl Iterator<Item = FourCC> + '_ {
        self.parts.iter().map(|entry| entry.tag)
    }

    /// Add a part at the end, or replace the part with the same tag in
    /// place. Returns the replaced part.
    pub fn insert_part(&mut self, tag: FourCC, part: Part) -> Option<Part> {
        self.parts
            .insert_or_replace(ContainerPart { tag, part })
            .map(|old| old.part)
    }

    /// Typed view of a part. Opaque parts are decoded into an owned value
    /// without touching the container; a part holding another typed
    /// payload yields `None`.
    pub fn typed_part<T: TypedPart>(&self, tag: FourCC) -> Result<Option<Cow<'_, T>>> {
        let Some(part) = self.part(tag) else {
            return Ok(None);
        };
        if let Some(typed) = T::from_part(part) {
            return Ok(Some(Cow::Borrowed(typed)));
        }
        match part {
            Part::Opaque(bytes) => Ok(Some(Cow::Owned(T::decode(bytes)?))),
            _ => Ok(None),
        }
    }

    pub fn resource_definition(&self) -> Result<Option<Cow<'_, ResourceDefinition>>> {
        self.typed_part(FourCC::RDEF)
    }

    pub fn input_signature(&self) -> Result<Option<Cow<'_, Signature>>> {
        self.typed_part(FourCC::ISGN)
    }

    pub fn output_signature(&self) -> Result<Option<Cow<'_, Signature>>> {
        self.typed_part(FourCC::OSGN)
    }

    pub fn patch_constant_signature(&self) -> Result<Option<Cow<'_, Signature>>> {
        self.typed_part(FourCC::PCSG)
    }

    pub fn interfaces(&self) -> Result<Option<Cow<'_, Interfaces>>> {
        self.typed_part(FourCC::IFCE)
    }

    /// The shader bytecode, preferring SHEX over SHDR.
    pub fn shader(&self) -> Result<Option<Cow<'_, ShaderPart>>> {
        match self.typed_part(FourCC::SHEX)? {
            Some(shader) => Ok(Some(shader)),
            None => self.typed_part(FourCC::SHDR),
        }
    }

    pub fn stats(&self) -> Result<Option<Cow<'_, Stats>>> {
        self.typed_part(FourCC::STAT)
    }

    /// Decode an opaque part in place. Returns whether the part changed;
    /// missing, already typed and unknown-tag parts are left alone.
    pub fn upgrade_part(&mut self, tag: FourCC) -> Result<bool> {
        if !Part::is_known_tag(tag) {
            return Ok(false);
        }
        let Some(part) = self.part_mut(tag) else {
            return Ok(false);
        };
        let decoded = match part {
            Part::Opaque(bytes) => Part::decode(tag, bytes)?,
            _ => return Ok(false),
        };
        *part = decoded;
        Ok(true)
    }

    /// Encode a typed part back to raw bytes in place. Returns whether the
    /// part changed.
    pub fn downgrade_part(&mut self, tag: FourCC) -> Result<bool> {
        let Some(part) = self.part_mut(tag) else {
            return Ok(false);
        };
        if part.is_opaque() {
            return Ok(false);
        }
        *part = Part::Opaque(part.to_bytes()?);
        Ok(true)
    }

    pub fn upgrade_all(&mut self) -> Result<()> {
        let tags: Vec<FourCC> = self.tags().collect();
        for tag in tags {
            self.upgrade_part(tag)?;
        }
        Ok(())
    }

    pub fn downgrade_all(&mut self) -> Result<()> {
        let tags: Vec<FourCC> = self.tags().collect();
        for tag in tags {
            self.downgrade_part(tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::{
        ProgramType, RegisterComponentType, ResourceBinding, ShaderInputType, SignatureElement,
    };

    fn sample() -> Container {
        let mut rdef = ResourceDefinition {
            major_version: 5,
            creator: "lumen".to_owned(),
            ..Default::default()
        };
        rdef.bindings
            .push(ResourceBinding {
                name: "g_Sampler".to_owned(),
                input_type: ShaderInputType::SAMPLER,
                bind_count: 1,
                ..Default::default()
            })
            .unwrap();

        let mut isgn = Signature::default();
        isgn.elements
            .push(SignatureElement {
                name: "POSITION".to_owned(),
                component_type: RegisterComponentType::FLOAT32,
                mask: 0xF,
                read_write_mask: 0xF,
                ..Default::default()
            })
            .unwrap();

        let mut container = Container::new();
        container.insert_part(FourCC::RDEF, Part::ResourceDefinition(rdef));
        container.insert_part(FourCC::ISGN, Part::Signature(isgn));
        container.insert_part(FourCC::OSGN, Part::Signature(Signature::default()));
        container.insert_part(
            FourCC::SHEX,
            Part::Shader(ShaderPart {
                version: 0x50,
                program_type: ProgramType::VERTEX,
                tokens: vec![0x0100_003E],
            }),
        );
        container.insert_part(FourCC::STAT, Part::Stats(Stats::default()));
        container.insert_part(FourCC::new(b"SFI0"), Part::Opaque(vec![2, 0, 0, 0, 0, 0, 0, 0]));
        container
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample().to_bytes().unwrap();

        assert_eq!(&bytes[0..4], b"DXBC");
        assert_eq!(&bytes[0x14..0x18], [1, 0, 0, 0]);
        assert_eq!(
            u32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap()) as usize,
            bytes.len()
        );
        assert_eq!(&bytes[0x1C..0x20], [6, 0, 0, 0]);
        // The first part follows the offset table.
        assert_eq!(&bytes[0x20..0x24], &(0x20u32 + 6 * 4).to_le_bytes());
        assert_eq!(&bytes[0x38..0x3C], b"RDEF");
        assert!(digest::verify(&bytes[0x14..], bytes[4..20].try_into().unwrap()));
    }

    #[test]
    fn test_shallow_and_deep_round_trip() {
        let bytes = sample().to_bytes().unwrap();

        let shallow = Container::from_bytes(&bytes, true, true).unwrap();
        assert!(shallow.parts.iter().all(|entry| entry.part.is_opaque()));
        assert_eq!(shallow.to_bytes().unwrap(), bytes);

        let typed = Container::from_bytes(&bytes, true, false).unwrap();
        assert_eq!(typed.to_bytes().unwrap(), bytes);
        assert_eq!(typed, sample());

        let mut deep = shallow.clone();
        deep.upgrade_all().unwrap();
        assert!(deep.part(FourCC::new(b"SFI0")).unwrap().is_opaque());
        assert!(!deep.part(FourCC::RDEF).unwrap().is_opaque());
        assert_eq!(deep.to_bytes().unwrap(), bytes);

        deep.downgrade_all().unwrap();
        assert_eq!(deep, shallow);
    }

    #[test]
    fn test_accessors_borrow_or_decode() {
        let bytes = sample().to_bytes().unwrap();
        let mut container = Container::from_bytes(&bytes, true, true).unwrap();

        let shader = container.shader().unwrap().unwrap();
        assert!(matches!(shader, Cow::Owned(_)));
        assert_eq!(shader.program_type, ProgramType::VERTEX);

        assert!(container.upgrade_part(FourCC::ISGN).unwrap());
        assert!(!container.upgrade_part(FourCC::ISGN).unwrap());
        let isgn = container.input_signature().unwrap().unwrap();
        assert!(matches!(isgn, Cow::Borrowed(_)));
        assert!(isgn.element("POSITION", 0).is_some());

        assert!(container.patch_constant_signature().unwrap().is_none());
        assert!(container.interfaces().unwrap().is_none());
        // A typed part of another kind is not reinterpreted.
        assert!(container.typed_part::<Stats>(FourCC::ISGN).unwrap().is_none());
    }

    #[test]
    fn test_digest_verification() {
        let mut bytes = sample().to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;

        assert!(matches!(
            Container::from_bytes(&bytes, true, true),
            Err(Error::DigestMismatch { .. })
        ));
        assert!(Container::from_bytes(&bytes, false, true).is_ok());
    }

    #[test]
    fn test_header_errors() {
        let bytes = sample().to_bytes().unwrap();

        let mut magic = bytes.clone();
        magic[0] = b'X';
        assert!(matches!(
            Container::from_bytes(&magic, false, true),
            Err(Error::Common(lumen_common::Error::InvalidMagic { .. }))
        ));

        let mut version = bytes.clone();
        version[0x14] = 2;
        assert!(matches!(
            Container::from_bytes(&version, false, true),
            Err(Error::UnsupportedVersion { major: 2, .. })
        ));

        assert!(matches!(
            Container::from_bytes(&bytes[..bytes.len() - 1], false, true),
            Err(Error::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let bytes = sample().to_bytes().unwrap();
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0xCC; 12]);

        let container = Container::from_bytes(&padded, true, true).unwrap();
        assert_eq!(container.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_minor_version_is_kept() {
        let mut container = sample();
        container.minor_version = 3;
        let bytes = container.to_bytes().unwrap();
        assert_eq!(&bytes[0x16..0x18], [3, 0]);
        assert_eq!(Container::from_bytes(&bytes, true, true).unwrap().minor_version, 3);
    }

    #[test]
    fn test_duplicate_part_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        // Point the second offset at the first part.
        let first: [u8; 4] = bytes[0x20..0x24].try_into().unwrap();
        bytes[0x24..0x28].copy_from_slice(&first);

        assert!(matches!(
            Container::from_bytes(&bytes, false, true),
            Err(Error::DuplicatePart(FourCC::RDEF))
        ));
    }
}
