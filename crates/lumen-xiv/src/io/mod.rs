//! Shared framing of ShCd and ShPk files.
//!
//! Both formats start with the same 24-byte header and split the rest of the
//! file into three regions: a header region holding fixed-size records, a
//! blob region holding shader bytecode, and a string region holding resource
//! names. Records address blobs and strings relative to their region.

pub(crate) mod code;
pub(crate) mod package;

use std::io::Write;

use lumen_common::{
    BinaryReader, IndexedList, PointerId, StreamId, StringPool, SubStream, SubStreamOrchestrator,
};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::resource::{ShaderResource, ShaderResourceType};
use crate::{Error, GraphicsPlatform, Name, ProgramType, Result, Shader};

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawCommonHeader {
    magic: [u8; 4],
    version: u32,
    platform: u32,
    file_size: u32,
    blobs_offset: u32,
    strings_offset: u32,
}

const COMMON_HEADER_SIZE: usize = std::mem::size_of::<RawCommonHeader>();

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawResource {
    name_hash: u32,
    name_offset: u32,
    name_size: u16,
    kind: u16,
    slot: u16,
    size: u16,
}

/// Which shader header a file uses. Each version extends the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShaderLayout {
    /// Blob range plus constant buffer and sampler counts.
    V3,
    /// Adds UAV and texture counts.
    V5,
    /// Adds a trailing word that must hold a known value.
    V6 { expected: u32 },
}

pub(crate) struct FileReader<'a> {
    pub version: u32,
    pub platform: GraphicsPlatform,
    format: &'static str,
    blobs: &'a [u8],
    strings: BinaryReader<'a>,
    pub header: BinaryReader<'a>,
}

impl<'a> FileReader<'a> {
    pub fn new(bytes: &'a [u8], magic: &[u8; 4], format: &'static str) -> Result<Self> {
        BinaryReader::new(bytes).expect_magic(magic)?;
        let common = BinaryReader::new(bytes).read_struct::<RawCommonHeader>()?;

        let tag = common.platform;
        let platform = GraphicsPlatform::try_from(tag)
            .map_err(|tag| Error::UnknownPlatform { format, tag })?;

        let file_size = common.file_size as usize;
        if file_size > bytes.len() {
            return Err(Error::SizeMismatch {
                format,
                declared: file_size,
                actual: bytes.len(),
            });
        }
        let data = &bytes[..file_size];

        let blobs_offset = common.blobs_offset as usize;
        let strings_offset = common.strings_offset as usize;
        if blobs_offset < COMMON_HEADER_SIZE || blobs_offset > strings_offset || strings_offset > file_size {
            return Err(Error::malformed(
                format,
                format!(
                    "regions at {:#x} and {:#x} do not fit a file of {:#x} bytes",
                    blobs_offset, strings_offset, file_size
                ),
            ));
        }

        Ok(Self {
            version: common.version,
            platform,
            format,
            blobs: &data[blobs_offset..strings_offset],
            strings: BinaryReader::new(&data[strings_offset..]),
            header: BinaryReader::new_at(&data[..blobs_offset], COMMON_HEADER_SIZE),
        })
    }

    /// Read one shader header, its blob and its resources.
    pub fn read_shader(&mut self, program_type: ProgramType, layout: ShaderLayout) -> Result<Shader> {
        let blob_offset = self.header.read_u32()? as usize;
        let blob_size = self.header.read_u32()? as usize;
        let constant_count = self.header.read_u16()?;
        let sampler_count = self.header.read_u16()?;
        let (uav_count, texture_count) = match layout {
            ShaderLayout::V3 => (0, 0),
            ShaderLayout::V5 | ShaderLayout::V6 { .. } => {
                (self.header.read_u16()?, self.header.read_u16()?)
            }
        };
        let reserved = match layout {
            ShaderLayout::V6 { .. } => Some(self.header.read_u32()?),
            _ => None,
        };

        let raw_blob = blob_offset
            .checked_add(blob_size)
            .and_then(|end| self.blobs.get(blob_offset..end))
            .ok_or_else(|| {
                Error::malformed(
                    self.format,
                    format!(
                        "shader blob {:#x}+{:#x} is outside the blob region of {:#x} bytes",
                        blob_offset,
                        blob_size,
                        self.blobs.len()
                    ),
                )
            })?;
        let header_size = Shader::additional_header_size(self.platform, program_type);
        if raw_blob.len() < header_size {
            return Err(Error::malformed(
                self.format,
                format!(
                    "{} blob of {} bytes is shorter than its {}-byte header",
                    program_type,
                    raw_blob.len(),
                    header_size
                ),
            ));
        }

        let mut shader = Shader::new(self.platform, program_type);
        shader.additional_header = raw_blob[..header_size].to_vec();
        shader.blob = raw_blob[header_size..].to_vec();

        self.read_resources(&mut shader.constant_buffers, constant_count as usize)?;
        self.read_resources(&mut shader.samplers, sampler_count as usize)?;
        self.read_resources(&mut shader.uavs, uav_count as usize)?;
        self.read_resources(&mut shader.textures, texture_count as usize)?;

        if let (ShaderLayout::V6 { expected }, Some(actual)) = (layout, reserved) {
            if actual != expected {
                return Err(Error::malformed(
                    "shader header",
                    format!("reserved value {:#X}, expected {:#X}", actual, expected),
                ));
            }
        }

        Ok(shader)
    }

    pub fn read_resources(&mut self, list: &mut IndexedList<ShaderResource>, count: usize) -> Result<()> {
        for _ in 0..count {
            let raw = self.header.read_struct::<RawResource>()?;
            let text = self
                .strings
                .read_string_at(raw.name_offset as usize, raw.name_size as usize)?;
            list.push(ShaderResource {
                name: Name::with_text(raw.name_hash, text),
                kind: ShaderResourceType(raw.kind),
                slot: raw.slot,
                size: raw.size,
            })?;
        }
        Ok(())
    }

    pub fn expect_consumed(&self) -> Result<()> {
        if self.header.remaining() > 0 {
            return Err(Error::malformed(
                self.format,
                format!("{} bytes of unexpected extra header data", self.header.remaining()),
            ));
        }
        Ok(())
    }
}

/// Builds the three regions of a file and patches the common header.
pub(crate) struct FileWriter {
    orchestrator: SubStreamOrchestrator,
    header: StreamId,
    blobs: StreamId,
    strings: StreamId,
    file_size: PointerId,
}

impl FileWriter {
    pub fn new(magic: &[u8; 4], version: u32, platform: GraphicsPlatform) -> Result<Self> {
        let mut orchestrator = SubStreamOrchestrator::new(0);
        let header = orchestrator.add_stream(SubStream::new());
        let blobs = orchestrator.add_stream(SubStream::new());
        let strings = orchestrator.add_pool(StringPool::new());

        let stream = orchestrator.stream_mut(header)?;
        stream.write_all(magic)?;
        stream.write_u32_le(version)?;
        stream.write_u32_le(platform.tag())?;
        // The file ends where the string region ends; retargeted in `finish`.
        let file_size = orchestrator.write_delayed_pointer::<u32>(header, strings, 0)?;
        orchestrator.write_delayed_pointer::<u32>(header, blobs, 0)?;
        orchestrator.write_delayed_pointer::<u32>(header, strings, 0)?;

        Ok(Self {
            orchestrator,
            header,
            blobs,
            strings,
            file_size,
        })
    }

    pub fn header(&mut self) -> Result<&mut SubStream> {
        Ok(self.orchestrator.stream_mut(self.header)?)
    }

    /// Write a v6 shader header, or a v5 one when `reserved` is `None`.
    pub fn write_shader(&mut self, shader: &Shader, reserved: Option<u32>) -> Result<()> {
        let blobs = self.orchestrator.stream_mut(self.blobs)?;
        let blob_offset = blobs.position();
        blobs.write_all(&shader.additional_header)?;
        blobs.write_all(&shader.blob)?;
        let blob_size = blobs.position() - blob_offset;

        let header = self.header()?;
        header.write_u32_le(blob_offset as u32)?;
        header.write_u32_le(blob_size as u32)?;
        header.write_u16_le(shader.constant_buffers.len() as u16)?;
        header.write_u16_le(shader.samplers.len() as u16)?;
        header.write_u16_le(shader.uavs.len() as u16)?;
        header.write_u16_le(shader.textures.len() as u16)?;
        if let Some(reserved) = reserved {
            header.write_u32_le(reserved)?;
        }

        self.write_resources(&shader.constant_buffers)?;
        self.write_resources(&shader.samplers)?;
        self.write_resources(&shader.uavs)?;
        self.write_resources(&shader.textures)?;
        Ok(())
    }

    pub fn write_resources(&mut self, resources: &IndexedList<ShaderResource>) -> Result<()> {
        for resource in resources {
            let text = resource.name.text().ok_or_else(|| {
                Error::InvalidArgument(format!("resource {} has no name text", resource.name))
            })?;
            let name_offset = self
                .orchestrator
                .pool_mut(self.strings)?
                .find_or_add_str(text, false)?;

            let raw = RawResource {
                name_hash: resource.name.hash(),
                name_offset: name_offset as u32,
                name_size: text.len() as u16,
                kind: resource.kind.0,
                slot: resource.slot,
                size: resource.size,
            };
            self.header()?.write_all(raw.as_bytes())?;
        }
        Ok(())
    }

    pub fn finish<W: Write>(mut self, destination: &mut W) -> Result<()> {
        let strings_len = self.orchestrator.pool(self.strings)?.len();
        self.orchestrator.set_pointee(self.file_size, strings_len)?;
        self.orchestrator.write_all_to(destination)?;
        Ok(())
    }
}
