//! ShCd: a single shader.

use std::io::Write;

use tracing::debug;

use super::{FileReader, FileWriter, ShaderLayout};
use crate::{Error, ProgramType, Result, Shader};

const MAGIC: &[u8; 4] = b"ShCd";

pub(crate) fn read(bytes: &[u8]) -> Result<Shader> {
    let mut reader = FileReader::new(bytes, MAGIC, "ShCd")?;

    let raw_type = reader.version >> 24;
    let program_type = u8::try_from(raw_type)
        .ok()
        .and_then(|value| ProgramType::try_from(value).ok())
        .ok_or(Error::UnknownProgramType(raw_type))?;

    let layout = match reader.version & 0x00FF_FF00 {
        0x300 => ShaderLayout::V3,
        0x500 => ShaderLayout::V5,
        0x600 => ShaderLayout::V6 { expected: 0 },
        _ => {
            return Err(Error::UnsupportedVersion {
                format: "ShCd",
                version: reader.version,
            })
        }
    };

    let shader = reader.read_shader(program_type, layout)?;
    reader.expect_consumed()?;

    debug!(
        version = format_args!("{:#010X}", reader.version),
        %program_type,
        blob = shader.blob.len(),
        "read ShCd"
    );
    Ok(shader)
}

pub(crate) fn write<W: Write>(shader: &Shader, destination: &mut W) -> Result<()> {
    let version = ((shader.program_type as u32) << 24) | 0x0601;
    let mut writer = FileWriter::new(MAGIC, version, shader.platform)?;
    writer.write_shader(shader, Some(0))?;
    writer.finish(destination)
}

#[cfg(test)]
mod tests {
    use crate::resource::{ShaderResource, ShaderResourceType};
    use crate::{Error, GraphicsPlatform, Name, ProgramType, Shader};

    fn sample_shader() -> Shader {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Vertex);
        shader.additional_header = vec![1, 2, 3, 4, 5, 6, 7, 8];
        shader.blob = b"DXBC-ish payload".to_vec();
        shader
            .constant_buffers
            .push(ShaderResource::new("g_CameraParameter", ShaderResourceType::UNDEFINED, 0, 4))
            .unwrap();
        shader
            .samplers
            .push(ShaderResource::new("g_SamplerNormal", ShaderResourceType::UNDEFINED, 1, 0))
            .unwrap();
        shader
            .textures
            .push(ShaderResource::new("g_SamplerNormal", ShaderResourceType::TEXTURE, 1, 0))
            .unwrap();
        shader
            .uavs
            .push(ShaderResource::new("g_Output", ShaderResourceType::TEXTURE, 0, 1))
            .unwrap();
        shader
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn test_write_layout() {
        let bytes = sample_shader().to_shcd_bytes().unwrap();

        assert_eq!(&bytes[..4], b"ShCd");
        assert_eq!(u32_at(&bytes, 4), 0x0000_0601);
        assert_eq!(&bytes[8..12], b"DX11");
        assert_eq!(u32_at(&bytes, 12) as usize, bytes.len());

        // common header, shader header, four resources
        let blobs_offset = u32_at(&bytes, 16) as usize;
        assert_eq!(blobs_offset, 24 + 20 + 4 * 16);
        let strings_offset = u32_at(&bytes, 20) as usize;
        assert_eq!(strings_offset, blobs_offset + 8 + 16);

        // shared names are pooled once
        assert_eq!(
            &bytes[strings_offset..],
            b"g_CameraParameter\0g_SamplerNormal\0g_Output\0"
        );
    }

    #[test]
    fn test_round_trip() {
        let shader = sample_shader();
        let bytes = shader.to_shcd_bytes().unwrap();
        let decoded = Shader::from_shcd_bytes(&bytes).unwrap();
        assert_eq!(decoded, shader);
        assert_eq!(decoded.textures[0].name.text(), Some("g_SamplerNormal"));
        assert_eq!(decoded.to_shcd_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_trailing_bytes_are_ignored() {
        let shader = sample_shader();
        let mut bytes = shader.to_shcd_bytes().unwrap();
        bytes.extend_from_slice(&[0xEE; 7]);
        assert_eq!(Shader::from_shcd_bytes(&bytes).unwrap(), shader);
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let bytes = sample_shader().to_shcd_bytes().unwrap();
        let err = Shader::from_shcd_bytes(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
    }

    #[test]
    fn test_header_checks() {
        let bytes = sample_shader().to_shcd_bytes().unwrap();

        let mut bad = bytes.clone();
        bad[..4].copy_from_slice(b"ShPk");
        assert!(matches!(
            Shader::from_shcd_bytes(&bad),
            Err(Error::Common(lumen_common::Error::InvalidMagic { .. }))
        ));

        let mut bad = bytes.clone();
        bad[8..12].copy_from_slice(b"DX12");
        assert!(matches!(Shader::from_shcd_bytes(&bad), Err(Error::UnknownPlatform { .. })));

        let mut bad = bytes.clone();
        bad[7] = 6;
        assert!(matches!(Shader::from_shcd_bytes(&bad), Err(Error::UnknownProgramType(6))));

        let mut bad = bytes.clone();
        bad[5] = 0x07;
        assert!(matches!(Shader::from_shcd_bytes(&bad), Err(Error::UnsupportedVersion { .. })));

        // reserved word of the v6 shader header
        let mut bad = bytes;
        bad[24 + 16] = 1;
        assert!(matches!(Shader::from_shcd_bytes(&bad), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_read_v5_layout() {
        // pixel shader, no resources, v5 header without the reserved word
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ShCd");
        bytes.extend_from_slice(&0x0100_0501u32.to_le_bytes());
        bytes.extend_from_slice(b"DX11");
        bytes.extend_from_slice(&43u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&43u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(b"abc");

        let shader = Shader::from_shcd_bytes(&bytes).unwrap();
        assert_eq!(shader.program_type, ProgramType::Pixel);
        assert_eq!(shader.blob, b"abc");
        assert!(shader.additional_header.is_empty());

        // re-emitted as v6
        let rewritten = shader.to_shcd_bytes().unwrap();
        assert_eq!(u32_at(&rewritten, 4), 0x0100_0601);
        assert_eq!(rewritten.len(), bytes.len() + 4);
    }

    #[test]
    fn test_extra_header_data() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"ShCd");
        bytes.extend_from_slice(&0x0100_0501u32.to_le_bytes());
        bytes.extend_from_slice(b"DX11");
        bytes.extend_from_slice(&44u32.to_le_bytes());
        bytes.extend_from_slice(&44u32.to_le_bytes());
        bytes.extend_from_slice(&44u32.to_le_bytes());
        bytes.extend_from_slice(&[0; 20]);

        let err = Shader::from_shcd_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }), "{}", err);
    }

    #[test]
    fn test_resource_needs_text() {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
        shader
            .samplers
            .push(ShaderResource::new(Name::from_hash(0x1234), ShaderResourceType::UNDEFINED, 0, 0))
            .unwrap();
        assert!(matches!(shader.to_shcd_bytes(), Err(Error::InvalidArgument(_))));
    }
}
