//! Program types and graphics platforms.

use std::fmt;

use lumen_dxbc::parts::{ProgramType as DxbcProgramType, RdefProgramType, ResourceDefinition};

/// Shader stage, as numbered in ShCd headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u8)]
pub enum ProgramType {
    Vertex = 0,
    Pixel = 1,
    Geometry = 2,
    Compute = 3,
    Hull = 4,
    Domain = 5,
}

impl TryFrom<u8> for ProgramType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Vertex),
            1 => Ok(Self::Pixel),
            2 => Ok(Self::Geometry),
            3 => Ok(Self::Compute),
            4 => Ok(Self::Hull),
            5 => Ok(Self::Domain),
            other => Err(other),
        }
    }
}

impl ProgramType {
    /// Two-letter prefix of shader ids, e.g. `vs`.
    pub fn abbreviation(self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Pixel => "ps",
            Self::Geometry => "gs",
            Self::Compute => "cs",
            Self::Hull => "hs",
            Self::Domain => "ds",
        }
    }

    /// Parse a two-letter prefix, ignoring case.
    pub fn from_abbreviation(abbreviation: &str) -> Option<Self> {
        match abbreviation.to_ascii_lowercase().as_str() {
            "vs" => Some(Self::Vertex),
            "ps" => Some(Self::Pixel),
            "gs" => Some(Self::Geometry),
            "cs" => Some(Self::Compute),
            "hs" => Some(Self::Hull),
            "ds" => Some(Self::Domain),
            _ => None,
        }
    }

    /// Split a shader id such as `vs12` into its type and index.
    pub fn parse_shader_id(id: &str) -> Option<(Self, u32)> {
        let digits = id.find(|c: char| c.is_ascii_digit())?;
        let program_type = Self::from_abbreviation(&id[..digits])?;
        let index = id[digits..].parse().ok()?;
        Some((program_type, index))
    }

    pub fn from_dxbc(program_type: DxbcProgramType) -> Option<Self> {
        match program_type {
            DxbcProgramType::PIXEL => Some(Self::Pixel),
            DxbcProgramType::VERTEX => Some(Self::Vertex),
            DxbcProgramType::GEOMETRY => Some(Self::Geometry),
            DxbcProgramType::HULL => Some(Self::Hull),
            DxbcProgramType::DOMAIN => Some(Self::Domain),
            DxbcProgramType::COMPUTE => Some(Self::Compute),
            _ => None,
        }
    }

    pub fn to_dxbc(self) -> DxbcProgramType {
        match self {
            Self::Vertex => DxbcProgramType::VERTEX,
            Self::Pixel => DxbcProgramType::PIXEL,
            Self::Geometry => DxbcProgramType::GEOMETRY,
            Self::Compute => DxbcProgramType::COMPUTE,
            Self::Hull => DxbcProgramType::HULL,
            Self::Domain => DxbcProgramType::DOMAIN,
        }
    }

    pub fn from_rdef(program_type: RdefProgramType) -> Option<Self> {
        match program_type {
            RdefProgramType::PIXEL => Some(Self::Pixel),
            RdefProgramType::VERTEX => Some(Self::Vertex),
            RdefProgramType::GEOMETRY => Some(Self::Geometry),
            RdefProgramType::HULL => Some(Self::Hull),
            RdefProgramType::DOMAIN => Some(Self::Domain),
            RdefProgramType::COMPUTE => Some(Self::Compute),
            _ => None,
        }
    }

    pub fn to_rdef(self) -> RdefProgramType {
        match self {
            Self::Vertex => RdefProgramType::VERTEX,
            Self::Pixel => RdefProgramType::PIXEL,
            Self::Geometry => RdefProgramType::GEOMETRY,
            Self::Compute => RdefProgramType::COMPUTE,
            Self::Hull => RdefProgramType::HULL,
            Self::Domain => RdefProgramType::DOMAIN,
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex shader",
            Self::Pixel => "pixel shader",
            Self::Geometry => "geometry shader",
            Self::Compute => "compute shader",
            Self::Hull => "hull shader",
            Self::Domain => "domain shader",
        })
    }
}

/// Graphics API a shader was compiled for, stored as a four-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[repr(u32)]
pub enum GraphicsPlatform {
    /// `DX9\0`
    DirectX9 = 0x0039_5844,
    /// `DX11`
    DirectX11 = 0x3131_5844,
}

impl TryFrom<u32> for GraphicsPlatform {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0039_5844 => Ok(Self::DirectX9),
            0x3131_5844 => Ok(Self::DirectX11),
            other => Err(other),
        }
    }
}

impl GraphicsPlatform {
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Whether shaders reflected by `rdef` can run on this platform.
    pub fn is_compatible_with(self, rdef: &ResourceDefinition) -> bool {
        match rdef.major_version {
            3 => self == Self::DirectX9,
            5 => self == Self::DirectX11,
            _ => false,
        }
    }
}

impl fmt::Display for GraphicsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DirectX9 => "DirectX 9",
            Self::DirectX11 => "DirectX 11",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_ids() {
        assert_eq!(ProgramType::parse_shader_id("vs12"), Some((ProgramType::Vertex, 12)));
        assert_eq!(ProgramType::parse_shader_id("PS0"), Some((ProgramType::Pixel, 0)));
        assert_eq!(ProgramType::parse_shader_id("xs1"), None);
        assert_eq!(ProgramType::parse_shader_id("vs"), None);
    }

    #[test]
    fn test_dxbc_mapping() {
        for value in 0..6u8 {
            let program_type = ProgramType::try_from(value).unwrap();
            assert_eq!(ProgramType::from_dxbc(program_type.to_dxbc()), Some(program_type));
            assert_eq!(ProgramType::from_rdef(program_type.to_rdef()), Some(program_type));
        }
        assert_eq!(ProgramType::Vertex.to_dxbc(), DxbcProgramType::VERTEX);
        assert_eq!(ProgramType::Pixel.to_rdef(), RdefProgramType::PIXEL);
        assert_eq!(ProgramType::try_from(6), Err(6));
    }

    #[test]
    fn test_platform_tags() {
        assert_eq!(&GraphicsPlatform::DirectX11.tag().to_le_bytes(), b"DX11");
        assert_eq!(&GraphicsPlatform::DirectX9.tag().to_le_bytes(), b"DX9\0");
        assert_eq!(GraphicsPlatform::try_from(0x3131_5844), Ok(GraphicsPlatform::DirectX11));
        assert!(GraphicsPlatform::try_from(0).is_err());
    }
}
