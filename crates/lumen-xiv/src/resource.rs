//! Resources bound by shaders.

use lumen_common::Keyed;

use crate::Name;

/// What a texture or UAV slot holds. Constant buffers and samplers use
/// [`ShaderResourceType::UNDEFINED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShaderResourceType(pub u16);

impl ShaderResourceType {
    pub const UNDEFINED: Self = Self(0);
    pub const TEXTURE: Self = Self(1);
    pub const BUFFER: Self = Self(2);
}

/// A constant buffer, sampler, texture or UAV used by a shader.
///
/// `size` is in 16-byte registers for constant buffers and the array length
/// for UAVs. For samplers and textures it is the resource's position among
/// the sampler/texture pairs, or `0xFFFF` if it takes no part in one.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShaderResource {
    pub name: Name,
    pub kind: ShaderResourceType,
    pub slot: u16,
    pub size: u16,
}

impl ShaderResource {
    pub fn new(name: impl Into<Name>, kind: ShaderResourceType, slot: u16, size: u16) -> Self {
        Self {
            name: name.into(),
            kind,
            slot,
            size,
        }
    }
}

impl Keyed for ShaderResource {
    type Key = Name;

    fn key(&self) -> Name {
        self.name.clone()
    }
}

/// The four resource lists of a shader or package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceCategory {
    ConstantBuffer,
    Sampler,
    Texture,
    Uav,
}

impl ResourceCategory {
    /// Parse the prefix of a slot assignment such as `tt=`.
    pub fn from_table_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "ct" => Some(Self::ConstantBuffer),
            "st" => Some(Self::Sampler),
            "tt" => Some(Self::Texture),
            "ut" => Some(Self::Uav),
            _ => None,
        }
    }
}
