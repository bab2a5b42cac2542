//! Vertex input masks stored in a vertex shader's additional header.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use lumen_dxbc::parts::SignatureElement;

/// Set of vertex attributes, one bit per semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VertexInput(pub u32);

const FLAG_NAMES: [(u32, &str); 17] = [
    (VertexInput::POSITION.0, "Position"),
    (VertexInput::BLEND_WEIGHT.0, "BlendWeight"),
    (VertexInput::NORMAL.0, "Normal"),
    (VertexInput::COLOR0.0, "Color0"),
    (VertexInput::COLOR1.0, "Color1"),
    (VertexInput::FOG.0, "Fog"),
    (VertexInput::PSIZE.0, "PSize"),
    (VertexInput::BLEND_INDICES.0, "BlendIndices"),
    (VertexInput::TEXCOORD0.0, "TexCoord0"),
    (VertexInput::TEXCOORD1.0, "TexCoord1"),
    (VertexInput::TEXCOORD2.0, "TexCoord2"),
    (VertexInput::TEXCOORD3.0, "TexCoord3"),
    (VertexInput::TEXCOORD4.0, "TexCoord4"),
    (VertexInput::TEXCOORD5.0, "TexCoord5"),
    (VertexInput::TANGENT.0, "Tangent"),
    (VertexInput::BINORMAL.0, "Binormal"),
    (VertexInput::DEPTH.0, "Depth"),
];

impl VertexInput {
    pub const NONE: Self = Self(0);
    pub const POSITION: Self = Self(1 << 0);
    pub const BLEND_WEIGHT: Self = Self(1 << 1);
    pub const NORMAL: Self = Self(1 << 2);
    pub const COLOR0: Self = Self(1 << 3);
    pub const COLOR1: Self = Self(1 << 4);
    pub const FOG: Self = Self(1 << 5);
    pub const PSIZE: Self = Self(1 << 6);
    pub const BLEND_INDICES: Self = Self(1 << 7);
    pub const TEXCOORD0: Self = Self(1 << 8);
    pub const TEXCOORD1: Self = Self(1 << 9);
    pub const TEXCOORD2: Self = Self(1 << 10);
    pub const TEXCOORD3: Self = Self(1 << 11);
    pub const TEXCOORD4: Self = Self(1 << 12);
    pub const TEXCOORD5: Self = Self(1 << 13);
    pub const TANGENT: Self = Self(1 << 14);
    pub const BINORMAL: Self = Self(1 << 15);
    pub const DEPTH: Self = Self(1 << 16);

    /// The attribute an input signature element feeds, if it is one of the
    /// tracked semantics.
    pub fn from_element(element: &SignatureElement) -> Self {
        let index = element.semantic_index;
        match (element.name.as_str(), index) {
            ("POSITION", 0) => Self::POSITION,
            ("BLENDWEIGHT", 0) => Self::BLEND_WEIGHT,
            ("NORMAL", 0) => Self::NORMAL,
            ("COLOR", 0) => Self::COLOR0,
            ("COLOR", 1) => Self::COLOR1,
            ("FOG", 0) => Self::FOG,
            ("PSIZE", 0) => Self::PSIZE,
            ("BLENDINDICES", 0) => Self::BLEND_INDICES,
            ("TEXCOORD", 0..=5) => Self(Self::TEXCOORD0.0 << index),
            ("TANGENT", 0) => Self::TANGENT,
            ("BINORMAL", 0) => Self::BINORMAL,
            ("DEPTH", 0) => Self::DEPTH,
            _ => Self::NONE,
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for VertexInput {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for VertexInput {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for VertexInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("0");
        }
        let mut rest = self.0;
        let mut first = true;
        for (bit, name) in FLAG_NAMES {
            if rest & bit != 0 {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                rest &= !bit;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{:#X}", rest)?;
        }
        Ok(())
    }
}
