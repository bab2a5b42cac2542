//! Opcode tokens.

use std::fmt;

/// Instruction opcode, the low 11 bits of an opcode token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct OpcodeType(pub u16);

impl OpcodeType {
    pub const ADD: Self = Self(0x00);
    pub const MOV: Self = Self(0x36);
    pub const CUSTOM_DATA: Self = Self(0x35);
    pub const RET: Self = Self(0x3E);
    pub const SAMPLE: Self = Self(0x45);
    pub const SAMPLE_C: Self = Self(0x46);
    pub const SAMPLE_C_LZ: Self = Self(0x47);
    pub const SAMPLE_L: Self = Self(0x48);
    pub const SAMPLE_D: Self = Self(0x49);
    pub const SAMPLE_B: Self = Self(0x4A);
    pub const LD: Self = Self(0x2D);
    pub const DCL_RESOURCE: Self = Self(0x58);
    pub const DCL_CONSTANT_BUFFER: Self = Self(0x59);
    pub const DCL_SAMPLER: Self = Self(0x5A);
    pub const DCL_INPUT: Self = Self(0x5F);
    pub const DCL_OUTPUT: Self = Self(0x65);
    pub const DCL_TEMPS: Self = Self(0x68);
    pub const DCL_GLOBAL_FLAGS: Self = Self(0x6A);
    pub const GATHER4: Self = Self(0x6D);

    /// Declarations whose operands do not follow the generic operand
    /// encoding, plus `customdata`.
    pub fn has_custom_operands(self) -> bool {
        matches!(
            self.0,
            0x35 | 0x58..=0x5E | 0x60..=0x64 | 0x66..=0x6A | 0x78 | 0x90..=0xA0 | 0xA2 | 0xCE
        )
    }
}

impl fmt::Debug for OpcodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpcodeType({:#x})", self.0)
    }
}

/// First token of every instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeToken(pub u32);

impl OpcodeToken {
    pub fn opcode_type(self) -> OpcodeType {
        OpcodeType((self.0 & 0x7FF) as u16)
    }

    /// Instruction length in tokens, including this one. Not meaningful
    /// for `customdata`, whose length is the following token.
    pub fn length(self) -> usize {
        ((self.0 >> 24) & 0x7F) as usize
    }

    /// Whether an extended opcode token follows.
    pub fn is_extended(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_fields() {
        // sample r0.xyzw, v1.xyxx, t0.xyzw, s0 (11 tokens)
        let token = OpcodeToken(0x0B00_0045);
        assert_eq!(token.opcode_type(), OpcodeType::SAMPLE);
        assert_eq!(token.length(), 11);
        assert!(!token.is_extended());
        assert!(OpcodeToken(0x8B00_0045).is_extended());
    }

    #[test]
    fn test_custom_operand_table() {
        for custom in [0x35, 0x58, 0x5E, 0x60, 0x64, 0x66, 0x6A, 0x78, 0x90, 0xA0, 0xA2, 0xCE] {
            assert!(OpcodeType(custom).has_custom_operands(), "{:#x}", custom);
        }
        for generic in [0x00, 0x36, 0x45, 0x5F, 0x65, 0x6D, 0xA1, 0xCD] {
            assert!(!OpcodeType(generic).has_custom_operands(), "{:#x}", generic);
        }
    }
}
