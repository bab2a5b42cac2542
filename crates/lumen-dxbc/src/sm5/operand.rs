//! Operand tokens and their trailing immediates and indices.

use crate::{Error, Result};

/// Register file an operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OperandType(pub u8);

impl OperandType {
    pub const TEMP: Self = Self(0);
    pub const INPUT: Self = Self(1);
    pub const OUTPUT: Self = Self(2);
    pub const INDEXABLE_TEMP: Self = Self(3);
    pub const IMMEDIATE32: Self = Self(4);
    pub const IMMEDIATE64: Self = Self(5);
    pub const SAMPLER: Self = Self(6);
    pub const RESOURCE: Self = Self(7);
    pub const CONSTANT_BUFFER: Self = Self(8);
    pub const IMMEDIATE_CONSTANT_BUFFER: Self = Self(9);
    pub const LABEL: Self = Self(10);
    pub const NULL: Self = Self(13);
    pub const UNORDERED_ACCESS_VIEW: Self = Self(30);
    pub const THREAD_GROUP_SHARED_MEMORY: Self = Self(31);
}

/// Number of components an operand carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NumComponents(pub u8);

impl NumComponents {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);
    pub const FOUR: Self = Self(2);
    pub const N: Self = Self(3);

    fn count(self) -> usize {
        match self {
            Self::ONE => 1,
            Self::FOUR => 4,
            _ => 0,
        }
    }
}

/// How one dimension of an operand's index is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexRepresentation(pub u8);

impl IndexRepresentation {
    pub const IMMEDIATE32: Self = Self(0);
    pub const IMMEDIATE64: Self = Self(1);
    pub const RELATIVE: Self = Self(2);
    pub const IMMEDIATE32_PLUS_RELATIVE: Self = Self(3);
    pub const IMMEDIATE64_PLUS_RELATIVE: Self = Self(4);

    fn immediate_tokens(self) -> usize {
        match self {
            Self::IMMEDIATE32 | Self::IMMEDIATE32_PLUS_RELATIVE => 1,
            Self::IMMEDIATE64 | Self::IMMEDIATE64_PLUS_RELATIVE => 2,
            _ => 0,
        }
    }

    fn is_relative(self) -> bool {
        matches!(
            self,
            Self::RELATIVE | Self::IMMEDIATE32_PLUS_RELATIVE | Self::IMMEDIATE64_PLUS_RELATIVE
        )
    }
}

/// First token of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperandToken(pub u32);

impl OperandToken {
    pub fn num_components(self) -> NumComponents {
        NumComponents((self.0 & 0x3) as u8)
    }

    /// Mask, swizzle or select-1; only meaningful with four components.
    pub fn selection_mode(self) -> u8 {
        ((self.0 >> 2) & 0x3) as u8
    }

    pub fn operand_type(self) -> OperandType {
        OperandType(((self.0 >> 12) & 0xFF) as u8)
    }

    pub fn index_dimensions(self) -> usize {
        ((self.0 >> 20) & 0x3) as usize
    }

    /// Representation of index dimension `dimension` (0 to 2).
    pub fn index_representation(self, dimension: usize) -> IndexRepresentation {
        IndexRepresentation(((self.0 >> (22 + 3 * dimension)) & 0x7) as u8)
    }

    pub fn is_extended(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }
}

/// One decoded operand, borrowing its tokens from the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operand<'a> {
    pub token: OperandToken,
    pub extensions: &'a [u32],
    pub immediate: &'a [u32],
    /// Raw tokens of each index dimension, relative sub-operands included.
    pub indices: [&'a [u32]; 3],
}

fn slice<'a>(tokens: &'a [u32], start: usize, count: usize) -> Result<&'a [u32]> {
    start
        .checked_add(count)
        .and_then(|end| tokens.get(start..end))
        .ok_or_else(|| {
            Error::malformed(
                "operand",
                format!(
                    "{} tokens at {} run past the end of {} tokens",
                    count,
                    start,
                    tokens.len()
                ),
            )
        })
}

impl<'a> Operand<'a> {
    /// Decode the operand starting at `offset`, returning it and the offset
    /// that follows it.
    pub fn decode(tokens: &'a [u32], offset: usize) -> Result<(Self, usize)> {
        let token = OperandToken(slice(tokens, offset, 1)?[0]);

        let mut extensions = 0;
        while offset + 1 + extensions < tokens.len() && tokens[offset + extensions] & 0x8000_0000 != 0 {
            extensions += 1;
        }
        let extension_tokens = slice(tokens, offset + 1, extensions)?;
        let mut next = offset + 1 + extensions;

        let width = match token.operand_type() {
            OperandType::IMMEDIATE32 => 1,
            OperandType::IMMEDIATE64 => 2,
            _ => 0,
        };
        let immediate_length = width * token.num_components().count();
        let immediate = slice(tokens, next, immediate_length)?;
        next += immediate_length;

        let mut indices: [&'a [u32]; 3] = [&[], &[], &[]];
        for (dimension, index) in indices.iter_mut().enumerate().take(token.index_dimensions()) {
            let (decoded, after) = decode_index(tokens, token.index_representation(dimension), next)?;
            *index = decoded;
            next = after;
        }

        Ok((
            Self {
                token,
                extensions: extension_tokens,
                immediate,
                indices,
            },
            next,
        ))
    }

    /// Register number of a first index given as a 32-bit immediate.
    pub fn immediate_index(&self) -> Option<u32> {
        if self.token.index_dimensions() < 1
            || self.token.index_representation(0) != IndexRepresentation::IMMEDIATE32
        {
            return None;
        }
        self.indices[0].first().copied()
    }
}

fn decode_index(
    tokens: &[u32],
    representation: IndexRepresentation,
    offset: usize,
) -> Result<(&[u32], usize)> {
    let mut next = offset + representation.immediate_tokens();
    if representation.is_relative() {
        let (_, after) = Operand::decode(tokens, next)?;
        next = after;
    }
    Ok((slice(tokens, offset, next - offset)?, next))
}

/// Iterator over the operands of one instruction.
#[derive(Debug, Clone)]
pub struct Operands<'a> {
    tokens: &'a [u32],
    offset: usize,
}

impl<'a> Operands<'a> {
    pub fn new(tokens: &'a [u32]) -> Self {
        Self { tokens, offset: 0 }
    }
}

impl<'a> Iterator for Operands<'a> {
    type Item = Result<Operand<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.tokens.len() {
            return None;
        }
        match Operand::decode(self.tokens, self.offset) {
            Ok((operand, next)) => {
                self.offset = next;
                Some(Ok(operand))
            }
            Err(e) => {
                self.offset = self.tokens.len();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_operands() {
        // r0.xyzw, v1.xyxx, t0.xyzw, s0
        let tokens = [
            0x0010_00F2, 0, // r0
            0x0010_1046, 1, // v1
            0x0010_7E46, 0, // t0
            0x0010_6000, 0, // s0
        ];
        let operands: Vec<_> = Operands::new(&tokens).collect::<Result<_>>().unwrap();

        assert_eq!(operands.len(), 4);
        assert_eq!(operands[0].token.operand_type(), OperandType::TEMP);
        assert_eq!(operands[1].immediate_index(), Some(1));
        assert_eq!(operands[2].token.operand_type(), OperandType::RESOURCE);
        assert_eq!(operands[3].token.operand_type(), OperandType::SAMPLER);
        assert_eq!(operands[3].token.num_components(), NumComponents::ZERO);
        assert_eq!(operands[3].immediate_index(), Some(0));
    }

    #[test]
    fn test_immediates() {
        // l(1.0, 0, 0, 0) followed by a scalar l(7)
        let tokens = [0x0000_4002, 0x3F80_0000, 0, 0, 0, 0x0000_4001, 7];
        let operands: Vec<_> = Operands::new(&tokens).collect::<Result<_>>().unwrap();

        assert_eq!(operands[0].immediate, &[0x3F80_0000, 0, 0, 0]);
        assert_eq!(operands[1].immediate, &[7]);
        assert_eq!(operands[1].immediate_index(), None);
    }

    #[test]
    fn test_relative_index_recurses() {
        // cb0[r1.x + 2]: two dimensions, the second immediate32 plus relative.
        let token = 0x0020_8000 | (3 << 25) | 2;
        let tokens = [token, 0, 2, 0x0010_000A, 1];
        let (operand, next) = Operand::decode(&tokens, 0).unwrap();

        assert_eq!(next, tokens.len());
        assert_eq!(operand.token.operand_type(), OperandType::CONSTANT_BUFFER);
        assert_eq!(operand.indices[0], &[0]);
        assert_eq!(operand.indices[1], &[2, 0x0010_000A, 1]);
        assert_eq!(operand.immediate_index(), Some(0));
    }

    #[test]
    fn test_truncated_operand_is_an_error() {
        let tokens = [0x0010_7E46];
        let mut operands = Operands::new(&tokens);
        assert!(operands.next().unwrap().is_err());
        assert!(operands.next().is_none());
    }
}
