//! Instruction framing.

use super::opcode::{OpcodeToken, OpcodeType};
use super::operand::Operands;
use crate::{Error, Result};

/// One instruction, borrowing its tokens from the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction<'a> {
    pub opcode: OpcodeToken,
    pub extensions: &'a [u32],
    /// Operand tokens, or the payload of a `customdata` block.
    pub operands: &'a [u32],
}

impl<'a> Instruction<'a> {
    /// Decode the instruction at `offset`, returning it and the offset of
    /// the next one.
    pub fn decode(tokens: &'a [u32], offset: usize) -> Result<(Self, usize)> {
        let out_of_range = |what: &str, end: usize| {
            Error::malformed(
                "instruction",
                format!(
                    "{} at token {} ends at {}, past {} tokens",
                    what,
                    offset,
                    end,
                    tokens.len()
                ),
            )
        };

        let opcode = OpcodeToken(
            *tokens
                .get(offset)
                .ok_or_else(|| out_of_range("opcode", offset + 1))?,
        );

        if opcode.opcode_type() == OpcodeType::CUSTOM_DATA {
            let length = *tokens
                .get(offset + 1)
                .ok_or_else(|| out_of_range("customdata length", offset + 2))?
                as usize;
            let next = offset + length.max(2);
            let operands = tokens
                .get(offset + 2..next)
                .ok_or_else(|| out_of_range("customdata", next))?;
            return Ok((
                Self {
                    opcode,
                    extensions: &[],
                    operands,
                },
                next,
            ));
        }

        let length = opcode.length();
        let instruction = tokens
            .get(offset..offset + length)
            .ok_or_else(|| out_of_range("instruction", offset + length))?;
        let next = offset + length.max(1);

        let mut extensions = 0;
        while 1 + extensions < instruction.len() && instruction[extensions] & 0x8000_0000 != 0 {
            extensions += 1;
        }

        let (extensions, operands) = match instruction {
            [] => (&[][..], &[][..]),
            [_, rest @ ..] => rest.split_at(extensions),
        };

        Ok((
            Self {
                opcode,
                extensions,
                operands,
            },
            next,
        ))
    }

    pub fn opcode_type(&self) -> OpcodeType {
        self.opcode.opcode_type()
    }

    /// Whether the operands follow the generic operand encoding.
    pub fn has_generic_operands(&self) -> bool {
        !self.opcode_type().has_custom_operands()
    }

    pub fn operands(&self) -> Operands<'a> {
        Operands::new(self.operands)
    }
}

/// Iterator over the instructions of a token stream.
#[derive(Debug, Clone)]
pub struct Instructions<'a> {
    tokens: &'a [u32],
    offset: usize,
}

impl<'a> Instructions<'a> {
    pub fn new(tokens: &'a [u32]) -> Self {
        Self { tokens, offset: 0 }
    }

    /// Token offset of the next instruction.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.tokens.len() {
            return None;
        }
        match Instruction::decode(self.tokens, self.offset) {
            Ok((instruction, next)) => {
                self.offset = next;
                Some(Ok(instruction))
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
    use crate::sm5::OperandType;

    // dcl_sampler s0, mode_default
    // sample r0.xyzw, v1.xyxx, t0.xyzw, s0
    // customdata with a two-token payload
    // ret
    const PROGRAM: [u32; 18] = [
        0x0300_005A, 0x0010_6000, 0,
        0x0900_0045, 0x0010_00F2, 0, 0x0010_1046, 1, 0x0010_7E46, 0, 0x0010_6000, 0,
        0x0000_0035, 4, 0xAAAA, 0xBBBB,
        0x0100_003E,
        0x0100_003E,
    ];

    #[test]
    fn test_walk_program() {
        let instructions: Vec<_> = Instructions::new(&PROGRAM).collect::<Result<_>>().unwrap();
        let types: Vec<_> = instructions.iter().map(|i| i.opcode_type()).collect();
        assert_eq!(
            types,
            [
                OpcodeType::DCL_SAMPLER,
                OpcodeType::SAMPLE,
                OpcodeType::CUSTOM_DATA,
                OpcodeType::RET,
                OpcodeType::RET
            ]
        );

        assert!(!instructions[0].has_generic_operands());
        assert_eq!(instructions[2].operands, &[0xAAAA, 0xBBBB]);
        assert!(instructions[3].operands.is_empty());

        let sample: Vec<_> = instructions[1].operands().collect::<Result<_>>().unwrap();
        let kinds: Vec<_> = sample.iter().map(|o| o.token.operand_type()).collect();
        assert_eq!(
            kinds,
            [
                OperandType::TEMP,
                OperandType::INPUT,
                OperandType::RESOURCE,
                OperandType::SAMPLER
            ]
        );
    }

    #[test]
    fn test_extended_opcode() {
        // sample_aoffimmi with one extended token.
        let tokens = [0x8A00_0045, 0x0000_0001, 0x0010_00F2, 0, 0x0010_1046, 1, 0x0010_7E46, 0, 0x0010_6000, 0];
        let (instruction, next) = Instruction::decode(&tokens, 0).unwrap();
        assert_eq!(next, 10);
        assert_eq!(instruction.extensions, &[1]);
        assert_eq!(instruction.operands.len(), 8);
    }

    #[test]
    fn test_zero_length_advances() {
        let tokens = [0x0000_0036, 0x0100_003E];
        let instructions: Vec<_> = Instructions::new(&tokens).collect::<Result<_>>().unwrap();
        assert_eq!(instructions.len(), 2);
        assert!(instructions[0].operands.is_empty());
    }

    #[test]
    fn test_truncated_stream() {
        let tokens = [0x0900_0045, 0x0010_00F2];
        let mut instructions = Instructions::new(&tokens);
        assert!(instructions.next().unwrap().is_err());
        assert!(instructions.next().is_none());
    }
}
