//! Shader model 4/5 token stream decoding.
//!
//! Only the framing is decoded: instruction boundaries, extension tokens and
//! operand indices. This is enough to see which registers an instruction
//! touches without interpreting what it does.

mod instruction;
mod opcode;
mod operand;

pub use instruction::{Instruction, Instructions};
pub use opcode::{OpcodeToken, OpcodeType};
pub use operand::{
    IndexRepresentation, NumComponents, Operand, OperandToken, OperandType, Operands,
};
