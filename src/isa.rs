use crate::constants::*;
use crate::error::CoreError;
use crate::register::RegisterId;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

/// The sixteen opcodes of the vcpu16 instruction set, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum OpCode {
    Ld = 0x0,
    Li = 0x1,
    St = 0x2,
    Add = 0x3,
    Sub = 0x4,
    Jmp = 0x5,
    Beq = 0x6,
    Bne = 0x7,
    Cmp = 0x8,
    And = 0x9,
    Or = 0xA,
    Xor = 0xB,
    Shl = 0xC,
    Shr = 0xD,
    Push = 0xE,
    Pop = 0xF,
}

impl OpCode {
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Ld => "ld",
            OpCode::Li => "li",
            OpCode::St => "st",
            OpCode::Add => "add",
            OpCode::Sub => "sub",
            OpCode::Jmp => "jmp",
            OpCode::Beq => "beq",
            OpCode::Bne => "bne",
            OpCode::Cmp => "cmp",
            OpCode::And => "and",
            OpCode::Or => "or",
            OpCode::Xor => "xor",
            OpCode::Shl => "shl",
            OpCode::Shr => "shr",
            OpCode::Push => "push",
            OpCode::Pop => "pop",
        }
    }

    pub fn from_mnemonic(mnemonic: &str) -> Option<OpCode> {
        Some(match mnemonic {
            "ld" => OpCode::Ld,
            "li" => OpCode::Li,
            "st" => OpCode::St,
            "add" => OpCode::Add,
            "sub" => OpCode::Sub,
            "jmp" => OpCode::Jmp,
            "beq" => OpCode::Beq,
            "bne" => OpCode::Bne,
            "cmp" => OpCode::Cmp,
            "and" => OpCode::And,
            "or" => OpCode::Or,
            "xor" => OpCode::Xor,
            "shl" => OpCode::Shl,
            "shr" => OpCode::Shr,
            "push" => OpCode::Push,
            "pop" => OpCode::Pop,
            "syscall" => OpCode::Pop,
            _ => return None,
        })
    }
}

/// A decoded instruction word: `[op:4 | rd:2 | rn:2 | imm:8]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoded {
    pub op: OpCode,
    pub rd: RegisterId,
    pub rn: RegisterId,
    pub imm: u8,
}

/// Packs `(op, rd, rn, imm)` into a 16-bit instruction word.
pub fn encode(op: OpCode, rd: RegisterId, rn: RegisterId, imm: u8) -> u16 {
    let op = op.to_u16().expect("OpCode fits in 4 bits");
    ((op & OPCODE_MASK) << OPCODE_SHIFT)
        | ((rd.index() as u16 & RD_MASK) << RD_SHIFT)
        | ((rn.index() as u16 & RN_MASK) << RN_SHIFT)
        | ((imm as u16 & IMM_MASK) << IMM_SHIFT)
}

/// Unpacks a 16-bit instruction word into its four fields.
pub fn decode(word: u16) -> Result<Decoded, CoreError> {
    let op_bits = ((word >> OPCODE_SHIFT) & OPCODE_MASK) as u8;
    let op = OpCode::from_u8(op_bits).ok_or(CoreError::InvalidOpcode {
        opcode: op_bits,
        word,
    })?;
    let rd = RegisterId::from_index((word >> RD_SHIFT) & RD_MASK);
    let rn = RegisterId::from_index((word >> RN_SHIFT) & RN_MASK);
    let imm = ((word >> IMM_SHIFT) & IMM_MASK) as u8;

    Ok(Decoded { op, rd, rn, imm })
}
