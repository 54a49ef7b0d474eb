use crate::data::DataLabels;
use crate::error::{Error, Result};
use crate::labels::CodeLabels;
use crate::lexer::{split_operands, SourceLine};
use util::EnumFromStr;
use vcpu16::{encode as pack, OpCode, RegisterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Group {
    RegisterAffecting,
    Control,
}

fn group_of(op: OpCode) -> Group {
    match op {
        OpCode::Ld
        | OpCode::Li
        | OpCode::St
        | OpCode::Add
        | OpCode::Sub
        | OpCode::And
        | OpCode::Or
        | OpCode::Xor
        | OpCode::Shl
        | OpCode::Shr => Group::RegisterAffecting,
        OpCode::Jmp | OpCode::Beq | OpCode::Bne | OpCode::Cmp | OpCode::Push | OpCode::Pop => {
            Group::Control
        }
    }
}

fn parse_register(line: usize, token: &str) -> Result<RegisterId> {
    RegisterId::from_str(&token.to_uppercase()).map_err(|_| Error::InvalidOperand {
        line,
        operand: token.to_string(),
        reason: "not a register (r0..r3)".into(),
    })
}

/// Parses `#0xNN`, `#0bNNNN...` and `#N` (and the bare, `#`-less form used
/// by `push`/`pop`/`syscall` masks and counts).
fn parse_immediate(line: usize, token: &str) -> Result<i64> {
    // A `=label` operand is rewritten to `[#addr]` regardless of which
    // mnemonic it feeds (see `resolve_data_ref`); mnemonics whose own
    // grammar takes a bare `#imm` (e.g. `li`) never produce the bracket
    // themselves, so unwrap one here rather than forcing every bare-immediate
    // arm to special-case the data-ref rewrite.
    let token = token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(token);
    let token = token.strip_prefix('#').unwrap_or(token);
    let (negative, token) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let value = if let Some(hex) = token.strip_prefix("0x") {
        i64::from_str_radix(hex, 16)
    } else if let Some(bin) = token.strip_prefix("0b") {
        i64::from_str_radix(bin, 2)
    } else {
        token.parse::<i64>()
    }
    .map_err(|_| Error::InvalidOperand {
        line,
        operand: token.to_string(),
        reason: "not a valid immediate".into(),
    })?;

    Ok(if negative { -value } else { value })
}

/// Rewrites a `=label` operand into the label's first data address,
/// represented the same way an explicit `[#addr]` operand would be.
fn resolve_data_ref(line: usize, token: &str, data_labels: &DataLabels) -> Result<String> {
    if let Some(label) = token.strip_prefix('=') {
        let entry = data_labels.get(label).ok_or_else(|| Error::UndefinedLabel {
            line,
            label: label.to_string(),
        })?;
        let addr = entry
            .addresses
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidOperand {
                line,
                operand: token.to_string(),
                reason: "label has no data".into(),
            })?;
        Ok(format!("[#{}]", addr))
    } else {
        Ok(token.to_string())
    }
}

enum Addressed {
    Register(RegisterId),
    Immediate(u8),
}

/// Parses a `[Rn]` or `[#addr]` bracketed operand.
fn parse_bracket(line: usize, token: &str) -> Result<Addressed> {
    let inner = token
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| Error::InvalidOperand {
            line,
            operand: token.to_string(),
            reason: "expected `[Rn]` or `[#addr]`".into(),
        })?;

    if inner.starts_with('#') {
        Ok(Addressed::Immediate((parse_immediate(line, inner)? & 0xFF) as u8))
    } else {
        Ok(Addressed::Register(parse_register(line, inner)?))
    }
}

/// A register-or-immediate operand, used by `add`/`sub`/`and`/`or`/`xor`/`cmp`.
fn parse_register_or_immediate(line: usize, token: &str) -> Result<Addressed> {
    if token.starts_with('#') || token.starts_with("[#") {
        Ok(Addressed::Immediate((parse_immediate(line, token)? & 0xFF) as u8))
    } else {
        Ok(Addressed::Register(parse_register(line, token)?))
    }
}

fn resolve_branch_target(line: usize, token: &str, code_labels: &CodeLabels) -> Result<u8> {
    if let Some(imm) = token.strip_prefix('#') {
        Ok((parse_immediate(line, imm)? & 0xFF) as u8)
    } else {
        code_labels
            .get(token)
            .copied()
            .map(|addr| (addr & 0xFF) as u8)
            .ok_or_else(|| Error::UndefinedLabel {
                line,
                label: token.to_string(),
            })
    }
}

/// Parses a `{r0,r1,lr}`-style push/pop mask into the bitmap the CPU
/// expects (`R0..R3` at bits 0..3, `LR` at bit 4).
fn parse_mask(line: usize, token: &str) -> Result<u8> {
    let inner = token
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(token);

    let mut mask = 0u8;
    for name in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        mask |= match name {
            "r0" => 0b0001,
            "r1" => 0b0010,
            "r2" => 0b0100,
            "r3" => 0b1000,
            "lr" => 0b0001_0000,
            other => {
                return Err(Error::InvalidOperand {
                    line,
                    operand: other.to_string(),
                    reason: "not a pushable/poppable register".into(),
                })
            }
        };
    }
    Ok(mask)
}

fn encode_group1(line: usize, op: OpCode, operands: &[String]) -> Result<u16> {
    match op {
        OpCode::Li => {
            let rd = parse_register(line, &operands[0])?;
            let imm = (parse_immediate(line, &operands[1])? & 0xFF) as u8;
            Ok(pack(OpCode::Li, rd, RegisterId::R0, imm))
        }
        OpCode::Ld | OpCode::St => {
            let rd = parse_register(line, &operands[0])?;
            match parse_bracket(line, &operands[1])? {
                Addressed::Register(rn) => Ok(pack(op, rd, rn, 0)),
                Addressed::Immediate(addr) => Ok(pack(op, rd, RegisterId::R0, addr)),
            }
        }
        OpCode::Add | OpCode::Sub => {
            let rd = parse_register(line, &operands[0])?;
            let rn = parse_register(line, &operands[1])?;
            let imm = match operands.get(2) {
                Some(token) => (parse_immediate(line, token)? & 0xFF) as u8,
                None => 0,
            };
            Ok(pack(op, rd, rn, imm))
        }
        OpCode::And | OpCode::Or | OpCode::Xor => {
            let rd = parse_register(line, &operands[0])?;
            match parse_register_or_immediate(line, &operands[1])? {
                Addressed::Register(rn) => Ok(pack(op, rd, rn, 0)),
                Addressed::Immediate(imm) => Ok(pack(op, rd, RegisterId::R0, imm)),
            }
        }
        OpCode::Shl | OpCode::Shr => {
            let rd = parse_register(line, &operands[0])?;
            let rn = parse_register(line, &operands[1])?;
            let imm = match operands.get(2) {
                Some(token) => (parse_immediate(line, token)? & 0xF) as u8,
                None => 0,
            };
            Ok(pack(op, rd, rn, imm))
        }
        _ => unreachable!("not a group-1 mnemonic"),
    }
}

fn encode_group2(
    line: usize,
    op: OpCode,
    operands: &[String],
    code_labels: &CodeLabels,
) -> Result<u16> {
    match op {
        OpCode::Jmp | OpCode::Beq | OpCode::Bne => {
            let target = resolve_branch_target(line, &operands[0], code_labels)?;
            Ok(pack(op, RegisterId::R0, RegisterId::R0, target))
        }
        OpCode::Cmp => {
            let rd = parse_register(line, &operands[0])?;
            match parse_register_or_immediate(line, &operands[1])? {
                Addressed::Register(rn) => Ok(pack(op, rd, rn, 0)),
                Addressed::Immediate(imm) => Ok(pack(op, rd, RegisterId::R0, imm)),
            }
        }
        OpCode::Push | OpCode::Pop => {
            let mask = parse_mask(line, &operands[0])?;
            Ok(pack(op, RegisterId::R0, RegisterId::R0, mask))
        }
        _ => unreachable!("not a group-2 mnemonic"),
    }
}

/// Encodes `syscall n` as a `pop` with the IRC bit set and no registers
/// restored — a distinct instruction variant at the decoder level, not a
/// flavor of `pop`.
fn encode_syscall(line: usize, operands: &[String]) -> Result<u16> {
    let number = (parse_immediate(line, &operands[0])? & 0x7F) as u8;
    Ok(pack(OpCode::Pop, RegisterId::R0, RegisterId::R0, number | vcpu16::constants::IRC_BIT))
}

/// Encodes every `.text` line (skipping bare label lines) into its 16-bit
/// word, in source order.
pub fn encode_program(
    lines: &[SourceLine],
    code_labels: &CodeLabels,
    data_labels: &DataLabels,
) -> Result<Vec<u16>> {
    let mut words = Vec::with_capacity(lines.len());

    for line in lines {
        if line.text.ends_with(':') {
            continue;
        }

        let (mnemonic, rest) = line
            .text
            .split_once(char::is_whitespace)
            .unwrap_or((line.text.as_str(), ""));

        if mnemonic == "syscall" {
            let operands = split_operands(rest);
            words.push(encode_syscall(line.line, &operands)?);
            continue;
        }

        let op = OpCode::from_mnemonic(mnemonic).ok_or_else(|| Error::InvalidOpcode {
            line: line.line,
            mnemonic: mnemonic.to_string(),
        })?;

        let raw_operands = split_operands(rest);
        let operands: Result<Vec<String>> = raw_operands
            .iter()
            .map(|token| resolve_data_ref(line.line, token, data_labels))
            .collect();
        let operands = operands?;

        let word = match group_of(op) {
            Group::RegisterAffecting => encode_group1(line.line, op, &operands)?,
            Group::Control => encode_group2(line.line, op, &operands, code_labels)?,
        };

        words.push(word);
    }

    Ok(words)
}
