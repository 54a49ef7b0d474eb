//! Two-pass assembler for the vcpu16 instruction set.
//!
//! A program has an (optional) `.data` section and a `.text` section,
//! interleaved freely; [`sectionize`](lexer::sectionize) splits source into
//! the two, [`data::layout`] assigns `.data` labels their addresses,
//! [`labels::pre_pass`] records every `.text` label's branch target, and
//! [`encode::encode_program`] turns each `.text` line into its 16-bit word.
//!
//! Comments start with `;` and run to the end of the line. Mnemonics and
//! register names are case-insensitive. Labels end in `:`; everything else
//! is either a directive (starts with `.`) or an instruction.

mod data;
mod encode;
mod error;
mod lexer;
mod labels;

pub use data::{DataLabel, DataLabels};
pub use error::{Error, Result};
pub use labels::CodeLabels;

use hexfile::{DataRecord, Program};
use tracing::debug;
use vcpu16::constants::DEFAULT_DATA_BASE;

/// Assembles `source` into a [`hexfile::Program`], using the default data
/// base address.
pub fn assemble(source: &str) -> Result<Program> {
    assemble_addressed(source, DEFAULT_DATA_BASE)
}

/// Assembles `source` into a [`hexfile::Program`], laying out `.data` labels
/// starting at `data_base`.
pub fn assemble_addressed(source: &str, data_base: u16) -> Result<Program> {
    let (text_lines, data_lines) = lexer::sectionize(source);
    debug!(
        text_lines = text_lines.len(),
        data_lines = data_lines.len(),
        "sectionized source"
    );

    let data_labels = data::layout(&data_lines, data_base)?;
    debug!(labels = data_labels.len(), data_base, "laid out .data labels");

    let code_labels = labels::pre_pass(&text_lines);
    debug!(labels = code_labels.len(), "pre-passed .text labels");

    let instructions = encode::encode_program(&text_lines, &code_labels, &data_labels)?;
    debug!(words = instructions.len(), "encoded .text instructions");

    let mut data: Vec<DataRecord> = data_labels
        .values()
        .map(|label| DataRecord {
            address: label.addresses.first().copied().unwrap_or(data_base),
            bytes: label.values.clone(),
        })
        .collect();
    data.sort_by_key(|record| record.address);

    Ok(Program::new(instructions, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_a_small_program_end_to_end() {
        let source = "\
.data
msg: .asciz \"hi\"
.text
li r0, #1
loop:
add r0, r0, #1
jmp loop
";
        let program = assemble(source).unwrap();
        assert_eq!(program.instructions.len(), 3);
        assert_eq!(program.data.len(), 1);
        assert_eq!(program.data[0].bytes, vec![b'h', b'i']);
    }

    #[test]
    fn propagates_encoding_errors() {
        let err = assemble(".text\nbogus r0\n").unwrap_err();
        assert!(matches!(err, Error::InvalidOpcode { .. }));
    }

    #[test]
    fn data_label_reference_resolves_across_sections() {
        let source = "\
.data
n: .byte 42
.text
li r0, =n
ld r1, [r0]
syscall 0
";
        let program = assemble(source).unwrap();
        assert_eq!(program.instructions.len(), 3);
    }
}
