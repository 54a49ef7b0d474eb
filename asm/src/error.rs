use thiserror::Error;

/// Errors the assembler's pipeline can raise, each carrying the 1-based
/// source line that triggered it.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Error {
    #[error("line {line}: invalid opcode {mnemonic:?}")]
    InvalidOpcode { line: usize, mnemonic: String },

    #[error("line {line}: invalid operand {operand:?}: {reason}")]
    InvalidOperand {
        line: usize,
        operand: String,
        reason: String,
    },

    #[error("line {line}: undefined label {label:?}")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: invalid data declaration: {reason}")]
    InvalidDataDeclaration { line: usize, reason: String },

    #[error("line {line}: unsupported directive {directive:?}")]
    UnsupportedDirective { line: usize, directive: String },
}

pub type Result<T> = std::result::Result<T, Error>;
