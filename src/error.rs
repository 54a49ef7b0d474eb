use thiserror::Error;

/// Errors the CPU core itself can raise. Assembler-side errors live in the
/// `asm` crate; HEX record errors live in `hexfile`. `UnsupportedSyscall` is
/// not a `CoreError` variant: a reserved syscall number reaches the host
/// drainer like any other request and is logged and dropped there
/// (`emu::syscall_host`), since this machine's syscall contract is that it
/// never halts the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid opcode 0x{opcode:X} at word 0x{word:04X}")]
    InvalidOpcode { opcode: u8, word: u16 },
}

pub type Result<T> = std::result::Result<T, CoreError>;
