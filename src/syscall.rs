/// The syscall numbers this machine knows the name of. Only `Exit`, `Print`
/// and `Uname` have behavior; the rest are reserved and always bounce back
/// to the CPU worker as `CoreError::UnsupportedSyscall`, named so a
/// diagnostic can say *what* was unsupported instead of just a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Exit,
    Print,
    Uname,
    Reserved(u8),
}

impl Syscall {
    pub fn from_number(number: u8) -> Syscall {
        match number {
            0 => Syscall::Exit,
            1 => Syscall::Print,
            63 => Syscall::Uname,
            n => Syscall::Reserved(n),
        }
    }

    /// Name of a reserved syscall, for diagnostics only. Mirrors the
    /// reserved-number table the original emulator's CLI names but never
    /// implements.
    pub fn reserved_name(number: u8) -> &'static str {
        match number {
            2 => "OPEN",
            3 => "READ",
            4 => "WRITE",
            5 => "CLOSE",
            6 => "SEEK",
            7 => "SLEEP",
            8 => "MKDIR",
            9 => "RMDIR",
            10 => "RENAME",
            11 => "STAT",
            82 => "MALLOC",
            83 => "FREE",
            84 => "REALLOC",
            92 => "GETTIMEOFDAY",
            93 => "CLOCK_GETTIME",
            94 => "NANOSLEEP",
            95 => "GETPID",
            96 => "KILL",
            _ => "UNKNOWN",
        }
    }
}

/// A syscall request captured at the moment a `pop` with the IRC bit set is
/// executed: the number plus whatever arguments were eagerly read out of
/// memory at dispatch time (notably `PRINT`'s string, read before the CPU
/// worker moves on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallRequest {
    pub syscall: Syscall,
    pub args: SyscallArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyscallArgs {
    pub string: Option<String>,
    pub registers: [u8; 4],
}
