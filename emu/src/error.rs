use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced at the emulator's boundary: loading a HEX file and the
/// harddrive sandbox. Errors inside the CPU core itself are non-fatal by
/// design (see `vcpu16::CoreError`) and never reach this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("loading {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    #[error("{0} is outside ./harddrive")]
    SandboxViolation(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
