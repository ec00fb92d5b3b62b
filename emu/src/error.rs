//! Execution errors.

use rvemu_riscv::DecodeError;

/// Errors surfaced by the step loop and the ECALL bridge.
///
/// `Exit` is the structured termination signal raised by the `exit`
/// syscall; it carries no payload and callers decide whether it means
/// normal program termination. Every other kind is fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decode at {pc:#x}: {source}")]
    Decode {
        pc: u64,
        #[source]
        source: DecodeError,
    },

    #[error("unrecognized ecall {0:#x} ({0})")]
    UnknownSyscall(u64),

    #[error("unrecognized fd {0} in write ecall")]
    BadFileDescriptor(u64),

    #[error("exit")]
    Exit,

    #[error("host i/o: {0}")]
    HostIO(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the structured exit signal rather than a failure.
    pub fn is_exit(&self) -> bool {
        matches!(self, Error::Exit)
    }
}
