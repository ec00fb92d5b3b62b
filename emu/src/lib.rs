//! User-mode RV64IMC machine: register file, CSR file, flat little-endian
//! memory, the fetch/execute loop, the initial-stack builder, the ELF
//! section loader, and the ECALL bridge to the host.

pub mod error;
pub mod exec;
pub mod loader;
pub mod machine;
pub mod registers;
pub mod sign;
pub mod stack;
pub mod syscall;

pub use error::Error;
pub use exec::Flags;
pub use machine::{DebugFlags, Machine, Retired};
pub use sign::sext;
