//! The ECALL bridge to the host.
//!
//! Only the minimal subset a statically linked hello-world style program
//! needs is recognized: `write` to stdout/stderr and `exit`. Everything
//! else is fatal, which is deliberate; silently succeeding syscalls make
//! the diff harness drift from the reference simulator.

use std::io::{self, Write};

use crate::error::Error;
use crate::exec::Flags;
use crate::machine::Machine;
use crate::registers::{A0, A1, A2, A7};

// See riscv-tools/riscv-pk/pk/syscall.h for the syscall table.
const SYS_WRITE: u64 = 0x40;
const SYS_EXIT: u64 = 0x5D;

/// Dispatch an environment call on the syscall number in a7.
pub(crate) fn ecall(m: &mut Machine) -> Result<Flags, Error> {
    match m.regs[A7] {
        SYS_EXIT => {
            // The exit code is computed but deliberately not surfaced;
            // the emulator's own exit status reflects emulator health.
            tracing::debug!(code = m.regs[A0] as u32, "guest exit");
            Err(Error::Exit)
        }
        SYS_WRITE => {
            let fd = m.regs[A0];
            let buf = m.regs[A1] as usize;
            let n = m.regs[A2] as usize;
            let bytes = &m.mem[buf..buf + n];
            match fd {
                1 => {
                    let mut out = io::stdout().lock();
                    out.write_all(bytes)?;
                    out.flush()?;
                }
                2 => {
                    let mut out = io::stderr().lock();
                    out.write_all(bytes)?;
                    out.flush()?;
                }
                _ => return Err(Error::BadFileDescriptor(fd)),
            }
            m.store(A0, n as u64);
            Ok(Flags::default())
        }
        call => Err(Error::UnknownSyscall(call)),
    }
}
