//! Pseudo-terminal acquisition for driving the reference simulator.
//!
//! Both descriptors are owned [`File`]s, so they are released on every
//! exit path, including decode and step failures further up.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd};

use anyhow::{Context, Result};

/// A connected (master, subordinate) pseudo-terminal pair.
pub struct Pty {
    pub master: File,
    pub subordinate: File,
}

/// Open a pty pair with the subordinate end switched to raw mode.
pub fn open_pty() -> Result<Pty> {
    // SAFETY: posix_openpt returns a fresh descriptor whose ownership is
    // transferred to `master` immediately, and the ptsname buffer is
    // copied out before any further pty call.
    unsafe {
        let fdm = libc::posix_openpt(libc::O_RDWR);
        if fdm < 0 {
            return Err(io::Error::last_os_error()).context("posix_openpt");
        }
        let master = File::from_raw_fd(fdm);
        if libc::grantpt(fdm) != 0 {
            return Err(io::Error::last_os_error()).context("grantpt");
        }
        if libc::unlockpt(fdm) != 0 {
            return Err(io::Error::last_os_error()).context("unlockpt");
        }
        let name = libc::ptsname(fdm);
        if name.is_null() {
            return Err(io::Error::last_os_error()).context("ptsname");
        }
        let path = std::ffi::CStr::from_ptr(name).to_string_lossy().into_owned();
        let subordinate = File::options()
            .read(true)
            .write(true)
            .open(&path)
            .with_context(|| format!("open {path}"))?;

        // Raw mode: the prompt protocol must come through unmodified.
        let fds = subordinate.as_raw_fd();
        let mut term: libc::termios = std::mem::zeroed();
        if libc::tcgetattr(fds, &mut term) != 0 {
            return Err(io::Error::last_os_error()).context("tcgetattr");
        }
        libc::cfmakeraw(&mut term);
        if libc::tcsetattr(fds, libc::TCSANOW, &term) != 0 {
            return Err(io::Error::last_os_error()).context("tcsetattr");
        }

        Ok(Pty { master, subordinate })
    }
}
