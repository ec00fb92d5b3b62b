//! Control of the spike reference simulator through its debug prompt.
//!
//! Spike is started under `-d pk` with its stdin/stderr attached to the
//! subordinate end of a pty; this side drives the prompt line protocol:
//! an empty command steps one instruction, `reg 0` dumps the register
//! file, `mem 0 <addr>` reads a doubleword, `until pc 0 <addr>` runs to
//! an address.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use anyhow::Context;
use rvemu_core::registers::{A7, REG_NAMES};

use crate::pty::{open_pty, Pty};

// SYS_exit in the pk syscall table.
const SYS_EXIT: u64 = 0x5D;

/// Step outcomes the lockstep driver distinguishes.
#[derive(Debug, thiserror::Error)]
pub enum SpikeError {
    #[error("exit")]
    Exit,
    #[error("ecall")]
    Ecall,
    #[error("trap")]
    Trap,
    #[error("invalid address")]
    InvalidAddr,
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Protocol(String),
}

impl SpikeError {
    pub fn is_exit(&self) -> bool {
        matches!(self, SpikeError::Exit)
    }
}

/// A running spike instance, stepped one instruction at a time.
pub struct Spike {
    /// Register values, synced after every command.
    pub regs: [u64; 32],
    /// Program counter reported with the last executed instruction.
    pub pc: u64,
    /// Disassembly of the last executed instruction, as spike prints it.
    pub instr: String,
    pub steps: u64,
    child: Child,
    master: File,
}

impl Spike {
    /// Start spike on `prog` and run it up to the program entry
    /// `start`. `argv` holds the guest arguments after the program name.
    pub fn new(spike_path: &str, prog: &str, argv: &[String], start: u64) -> anyhow::Result<Spike> {
        let Pty { master, subordinate } = open_pty().context("can't control spike via pty")?;

        let mut cmd = Command::new(spike_path);
        cmd.arg("-d")
            .arg("pk")
            .arg(prog)
            .args(argv)
            .stdout(Stdio::inherit())
            // Spike uses stderr for its debug I/O.
            .stdin(Stdio::from(subordinate.try_clone().context("clone pty")?))
            .stderr(Stdio::from(subordinate));
        // The child needs the pty as its controlling terminal.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                // stdin is the subordinate end by now.
                if libc::ioctl(0, libc::TIOCSCTTY as libc::c_ulong, 0) < 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let child = cmd.spawn().with_context(|| format!("start {spike_path}"))?;

        let mut s = Spike {
            regs: [0; 32],
            pc: 0,
            instr: String::new(),
            steps: 0,
            child,
            master,
        };

        // Wait for the prompt, then go to _start. pk traps while setting
        // the program up, so the sequence runs until twice with a single
        // step in between.
        s.read_until_line(": ").context("reading until prompt failed")?;
        let until = format!("until pc 0 {start:#x}");
        for c in [until.as_str(), "", until.as_str()] {
            match s.run_cmd(c) {
                Ok(()) | Err(SpikeError::Trap) => {}
                Err(e) => anyhow::bail!("can't go to _start ({start:#x}): command {c:?} failed: {e}"),
            }
        }

        Ok(s)
    }

    /// Simulate `n` instructions.
    pub fn run(&mut self, n: usize) -> Result<(), SpikeError> {
        for _ in 0..n {
            let mut r = self.run_cmd("");
            // pk services the ecall; skip ahead to the next user
            // instruction.
            while matches!(r, Err(SpikeError::Ecall)) {
                let cmd = format!("until pc 0 {:#x}", self.pc + 4);
                r = self.run_cmd(&cmd);
            }
            r?;
            self.steps += 1;
        }
        Ok(())
    }

    /// Read the doubleword at `addr`, or `InvalidAddr` if spike has no
    /// memory there.
    pub fn memory(&mut self, addr: u64) -> Result<u64, SpikeError> {
        let got = self.send_cmd(&format!("mem 0 {addr:#x}"))?;
        let got = got.trim_end().trim_end_matches(':').trim();
        if got.is_empty() {
            return Err(SpikeError::InvalidAddr);
        }
        parse_u64(got)
            .ok_or_else(|| SpikeError::Protocol(format!("can't parse value {got:?} at {addr:#x}")))
    }

    /// Read the stack: SP and the bytes from SP up to the first invalid
    /// address.
    pub fn stack(&mut self) -> Result<(u64, Vec<u8>), SpikeError> {
        let sp = self.regs[rvemu_core::registers::SP];
        let mut stack = Vec::new();
        let mut addr = sp;
        loop {
            match self.memory(addr) {
                Ok(v) => stack.extend_from_slice(&v.to_le_bytes()),
                Err(SpikeError::InvalidAddr) => return Ok((sp, stack)),
                Err(e) => return Err(e),
            }
            addr += 8;
        }
    }

    /// Run one command, then re-sync PC, the last instruction and the
    /// register file from spike's output.
    fn run_cmd(&mut self, cmd: &str) -> Result<(), SpikeError> {
        let got = self.send_cmd(cmd)?;

        let ecall = got.contains("trap_user_ecall");
        let mut trap = false;
        for line in got.lines() {
            if let Some((pc, instr)) = parse_core_line(line) {
                self.pc = pc;
                self.instr = instr;
            }
            if let Some(epc) = parse_trap_line(line) {
                trap = true;
                self.pc = epc;
            }
        }

        let got = self.send_cmd("reg 0")?;
        let fields: Vec<&str> = got
            .split(|c| c == '\n' || c == '\r' || c == ' ' || c == ':')
            .filter(|s| !s.is_empty())
            .collect();
        if fields.len() % 2 == 1 {
            return Err(SpikeError::Protocol(format!("odd number of reg-value fields: {got:?}")));
        }
        for pair in fields.chunks(2) {
            let Some(n) = REG_NAMES.iter().position(|&name| name == pair[0]) else {
                return Err(SpikeError::Protocol(format!("unrecognized reg {:?}", pair[0])));
            };
            let v = parse_u64(pair[1])
                .ok_or_else(|| SpikeError::Protocol(format!("can't parse reg value {:?}", pair[1])))?;
            self.regs[n] = v;
        }

        if ecall {
            if self.regs[A7] == SYS_EXIT {
                return Err(SpikeError::Exit);
            }
            return Err(SpikeError::Ecall);
        }
        if trap {
            return Err(SpikeError::Trap);
        }
        Ok(())
    }

    /// Send one command line and read spike's output up to the next
    /// prompt. Non-empty commands are echoed back first.
    fn send_cmd(&mut self, cmd: &str) -> Result<String, SpikeError> {
        self.master.write_all(cmd.as_bytes())?;
        self.master.write_all(b"\n")?;
        if !cmd.is_empty() {
            let echoed = self.read_until_line(cmd)?;
            if echoed != cmd {
                return Err(SpikeError::Protocol(format!("got {echoed:?} want {cmd:?}")));
            }
        }
        self.read_until_line(": ")
    }

    /// Read byte-by-byte until the current line equals `want`; returns
    /// everything read.
    fn read_until_line(&mut self, want: &str) -> Result<String, SpikeError> {
        let want = want.as_bytes();
        let mut got: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        loop {
            let mut buf = [0u8; 1];
            if self.master.read(&mut buf)? == 0 {
                return Err(SpikeError::Protocol("unexpected eof from spike".into()));
            }
            got.push(buf[0]);
            if buf[0] == b'\n' {
                line.clear();
                continue;
            }
            line.push(buf[0]);
            if line == want {
                return Ok(String::from_utf8_lossy(&got).into_owned());
            }
        }
    }
}

impl Drop for Spike {
    fn drop(&mut self) {
        // Ask spike to quit, then make sure the child is reaped. The pty
        // descriptors close with their Files.
        let _ = self.master.write_all(b"q\n");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl fmt::Display for Spike {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=========== Spike ============")?;
        writeln!(f, "Steps: {}", self.steps)?;
        writeln!(f, "PC:    {:#x} ({})", self.pc, self.pc)?;
        writeln!(f, "INSTR: {}", self.instr)?;
        writeln!(f, "\n[ REGISTERS ]")?;
        for (row, chunk) in self.regs.chunks(4).enumerate() {
            for (col, v) in chunk.iter().enumerate() {
                let i = row * 4 + col;
                let cell = format!("{}({}): {:#x}", REG_NAMES[i], i, v);
                write!(f, "{cell:<24}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Parse `core   0: 0x0000000000010078 (0x00f58593) addi a1, a1, 15`.
fn parse_core_line(line: &str) -> Option<(u64, String)> {
    let rest = line.strip_prefix("core")?.trim_start().strip_prefix("0:")?.trim_start();
    let (pc_str, instr) = match rest.split_once(char::is_whitespace) {
        Some((a, b)) => (a, b),
        None => (rest, ""),
    };
    if !pc_str.starts_with("0x") {
        return None;
    }
    Some((parse_u64(pc_str)?, instr.trim().to_string()))
}

/// Parse `core   0: exception trap_..., epc 0x...`.
fn parse_trap_line(line: &str) -> Option<u64> {
    let rest = line.strip_prefix("core")?.trim_start().strip_prefix("0:")?.trim_start();
    if !rest.starts_with("exception") {
        return None;
    }
    let (_, epc) = rest.rsplit_once("epc")?;
    parse_u64(epc.trim())
}

/// Parse a number the way spike prints them: 0x-prefixed or decimal.
fn parse_u64(s: &str) -> Option<u64> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
