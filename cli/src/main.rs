//! rvemu is a toy user-mode RISC-V (RV64IMC) emulator.
//!
//! It can:
//!
//!   - execute a statically linked risc-v program (ELF file)
//!
//!   - step through a risc-v program and compare the state with the
//!     spike simulator after every instruction; this mode requires Linux
//!     (for the PTY) and a spike binary
//!     (https://github.com/riscv/riscv-isa-sim)
//!
//! To execute a program:
//!
//!    rvemu --argv=a,hello,world --env=A=B,LANG=en_US.UTF-8 --prog=PATH_TO_RISCV_BINARY
//!
//! To compare with spike:
//!
//!    rvemu --argv=a,hello,world --prog=PATH_TO_RISCV_BINARY --spike=PATH_TO_SPIKE_BINARY

mod diff;
mod pty;
mod spike;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use rvemu_core::{loader, DebugFlags, Machine};
use tracing_subscriber::EnvFilter;

/// Default guest memory for plain runs.
const MEM_SIZE: u64 = 100 << 20;

#[derive(Parser)]
#[command(about = "A user-mode RV64IMC emulator", long_about = None)]
struct Args {
    /// Comma-separated guest arguments; the program path is prepended as
    /// argv[0]
    #[clap(long, default_value = "")]
    argv: String,

    /// Comma-separated guest environment
    #[clap(long, default_value = "")]
    env: String,

    /// Path to the program to execute (must be an ELF file)
    #[clap(long)]
    prog: String,

    /// Maximum number of instructions to execute
    #[clap(long, default_value_t = 10_000)]
    max_steps: usize,

    /// Path to the spike binary. When set, the emulator runs one
    /// instruction at a time and compares state with spike after every
    /// step.
    #[clap(long)]
    spike: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let argv = split_list(&args.argv);
    let env = split_list(&args.env);
    let prog = expand_env(&args.prog);

    if let Some(spike) = &args.spike {
        let spike = expand_env(spike);
        return diff::diff_with_spike(&prog, &argv, &env, &spike, args.max_steps)
            .with_context(|| format!("can't compare VM with spike for program {prog}"));
    }

    let data = fs::read(&prog).with_context(|| format!("can't read program {prog}"))?;

    let mut guest_argv = vec![prog.clone()];
    guest_argv.extend(argv);
    let mut m = Machine::with_stack(0, MEM_SIZE, &guest_argv, &env);
    m.pc = loader::load_elf(&data, &mut m.mem).with_context(|| format!("can't load {prog}"))?;
    m.debug = DebugFlags::REGS | DebugFlags::INSTR;

    if let Err(err) = m.run(args.max_steps) {
        if !err.is_exit() {
            eprintln!("{m}");
            return Err(anyhow::Error::new(err))
                .with_context(|| format!("can't execute {prog} (step {})", m.steps));
        }
    }
    Ok(())
}

/// Split a comma-separated flag value. Splitting the empty string yields
/// one empty element, so the default flags still contribute an empty
/// guest argument and environment entry to the stack layout.
fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::to_string).collect()
}

/// Expand `$VAR` and `${VAR}` references from the process environment;
/// unknown variables expand to the empty string.
fn expand_env(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        let (name, tail) = if let Some(stripped) = rest.strip_prefix('{') {
            match stripped.find('}') {
                Some(end) => (&stripped[..end], &stripped[end + 1..]),
                None => ("", rest),
            }
        } else {
            let end = rest
                .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .unwrap_or(rest.len());
            (&rest[..end], &rest[end..])
        };
        if name.is_empty() {
            out.push('$');
        } else {
            out.push_str(&std::env::var(name).unwrap_or_default());
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}
