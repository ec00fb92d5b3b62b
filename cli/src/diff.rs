//! Lockstep execution of the machine against the spike reference
//! simulator.
//!
//! Spike owns program setup: its pk proxy kernel builds the guest stack,
//! so the machine's memory is sized to spike's SP plus the stack bytes
//! above it and seeded from spike's state before stepping begins.

use anyhow::{Context, Result};
use rvemu_core::registers::{REG_NAMES, SP};
use rvemu_core::{loader, DebugFlags, Machine};

use crate::spike::Spike;

/// Run `prog` under both the machine and spike, one instruction at a
/// time, until they exit or their state differs. The first divergence is
/// printed with both machine states and the register delta.
pub fn diff_with_spike(
    prog: &str,
    argv: &[String],
    env: &[String],
    spike_path: &str,
    max_steps: usize,
) -> Result<()> {
    // pk builds the guest environment on its own; the --env values only
    // matter for plain runs.
    let _ = env;

    let data = std::fs::read(prog).with_context(|| format!("can't read program {prog}"))?;
    let elf = goblin::elf::Elf::parse(&data).context("can't parse ELF")?;

    let mut spike = Spike::new(spike_path, prog, argv, elf.entry)
        .context("can't create spike instance")?;

    let (sp, stack) = spike
        .stack()
        .map_err(|e| anyhow::anyhow!("can't read stack from the spike simulator: {e}"))?;

    let mut m = Machine::new(elf.entry, sp + stack.len() as u64);
    m.debug = DebugFlags::REGS | DebugFlags::INSTR;
    loader::load_elf(&data, &mut m.mem).with_context(|| format!("can't load {prog}"))?;
    m.mem[sp as usize..sp as usize + stack.len()].copy_from_slice(&stack);
    m.regs[SP] = sp;

    for i in 0..max_steps {
        let serr = spike.run(1).err();
        let verr = m.run(1).err();

        let sexit = serr.as_ref().is_some_and(|e| e.is_exit());
        let vexit = verr.as_ref().is_some_and(|e| e.is_exit());
        if sexit || vexit {
            if sexit != vexit {
                println!("{spike}");
                println!("{m}");
                anyhow::bail!("VM and spike didn't exit at the same time");
            }
            break;
        }
        if let Some(e) = serr {
            println!("{spike}");
            println!("{m}");
            return Err(anyhow::Error::new(e)).context("can't execute spike instruction");
        }
        if let Some(e) = verr {
            println!("{spike}");
            println!("{m}");
            return Err(anyhow::Error::new(e)).context("can't execute vm instruction");
        }

        let d = diff_regs(&spike.regs, &m.regs);
        if !d.is_empty() || spike.pc != m.last_pc {
            println!("\n================================================================================");
            println!("          FOUND DIFF AFTER {} STEPS:\n", i + 1);
            println!("{spike}");
            println!("{m}");
            println!("Instruction:");
            println!("\tSpike: {}", spike.instr);
            match &m.last_instr {
                Some(in_) => println!("\tVM   : {in_}"),
                None => println!("\tVM   : <none>"),
            }
            println!("\nRegisters diff:");
            for &j in &d {
                println!("\t{} {}({:#x}):", REG_NAMES[j], j, j);
                println!("\t\tSpike: {:#x} ({})", spike.regs[j], spike.regs[j]);
                println!("\t\tVM   : {:#x} ({})", m.regs[j], m.regs[j]);
            }
            if spike.pc != m.last_pc {
                println!("PC diff:\n\tspike: {:#x}\n\tvm:    {:#x}", spike.pc, m.last_pc);
            }
            return Ok(());
        }
    }

    println!("\n================================================================================");
    println!("          EXITED AFTER {} STEPS:\n", m.steps);
    println!("{spike}");
    println!("{m}");
    Ok(())
}

/// Indexes of the registers whose values differ.
fn diff_regs(a: &[u64; 32], b: &[u64; 32]) -> Vec<usize> {
    (0..32).filter(|&i| a[i] != b[i]).collect()
}
