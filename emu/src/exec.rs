//! Operation execution and the fetch/execute loop.
//!
//! Execution is one exhaustive match over the decoded instruction form.
//! Every arm reads through `rs1`/`rs2`, writes at most one result through
//! the x0-filtering store, and reports through [`Flags`] whether it wrote
//! PC or the retired-instruction counter, which suppresses the loop's
//! automatic updates.

use rvemu_riscv::Instruction;

use crate::error::Error;
use crate::machine::{DebugFlags, Machine, Retired};
use crate::registers::RDINSTRET;
use crate::sign::sext;
use crate::syscall;

/// Returned by every handler.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    /// The instruction set PC; skip the automatic advance.
    pub updated_pc: bool,
    /// The instruction wrote RDINSTRET; skip the automatic increment.
    pub updated_instret: bool,
}

impl Machine {
    /// Execute one instruction: fetch at PC, decode, dispatch, then
    /// advance PC and RDINSTRET unless the handler already did.
    pub fn step(&mut self) -> Result<(), Error> {
        // Only 2- and 4-byte instructions exist; fetch at most 4 bytes
        // and let the decoder cope with a 2-byte window at the end of
        // memory.
        let pc = self.pc as usize;
        let end = usize::min(pc + 4, self.mem.len());
        let (instr, size) = rvemu_riscv::decode(&self.mem[pc..end])
            .map_err(|source| Error::Decode { pc: self.pc, source })?;
        let raw = match size {
            2 => self.read_u16(self.pc) as u32,
            _ => self.read_u32(self.pc),
        };
        self.last_pc = self.pc;
        self.last_instr = Some(Retired { instr, raw, size });
        if self.debug.contains(DebugFlags::STEP) {
            println!("{self}");
        }

        let flags = execute(self, &instr, size as u64)?;

        self.steps += 1;
        if !flags.updated_instret {
            let v = self.csr(RDINSTRET);
            self.set_csr(RDINSTRET, v.wrapping_add(1));
        }
        if !flags.updated_pc {
            self.pc += size as u64;
        }
        Ok(())
    }

    /// Execute up to `n` instructions, stopping at the first error.
    /// [`Error::Exit`] is the program's own termination. External drivers
    /// lockstep with `run(1)`.
    pub fn run(&mut self, n: usize) -> Result<(), Error> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }
}

/// Dispatch one decoded instruction against the machine. `size` is the
/// encoded size in bytes; it is what the jumps save as the link value, so
/// expanded compressed jumps link to PC + 2.
pub(crate) fn execute(m: &mut Machine, in_: &Instruction, size: u64) -> Result<Flags, Error> {
    use Instruction as I;

    let taken = Flags { updated_pc: true, ..Flags::default() };

    match *in_ {
        // riscv-spec-v2.2 defines LUI/AUIPC results as sign-extended
        // 32-bit values; AUIPC extends the wrapped 32-bit sum.
        I::LUI { rd, imm } => m.store(rd as usize, sext(imm as u32 as u64, 31)),
        I::AUIPC { rd, imm } => {
            m.store(rd as usize, sext(m.pc.wrapping_add(imm as u32 as u64), 31))
        }

        I::JAL { rd, offset } => {
            m.store(rd as usize, m.pc.wrapping_add(size));
            m.pc = m.pc.wrapping_add(offset as i64 as u64);
            return Ok(taken);
        }
        I::JALR { rd, rs1, offset } => {
            // The link write happens first; the low bit of the target is
            // always cleared.
            m.store(rd as usize, m.pc.wrapping_add(size));
            m.pc = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64) & !1;
            return Ok(taken);
        }

        I::BEQ { rs1, rs2, offset } => {
            if m.regs[rs1 as usize] == m.regs[rs2 as usize] {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }
        I::BNE { rs1, rs2, offset } => {
            if m.regs[rs1 as usize] != m.regs[rs2 as usize] {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }
        I::BLT { rs1, rs2, offset } => {
            if (m.regs[rs1 as usize] as i64) < (m.regs[rs2 as usize] as i64) {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }
        I::BGE { rs1, rs2, offset } => {
            if (m.regs[rs1 as usize] as i64) >= (m.regs[rs2 as usize] as i64) {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }
        I::BLTU { rs1, rs2, offset } => {
            if m.regs[rs1 as usize] < m.regs[rs2 as usize] {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }
        I::BGEU { rs1, rs2, offset } => {
            if m.regs[rs1 as usize] >= m.regs[rs2 as usize] {
                m.pc = m.pc.wrapping_add(offset as i64 as u64);
                return Ok(taken);
            }
        }

        I::LB { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u8(a) as i8 as i64 as u64);
        }
        I::LH { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u16(a) as i16 as i64 as u64);
        }
        I::LW { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u32(a) as i32 as i64 as u64);
        }
        I::LD { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u64(a));
        }
        I::LBU { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u8(a) as u64);
        }
        I::LHU { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u16(a) as u64);
        }
        I::LWU { rd, rs1, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.store(rd as usize, m.read_u32(a) as u64);
        }

        I::SB { rs1, rs2, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.write_u8(a, m.regs[rs2 as usize] as u8);
        }
        I::SH { rs1, rs2, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.write_u16(a, m.regs[rs2 as usize] as u16);
        }
        I::SW { rs1, rs2, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.write_u32(a, m.regs[rs2 as usize] as u32);
        }
        I::SD { rs1, rs2, offset } => {
            let a = m.regs[rs1 as usize].wrapping_add(offset as i64 as u64);
            m.write_u64(a, m.regs[rs2 as usize]);
        }

        I::ADDI { rd, rs1, imm } => {
            m.store(rd as usize, m.regs[rs1 as usize].wrapping_add(imm as i64 as u64))
        }
        I::SLTI { rd, rs1, imm } => {
            m.store(rd as usize, ((m.regs[rs1 as usize] as i64) < imm as i64) as u64)
        }
        // The immediate is sign-extended first and then compared
        // unsigned, so -1 becomes the largest u64.
        I::SLTIU { rd, rs1, imm } => {
            m.store(rd as usize, (m.regs[rs1 as usize] < imm as i64 as u64) as u64)
        }
        I::XORI { rd, rs1, imm } => {
            m.store(rd as usize, m.regs[rs1 as usize] ^ imm as i64 as u64)
        }
        I::ORI { rd, rs1, imm } => m.store(rd as usize, m.regs[rs1 as usize] | imm as i64 as u64),
        I::ANDI { rd, rs1, imm } => {
            m.store(rd as usize, m.regs[rs1 as usize] & imm as i64 as u64)
        }

        I::ADD { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize].wrapping_add(m.regs[rs2 as usize]))
        }
        I::SUB { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize].wrapping_sub(m.regs[rs2 as usize]))
        }
        I::SLT { rd, rs1, rs2 } => m.store(
            rd as usize,
            ((m.regs[rs1 as usize] as i64) < (m.regs[rs2 as usize] as i64)) as u64,
        ),
        I::SLTU { rd, rs1, rs2 } => {
            m.store(rd as usize, (m.regs[rs1 as usize] < m.regs[rs2 as usize]) as u64)
        }
        I::XOR { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize] ^ m.regs[rs2 as usize])
        }
        I::OR { rd, rs1, rs2 } => m.store(rd as usize, m.regs[rs1 as usize] | m.regs[rs2 as usize]),
        I::AND { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize] & m.regs[rs2 as usize])
        }

        // Register shift amounts are taken modulo 64 (modulo 32 for the
        // W variants); the immediate forms are already masked by decode.
        I::SLL { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize] << (m.regs[rs2 as usize] & 0x3f))
        }
        I::SRL { rd, rs1, rs2 } => {
            m.store(rd as usize, m.regs[rs1 as usize] >> (m.regs[rs2 as usize] & 0x3f))
        }
        I::SRA { rd, rs1, rs2 } => m.store(
            rd as usize,
            ((m.regs[rs1 as usize] as i64) >> (m.regs[rs2 as usize] & 0x3f)) as u64,
        ),
        I::SLLI { rd, rs1, shamt } => m.store(rd as usize, m.regs[rs1 as usize] << shamt),
        I::SRLI { rd, rs1, shamt } => m.store(rd as usize, m.regs[rs1 as usize] >> shamt),
        I::SRAI { rd, rs1, shamt } => {
            m.store(rd as usize, ((m.regs[rs1 as usize] as i64) >> shamt) as u64)
        }

        // W variants compute at 32 bits and sign-extend the result.
        I::ADDIW { rd, rs1, imm } => {
            m.store(rd as usize, (m.regs[rs1 as usize] as i32).wrapping_add(imm) as i64 as u64)
        }
        I::SLLIW { rd, rs1, shamt } => {
            m.store(rd as usize, (((m.regs[rs1 as usize] as u32) << shamt) as i32) as i64 as u64)
        }
        I::SRLIW { rd, rs1, shamt } => {
            m.store(rd as usize, (((m.regs[rs1 as usize] as u32) >> shamt) as i32) as i64 as u64)
        }
        I::SRAIW { rd, rs1, shamt } => {
            m.store(rd as usize, ((m.regs[rs1 as usize] as i32) >> shamt) as i64 as u64)
        }
        I::ADDW { rd, rs1, rs2 } => m.store(
            rd as usize,
            (m.regs[rs1 as usize] as i32).wrapping_add(m.regs[rs2 as usize] as i32) as i64 as u64,
        ),
        I::SUBW { rd, rs1, rs2 } => m.store(
            rd as usize,
            (m.regs[rs1 as usize] as i32).wrapping_sub(m.regs[rs2 as usize] as i32) as i64 as u64,
        ),
        I::SLLW { rd, rs1, rs2 } => {
            let shift = (m.regs[rs2 as usize] & 0x1f) as u32;
            m.store(rd as usize, (((m.regs[rs1 as usize] as u32) << shift) as i32) as i64 as u64);
        }
        I::SRLW { rd, rs1, rs2 } => {
            let shift = (m.regs[rs2 as usize] & 0x1f) as u32;
            m.store(rd as usize, (((m.regs[rs1 as usize] as u32) >> shift) as i32) as i64 as u64);
        }
        I::SRAW { rd, rs1, rs2 } => {
            let shift = (m.regs[rs2 as usize] & 0x1f) as u32;
            m.store(rd as usize, ((m.regs[rs1 as usize] as i32) >> shift) as i64 as u64);
        }

        I::MUL { rd, rs1, rs2 } => m.store(
            rd as usize,
            (m.regs[rs1 as usize] as i64).wrapping_mul(m.regs[rs2 as usize] as i64) as u64,
        ),
        // The high-word multiplies use 128-bit products; an i64 * i64
        // cannot overflow an i128.
        I::MULH { rd, rs1, rs2 } => {
            let p = (m.regs[rs1 as usize] as i64 as i128) * (m.regs[rs2 as usize] as i64 as i128);
            m.store(rd as usize, (p >> 64) as u64);
        }
        I::MULHSU { rd, rs1, rs2 } => {
            let p = (m.regs[rs1 as usize] as i64 as i128) * (m.regs[rs2 as usize] as i128);
            m.store(rd as usize, (p >> 64) as u64);
        }
        I::MULHU { rd, rs1, rs2 } => {
            let p = (m.regs[rs1 as usize] as u128) * (m.regs[rs2 as usize] as u128);
            m.store(rd as usize, (p >> 64) as u64);
        }
        I::MULW { rd, rs1, rs2 } => m.store(
            rd as usize,
            (m.regs[rs1 as usize] as i32).wrapping_mul(m.regs[rs2 as usize] as i32) as i64 as u64,
        ),

        // Division by zero writes all ones (quotient) or the dividend
        // (remainder); signed overflow wraps back to the dividend with a
        // zero remainder. wrapping_div/_rem give exactly the overflow
        // case of the spec.
        I::DIV { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as i64, m.regs[rs2 as usize] as i64);
            let v = if d == 0 { u64::MAX } else { n.wrapping_div(d) as u64 };
            m.store(rd as usize, v);
        }
        I::DIVU { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize], m.regs[rs2 as usize]);
            let v = if d == 0 { u64::MAX } else { n / d };
            m.store(rd as usize, v);
        }
        I::REM { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as i64, m.regs[rs2 as usize] as i64);
            let v = if d == 0 { n as u64 } else { n.wrapping_rem(d) as u64 };
            m.store(rd as usize, v);
        }
        I::REMU { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize], m.regs[rs2 as usize]);
            let v = if d == 0 { n } else { n % d };
            m.store(rd as usize, v);
        }
        I::DIVW { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as i32, m.regs[rs2 as usize] as i32);
            let v = if d == 0 { u64::MAX } else { n.wrapping_div(d) as i64 as u64 };
            m.store(rd as usize, v);
        }
        I::DIVUW { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as u32, m.regs[rs2 as usize] as u32);
            let v = if d == 0 { u64::MAX } else { ((n / d) as i32) as i64 as u64 };
            m.store(rd as usize, v);
        }
        I::REMW { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as i32, m.regs[rs2 as usize] as i32);
            let v = if d == 0 { n as i64 as u64 } else { n.wrapping_rem(d) as i64 as u64 };
            m.store(rd as usize, v);
        }
        I::REMUW { rd, rs1, rs2 } => {
            let (n, d) = (m.regs[rs1 as usize] as u32, m.regs[rs2 as usize] as u32);
            let v = if d == 0 {
                (n as i32) as i64 as u64
            } else {
                ((n % d) as i32) as i64 as u64
            };
            m.store(rd as usize, v);
        }

        // CSR read-modify-write. Only writes to RDINSTRET report through
        // the flag; the set/clear forms only touch the CSR when the mask
        // operand is non-zero.
        I::CSRRW { rd, rs1, csr } => {
            let flags = Flags { updated_instret: csr == RDINSTRET, ..Flags::default() };
            if rd == 0 {
                m.set_csr(csr, m.regs[rs1 as usize]);
            } else {
                let old = m.csr(csr);
                m.set_csr(csr, m.regs[rs1 as usize]);
                m.store(rd as usize, old);
            }
            return Ok(flags);
        }
        I::CSRRS { rd, rs1, csr } => {
            let old = m.csr(csr);
            if rs1 != 0 {
                m.set_csr(csr, old | m.regs[rs1 as usize]);
            }
            m.store(rd as usize, old);
        }
        I::CSRRC { rd, rs1, csr } => {
            let old = m.csr(csr);
            if rs1 != 0 {
                m.set_csr(csr, old & !m.regs[rs1 as usize]);
            }
            m.store(rd as usize, old);
        }
        I::CSRRWI { rd, uimm, csr } => {
            let v = sext(uimm as u64 & 0x1f, 4);
            let flags = Flags { updated_instret: csr == RDINSTRET, ..Flags::default() };
            if rd == 0 {
                m.set_csr(csr, v);
            } else {
                let old = m.csr(csr);
                m.set_csr(csr, v);
                m.store(rd as usize, old);
            }
            return Ok(flags);
        }
        I::CSRRSI { rd, uimm, csr } => {
            let v = sext(uimm as u64 & 0x1f, 4);
            let old = m.csr(csr);
            if v != 0 {
                m.set_csr(csr, old | v);
            }
            m.store(rd as usize, old);
        }
        I::CSRRCI { rd, uimm, csr } => {
            let v = sext(uimm as u64 & 0x1f, 4);
            let old = m.csr(csr);
            if v != 0 {
                m.set_csr(csr, old & !v);
            }
            m.store(rd as usize, old);
        }

        // One hart executing in program order with no instruction cache:
        // both fences are no-ops.
        I::FENCE | I::FENCE_I => {}

        I::ECALL => return syscall::ecall(m),
        I::EBREAK => {}
    }

    Ok(Flags::default())
}
