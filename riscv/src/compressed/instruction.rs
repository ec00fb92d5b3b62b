//! Compressed instruction form and its expansion into the standard form.
//!
//! Usage is always decode-then-expand: the machine executes the expanded
//! instruction, remembering only that it occupied 2 bytes. That size is
//! what makes the compressed jumps save `PC + 2` instead of `PC + 4`.

use crate::Instruction;

/// RISC-V compressed (16-bit) instructions, grouped by compressed format.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum CInstruction {
    // CIW (wide immediate)
    C_ADDI4SPN { rd: u8, imm: u16 },

    // CL (loads) and CS (stores)
    C_LW { rd: u8, rs1: u8, offset: u16 },
    C_LD { rd: u8, rs1: u8, offset: u16 },
    C_SW { rs1: u8, rs2: u8, offset: u16 },
    C_SD { rs1: u8, rs2: u8, offset: u16 },

    // CI (immediates, sp-relative loads)
    C_NOP,
    C_ADDI { rd: u8, imm: i32 },
    C_ADDIW { rd: u8, imm: i32 },
    C_LI { rd: u8, imm: i32 },
    C_ADDI16SP { imm: i32 },
    C_LUI { rd: u8, imm: i32 },
    C_SRLI { rd: u8, shamt: u8 },
    C_SRAI { rd: u8, shamt: u8 },
    C_ANDI { rd: u8, imm: i32 },
    C_SLLI { rd: u8, shamt: u8 },
    C_LWSP { rd: u8, offset: u16 },
    C_LDSP { rd: u8, offset: u16 },

    // CSS (sp-relative stores)
    C_SWSP { rs2: u8, offset: u16 },
    C_SDSP { rs2: u8, offset: u16 },

    // CA (arithmetic on compressed regs)
    C_SUB { rd: u8, rs2: u8 },
    C_XOR { rd: u8, rs2: u8 },
    C_OR { rd: u8, rs2: u8 },
    C_AND { rd: u8, rs2: u8 },
    C_SUBW { rd: u8, rs2: u8 },
    C_ADDW { rd: u8, rs2: u8 },

    // CB (branches)
    C_BEQZ { rs1: u8, offset: i16 },
    C_BNEZ { rs1: u8, offset: i16 },

    // CJ (jumps)
    C_J { offset: i16 },

    // CR (register-register and control)
    C_JR { rs1: u8 },
    C_MV { rd: u8, rs2: u8 },
    C_EBREAK,
    C_JALR { rs1: u8 },
    C_ADD { rd: u8, rs2: u8 },
}

impl From<CInstruction> for Instruction {
    fn from(value: CInstruction) -> Self {
        match value {
            // Stack pointer add
            CInstruction::C_ADDI4SPN { rd, imm } => {
                Instruction::ADDI { rd, rs1: 2, imm: imm as i32 } // x2 is the stack pointer
            }

            // Loads
            CInstruction::C_LW { rd, rs1, offset } => {
                Instruction::LW { rd, rs1, offset: offset as i32 }
            }
            CInstruction::C_LD { rd, rs1, offset } => {
                Instruction::LD { rd, rs1, offset: offset as i32 }
            }
            CInstruction::C_LWSP { rd, offset } => {
                Instruction::LW { rd, rs1: 2, offset: offset as i32 }
            }
            CInstruction::C_LDSP { rd, offset } => {
                Instruction::LD { rd, rs1: 2, offset: offset as i32 }
            }

            // Stores
            CInstruction::C_SW { rs1, rs2, offset } => {
                Instruction::SW { rs1, rs2, offset: offset as i32 }
            }
            CInstruction::C_SD { rs1, rs2, offset } => {
                Instruction::SD { rs1, rs2, offset: offset as i32 }
            }
            CInstruction::C_SWSP { rs2, offset } => {
                Instruction::SW { rs1: 2, rs2, offset: offset as i32 }
            }
            CInstruction::C_SDSP { rs2, offset } => {
                Instruction::SD { rs1: 2, rs2, offset: offset as i32 }
            }

            // Immediate operations
            CInstruction::C_NOP => Instruction::ADDI { rd: 0, rs1: 0, imm: 0 },
            CInstruction::C_ADDI { rd, imm } => Instruction::ADDI { rd, rs1: rd, imm },
            CInstruction::C_ADDIW { rd, imm } => Instruction::ADDIW { rd, rs1: rd, imm },
            CInstruction::C_LI { rd, imm } => Instruction::ADDI { rd, rs1: 0, imm },
            CInstruction::C_ADDI16SP { imm } => Instruction::ADDI { rd: 2, rs1: 2, imm },
            CInstruction::C_LUI { rd, imm } => Instruction::LUI { rd, imm },

            // Shifts
            CInstruction::C_SLLI { rd, shamt } => Instruction::SLLI { rd, rs1: rd, shamt },
            CInstruction::C_SRLI { rd, shamt } => Instruction::SRLI { rd, rs1: rd, shamt },
            CInstruction::C_SRAI { rd, shamt } => Instruction::SRAI { rd, rs1: rd, shamt },
            CInstruction::C_ANDI { rd, imm } => Instruction::ANDI { rd, rs1: rd, imm },

            // Arithmetic
            CInstruction::C_SUB { rd, rs2 } => Instruction::SUB { rd, rs1: rd, rs2 },
            CInstruction::C_XOR { rd, rs2 } => Instruction::XOR { rd, rs1: rd, rs2 },
            CInstruction::C_OR { rd, rs2 } => Instruction::OR { rd, rs1: rd, rs2 },
            CInstruction::C_AND { rd, rs2 } => Instruction::AND { rd, rs1: rd, rs2 },
            CInstruction::C_SUBW { rd, rs2 } => Instruction::SUBW { rd, rs1: rd, rs2 },
            CInstruction::C_ADDW { rd, rs2 } => Instruction::ADDW { rd, rs1: rd, rs2 },

            // Control flow. The link register value for the expanded jumps
            // is PC + encoded size, so these save PC + 2 when executed.
            CInstruction::C_J { offset } => Instruction::JAL { rd: 0, offset: offset as i32 },
            CInstruction::C_BEQZ { rs1, offset } => {
                Instruction::BEQ { rs1, rs2: 0, offset: offset as i32 }
            }
            CInstruction::C_BNEZ { rs1, offset } => {
                Instruction::BNE { rs1, rs2: 0, offset: offset as i32 }
            }
            CInstruction::C_JR { rs1 } => Instruction::JALR { rd: 0, rs1, offset: 0 },
            CInstruction::C_JALR { rs1 } => Instruction::JALR { rd: 1, rs1, offset: 0 },
            CInstruction::C_MV { rd, rs2 } => Instruction::ADD { rd, rs1: 0, rs2 },
            CInstruction::C_ADD { rd, rs2 } => Instruction::ADD { rd, rs1: rd, rs2 },

            // System
            CInstruction::C_EBREAK => Instruction::EBREAK,
        }
    }
}
