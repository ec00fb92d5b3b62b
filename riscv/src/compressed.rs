//! Compressed (16-bit) RISC-V instruction decoder for RV64C.
//!
//! Compressed instructions are organized by quadrant (bits [1:0]):
//! - Quadrant 0 (00): wide-immediate SP adds, register-based loads/stores
//! - Quadrant 1 (01): control transfers, integer constants and computations
//! - Quadrant 2 (10): stack-pointer relative operations, register moves
//! - Quadrant 3 (11): 32-bit instructions, never handled here
//!
//! Every decoded [`CInstruction`] expands into the standard
//! [`Instruction`](crate::Instruction) form; execution only has to know
//! that the encoded size was 2 bytes.

pub mod instruction;

pub use instruction::CInstruction;

use crate::DecodeError;

/// Bit masks for compressed field extraction
const MASK1: u16 = 0b1;
const MASK2: u16 = 0b11;
const MASK3: u16 = 0b111;
const MASK4: u16 = 0b1111;
const MASK5: u16 = 0b1_1111;

/// Decode a 16-bit compressed RISC-V instruction.
pub fn decode_compressed_instruction(bits: u16) -> Result<CInstruction, DecodeError> {
    // The all-zero halfword is defined to be illegal.
    if bits == 0 {
        return Err(DecodeError::IllegalInstruction(0));
    }

    let encoded = EncodedInstruction::new(bits);

    match encoded.quadrant {
        0 => decode_quadrant_0(&encoded),
        1 => decode_quadrant_1(&encoded),
        2 => decode_quadrant_2(&encoded),
        // Bits [1:0] = 11 marks a 32-bit instruction; the length decoder
        // never routes those here.
        _ => Err(DecodeError::IllegalInstruction(bits as u32)),
    }
}

/// Parsed fields of a 16-bit compressed instruction.
///
/// Like the standard decoder this is a union of the compressed formats;
/// the quadrant decoders pick the fields they need.
struct EncodedInstruction {
    bits: u16,
    quadrant: u8,
    funct3: u8,
    /// Full 5-bit rd/rs1 field (bits [11:7])
    rd: u8,
    /// Full 5-bit rs2 field (bits [6:2])
    rs2: u8,
    /// Compressed 3-bit rd'/rs2' field (bits [4:2])
    rd_prime: u8,
    /// Compressed 3-bit rs1' field (bits [9:7])
    rs1_prime: u8,
    /// CI shift amount: shamt[4:0] = bits[6:2], shamt[5] = bit[12]
    shamt6: u8,
    /// CI-format sign-extended 6-bit immediate (bits [12|6:2])
    ci_imm: i32,
    /// CIW-format zero-extended immediate for C.ADDI4SPN
    uimm_ciw: u16,
    /// CL/CS-format word offset (C.LW / C.SW)
    uimm_w: u16,
    /// CL/CS-format doubleword offset (C.LD / C.SD)
    uimm_d: u16,
    /// CI-format C.LWSP offset
    uimm_lwsp: u16,
    /// CI-format C.LDSP offset
    uimm_ldsp: u16,
    /// CSS-format C.SWSP offset
    uimm_swsp: u16,
    /// CSS-format C.SDSP offset
    uimm_sdsp: u16,
    /// CI-format C.ADDI16SP immediate, sign-extended
    imm_addi16sp: i32,
    /// CI-format C.LUI immediate, sign-extended
    imm_lui: i32,
    /// CJ-format signed jump offset
    cj_offset: i16,
    /// CB-format signed branch offset
    cb_offset: i16,
}

impl EncodedInstruction {
    fn new(bits: u16) -> Self {
        /*
        The compressed formats; rd'/rs1'/rs2' are 3-bit fields addressing
        x8..x15, everything else uses the full 5-bit register space.

        CR-type  | funct4 |   rd/rs1   |   rs2    | op |
                 | 15-12  |    11-7    |   6-2    | 1-0|

        CI-type  | funct3 | imm |   rd/rs1   | imm | op |
                 | 15-13  | 12  |    11-7    | 6-2 | 1-0|

        CSS-type | funct3 |     imm     |   rs2    | op |
                 | 15-13  |    12-7     |   6-2    | 1-0|

        CIW-type | funct3 |     imm      | rd' | op |
                 | 15-13  |     12-5     | 4-2 | 1-0|

        CL-type  | funct3 | imm | rs1' | imm | rd' | op |
                 | 15-13  |12-10| 9-7  | 6-5 | 4-2 | 1-0|

        CS-type  | funct3 | imm | rs1' | imm | rs2'| op |
                 | 15-13  |12-10| 9-7  | 6-5 | 4-2 | 1-0|

        CB-type  | funct3 | off | rs1' |    offset    | op |
                 | 15-13  | 12  | 9-7  |   6-2        | 1-0|

        CJ-type  | funct3 |        jump target        | op |
                 | 15-13  |         12-2              | 1-0|
        */
        Self {
            bits,
            quadrant: (bits & MASK2) as u8,
            funct3: ((bits >> 13) & MASK3) as u8,
            rd: ((bits >> 7) & MASK5) as u8,
            rs2: ((bits >> 2) & MASK5) as u8,
            rd_prime: ((bits >> 2) & MASK3) as u8,
            rs1_prime: ((bits >> 7) & MASK3) as u8,
            shamt6: extract_ci_shift_amount(bits),
            ci_imm: extract_ci_immediate(bits),
            uimm_ciw: extract_ciw_immediate(bits),
            uimm_w: extract_cls_w_offset(bits),
            uimm_d: extract_cls_d_offset(bits),
            uimm_lwsp: extract_ci_lwsp_offset(bits),
            uimm_ldsp: extract_ci_ldsp_offset(bits),
            uimm_swsp: extract_css_swsp_offset(bits),
            uimm_sdsp: extract_css_sdsp_offset(bits),
            imm_addi16sp: extract_ci16sp_immediate(bits),
            imm_lui: extract_ci_lui_immediate(bits),
            cj_offset: extract_cj_offset(bits),
            cb_offset: extract_cb_offset(bits),
        }
    }
}

/// Convert a compressed 3-bit register index to the full index (x8..x15).
fn expand_compressed_reg(reg: u8) -> u8 {
    8 + (reg & MASK3 as u8)
}

/// Decode Quadrant 0 instructions (bits [1:0] = 00).
fn decode_quadrant_0(encoded: &EncodedInstruction) -> Result<CInstruction, DecodeError> {
    let rd = expand_compressed_reg(encoded.rd_prime);
    let rs1 = expand_compressed_reg(encoded.rs1_prime);
    let rs2 = expand_compressed_reg(encoded.rd_prime);
    match encoded.funct3 {
        0b000 => Ok(CInstruction::C_ADDI4SPN { rd, imm: encoded.uimm_ciw }),
        0b001 => Err(DecodeError::UnsupportedOp("c.fld")),
        0b010 => Ok(CInstruction::C_LW { rd, rs1, offset: encoded.uimm_w }),
        0b011 => Ok(CInstruction::C_LD { rd, rs1, offset: encoded.uimm_d }),
        0b100 => Err(DecodeError::IllegalInstruction(encoded.bits as u32)), // reserved
        0b101 => Err(DecodeError::UnsupportedOp("c.fsd")),
        0b110 => Ok(CInstruction::C_SW { rs1, rs2, offset: encoded.uimm_w }),
        0b111 => Ok(CInstruction::C_SD { rs1, rs2, offset: encoded.uimm_d }),
        _ => unreachable!("funct3 is 3 bits"),
    }
}

/// Decode Quadrant 1 instructions (bits [1:0] = 01).
fn decode_quadrant_1(encoded: &EncodedInstruction) -> Result<CInstruction, DecodeError> {
    let rs1p = expand_compressed_reg(encoded.rs1_prime);
    match encoded.funct3 {
        0b000 => {
            // C.NOP is C.ADDI with rd = x0
            if encoded.rd == 0 {
                Ok(CInstruction::C_NOP)
            } else {
                Ok(CInstruction::C_ADDI { rd: encoded.rd, imm: encoded.ci_imm })
            }
        }
        // On RV32 this slot is C.JAL; on RV64 it is C.ADDIW.
        0b001 => Ok(CInstruction::C_ADDIW { rd: encoded.rd, imm: encoded.ci_imm }),
        0b010 => Ok(CInstruction::C_LI { rd: encoded.rd, imm: encoded.ci_imm }),
        0b011 => {
            if encoded.rd == 2 {
                Ok(CInstruction::C_ADDI16SP { imm: encoded.imm_addi16sp })
            } else {
                Ok(CInstruction::C_LUI { rd: encoded.rd, imm: encoded.imm_lui })
            }
        }
        0b100 => decode_quadrant_1_misc_alu(encoded),
        0b101 => Ok(CInstruction::C_J { offset: encoded.cj_offset }),
        0b110 => Ok(CInstruction::C_BEQZ { rs1: rs1p, offset: encoded.cb_offset }),
        0b111 => Ok(CInstruction::C_BNEZ { rs1: rs1p, offset: encoded.cb_offset }),
        _ => unreachable!("funct3 is 3 bits"),
    }
}

/// Decode Quadrant 1 miscellaneous ALU instructions (funct3 = 100).
fn decode_quadrant_1_misc_alu(encoded: &EncodedInstruction) -> Result<CInstruction, DecodeError> {
    let funct2 = (encoded.bits >> 10) & MASK2;
    let rd = expand_compressed_reg(encoded.rs1_prime);
    let rs2 = expand_compressed_reg(encoded.rd_prime);
    match funct2 {
        0b00 => Ok(CInstruction::C_SRLI { rd, shamt: encoded.shamt6 }),
        0b01 => Ok(CInstruction::C_SRAI { rd, shamt: encoded.shamt6 }),
        0b10 => Ok(CInstruction::C_ANDI { rd, imm: encoded.ci_imm }),
        0b11 => {
            let funct1 = (encoded.bits >> 12) & MASK1;
            let funct2_low = (encoded.bits >> 5) & MASK2;
            match (funct1, funct2_low) {
                (0, 0b00) => Ok(CInstruction::C_SUB { rd, rs2 }),
                (0, 0b01) => Ok(CInstruction::C_XOR { rd, rs2 }),
                (0, 0b10) => Ok(CInstruction::C_OR { rd, rs2 }),
                (0, 0b11) => Ok(CInstruction::C_AND { rd, rs2 }),
                (1, 0b00) => Ok(CInstruction::C_SUBW { rd, rs2 }),
                (1, 0b01) => Ok(CInstruction::C_ADDW { rd, rs2 }),
                _ => Err(DecodeError::IllegalInstruction(encoded.bits as u32)), // reserved
            }
        }
        _ => unreachable!("funct2 is 2 bits"),
    }
}

/// Decode Quadrant 2 instructions (bits [1:0] = 10).
fn decode_quadrant_2(encoded: &EncodedInstruction) -> Result<CInstruction, DecodeError> {
    let rd = encoded.rd;
    let rs2 = encoded.rs2;
    match encoded.funct3 {
        0b000 => Ok(CInstruction::C_SLLI { rd, shamt: encoded.shamt6 }),
        0b001 => Err(DecodeError::UnsupportedOp("c.fldsp")),
        0b010 => Ok(CInstruction::C_LWSP { rd, offset: encoded.uimm_lwsp }),
        0b011 => Ok(CInstruction::C_LDSP { rd, offset: encoded.uimm_ldsp }),
        0b100 => decode_quadrant_2_misc(encoded),
        0b101 => Err(DecodeError::UnsupportedOp("c.fsdsp")),
        0b110 => Ok(CInstruction::C_SWSP { rs2, offset: encoded.uimm_swsp }),
        0b111 => Ok(CInstruction::C_SDSP { rs2, offset: encoded.uimm_sdsp }),
        _ => unreachable!("funct3 is 3 bits"),
    }
}

/// Decode Quadrant 2 jumps, moves and C.EBREAK (funct3 = 100).
fn decode_quadrant_2_misc(encoded: &EncodedInstruction) -> Result<CInstruction, DecodeError> {
    let funct1 = (encoded.bits >> 12) & MASK1;
    let rd = encoded.rd;
    let rs2 = encoded.rs2;

    if funct1 == 0 {
        if rs2 == 0 {
            Ok(CInstruction::C_JR { rs1: rd })
        } else {
            Ok(CInstruction::C_MV { rd, rs2 })
        }
    } else if rd == 0 && rs2 == 0 {
        Ok(CInstruction::C_EBREAK)
    } else if rs2 == 0 {
        Ok(CInstruction::C_JALR { rs1: rd })
    } else {
        Ok(CInstruction::C_ADD { rd, rs2 })
    }
}

// Immediate extraction. Each instruction class scatters its immediate
// bits differently; the comments give the bit-to-bit mapping.

/// CIW-format immediate for C.ADDI4SPN (nzuimm[9:2]).
fn extract_ciw_immediate(bits: u16) -> u16 {
    let mut imm = 0u16;
    imm |= ((bits >> 7) & MASK4) << 6; // bits[10:7] -> imm[9:6]
    imm |= ((bits >> 11) & MASK2) << 4; // bits[12:11] -> imm[5:4]
    imm |= ((bits >> 5) & MASK1) << 3; // bit[5] -> imm[3]
    imm |= ((bits >> 6) & MASK1) << 2; // bit[6] -> imm[2]
    imm
}

/// CL/CS-format word offset (C.LW, C.SW).
fn extract_cls_w_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 10) & MASK3) << 3; // bits[12:10] -> offset[5:3]
    offset |= ((bits >> 6) & MASK1) << 2; // bit[6] -> offset[2]
    offset |= ((bits >> 5) & MASK1) << 6; // bit[5] -> offset[6]
    offset
}

/// CL/CS-format doubleword offset (C.LD, C.SD).
fn extract_cls_d_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 10) & MASK3) << 3; // bits[12:10] -> offset[5:3]
    offset |= ((bits >> 5) & MASK2) << 6; // bits[6:5] -> offset[7:6]
    offset
}

/// CI-format sign-extended 6-bit immediate.
fn extract_ci_immediate(bits: u16) -> i32 {
    let mut imm = 0i32;
    imm |= ((bits >> 2) & MASK5) as i32; // bits[6:2] -> imm[4:0]
    imm |= (((bits >> 12) & MASK1) as i32) << 5; // bit[12] -> imm[5]
    (imm << (32 - 6)) >> (32 - 6)
}

/// CI-format immediate for C.ADDI16SP, sign-extended at bit 9.
fn extract_ci16sp_immediate(bits: u16) -> i32 {
    let mut imm = 0i32;
    imm |= (((bits >> 6) & MASK1) as i32) << 4; // bit[6] -> imm[4]
    imm |= (((bits >> 2) & MASK1) as i32) << 5; // bit[2] -> imm[5]
    imm |= (((bits >> 5) & MASK1) as i32) << 6; // bit[5] -> imm[6]
    imm |= (((bits >> 3) & MASK2) as i32) << 7; // bits[4:3] -> imm[8:7]
    imm |= (((bits >> 12) & MASK1) as i32) << 9; // bit[12] -> imm[9]
    (imm << (32 - 10)) >> (32 - 10)
}

/// CI-format immediate for C.LUI, sign-extended at bit 17.
fn extract_ci_lui_immediate(bits: u16) -> i32 {
    let mut imm = 0i32;
    imm |= (((bits >> 2) & MASK5) as i32) << 12; // bits[6:2] -> imm[16:12]
    imm |= (((bits >> 12) & MASK1) as i32) << 17; // bit[12] -> imm[17]
    (imm << (32 - 18)) >> (32 - 18)
}

/// CJ-format offset, sign-extended at bit 11.
fn extract_cj_offset(bits: u16) -> i16 {
    let mut offset = 0i16;
    offset |= (((bits >> 3) & MASK3) as i16) << 1; // bits[5:3] -> offset[3:1]
    offset |= (((bits >> 11) & MASK1) as i16) << 4; // bit[11] -> offset[4]
    offset |= (((bits >> 2) & MASK1) as i16) << 5; // bit[2] -> offset[5]
    offset |= (((bits >> 7) & MASK1) as i16) << 6; // bit[7] -> offset[6]
    offset |= (((bits >> 6) & MASK1) as i16) << 7; // bit[6] -> offset[7]
    offset |= (((bits >> 9) & MASK2) as i16) << 8; // bits[10:9] -> offset[9:8]
    offset |= (((bits >> 8) & MASK1) as i16) << 10; // bit[8] -> offset[10]
    offset |= (((bits >> 12) & MASK1) as i16) << 11; // bit[12] -> offset[11]
    (offset << (16 - 12)) >> (16 - 12)
}

/// CB-format offset, sign-extended at bit 8.
fn extract_cb_offset(bits: u16) -> i16 {
    let mut offset = 0i16;
    offset |= (((bits >> 3) & MASK2) as i16) << 1; // bits[4:3] -> offset[2:1]
    offset |= (((bits >> 10) & MASK2) as i16) << 3; // bits[11:10] -> offset[4:3]
    offset |= (((bits >> 2) & MASK1) as i16) << 5; // bit[2] -> offset[5]
    offset |= (((bits >> 5) & MASK2) as i16) << 6; // bits[6:5] -> offset[7:6]
    offset |= (((bits >> 12) & MASK1) as i16) << 8; // bit[12] -> offset[8]
    (offset << (16 - 9)) >> (16 - 9)
}

/// CI shift amount for C.SLLI/C.SRLI/C.SRAI.
fn extract_ci_shift_amount(bits: u16) -> u8 {
    let mut shamt = 0u8;
    shamt |= ((bits >> 2) & MASK5) as u8; // bits[6:2] -> shamt[4:0]
    shamt |= (((bits >> 12) & MASK1) as u8) << 5; // bit[12] -> shamt[5]
    shamt
}

/// CI-format offset for C.LWSP.
fn extract_ci_lwsp_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 4) & MASK3) << 2; // bits[6:4] -> offset[4:2]
    offset |= ((bits >> 12) & MASK1) << 5; // bit[12] -> offset[5]
    offset |= ((bits >> 2) & MASK2) << 6; // bits[3:2] -> offset[7:6]
    offset
}

/// CI-format offset for C.LDSP.
fn extract_ci_ldsp_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 5) & MASK2) << 3; // bits[6:5] -> offset[4:3]
    offset |= ((bits >> 12) & MASK1) << 5; // bit[12] -> offset[5]
    offset |= ((bits >> 2) & MASK3) << 6; // bits[4:2] -> offset[8:6]
    offset
}

/// CSS-format offset for C.SWSP.
fn extract_css_swsp_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 9) & MASK4) << 2; // bits[12:9] -> offset[5:2]
    offset |= ((bits >> 7) & MASK2) << 6; // bits[8:7] -> offset[7:6]
    offset
}

/// CSS-format offset for C.SDSP.
fn extract_css_sdsp_offset(bits: u16) -> u16 {
    let mut offset = 0u16;
    offset |= ((bits >> 10) & MASK3) << 3; // bits[12:10] -> offset[5:3]
    offset |= ((bits >> 7) & MASK3) << 6; // bits[9:7] -> offset[8:6]
    offset
}
