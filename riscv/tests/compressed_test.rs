//! Expansion tests for the compressed decoder. The vectors exercise one
//! immediate bit at a time on top of a base encoding, so a wrong scatter
//! permutation shows up as exactly the misplaced bit.

use rvemu_riscv::{decode, DecodeError, Instruction};

fn expand(half: u16) -> Instruction {
    let (in_, size) = decode(&half.to_le_bytes()).unwrap_or_else(|e| panic!("decode({half:#06x}): {e}"));
    assert_eq!(size, 2, "decode({half:#06x}) size");
    in_
}

#[test]
fn test_addi4spn_immediate_scatter() {
    // Encoded bits 5,4,9,8,7,6,2,3 map to imm[9:2].
    for (in_, imm) in [
        (0x000Cu16, 0i32),
        (0x000C | 0x0020, 1 << 3),
        (0x000C | 0x0040, 1 << 2),
        (0x000C | 0x0080, 1 << 6),
        (0x000C | 0x0100, 1 << 7),
        (0x000C | 0x0200, 1 << 8),
        (0x000C | 0x0400, 1 << 9),
        (0x000C | 0x0800, 1 << 4),
        (0x000C | 0x1000, 1 << 5),
    ] {
        assert_eq!(expand(in_), Instruction::ADDI { rd: 11, rs1: 2, imm }, "in = {in_:#06x}");
    }
}

#[test]
fn test_word_load_store_offsets() {
    // C.LW / C.SW offset bits 5,4,3,2,6.
    for (bit, imm) in [(0x0020u16, 1 << 6), (0x0040, 1 << 2), (0x0400, 1 << 3), (0x0800, 1 << 4), (0x1000, 1 << 5)] {
        assert_eq!(
            expand(0x410C | bit),
            Instruction::LW { rd: 11, rs1: 10, offset: imm },
            "c.lw bit {bit:#06x}"
        );
        assert_eq!(
            expand(0xC10C | bit),
            Instruction::SW { rs1: 10, rs2: 11, offset: imm },
            "c.sw bit {bit:#06x}"
        );
    }
}

#[test]
fn test_double_load_store_offsets() {
    // C.LD / C.SD offset bits 5,4,3,7,6.
    for (bit, imm) in [(0x0020u16, 1 << 6), (0x0040, 1 << 7), (0x0400, 1 << 3), (0x0800, 1 << 4), (0x1000, 1 << 5)] {
        assert_eq!(
            expand(0x610C | bit),
            Instruction::LD { rd: 11, rs1: 10, offset: imm },
            "c.ld bit {bit:#06x}"
        );
        assert_eq!(
            expand(0xE10C | bit),
            Instruction::SD { rs1: 10, rs2: 11, offset: imm },
            "c.sd bit {bit:#06x}"
        );
    }
}

#[test]
fn test_ci_immediates() {
    // C.NOP: rd = x0.
    assert_eq!(expand(0x0001), Instruction::ADDI { rd: 0, rs1: 0, imm: 0 });

    // C.ADDI / C.ADDIW / C.LI share the CI immediate (bits 12|6:2).
    for (bit, imm) in [
        (0x0000u16, 0i32),
        (0x0004, 1),
        (0x0008, 1 << 1),
        (0x0010, 1 << 2),
        (0x0020, 1 << 3),
        (0x0040, 1 << 4),
        (0x1000, -32),
    ] {
        assert_eq!(expand(0x0F81 | bit), Instruction::ADDI { rd: 31, rs1: 31, imm });
        assert_eq!(expand(0x2F81 | bit), Instruction::ADDIW { rd: 31, rs1: 31, imm });
        assert_eq!(expand(0x4F81 | bit), Instruction::ADDI { rd: 31, rs1: 0, imm });
    }
}

#[test]
fn test_addi16sp_immediate_scatter() {
    // Encoded bits 9,4,6,8,7,5 map to imm[9:4].
    for (bit, imm) in [
        (0x0000u16, 0i32),
        (0x0004, 1 << 5),
        (0x0008, 1 << 7),
        (0x0010, 1 << 8),
        (0x0020, 1 << 6),
        (0x0040, 1 << 4),
        (0x1000, -512),
    ] {
        assert_eq!(expand(0x6101 | bit), Instruction::ADDI { rd: 2, rs1: 2, imm }, "bit {bit:#06x}");
    }
}

#[test]
fn test_lui_immediate() {
    for (bit, imm) in [
        (0x0000u16, 0i32),
        (0x0004, 1 << 12),
        (0x0008, 1 << 13),
        (0x0010, 1 << 14),
        (0x0020, 1 << 15),
        (0x0040, 1 << 16),
        (0x1000, -(1 << 17)),
    ] {
        assert_eq!(expand(0x6181 | bit), Instruction::LUI { rd: 3, imm }, "bit {bit:#06x}");
    }
}

#[test]
fn test_misc_alu_shifts_and_andi() {
    // C.SRLI / C.SRAI take a 6-bit shamt (bit 12 is shamt[5]).
    assert_eq!(expand(0x8381 | 0x0004), Instruction::SRLI { rd: 15, rs1: 15, shamt: 1 });
    assert_eq!(expand(0x8381 | 0x1000), Instruction::SRLI { rd: 15, rs1: 15, shamt: 32 });
    assert_eq!(expand(0x8781 | 0x0010), Instruction::SRAI { rd: 15, rs1: 15, shamt: 4 });
    assert_eq!(expand(0x8B81 | 0x1000), Instruction::ANDI { rd: 15, rs1: 15, imm: -32 });
}

#[test]
fn test_misc_alu_register_ops() {
    let base = 0x0180 | 0x0018; // rd' = x11, rs2' = x14
    assert_eq!(expand(0x8C01 | base), Instruction::SUB { rd: 11, rs1: 11, rs2: 14 });
    assert_eq!(expand(0x8C21 | base), Instruction::XOR { rd: 11, rs1: 11, rs2: 14 });
    assert_eq!(expand(0x8C41 | base), Instruction::OR { rd: 11, rs1: 11, rs2: 14 });
    assert_eq!(expand(0x8C61 | base), Instruction::AND { rd: 11, rs1: 11, rs2: 14 });
    assert_eq!(expand(0x9C01 | base), Instruction::SUBW { rd: 11, rs1: 11, rs2: 14 });
    assert_eq!(expand(0x9C21 | base), Instruction::ADDW { rd: 11, rs1: 11, rs2: 14 });
    // (funct1, funct2_low) = (1, 10) and (1, 11) are reserved.
    assert!(decode(&(0x9C41u16 | base).to_le_bytes()).is_err());
    assert!(decode(&(0x9C61u16 | base).to_le_bytes()).is_err());
}

#[test]
fn test_cj_offset_scatter() {
    // Encoded bits 11,4,9,8,10,6,7,3,2,1,5 map to offset[11:1].
    for (bit, offset) in [
        (0x0000u16, 0i32),
        (0x0004, 1 << 5),
        (0x0008, 1 << 1),
        (0x0010, 1 << 2),
        (0x0020, 1 << 3),
        (0x0040, 1 << 7),
        (0x0080, 1 << 6),
        (0x0100, 1 << 10),
        (0x0200, 1 << 8),
        (0x0400, 1 << 9),
        (0x0800, 1 << 4),
        (0x1000, -2048),
    ] {
        assert_eq!(expand(0xA001 | bit), Instruction::JAL { rd: 0, offset }, "bit {bit:#06x}");
    }
}

#[test]
fn test_cb_offset_scatter() {
    // Encoded bits 8,4,3,7,6,2,1,5 map to offset[8:1].
    for (bit, offset) in [
        (0x0000u16, 0i32),
        (0x0004, 1 << 5),
        (0x0008, 1 << 1),
        (0x0010, 1 << 2),
        (0x0020, 1 << 6),
        (0x0040, 1 << 7),
        (0x0400, 1 << 3),
        (0x0800, 1 << 4),
        (0x1000, -256),
    ] {
        assert_eq!(expand(0xC001 | bit), Instruction::BEQ { rs1: 8, rs2: 0, offset }, "beqz bit {bit:#06x}");
        assert_eq!(expand(0xE001 | bit), Instruction::BNE { rs1: 8, rs2: 0, offset }, "bnez bit {bit:#06x}");
    }
}

#[test]
fn test_stack_relative_offsets() {
    // C.SLLI shamt bits 5,4,3,2,1,0.
    assert_eq!(expand(0x0F82 | 0x0004), Instruction::SLLI { rd: 31, rs1: 31, shamt: 1 });
    assert_eq!(expand(0x0F82 | 0x1000), Instruction::SLLI { rd: 31, rs1: 31, shamt: 32 });

    // C.LWSP offset bits 5,4,3,2,7,6.
    for (bit, offset) in [(0x0004u16, 1i32 << 6), (0x0008, 1 << 7), (0x0010, 1 << 2), (0x1000, 1 << 5)] {
        assert_eq!(expand(0x4F82 | bit), Instruction::LW { rd: 31, rs1: 2, offset }, "c.lwsp bit {bit:#06x}");
    }

    // C.LDSP offset bits 5,4,3,8,7,6.
    for (bit, offset) in [(0x0004u16, 1i32 << 6), (0x0010, 1 << 8), (0x0020, 1 << 3), (0x1000, 1 << 5)] {
        assert_eq!(expand(0x6F82 | bit), Instruction::LD { rd: 31, rs1: 2, offset }, "c.ldsp bit {bit:#06x}");
    }

    // C.SWSP offset bits 5,4,3,2,7,6.
    for (bit, offset) in [(0x0080u16, 1i32 << 6), (0x0100, 1 << 7), (0x0200, 1 << 2), (0x1000, 1 << 5)] {
        assert_eq!(expand(0xC07E | bit), Instruction::SW { rs1: 2, rs2: 31, offset }, "c.swsp bit {bit:#06x}");
    }

    // C.SDSP offset bits 5,4,3,8,7,6.
    for (bit, offset) in [(0x0080u16, 1i32 << 6), (0x0200, 1 << 8), (0x0400, 1 << 3), (0x1000, 1 << 5)] {
        assert_eq!(expand(0xE07E | bit), Instruction::SD { rs1: 2, rs2: 31, offset }, "c.sdsp bit {bit:#06x}");
    }
}

#[test]
fn test_cr_forms() {
    assert_eq!(expand(0x8F82), Instruction::JALR { rd: 0, rs1: 31, offset: 0 }); // c.jr
    assert_eq!(expand(0x8AAA), Instruction::ADD { rd: 21, rs1: 0, rs2: 10 }); // c.mv
    assert_eq!(expand(0x9002), Instruction::EBREAK); // c.ebreak
    assert_eq!(expand(0x9F82), Instruction::JALR { rd: 1, rs1: 31, offset: 0 }); // c.jalr
    assert_eq!(expand(0x9AAA), Instruction::ADD { rd: 21, rs1: 21, rs2: 10 }); // c.add
}

#[test]
fn test_zero_halfword_illegal() {
    assert!(matches!(
        decode(&[0x00, 0x00]).unwrap_err(),
        DecodeError::IllegalInstruction(0)
    ));
}

#[test]
fn test_fp_forms_unsupported() {
    // c.fld / c.fsd / c.fldsp / c.fsdsp
    for half in [0x2000u16, 0xA000, 0x2002, 0xA002] {
        assert!(
            matches!(decode(&half.to_le_bytes()).unwrap_err(), DecodeError::UnsupportedOp(_)),
            "half = {half:#06x}"
        );
    }
}
