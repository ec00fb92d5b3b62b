//! Variable-length instruction classification.
//!
//! The base ISA reserves encodings of the first bytes to describe how long
//! the instruction starting there is. Only 16-bit and 32-bit instructions
//! are executable here; the longer forms are still classified so that they
//! produce a precise error instead of a misdecode.

use crate::DecodeError;

/// Returns the size in bytes (2 or 4) of the instruction starting at
/// `buf[0]`. The buffer length must be a non-zero multiple of 2.
///
/// riscv-spec-v2.2; Figure 1.1
pub fn insn_length(buf: &[u8]) -> Result<usize, DecodeError> {
    if buf.is_empty() || buf.len() % 2 != 0 {
        return Err(DecodeError::BadBufferLength(buf.len()));
    }
    let b0 = buf[0];
    if b0 & 0b11 != 0b11 {
        return Ok(2);
    }
    if b0 & 0b1_1111 != 0b1_1111 {
        return Ok(4);
    }
    if b0 & 0b11_1111 == 0b01_1111 {
        // 48-bit encoding space.
        return Err(DecodeError::UnsupportedLength(48));
    }
    if b0 & 0b111_1111 == 0b011_1111 {
        // The 64-bit slot maps onto an undefined base opcode, so keep the
        // 4-byte classification and let the standard decoder reject it.
        return Ok(4);
    }
    // b0 & 0x7f == 0x7f: length is (80 + 16*n) bits, n in bits 14..12;
    // n == 7 is reserved for 192 bits and up.
    let n = (buf[1] >> 4) & 0x7;
    if n == 7 {
        return Err(DecodeError::UnsupportedLength(192));
    }
    Err(DecodeError::UnsupportedLength(80 + 16 * n as u32))
}
