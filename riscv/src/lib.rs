//! RV64IMC instruction decoding.
//!
//! The crate exposes a single uniform [`Instruction`] form. 32-bit standard
//! encodings decode into it directly; 16-bit compressed encodings decode into
//! a [`compressed::CInstruction`] first and are then expanded into the same
//! form, so the execution layer never distinguishes the two beyond the
//! encoded size.

pub mod compressed;
pub mod instruction;
pub mod length;
pub mod standard;

pub use compressed::{decode_compressed_instruction, CInstruction};
pub use instruction::Instruction;
pub use length::insn_length;
pub use standard::decode_standard_instruction;

/// Decoder errors. All of them are fatal for the instruction they describe.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("illegal instruction {0:#010x}")]
    IllegalInstruction(u32),

    #[error("unsupported operation: {0}")]
    UnsupportedOp(&'static str),

    #[error("shift immediate selects neither srli nor srai")]
    BadShiftImmediate,

    #[error("unsupported instruction length of {0} bits")]
    UnsupportedLength(u32),

    #[error("instruction buffer of {0} bytes; length must be a non-zero multiple of 2")]
    BadBufferLength(usize),

    #[error("not enough bytes for a {need}-byte instruction: have {have}")]
    Truncated { need: usize, have: usize },
}

/// Decode the first instruction in `bytes` and return it together with its
/// encoded size (2 or 4). The buffer may be shorter than 4 bytes as long as
/// it still covers the instruction it starts with.
pub fn decode(bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
    let size = insn_length(bytes)?;
    match size {
        2 => {
            let half = u16::from_le_bytes([bytes[0], bytes[1]]);
            let c = decode_compressed_instruction(half)?;
            Ok((Instruction::from(c), 2))
        }
        4 => {
            if bytes.len() < 4 {
                return Err(DecodeError::Truncated { need: 4, have: bytes.len() });
            }
            let word = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            Ok((decode_standard_instruction(word)?, 4))
        }
        n => Err(DecodeError::UnsupportedLength(8 * n as u32)),
    }
}
