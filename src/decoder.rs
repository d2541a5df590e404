use serde::Serialize;

use crate::addressing::{AddressingMode, IndexRegister, Register, Size};

/// One decoded operand. PC-relative and branch values are absolute targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedOperand {
    pub mode: AddressingMode,
    pub register: Option<Register>,
    pub value: Option<i64>,
    pub index: Option<IndexRegister>,
    pub outer: Option<i64>,
    /// Register list, d0 = bit 0.
    pub mask: Option<u16>,
}

impl DecodedOperand {
    pub fn new(mode: AddressingMode) -> Self {
        Self {
            mode,
            register: None,
            value: None,
            index: None,
            outer: None,
            mask: None,
        }
    }

    pub fn register(mode: AddressingMode, register: Register) -> Self {
        Self {
            register: Some(register),
            ..Self::new(mode)
        }
    }

    pub fn value(mode: AddressingMode, value: i64) -> Self {
        Self {
            value: Some(value),
            ..Self::new(mode)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decoded {
    pub mnemonic: String,
    pub size: Option<Size>,
    /// Whether the size suffix is part of the canonical spelling.
    pub show_size: bool,
    pub operands: Vec<DecodedOperand>,
    /// Bytes consumed, opcode and extension words.
    pub length: u32,
}

pub trait Decoder {
    /// Decodes the instruction at the start of `bytes`, located at `address`.
    fn decode(&self, bytes: &[u8], address: u32) -> Option<Decoded>;
}

/// Big-endian unsigned read of `n` bytes at `pos`.
pub fn read_be(bytes: &[u8], pos: usize, n: usize) -> Option<u64> {
    let chunk = bytes.get(pos..pos.checked_add(n)?)?;
    Some(chunk.iter().fold(0u64, |w, &b| (w << 8) | b as u64))
}

pub fn sign_extend(value: i64, bits: u32) -> i64 {
    if bits == 0 || bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension() {
        assert_eq!(sign_extend(0xFF, 8), -1);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0x8000, 16), -32768);
    }

    #[test]
    fn big_endian_reads() {
        assert_eq!(read_be(&[0x12, 0x34, 0x56], 1, 2), Some(0x3456));
        assert_eq!(read_be(&[0x12], 0, 2), None);
    }
}
