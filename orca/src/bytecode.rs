//! Instruction decoding.
//!
//! An instruction is a big-endian 16-bit word split into 4-bit nibbles:
//!
//! ```text
//! op   x    y    n
//! 1111 0000 0000 0000
//!      nnn------------
//!           nn--------
//! ```
use crate::{constants::Address, ir::Op};

/// Operand fields of a single instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    /// Opcode class.
    pub op: u8, // 0xF000
    /// Register index `Vx`.
    pub x: u8, // 0x0F00
    /// Register index `Vy`.
    pub y: u8, // 0x00F0
    /// 4-bit immediate or sub-selector.
    pub n: u8, // 0x000F
    /// 8-bit immediate or sub-selector.
    pub nn: u8, // 0x00FF
    /// 12-bit address.
    pub nnn: Address, // 0x0FFF
}

impl Fields {
    /// Whole instruction word.
    #[inline(always)]
    pub fn word(&self) -> u16 {
        ((self.op as u16) << 12) | self.nnn
    }
}

impl From<[u8; 2]> for Fields {
    #[inline(always)]
    fn from([a, b]: [u8; 2]) -> Self {
        Self {
            op: a >> 4,
            x: a & 0xF,
            y: b >> 4,
            n: b & 0xF,
            nn: b,
            nnn: (((a as u16) & 0xF) << 8) | b as u16,
        }
    }
}

impl From<u16> for Fields {
    #[inline(always)]
    fn from(word: u16) -> Self {
        Self::from(word.to_be_bytes())
    }
}

/// Decode an instruction into its tagged representation.
///
/// Classes 0x8, 0xE and 0xF are further identified by a sub-selector.
/// Classes 0x5 and 0x9 do not inspect their low nibble.
pub fn decode(bytecode: [u8; 2]) -> Op {
    let Fields {
        op,
        x: vx,
        y: vy,
        n,
        nn,
        nnn,
    } = Fields::from(bytecode);
    let word = u16::from_be_bytes(bytecode);

    match op {
        0x0 => match word {
            // 00E0 (CLS)
            0x00E0 => Op::ClearScreen,
            // 00EE (RET)
            0x00EE => Op::Return,
            // 0nnn (SYS addr) is ignored by modern interpreters.
            _ => Op::Unknown { word },
        },
        0x1 => Op::JumpAddress { address: nnn },
        0x2 => Op::Call { address: nnn },
        0x3 => Op::Skip_Eq_Byte { vx, nn },
        0x4 => Op::Skip_NotEq_Byte { vx, nn },
        0x5 => Op::Skip_Eq { vx, vy },
        0x6 => Op::Load_Byte { vx, nn },
        0x7 => Op::Add_Byte { vx, nn },
        // Arithmetic instructions indentified by n
        0x8 => match n {
            0x0 => Op::Load_Vx_Vy { vx, vy },
            0x1 => Op::Or_Vx_Vy { vx, vy },
            0x2 => Op::And_Vx_Vy { vx, vy },
            0x3 => Op::Xor_Vx_Vy { vx, vy },
            0x4 => Op::Add_Vx_Vy { vx, vy },
            0x5 => Op::Sub_Vx_Vy { vx, vy },
            0x6 => Op::ShiftRight { vx, vy },
            0x7 => Op::SubReverse_Vx_Vy { vx, vy },
            0xE => Op::ShiftLeft { vx, vy },
            _ => Op::Unknown { word },
        },
        0x9 => Op::Skip_NotEq { vx, vy },
        0xA => Op::Load_Address { address: nnn },
        0xB => Op::Jump_V0 { address: nnn },
        0xC => Op::Random { vx, nn },
        0xD => Op::Draw { vx, vy, n },
        // Keyboard instructions identified by nn
        0xE => match nn {
            0x9E => Op::Skip_Key { vx },
            0xA1 => Op::Skip_NotKey { vx },
            _ => Op::Unknown { word },
        },
        // Miscellaneous instructions identified by nn
        0xF => match nn {
            0x07 => Op::Load_Vx_DT { vx },
            0x0A => Op::Load_Vx_K { vx },
            0x15 => Op::Load_DT_Vx { vx },
            0x18 => Op::Load_ST_Vx { vx },
            0x1E => Op::Add_I_Vx { vx },
            0x29 => Op::Load_F_Vx { vx },
            0x33 => Op::Load_B_Vx { vx },
            0x55 => Op::Store_Regs { vx },
            0x65 => Op::Load_Regs { vx },
            _ => Op::Unknown { word },
        },
        // Nibble is only 4 bits wide.
        _ => unreachable!("opcode class out of range: {op:X}"),
    }
}

/// Decode a whole instruction word.
#[inline(always)]
pub fn decode_word(word: u16) -> Op {
    decode(word.to_be_bytes())
}
