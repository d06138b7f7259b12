//! Intermediate representation of decoded instructions.
//!
//! Every instruction word decodes to exactly one [`Op`], which the
//! virtual machine dispatches on and the disassembler prints.
use std::fmt;
use std::fmt::Formatter;

use crate::constants::Address;

/// A decoded instruction together with where it came from.
pub struct Instr {
    /// Address in memory where the instruction is located.
    pub addr: Address,
    /// The original bytes that were read from the buffer.
    pub bytes: [u8; 2],
    pub op: Op,
}

impl Instr {
    /// Original bytes encoded into a `u16`.
    #[inline(always)]
    pub fn bytecode(&self) -> u16 {
        u16::from_be_bytes(self.bytes)
    }

    #[inline(always)]
    pub fn repr(&self) -> InstrRepr<'_> {
        InstrRepr { instr: self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Op {
    /// 00E0 (CLS)
    ///
    /// Clear the screen.
    ClearScreen,
    /// 00EE (RET)
    ///
    /// Return from the sub-routine.
    Return,
    /// 1nnn (JP addr)
    ///
    /// Jump to the address in `nnn`.
    JumpAddress { address: Address },
    /// 2nnn (CALL addr)
    ///
    /// Call the sub-routine at address `nnn`.
    Call { address: Address },
    /// 3xnn (SE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` equals value `nn`
    Skip_Eq_Byte { vx: u8, nn: u8 },
    /// 4xnn (SNE Vx, byte)
    ///
    /// Skip the next instruction if register `Vx` does not equal value `nn`.
    Skip_NotEq_Byte { vx: u8, nn: u8 },
    /// 5xy0 (SE Vx, Vy)
    ///
    /// Skip the next instruction if register `Vx` equals register `Vy`.
    Skip_Eq { vx: u8, vy: u8 },
    /// 6xnn (LD Vx, byte)
    Load_Byte { vx: u8, nn: u8 },
    /// 7xnn (ADD Vx, byte)
    ///
    /// Add byte to the value in register `Vx`, store the result in `Vx`.
    Add_Byte { vx: u8, nn: u8 },

    // ------------------------------------------------------------------------
    // Math
    /// 8xy0 (LD Vx, Vy)
    Load_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy1 (OR Vx, Vy)
    Or_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy2 (AND Vx, Vy)
    And_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy3 (XOR Vx, Vy)
    Xor_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy4 (ADD Vx, Vy)
    Add_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy5 (SUB Vx, Vy)
    Sub_Vx_Vy { vx: u8, vy: u8 },
    /// 8xy6 (SHR Vx, Vy)
    ///
    /// Copies `Vy` into `Vx` before shifting.
    ShiftRight { vx: u8, vy: u8 },
    /// 8xy7 (SUBN Vx, Vy)
    SubReverse_Vx_Vy { vx: u8, vy: u8 },
    /// 8xyE (SHL Vx, Vy)
    ///
    /// Copies `Vy` into `Vx` before shifting.
    ShiftLeft { vx: u8, vy: u8 },
    /// 9xy0 (SNE Vx, Vy)
    Skip_NotEq { vx: u8, vy: u8 },

    /// Annn (LD I, addr)
    ///
    /// Load address into register `I`.
    Load_Address { address: Address },
    /// Bnnn (JP V0, addr)
    ///
    /// Jump to location nnn + V0.
    Jump_V0 { address: Address },
    /// Cxnn (RND Vx, byte)
    ///
    /// Generate random number.
    Random { vx: u8, nn: u8 },
    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer.
    Draw { vx: u8, vy: u8, n: u8 },

    // ------------------------------------------------------------------------
    // Keyboard
    /// Ex9E (SKP Vx)
    Skip_Key { vx: u8 },
    /// ExA1 (SKNP Vx)
    Skip_NotKey { vx: u8 },

    // ------------------------------------------------------------------------
    // Miscellaneous
    /// Fx07 (LD Vx, DT)
    Load_Vx_DT { vx: u8 },
    /// Fx0A (LD Vx, K)
    Load_Vx_K { vx: u8 },
    /// Fx15 (LD DT, Vx)
    Load_DT_Vx { vx: u8 },
    /// Fx18 (LD ST, Vx)
    Load_ST_Vx { vx: u8 },
    /// Fx1E (ADD I, Vx)
    Add_I_Vx { vx: u8 },
    /// Fx29 (LD F, Vx)
    Load_F_Vx { vx: u8 },
    /// Fx33 (LD B, Vx)
    Load_B_Vx { vx: u8 },
    /// Fx55 (LD [I], Vx)
    Store_Regs { vx: u8 },
    /// Fx65 (LD Vx, [I])
    Load_Regs { vx: u8 },

    /// Word that does not match any known instruction.
    Unknown { word: u16 },
}

impl Op {
    /// Assembly mnemonic of the instruction.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::ClearScreen => "CLS",
            Op::Return => "RET",
            Op::JumpAddress { .. } | Op::Jump_V0 { .. } => "JP",
            Op::Call { .. } => "CALL",
            Op::Skip_Eq_Byte { .. } | Op::Skip_Eq { .. } => "SE",
            Op::Skip_NotEq_Byte { .. } | Op::Skip_NotEq { .. } => "SNE",
            Op::Add_Byte { .. } | Op::Add_Vx_Vy { .. } | Op::Add_I_Vx { .. } => "ADD",
            Op::Or_Vx_Vy { .. } => "OR",
            Op::And_Vx_Vy { .. } => "AND",
            Op::Xor_Vx_Vy { .. } => "XOR",
            Op::Sub_Vx_Vy { .. } => "SUB",
            Op::ShiftRight { .. } => "SHR",
            Op::SubReverse_Vx_Vy { .. } => "SUBN",
            Op::ShiftLeft { .. } => "SHL",
            Op::Random { .. } => "RND",
            Op::Draw { .. } => "DRW",
            Op::Skip_Key { .. } => "SKP",
            Op::Skip_NotKey { .. } => "SKNP",
            Op::Unknown { .. } => "???",
            _ => "LD",
        }
    }
}

pub struct InstrRepr<'a> {
    instr: &'a Instr,
}

impl<'a> fmt::Display for InstrRepr<'a> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let op = &self.instr.op;
        let name = op.mnemonic();

        match *op {
            Op::ClearScreen | Op::Return => write!(f, "{name}"),
            Op::JumpAddress { address } | Op::Call { address } => {
                write!(f, "{name} 0x{address:03X}")
            }
            Op::Skip_Eq_Byte { vx, nn }
            | Op::Skip_NotEq_Byte { vx, nn }
            | Op::Load_Byte { vx, nn }
            | Op::Add_Byte { vx, nn }
            | Op::Random { vx, nn } => write!(f, "{name} v{vx:X}, {nn}"),
            Op::Skip_Eq { vx, vy }
            | Op::Skip_NotEq { vx, vy }
            | Op::Load_Vx_Vy { vx, vy }
            | Op::Or_Vx_Vy { vx, vy }
            | Op::And_Vx_Vy { vx, vy }
            | Op::Xor_Vx_Vy { vx, vy }
            | Op::Add_Vx_Vy { vx, vy }
            | Op::Sub_Vx_Vy { vx, vy }
            | Op::ShiftRight { vx, vy }
            | Op::SubReverse_Vx_Vy { vx, vy }
            | Op::ShiftLeft { vx, vy } => write!(f, "{name} v{vx:X}, v{vy:X}"),
            Op::Load_Address { address } => write!(f, "{name} I, 0x{address:03X}"),
            Op::Jump_V0 { address } => write!(f, "{name} v0, 0x{address:03X}"),
            Op::Draw { vx, vy, n } => write!(f, "{name} v{vx:X}, v{vy:X}, {n}"),
            Op::Skip_Key { vx } | Op::Skip_NotKey { vx } => write!(f, "{name} v{vx:X}"),
            Op::Load_Vx_DT { vx } => write!(f, "{name} v{vx:X}, DT"),
            Op::Load_Vx_K { vx } => write!(f, "{name} v{vx:X}, K"),
            Op::Load_DT_Vx { vx } => write!(f, "{name} DT, v{vx:X}"),
            Op::Load_ST_Vx { vx } => write!(f, "{name} ST, v{vx:X}"),
            Op::Add_I_Vx { vx } => write!(f, "{name} I, v{vx:X}"),
            Op::Load_F_Vx { vx } => write!(f, "{name} F, v{vx:X}"),
            Op::Load_B_Vx { vx } => write!(f, "{name} B, v{vx:X}"),
            Op::Store_Regs { vx } => write!(f, "{name} [I], v{vx:X}"),
            Op::Load_Regs { vx } => write!(f, "{name} v{vx:X}, [I]"),
            Op::Unknown { word } => write!(f, "0x{word:04X}"),
        }
    }
}
