//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{
    bytecode::decode,
    constants::{Address, MEM_START},
    ir::Instr,
};

/// Linear disassembler over a program image.
///
/// Every word is decoded as an instruction, so sprite data
/// embedded in the program shows up as whatever it decodes to.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    /// Address the first byte would be loaded at.
    origin: Address,
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self {
            bytecode,
            origin: MEM_START as Address,
        }
    }

    pub fn with_origin(bytecode: &'a [u8], origin: Address) -> Self {
        Self { bytecode, origin }
    }

    /// Decoded instructions, in program order.
    ///
    /// A trailing odd byte is padded with zero.
    pub fn instructions(&self) -> impl Iterator<Item = Instr> + 'a {
        let origin = self.origin;
        self.bytecode
            .chunks(2)
            .enumerate()
            .map(move |(i, chunk)| {
                let bytes = [chunk[0], chunk.get(1).copied().unwrap_or(0)];
                Instr {
                    addr: origin.wrapping_add((i * 2) as Address),
                    bytes,
                    op: decode(bytes),
                }
            })
    }

    /// Write the whole program, one instruction per line.
    pub fn disassemble<W: FmtWrite>(&self, w: &mut W) -> fmt::Result {
        for instr in self.instructions() {
            writeln!(
                w,
                "{:04X}: {:04X}  {}",
                instr.addr,
                instr.bytecode(),
                instr.repr()
            )?;
        }

        Ok(())
    }

    pub fn print_bytecode(&self) -> fmt::Result {
        let mut s = String::new();
        self.disassemble(&mut s)?;
        print!("{s}");
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::Op;

    #[test]
    fn test_disassemble() {
        let bytecode = [0x00, 0xE0, 0xA2, 0x1E, 0xC2, 0x01, 0xFF];
        let mut buf = String::new();
        Disassembler::new(&bytecode).disassemble(&mut buf).unwrap();

        let lines: Vec<&str> = buf.lines().collect();
        assert_eq!(
            lines,
            vec![
                "0200: 00E0  CLS",
                "0202: A21E  LD I, 0x21E",
                "0204: C201  RND v2, 1",
                "0206: FF00  0xFF00",
            ]
        );
    }

    #[test]
    fn test_origin() {
        let bytecode = [0x12, 0x00];
        let instr = Disassembler::with_origin(&bytecode, 0x300)
            .instructions()
            .next()
            .unwrap();
        assert_eq!(instr.addr, 0x300);
        assert_eq!(instr.op, Op::JumpAddress { address: 0x200 });
    }
}
