mod bytecode;
pub mod constants;
mod cpu;
mod devices;
mod disasm;
mod error;
mod exec;
mod ir;
mod vm;

pub mod prelude {
    pub use super::{
        bytecode::{decode, decode_word, Fields},
        cpu::{Chip8Cpu, Chip8DisplayBuffer, KeyWait, StackOverflow},
        devices::{Devices, InvalidKeyCode, KeyCode, KeyState},
        disasm::Disassembler,
        error::{Chip8Error, Chip8Result, Fault},
        ir::{Instr, InstrRepr, Op},
        vm::{Chip8Conf, Chip8Vm, Diagnostics, Flow, FrameReport},
    };
}
