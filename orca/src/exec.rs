//! Instruction handlers.
//!
//! Every handler runs after the program counter was advanced past
//! the instruction, so `pc - 2` is the address of the instruction itself.
use rand::{Rng, RngCore};

use crate::{
    constants::*,
    cpu::{Chip8Cpu, KeyWait},
    error::Fault,
    vm::Flow,
};

impl Chip8Cpu {
    /// Address of the instruction currently executing.
    #[inline(always)]
    fn current_instr(&self) -> Address {
        self.pc.wrapping_sub(2)
    }

    /// Step the program counter back onto the current instruction,
    /// so it is fetched again next cycle.
    #[inline(always)]
    fn rewind(&mut self) {
        self.pc = self.current_instr();
    }

    #[inline(always)]
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    #[inline(always)]
    fn set_flag(&mut self, flag: bool) {
        self.registers[FLAG_REGISTER] = flag as u8;
    }

    #[inline(always)]
    fn reg_pair(&self, vx: u8, vy: u8) -> (u8, u8) {
        (self.register(vx), self.register(vy))
    }

    // ------------------------------------------------------------------------
    // Flow control

    /// 00E0 (CLS)
    pub fn clear_display(&mut self) {
        self.display.fill(false);
    }

    /// 00EE (RET)
    ///
    /// Pop the return address off the stack into the program counter.
    pub fn return_subroutine(&mut self) -> Result<Flow, Fault> {
        match self.pop() {
            Some(address) => {
                self.pc = address;
                Ok(Flow::Jump)
            }
            None => Err(Fault::StackUnderflow {
                pc: self.current_instr(),
            }),
        }
    }

    /// 1nnn (JP addr)
    ///
    /// A jump onto itself is how programs halt; it is reported as [`Flow::Halt`].
    pub fn jump(&mut self, address: Address) -> Flow {
        let spin = address == self.current_instr();
        self.pc = address;
        if spin {
            Flow::Halt
        } else {
            Flow::Jump
        }
    }

    /// 2nnn (CALL addr)
    ///
    /// With a full stack nothing is pushed and the call is retried next cycle.
    pub fn call_subroutine(&mut self, address: Address) -> Flow {
        match self.push(self.pc) {
            Ok(()) => {
                self.pc = address;
                Flow::Jump
            }
            Err(_) => {
                self.rewind();
                Flow::Stall
            }
        }
    }

    /// 3xnn (SE Vx, byte)
    pub fn skip_equal(&mut self, vx: u8, nn: u8) {
        self.skip_if(self.register(vx) == nn);
    }

    /// 4xnn (SNE Vx, byte)
    pub fn skip_not_equal(&mut self, vx: u8, nn: u8) {
        self.skip_if(self.register(vx) != nn);
    }

    /// 5xy0 (SE Vx, Vy)
    pub fn skip_equal_reg(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.skip_if(x == y);
    }

    /// 9xy0 (SNE Vx, Vy)
    pub fn skip_not_equal_reg(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.skip_if(x != y);
    }

    /// Bnnn (JP V0, addr)
    pub fn jump_v0(&mut self, address: Address) -> Flow {
        self.pc = address.wrapping_add(self.registers[0] as Address);
        Flow::Jump
    }

    // ------------------------------------------------------------------------
    // Registers

    /// 6xnn (LD Vx, byte)
    pub fn set_reg(&mut self, vx: u8, nn: u8) {
        self.set_register(vx, nn);
    }

    /// 7xnn (ADD Vx, byte)
    ///
    /// Carry flag is not set.
    pub fn add_reg(&mut self, vx: u8, nn: u8) {
        let x = self.register(vx);
        self.set_register(vx, x.wrapping_add(nn));
    }

    /// 8xy0 (LD Vx, Vy)
    pub fn set_reg_to_reg(&mut self, vx: u8, vy: u8) {
        self.set_register(vx, self.register(vy));
    }

    /// 8xy1 (OR Vx, Vy)
    ///
    /// Resets VF.
    pub fn bit_or(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.set_register(vx, x | y);
        self.set_flag(false);
    }

    /// 8xy2 (AND Vx, Vy)
    ///
    /// Resets VF.
    pub fn bit_and(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.set_register(vx, x & y);
        self.set_flag(false);
    }

    /// 8xy3 (XOR Vx, Vy)
    ///
    /// Resets VF.
    pub fn bit_xor(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.set_register(vx, x ^ y);
        self.set_flag(false);
    }

    /// 8xy4 (ADD Vx, Vy)
    ///
    /// VF is set to 1 when the sum overflows 8 bits, else 0.
    pub fn add_reg_to_reg(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        let result = x as u16 + y as u16;
        self.set_register(vx, (result & 0xFF) as u8); // Overflow wrap
        self.set_flag(result > 0xFF);
    }

    /// 8xy5 (SUB Vx, Vy)
    ///
    /// VF is set to 1 when `Vx > Vy`, else 0.
    pub fn sub_reg(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.set_register(vx, x.wrapping_sub(y));
        self.set_flag(x > y);
    }

    /// 8xy7 (SUBN Vx, Vy)
    ///
    /// VF is set to 1 when `Vy > Vx`, else 0.
    pub fn sub_reg_rev(&mut self, vx: u8, vy: u8) {
        let (x, y) = self.reg_pair(vx, vy);
        self.set_register(vx, y.wrapping_sub(x));
        self.set_flag(y > x);
    }

    /// 8xy6 (SHR Vx, Vy)
    ///
    /// `Vx` is loaded from `Vy` and then shifted right.
    /// VF receives the bit shifted out.
    pub fn shift_reg_right(&mut self, vx: u8, vy: u8) {
        let y = self.register(vy);
        self.set_register(vx, y >> 1);
        self.set_flag(y & 1 == 1);
    }

    /// 8xyE (SHL Vx, Vy)
    ///
    /// `Vx` is loaded from `Vy` and then shifted left.
    /// VF receives the bit shifted out.
    pub fn shift_reg_left(&mut self, vx: u8, vy: u8) {
        let y = self.register(vy);
        self.set_register(vx, y << 1);
        self.set_flag(y & 0x80 != 0);
    }

    /// Cxnn (RND Vx, byte)
    pub fn random<R: RngCore>(&mut self, vx: u8, nn: u8, rng: &mut R) {
        self.set_register(vx, rng.gen::<u8>() & nn);
    }

    // ------------------------------------------------------------------------
    // Memory

    /// Annn (LD I, addr)
    pub fn set_index(&mut self, address: Address) {
        self.address = address;
    }

    /// Fx1E (ADD I, Vx)
    ///
    /// VF is not affected.
    pub fn add_index(&mut self, vx: u8) {
        self.address = self.address.wrapping_add(self.register(vx) as Address);
    }

    /// Fx29 (LD F, Vx)
    ///
    /// Point `I` at the font glyph for the digit in `Vx`.
    pub fn load_font_char(&mut self, vx: u8) {
        let x = self.register(vx) as Address;
        self.address = FONTSET_START + x * FONTSET_HEIGHT as Address;
    }

    /// Fx33 (LD B, Vx)
    ///
    /// Store the binary-coded decimal representation of Vx
    /// in the memory locations I, I+1, and I+2.
    #[rustfmt::skip]
    pub fn bcd(&mut self, vx: u8) {
        let addr = self.address as usize;
        let x = self.register(vx);
        self.write(addr,     x / 100 % 10);
        self.write(addr + 1, x / 10  % 10);
        self.write(addr + 2, x       % 10);
    }

    /// Fx55 (LD [I], Vx)
    ///
    /// Store registers V0 through Vx starting at `I`, leaving `I` one past the last byte.
    pub fn store_regs(&mut self, vx: u8) {
        let addr = self.address as usize;
        let count = (vx & 0xF) as usize + 1;
        for v in 0..count {
            self.write(addr + v, self.registers[v]);
        }
        self.address = self.address.wrapping_add(count as Address);
    }

    /// Fx65 (LD Vx, [I])
    ///
    /// Load registers V0 through Vx from `I`, leaving `I` one past the last byte.
    pub fn load_regs(&mut self, vx: u8) {
        let addr = self.address as usize;
        let count = (vx & 0xF) as usize + 1;
        for v in 0..count {
            self.registers[v] = self.read(addr + v);
        }
        self.address = self.address.wrapping_add(count as Address);
    }

    // ------------------------------------------------------------------------
    // Display

    /// Dxyn (DRW Vx, Vy, nibble)
    ///
    /// XOR an 8 pixel wide, `n` row high sprite read from `I` onto the display.
    ///
    /// The starting coordinate wraps around the display, but the
    /// sprite itself is clipped at the right and bottom edges.
    ///
    /// VF is set to 1 if any pixel that was on is touched by the sprite.
    pub fn draw_sprite(&mut self, vx: u8, vy: u8, n: u8) {
        // VF is cleared before the coordinates are read.
        self.set_flag(false);

        let x0 = self.register(vx) as usize % DISPLAY_WIDTH;
        let y0 = self.register(vy) as usize % DISPLAY_HEIGHT;
        let base = self.address as usize;
        let mut collision = false;

        for row in 0..n as usize {
            let y = y0 + row;
            if y >= DISPLAY_HEIGHT {
                break;
            }

            // Each row is 8 bits representing the 8 pixels of the sprite.
            let bits = self.read(base + row);
            for col in 0..SPRITE_WIDTH {
                let x = x0 + col;
                if x >= DISPLAY_WIDTH {
                    break;
                }

                if bits & (0x80 >> col) != 0 {
                    let d = x + y * DISPLAY_WIDTH;
                    collision |= self.display[d];
                    self.display[d] ^= true;
                }
            }
        }

        self.set_flag(collision);
    }

    // ------------------------------------------------------------------------
    // Keyboard and timers

    /// Ex9E (SKP Vx)
    pub fn skip_key_pressed(&mut self, vx: u8) {
        self.skip_if(self.key_state(self.register(vx)));
    }

    /// ExA1 (SKNP Vx)
    pub fn skip_key_not_pressed(&mut self, vx: u8) {
        self.skip_if(!self.key_state(self.register(vx)));
    }

    /// Fx07 (LD Vx, DT)
    pub fn load_delay_timer(&mut self, vx: u8) {
        self.set_register(vx, self.delay_timer);
    }

    /// Fx15 (LD DT, Vx)
    pub fn set_delay_timer(&mut self, vx: u8) {
        self.delay_timer = self.register(vx);
    }

    /// Fx18 (LD ST, Vx)
    pub fn set_sound_timer(&mut self, vx: u8) {
        self.sound_timer = self.register(vx);
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Stalls by re-fetching itself until a key is pressed and then
    /// every key is released. While keys are held, `Vx` tracks the
    /// lowest pressed key, so the last key seen before release wins.
    pub fn wait_for_key(&mut self, vx: u8) -> Flow {
        match self.first_key() {
            Some(key) => {
                self.set_register(vx, key);
                self.key_wait = KeyWait::Release;
                self.rewind();
                Flow::KeyWait
            }
            None if self.key_wait == KeyWait::Release => {
                self.key_wait = KeyWait::Idle;
                Flow::Ok
            }
            None => {
                self.rewind();
                Flow::KeyWait
            }
        }
    }
}
