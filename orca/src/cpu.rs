//! CPU and memory state.
use crate::{bytecode::Fields, constants::*, devices::KeyState};

/// Borrowed view of the display buffer, row-major.
pub type Chip8DisplayBuffer<'a> = &'a [bool; DISPLAY_BUFFER_SIZE];

/// Progress of the `Fx0A` (`LD Vx, K`) instruction across cycles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    /// Not waiting, or waiting for the first key press.
    #[default]
    Idle,
    /// A key was captured; waiting for every key to be released.
    Release,
}

/// Returned by [`Chip8Cpu::push`] when the call stack is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackOverflow;

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the current position in the bytecode.
    pub(crate) pc: Address,
    /// Stack pointer, number of return addresses on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Index register `I` used for temporarily storing an address.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Switch tracking whether the buzzer should be on or off.
    pub(crate) buzzer_state: bool,
    /// Indicates that the machine is waiting on the keypad.
    pub(crate) key_wait: KeyWait,
    /// Keyboard input state. Pressed is a 1 bit, released is a 0 bit.
    pub(crate) key_state: u16,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: Box<[Address; STACK_SIZE]>,
    /// Screen buffer that is drawn too.
    pub(crate) display: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: 0,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            buzzer_state: false,
            key_wait: KeyWait::Idle,
            key_state: 0,

            ram: Box::new([0; MEM_SIZE]),
            stack: Box::new([0; STACK_SIZE]),
            display: Box::new([false; DISPLAY_BUFFER_SIZE]),
        };
        cpu.reset();
        cpu
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Power-on state: everything zeroed, font loaded and
    /// the program counter at the start of program memory.
    pub fn reset(&mut self) {
        self.clear_memory();
        self.registers.fill(0);
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.buzzer_state = false;
        self.key_wait = KeyWait::Idle;
        self.key_state = 0;

        let font_start = FONTSET_START as usize;
        self.ram[font_start..font_start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    /// Erase the contents of the memory buffers `ram`, `stack` and `display`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
        self.display.fill(false);
    }

    // ------------------------------------------------------------------------
    // Stack

    /// Push a return address onto the call stack.
    ///
    /// A full stack is left untouched.
    pub fn push(&mut self, address: Address) -> Result<(), StackOverflow> {
        if self.sp >= STACK_SIZE {
            return Err(StackOverflow);
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        Ok(())
    }

    /// Pop the most recent return address, or `None` when the stack is empty.
    pub fn pop(&mut self) -> Option<Address> {
        if self.sp == 0 {
            return None;
        }
        self.sp -= 1;
        Some(self.stack[self.sp])
    }

    /// Return address on top of the stack.
    pub fn stack_top(&self) -> Option<Address> {
        self.sp.checked_sub(1).map(|i| self.stack[i])
    }

    pub fn stack_depth(&self) -> usize {
        self.sp
    }

    // ------------------------------------------------------------------------
    // Keyboard

    pub fn set_key_state(&mut self, key_id: u8, state: bool) {
        if key_id < KEY_COUNT {
            if state {
                self.key_state |= 1 << key_id;
            } else {
                self.key_state &= !(1 << key_id);
            }
        }
    }

    pub fn key_state(&self, key_id: u8) -> bool {
        KeyState(self.key_state).is_pressed(key_id)
    }

    /// Replace the whole keyboard state at once.
    pub fn set_keys(&mut self, keys: KeyState) {
        self.key_state = keys.0;
    }

    pub fn keys(&self) -> KeyState {
        KeyState(self.key_state)
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.key_state > 0
    }

    /// Retrieve the value of the first key that is pressed down.
    #[inline]
    pub fn first_key(&self) -> Option<u8> {
        KeyState(self.key_state).first()
    }

    /// Clear the keyboard input state, setting all keys to up.
    #[inline(always)]
    pub fn clear_keys(&mut self) {
        self.key_state = 0;
    }

    pub fn key_wait(&self) -> KeyWait {
        self.key_wait
    }

    // ------------------------------------------------------------------------
    // Timers

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        // The checked_sub implementation uses `unlikely!()` which degrades performance.
        let (val, underflow) = self.delay_timer.overflowing_sub(1);
        if !underflow {
            self.delay_timer = val;
        }
    }

    #[inline]
    pub fn tick_sound(&mut self) {
        let (val, underflow) = self.sound_timer.overflowing_sub(1);
        if !underflow {
            self.sound_timer = val;
        }
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    // ------------------------------------------------------------------------
    // Display

    #[inline(always)]
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.display[x + y * DISPLAY_WIDTH]
    }

    #[inline(always)]
    pub fn set_pixel(&mut self, x: usize, y: usize, on: bool) {
        self.display[x + y * DISPLAY_WIDTH] = on;
    }

    pub fn display(&self) -> Chip8DisplayBuffer<'_> {
        &self.display
    }

    // ------------------------------------------------------------------------
    // Registers and memory

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn set_pc(&mut self, pc: Address) {
        self.pc = pc;
    }

    /// Value of the index register `I`.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn register(&self, vx: u8) -> u8 {
        self.registers[vx as usize & 0xF]
    }

    pub fn set_register(&mut self, vx: u8, value: u8) {
        self.registers[vx as usize & 0xF] = value;
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }

    pub fn ram_mut(&mut self) -> &mut [u8; MEM_SIZE] {
        &mut self.ram
    }

    /// Read a byte, wrapping the address to the 12-bit address space.
    #[inline(always)]
    pub fn read(&self, address: usize) -> u8 {
        self.ram[address & MEM_MASK]
    }

    #[inline(always)]
    pub fn write(&mut self, address: usize, value: u8) {
        self.ram[address & MEM_MASK] = value;
    }

    /// Extract the instruction at the current program counter.
    #[inline(always)]
    pub fn instr(&self) -> [u8; 2] {
        let pc = self.pc as usize;
        [self.read(pc), self.read(pc + 1)]
    }

    /// Decode the operand fields of the instruction at the current program counter.
    #[inline(always)]
    pub fn fields(&self) -> Fields {
        Fields::from(self.instr())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let mut cpu = Chip8Cpu::default();

        cpu.set_key_state(0, true);
        assert_eq!(cpu.key_state, 0b00000000_00000001);
        assert!(cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(!cpu.key_state(7));

        cpu.set_key_state(7, true);
        assert_eq!(cpu.key_state, 0b00000000_10000001);
        assert!(cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));

        cpu.set_key_state(0, false);
        assert_eq!(cpu.key_state, 0b00000000_10000000);
        assert!(!cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));

        cpu.set_key_state(15, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(!cpu.key_state(0));
        assert!(!cpu.key_state(1));
        assert!(cpu.key_state(7));
        assert!(cpu.key_state(15));

        // Out of range keys are ignored.
        cpu.set_key_state(16, true);
        assert_eq!(cpu.key_state, 0b10000000_10000000);
        assert!(!cpu.key_state(16));
        assert_eq!(cpu.first_key(), Some(7));
    }

    #[test]
    fn test_power_on_state() {
        let cpu = Chip8Cpu::new();

        assert_eq!(cpu.pc(), MEM_START as Address);
        assert_eq!(cpu.address(), 0);
        assert_eq!(cpu.stack_depth(), 0);
        assert_eq!(cpu.registers(), &[0; REGISTER_COUNT]);
        assert_eq!(cpu.delay_timer(), 0);
        assert_eq!(cpu.sound_timer(), 0);
        assert!(!cpu.any_key());
        assert!(cpu.display().iter().all(|px| !px));

        let font_start = FONTSET_START as usize;
        assert_eq!(&cpu.ram()[font_start..font_start + FONTSET_DATA_LENGTH], &FONTSET[..]);
        assert!(cpu.ram()[..font_start].iter().all(|b| *b == 0));
        assert!(cpu.ram()[MEM_START..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_stack_lifo() {
        let mut cpu = Chip8Cpu::new();

        for addr in [0x202, 0x304, 0x406] {
            cpu.push(addr).unwrap();
        }
        assert_eq!(cpu.stack_top(), Some(0x406));
        assert_eq!(cpu.pop(), Some(0x406));
        assert_eq!(cpu.pop(), Some(0x304));
        assert_eq!(cpu.pop(), Some(0x202));
        assert_eq!(cpu.pop(), None);
        assert_eq!(cpu.stack_depth(), 0);
    }

    #[test]
    fn test_stack_overflow_keeps_top() {
        let mut cpu = Chip8Cpu::new();

        for i in 0..STACK_SIZE {
            cpu.push(0x200 + i as Address * 2).unwrap();
        }
        let top = cpu.stack_top();

        assert_eq!(cpu.push(0xABC), Err(StackOverflow));
        assert_eq!(cpu.stack_depth(), STACK_SIZE);
        assert_eq!(cpu.stack_top(), top);
    }

    #[test]
    fn test_timers_clamp_at_zero() {
        let mut cpu = Chip8Cpu::new();
        cpu.delay_timer = 2;
        cpu.sound_timer = 1;

        cpu.tick_delay();
        cpu.tick_sound();
        assert_eq!((cpu.delay_timer(), cpu.sound_timer()), (1, 0));

        cpu.tick_delay();
        cpu.tick_sound();
        cpu.tick_delay();
        cpu.tick_sound();
        assert_eq!((cpu.delay_timer(), cpu.sound_timer()), (0, 0));
    }

    #[test]
    fn test_memory_wraps() {
        let mut cpu = Chip8Cpu::new();
        cpu.write(MEM_SIZE + 3, 0xAA);
        assert_eq!(cpu.read(3), 0xAA);

        cpu.pc = 0xFFF;
        cpu.ram[0xFFF] = 0x12;
        cpu.ram[0x000] = 0x34;
        assert_eq!(cpu.instr(), [0x12, 0x34]);
    }
}
