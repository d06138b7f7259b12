//! Virtual machine.
use std::fmt::{self, Write};

use log::{error, warn};
use rand::prelude::*;

use crate::{
    bytecode::decode,
    constants::*,
    cpu::{Chip8Cpu, Chip8DisplayBuffer},
    devices::{Devices, KeyCode, KeyState},
    error::{Chip8Error, Chip8Result, Fault},
    ir::Op,
};

pub struct Chip8Vm {
    cpu: Chip8Cpu,
    rng: StdRng,
    /// Fatal condition the VM is trapped in, if any.
    fault: Option<Fault>,
    diagnostics: Diagnostics,
    conf: Chip8Conf,
}

/// Control flow outcome of a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Ok,
    /// Program counter has jumped to a new address.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The program jumped onto itself, which is how programs halt.
    ///
    /// The VM keeps spinning on the jump if stepped further.
    Halt,
    Draw,
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stops
    /// execution until a key is pressed and released, and loads the key value into `Vx`.
    KeyWait,
    /// `CALL` was attempted with a full stack, and will be retried next cycle.
    Stall,
    /// The instruction word is not part of the instruction set.
    /// It was skipped over.
    Unimplemented { word: u16 },
}

/// VM Configuration Parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(default))]
pub struct Chip8Conf {
    /// Number of instructions executed per frame.
    pub steps_per_frame: usize,
    /// Seed for the random number generator. Seeded from entropy when absent.
    pub rng_seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            steps_per_frame: DEFAULT_STEPS_PER_FRAME,
            rng_seed: None,
        }
    }
}

/// Counters of non-fatal conditions, since the program was loaded.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// Executed instructions.
    pub steps: u64,
    /// Instructions that were not recognised.
    pub unimplemented: u64,
    /// Last unrecognised instruction word.
    pub last_unimplemented: Option<u16>,
    /// Cycles spent retrying a `CALL` on a full stack.
    pub stalls: u64,
}

/// Summary of a frame driven by [`Chip8Vm::run_frame`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Instructions executed this frame.
    pub steps: usize,
    /// The display buffer was modified.
    pub drawn: bool,
    /// The program reached a self-jump.
    pub halted: bool,
    /// The frame ended with the VM waiting on the keypad.
    pub key_wait: bool,
    /// Buzzer state at the end of the frame.
    pub buzzer: bool,
}

impl Chip8Vm {
    pub fn new(conf: Chip8Conf) -> Self {
        Chip8Vm {
            cpu: Chip8Cpu::new(),
            rng: seed_rng(conf.rng_seed),
            fault: None,
            diagnostics: Diagnostics::default(),
            conf,
        }
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Replace the builtin font with custom glyph data.
    pub fn load_font(&mut self, fontset: &[u8]) -> Chip8Result<()> {
        if fontset.len() != FONTSET_DATA_LENGTH {
            return Err(Chip8Error::Font(format!(
                "fontset data must be {FONTSET_DATA_LENGTH} bytes, got {}",
                fontset.len()
            )));
        }

        let start = FONTSET_START as usize;
        self.cpu.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(fontset);

        Ok(())
    }

    /// Reset the machine and copy a program into memory at [`MEM_START`].
    ///
    /// A program that doesn't fit is rejected before the machine is touched.
    pub fn load_bytecode(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if !check_program_size(bytecode) {
            return Err(Chip8Error::LargeProgram {
                size: bytecode.len(),
                capacity: MAX_PROGRAM_SIZE,
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.reset();

        // Load program into virtual RAM
        self.cpu.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        log::debug!("loaded {} byte program", bytecode.len());

        Ok(())
    }

    /// Clear internal state in preparation for a fresh startup.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.fault = None;
        self.diagnostics = Diagnostics::default();
        self.rng = seed_rng(self.conf.rng_seed);
    }

    pub fn display_buffer(&self) -> Chip8DisplayBuffer<'_> {
        self.cpu.display()
    }

    pub fn cpu(&self) -> &Chip8Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Chip8Cpu {
        &mut self.cpu
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// The fatal condition that stopped the VM, if any.
    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }
}

fn seed_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

#[inline]
fn check_program_size(bytecode: &[u8]) -> bool {
    bytecode.len() <= MAX_PROGRAM_SIZE
}

/// Interpreter
impl Chip8Vm {
    /// Sets the keyboard key input state.
    pub fn set_key(&mut self, key: KeyCode, pressed: bool) {
        self.cpu.set_key_state(key.as_u8(), pressed);
    }

    /// Replace the whole keyboard state, as sampled by the host.
    pub fn set_keys(&mut self, keys: KeyState) {
        self.cpu.set_keys(keys);
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn clear_keys(&mut self) {
        self.cpu.clear_keys()
    }

    /// Count down both timers by one tick.
    ///
    /// Expected to be called by the host at [`DELAY_FREQUENCY`].
    pub fn tick_timers(&mut self) {
        self.cpu.tick_delay();
        self.cpu.tick_sound();
    }

    /// Drive one frame: sample input, count down timers,
    /// execute `steps_per_frame` instructions and present the display.
    pub fn run_frame<D: Devices>(&mut self, devices: &mut D) -> Chip8Result<FrameReport> {
        let mut report = FrameReport::default();

        self.set_keys(devices.poll_keys());
        self.tick_timers();

        for _ in 0..self.conf.steps_per_frame {
            let flow = self.step()?;
            report.steps += 1;
            match flow {
                Flow::Draw => report.drawn = true,
                Flow::Halt => report.halted = true,
                _ => {}
            }
            report.key_wait = flow == Flow::KeyWait;
        }

        devices.draw(self.cpu.display());

        // Buzzer should be on while sound timer counts down,
        // then turned off when the timer reaches zero.
        if self.cpu.sound_timer > 0 && !self.cpu.buzzer_state {
            self.cpu.buzzer_state = true;
            devices.buzz(true);
        } else if self.cpu.sound_timer == 0 && self.cpu.buzzer_state {
            self.cpu.buzzer_state = false;
            devices.buzz(false);
        }
        report.buzzer = self.cpu.buzzer_state;

        Ok(report)
    }

    /// Execute up to `step_count` instructions, stopping early when the program halts.
    pub fn run_steps(&mut self, step_count: usize) -> Chip8Result<Flow> {
        let mut flow = Flow::Ok;

        for _ in 0..step_count {
            flow = self.step()?;
            if flow == Flow::Halt {
                break;
            }
        }

        Ok(flow)
    }

    /// Fetch, decode and execute a single instruction.
    ///
    /// Non-fatal conditions are reported through the returned [`Flow`].
    /// A fatal fault traps the VM; every following call returns the
    /// same error until a program is loaded again.
    pub fn step(&mut self) -> Chip8Result<Flow> {
        if let Some(fault) = self.fault {
            return Err(Chip8Error::Fault(fault));
        }

        let bytes = self.cpu.instr();
        let op = decode(bytes);
        op_trace(&self.cpu, bytes, op);

        self.cpu.pc = self.cpu.pc.wrapping_add(2);
        self.diagnostics.steps += 1;

        match self.dispatch(op) {
            Ok(flow) => {
                self.record(flow);
                Ok(flow)
            }
            Err(fault) => {
                error!("{fault}");
                self.fault = Some(fault);
                Err(Chip8Error::Fault(fault))
            }
        }
    }

    fn record(&mut self, flow: Flow) {
        match flow {
            Flow::Unimplemented { word } => {
                warn!(
                    "unimplemented instruction 0x{word:04X} at 0x{:03X}",
                    self.cpu.pc.wrapping_sub(2)
                );
                self.diagnostics.unimplemented += 1;
                self.diagnostics.last_unimplemented = Some(word);
            }
            Flow::Stall => {
                // Only the first cycle of a stall is worth a warning.
                if self.diagnostics.stalls == 0 {
                    warn!("call stack overflow, stalling on CALL");
                }
                self.diagnostics.stalls += 1;
            }
            _ => {}
        }
    }

    /// Route a decoded instruction to its handler.
    #[inline]
    fn dispatch(&mut self, op: Op) -> Result<Flow, Fault> {
        let cpu = &mut self.cpu;

        let flow = match op {
            Op::ClearScreen => {
                cpu.clear_display();
                Flow::Draw
            }
            Op::Return => return cpu.return_subroutine(),
            Op::JumpAddress { address } => cpu.jump(address),
            Op::Call { address } => cpu.call_subroutine(address),
            Op::Skip_Eq_Byte { vx, nn } => {
                cpu.skip_equal(vx, nn);
                Flow::Ok
            }
            Op::Skip_NotEq_Byte { vx, nn } => {
                cpu.skip_not_equal(vx, nn);
                Flow::Ok
            }
            Op::Skip_Eq { vx, vy } => {
                cpu.skip_equal_reg(vx, vy);
                Flow::Ok
            }
            Op::Load_Byte { vx, nn } => {
                cpu.set_reg(vx, nn);
                Flow::Ok
            }
            Op::Add_Byte { vx, nn } => {
                cpu.add_reg(vx, nn);
                Flow::Ok
            }
            // ----------------------------------------------------------------
            // Math
            Op::Load_Vx_Vy { vx, vy } => {
                cpu.set_reg_to_reg(vx, vy);
                Flow::Ok
            }
            Op::Or_Vx_Vy { vx, vy } => {
                cpu.bit_or(vx, vy);
                Flow::Ok
            }
            Op::And_Vx_Vy { vx, vy } => {
                cpu.bit_and(vx, vy);
                Flow::Ok
            }
            Op::Xor_Vx_Vy { vx, vy } => {
                cpu.bit_xor(vx, vy);
                Flow::Ok
            }
            Op::Add_Vx_Vy { vx, vy } => {
                cpu.add_reg_to_reg(vx, vy);
                Flow::Ok
            }
            Op::Sub_Vx_Vy { vx, vy } => {
                cpu.sub_reg(vx, vy);
                Flow::Ok
            }
            Op::ShiftRight { vx, vy } => {
                cpu.shift_reg_right(vx, vy);
                Flow::Ok
            }
            Op::SubReverse_Vx_Vy { vx, vy } => {
                cpu.sub_reg_rev(vx, vy);
                Flow::Ok
            }
            Op::ShiftLeft { vx, vy } => {
                cpu.shift_reg_left(vx, vy);
                Flow::Ok
            }
            Op::Skip_NotEq { vx, vy } => {
                cpu.skip_not_equal_reg(vx, vy);
                Flow::Ok
            }
            // ----------------------------------------------------------------
            Op::Load_Address { address } => {
                cpu.set_index(address);
                Flow::Ok
            }
            Op::Jump_V0 { address } => cpu.jump_v0(address),
            Op::Random { vx, nn } => {
                cpu.random(vx, nn, &mut self.rng);
                Flow::Ok
            }
            Op::Draw { vx, vy, n } => {
                cpu.draw_sprite(vx, vy, n);
                Flow::Draw
            }
            // ----------------------------------------------------------------
            // Keyboard
            Op::Skip_Key { vx } => {
                cpu.skip_key_pressed(vx);
                Flow::Ok
            }
            Op::Skip_NotKey { vx } => {
                cpu.skip_key_not_pressed(vx);
                Flow::Ok
            }
            // ----------------------------------------------------------------
            // Miscellaneous
            Op::Load_Vx_DT { vx } => {
                cpu.load_delay_timer(vx);
                Flow::Ok
            }
            Op::Load_Vx_K { vx } => cpu.wait_for_key(vx),
            Op::Load_DT_Vx { vx } => {
                cpu.set_delay_timer(vx);
                Flow::Ok
            }
            Op::Load_ST_Vx { vx } => {
                cpu.set_sound_timer(vx);
                Flow::Sound
            }
            Op::Add_I_Vx { vx } => {
                cpu.add_index(vx);
                Flow::Ok
            }
            Op::Load_F_Vx { vx } => {
                cpu.load_font_char(vx);
                Flow::Ok
            }
            Op::Load_B_Vx { vx } => {
                cpu.bcd(vx);
                Flow::Ok
            }
            Op::Store_Regs { vx } => {
                cpu.store_regs(vx);
                Flow::Ok
            }
            Op::Load_Regs { vx } => {
                cpu.load_regs(vx);
                Flow::Ok
            }
            // ----------------------------------------------------------------
            // Unsupported operation.
            Op::Unknown { word } => Flow::Unimplemented { word },
        };

        Ok(flow)
    }
}

/// Troubleshooting
#[allow(dead_code)]
#[doc(hidden)]
impl Chip8Vm {
    /// Returns the contents of the memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let iter = self
            .cpu
            .ram
            .iter()
            .enumerate()
            .skip(MEM_START)
            .take(count)
            .step_by(2);
        let mut buf = String::new();

        for (i, op) in iter {
            writeln!(buf, "{:04X}: {:02X}{:02X}", i, op, self.cpu.read(i + 1))?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        for y in 0..DISPLAY_HEIGHT {
            for x in 0..DISPLAY_WIDTH {
                if self.cpu.pixel(x, y) {
                    write!(buf, "#")?;
                } else {
                    write!(buf, ".")?;
                }
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_keys(&self) -> Result<String, fmt::Error> {
        let mut buf = String::new();

        if self.cpu.any_key() {
            write!(buf, "keys: ")?;
            for i in 0..KEY_COUNT {
                if self.cpu.key_state(i) {
                    write!(buf, "k{i:x}")?;
                }
            }
        }

        Ok(buf)
    }
}

#[cfg(feature = "op_trace")]
#[inline]
fn op_trace(cpu: &Chip8Cpu, bytes: [u8; 2], op: Op) {
    let instr = crate::ir::Instr {
        addr: cpu.pc(),
        bytes,
        op,
    };
    log::trace!("{:04X}: {:04X} {}", instr.addr, instr.bytecode(), instr.repr());
}

#[cfg(not(feature = "op_trace"))]
#[inline]
fn op_trace(_: &Chip8Cpu, _: [u8; 2], _: Op) {}

#[cfg(test)]
mod test {
    use super::*;

    fn vm_with(bytecode: &[u8]) -> Chip8Vm {
        let mut vm = Chip8Vm::new(Chip8Conf {
            rng_seed: Some(1),
            ..Chip8Conf::default()
        });
        vm.load_bytecode(bytecode).unwrap();
        vm
    }

    #[derive(Default)]
    struct TestDevices {
        keys: Vec<KeyState>,
        frames: usize,
        buzz: Vec<bool>,
    }

    impl Devices for TestDevices {
        fn poll_keys(&mut self) -> KeyState {
            self.keys.get(self.frames).copied().unwrap_or_default()
        }

        fn draw(&mut self, _display: Chip8DisplayBuffer<'_>) {
            self.frames += 1;
        }

        fn buzz(&mut self, state: bool) {
            self.buzz.push(state);
        }
    }

    #[test]
    fn test_set_register_step() {
        let mut vm = vm_with(&[0x6A, 0x05]);

        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.registers[0xA], 5);
        assert_eq!(vm.cpu.pc, MEM_START as Address + 2);
    }

    #[test]
    fn test_clear_screen_step() {
        let mut vm = vm_with(&[0x00, 0xE0]);
        vm.cpu.set_pixel(3, 3, true);

        assert_eq!(vm.step().unwrap(), Flow::Draw);
        assert!(vm.display_buffer().iter().all(|px| !px));
    }

    #[test]
    fn test_call_step() {
        let mut vm = vm_with(&[0x23, 0x00]);

        assert_eq!(vm.step().unwrap(), Flow::Jump);
        assert_eq!(vm.cpu.pc, 0x300);
        assert_eq!(vm.cpu.stack_top(), Some(MEM_START as Address + 2));
    }

    #[test]
    fn test_unimplemented_is_not_fatal() {
        #[rustfmt::skip]
        let mut vm = vm_with(&[
            0xE0, 0x00, // unknown keyboard op
            0x61, 0x07, // LD v1, 7
        ]);

        assert_eq!(vm.step().unwrap(), Flow::Unimplemented { word: 0xE000 });
        assert_eq!(vm.cpu.pc, MEM_START as Address + 2);
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.registers[1], 7);

        assert_eq!(vm.diagnostics().unimplemented, 1);
        assert_eq!(vm.diagnostics().last_unimplemented, Some(0xE000));
        assert_eq!(vm.diagnostics().steps, 2);
    }

    #[test]
    fn test_return_underflow_traps() {
        let mut vm = vm_with(&[0x00, 0xEE]);

        let err = vm.step().unwrap_err();
        assert!(matches!(
            err,
            Chip8Error::Fault(Fault::StackUnderflow { pc: 0x200 })
        ));
        assert_eq!(vm.fault(), Some(Fault::StackUnderflow { pc: 0x200 }));

        // Trapped until reloaded.
        let pc = vm.cpu.pc;
        assert!(vm.step().is_err());
        assert_eq!(vm.cpu.pc, pc);

        vm.load_bytecode(&[0x61, 0x01]).unwrap();
        assert_eq!(vm.fault(), None);
        assert_eq!(vm.step().unwrap(), Flow::Ok);
    }

    #[test]
    fn test_recursive_call_stalls() {
        // 0x200: CALL 0x200
        let mut vm = vm_with(&[0x22, 0x00]);

        for _ in 0..STACK_SIZE {
            assert_eq!(vm.step().unwrap(), Flow::Jump);
        }
        assert_eq!(vm.cpu.stack_depth(), STACK_SIZE);

        assert_eq!(vm.step().unwrap(), Flow::Stall);
        assert_eq!(vm.step().unwrap(), Flow::Stall);
        assert_eq!(vm.cpu.pc, MEM_START as Address);
        assert_eq!(vm.cpu.stack_depth(), STACK_SIZE);
        assert_eq!(vm.diagnostics().stalls, 2);
    }

    #[test]
    fn test_call_return_roundtrip() {
        #[rustfmt::skip]
        let mut vm = vm_with(&[
            0x22, 0x06, // 0x200: CALL 0x206
            0x62, 0x42, // 0x202: LD v2, 0x42
            0x12, 0x04, // 0x204: JP 0x204
            0x61, 0x01, // 0x206: LD v1, 1
            0x00, 0xEE, // 0x208: RET
        ]);

        assert_eq!(vm.run_steps(100).unwrap(), Flow::Halt);
        assert_eq!(vm.cpu.registers[1], 1);
        assert_eq!(vm.cpu.registers[2], 0x42);
        assert_eq!(vm.cpu.pc, 0x204);
        assert_eq!(vm.cpu.stack_depth(), 0);
        assert_eq!(vm.diagnostics().steps, 5);
    }

    #[test]
    fn test_load_rejects_large_program() {
        let mut vm = vm_with(&[0x6A, 0x05]);
        vm.step().unwrap();

        let rom = vec![0xAA; MAX_PROGRAM_SIZE + 1];
        assert!(matches!(
            vm.load_bytecode(&rom),
            Err(Chip8Error::LargeProgram { size, capacity })
                if size == MAX_PROGRAM_SIZE + 1 && capacity == MAX_PROGRAM_SIZE
        ));

        // Machine state is untouched.
        assert_eq!(vm.cpu.registers[0xA], 5);
        assert_eq!(vm.cpu.pc, MEM_START as Address + 2);
        assert_eq!(vm.cpu.ram[MEM_START], 0x6A);

        // Exactly filling memory is fine.
        let rom = vec![0xAA; MAX_PROGRAM_SIZE];
        vm.load_bytecode(&rom).unwrap();
        assert_eq!(vm.cpu.ram[MEM_SIZE - 1], 0xAA);
        assert_eq!(vm.cpu.registers[0xA], 0);
    }

    #[test]
    fn test_load_font() {
        let mut vm = Chip8Vm::new(Chip8Conf::default());
        assert!(matches!(vm.load_font(&[0; 10]), Err(Chip8Error::Font(_))));

        vm.load_font(&[0xFF; FONTSET_DATA_LENGTH]).unwrap();
        assert_eq!(vm.cpu.ram[FONTSET_START as usize], 0xFF);
    }

    /// Fx0A (LD Vx, K)
    ///
    /// Wait for a keypress and release, then store the key value in Vx.
    /// The VM must stall while waiting, and signal the state to the outer executer.
    #[test]
    #[rustfmt::skip]
    fn test_key_wait() {
        let mut vm = vm_with(&[
            0xF1, 0x0A, // LD v1, K
            0x62, 0x42  // LD v2, 0x42  ; sentinal
        ]);

        // machine must stall
        for _ in 0..6 {
            assert_eq!(vm.step().unwrap(), Flow::KeyWait);
            assert_eq!(vm.cpu.pc, MEM_START as Address);
        }

        // key down: value is captured, but the machine waits for release
        vm.set_key(KeyCode::Key5, true);
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);
        assert_eq!(vm.cpu.pc, MEM_START as Address);
        assert_eq!(vm.cpu.registers[1], 0x05);
        assert_eq!(vm.step().unwrap(), Flow::KeyWait);

        // key up: machine will now advance
        vm.set_key(KeyCode::Key5, false);
        assert_eq!(vm.step().unwrap(), Flow::Ok);
        assert_eq!(vm.cpu.pc, MEM_START as Address + 2);
        assert_eq!(vm.cpu.registers[1], 0x05);

        // Ensure the machine is continuing
        vm.step().unwrap();
        assert_eq!(vm.cpu.pc, MEM_START as Address + 4);
        assert_eq!(vm.cpu.registers[2], 0x42); // sentinal
    }

    #[test]
    fn test_draw_collision() {
        // Draw two sprites next to each other.
        // The zero bits of the second draw must not erase
        // the pixels of the first draw
        //
        // draw sprite 1
        // ____####, vf == 0
        //
        // draw sprite 2
        // ####____, vf == 0
        #[rustfmt::skip]
        let mut vm = vm_with(&[
            0xA2, 0x0C, // LD I, 0x20C
            0x60, 0x04, // LD v0, 4
            0x61, 0x00, // LD v1, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0x60, 0x00, // LD v0, 0
            0xD0, 0x11, // DRW v0, v1, 1
            0xF0, 0x00, // sprite: 0b11110000
        ]);

        vm.run_steps(6).unwrap();

        assert!(vm.display_buffer()[0]); // sprite 2
        assert!(vm.display_buffer()[4]); // sprite 1
        assert!(vm.display_buffer()[7]);
        assert!(!vm.display_buffer()[8]);
        assert_eq!(vm.cpu.registers[0xF], 0);
    }

    #[test]
    fn test_run_frame_cadence() {
        // 0x200: ADD v0, 1 ; 0x202: JP 0x200
        let mut vm = vm_with(&[0x70, 0x01, 0x12, 0x00]);
        vm.cpu.delay_timer = 2;
        let mut devices = TestDevices::default();

        let report = vm.run_frame(&mut devices).unwrap();
        assert_eq!(report.steps, DEFAULT_STEPS_PER_FRAME);
        assert!(!report.halted);
        assert_eq!(vm.cpu.registers[0], 5);
        assert_eq!(vm.cpu.delay_timer, 1);
        assert_eq!(devices.frames, 1);

        vm.run_frame(&mut devices).unwrap();
        vm.run_frame(&mut devices).unwrap();
        assert_eq!(vm.cpu.delay_timer, 0);
    }

    #[test]
    fn test_run_frame_keys_and_buzzer() {
        #[rustfmt::skip]
        let mut vm = vm_with(&[
            0xF3, 0x0A, // 0x200: LD v3, K
            0xF3, 0x18, // 0x202: LD ST, v3
            0x12, 0x04, // 0x204: JP 0x204
        ]);
        let mut devices = TestDevices {
            keys: vec![KeyState::empty(), KeyState::empty().with(KeyCode::Key2)],
            ..TestDevices::default()
        };

        let report = vm.run_frame(&mut devices).unwrap();
        assert!(report.key_wait);

        let report = vm.run_frame(&mut devices).unwrap();
        assert!(report.key_wait);
        assert_eq!(vm.cpu.registers[3], 2);

        // Keys released: proceeds and starts the buzzer.
        let report = vm.run_frame(&mut devices).unwrap();
        assert!(report.halted);
        assert!(report.buzzer);
        assert_eq!(vm.cpu.sound_timer, 2);

        // Timer runs down over the next frames.
        vm.run_frame(&mut devices).unwrap();
        let report = vm.run_frame(&mut devices).unwrap();
        assert!(!report.buzzer);
        assert_eq!(devices.buzz, vec![true, false]);
    }

    #[test]
    fn test_random_is_seeded() {
        let rom = [0xC0, 0xFF, 0xC1, 0xFF, 0xC2, 0xFF];
        let mut a = vm_with(&rom);
        let mut b = vm_with(&rom);
        a.run_steps(3).unwrap();
        b.run_steps(3).unwrap();
        assert_eq!(a.cpu.registers, b.cpu.registers);
    }

    #[test]
    fn test_dump_display() {
        let mut vm = vm_with(&[]);
        vm.cpu.set_pixel(0, 0, true);
        let dump = vm.dump_display().unwrap();
        let first = dump.lines().next().unwrap();
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert!(first.starts_with("#."));
        assert_eq!(dump.lines().count(), DISPLAY_HEIGHT);
    }
}
