use orca::{constants::*, prelude::*};

const MAZE: &[u8] = include_bytes!("../programs/maze");

fn maze_vm(seed: u64) -> Chip8Vm {
    let mut vm = Chip8Vm::new(Chip8Conf {
        rng_seed: Some(seed),
        ..Chip8Conf::default()
    });
    vm.load_bytecode(MAZE).unwrap();
    vm
}

#[test]
fn test_maze_runs_to_halt() {
    let mut vm = maze_vm(7);

    assert_eq!(vm.run_steps(10_000).unwrap(), Flow::Halt);
    assert_eq!(vm.cpu().pc(), 0x21C);
    assert_eq!(vm.diagnostics().unimplemented, 0);

    // 16 columns by 8 rows of 4 pixel diagonals, none overlapping.
    let lit = vm.display_buffer().iter().filter(|px| **px).count();
    assert_eq!(lit, 16 * 8 * 4);
    assert_eq!(vm.cpu().register(0xF), 0);
    assert_eq!(vm.cpu().register(0x1), DISPLAY_HEIGHT as u8);

    // Halted programs keep spinning in place.
    assert_eq!(vm.step().unwrap(), Flow::Halt);
    assert_eq!(vm.cpu().pc(), 0x21C);
}

#[test]
fn test_maze_is_reproducible() {
    let mut a = maze_vm(42);
    let mut b = maze_vm(42);
    a.run_steps(10_000).unwrap();
    b.run_steps(10_000).unwrap();

    assert_eq!(a.display_buffer(), b.display_buffer());
    assert_eq!(a.dump_display().unwrap(), b.dump_display().unwrap());
}

#[derive(Default)]
struct Headless {
    frames: usize,
    lit: usize,
}

impl Devices for Headless {
    fn poll_keys(&mut self) -> KeyState {
        KeyState::empty()
    }

    fn draw(&mut self, display: Chip8DisplayBuffer<'_>) {
        self.frames += 1;
        self.lit = display.iter().filter(|px| **px).count();
    }

    fn buzz(&mut self, _state: bool) {}
}

#[test]
fn test_maze_frames() {
    let mut vm = maze_vm(3);
    let mut devices = Headless::default();

    let mut halted_at = None;
    for frame in 0..1000 {
        let report = vm.run_frame(&mut devices).unwrap();
        assert_eq!(report.steps, DEFAULT_STEPS_PER_FRAME);
        if report.halted {
            halted_at = Some(frame);
            break;
        }
    }

    assert!(halted_at.is_some());
    assert_eq!(devices.frames, halted_at.unwrap() + 1);
    assert_eq!(devices.lit, 16 * 8 * 4);
}

#[test]
fn test_maze_disassembly() {
    let mut buf = String::new();
    Disassembler::new(MAZE).disassemble(&mut buf).unwrap();

    let lines: Vec<&str> = buf.lines().collect();
    assert_eq!(lines.len(), MAZE.len() / 2);
    assert_eq!(lines[0], "0200: 6000  LD v0, 0");
    assert_eq!(lines[3], "0206: C201  RND v2, 1");
    assert_eq!(lines[6], "020C: D014  DRW v0, v1, 4");
    assert_eq!(lines[14], "021C: 121C  JP 0x21C");
}
