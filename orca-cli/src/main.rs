//! Entrypoint for CLI
use std::{env, error::Error, fs, time::Instant};

use log::{error, info, warn};
use orca::prelude::*;

mod clock;
mod config;
mod devices;
mod error;

use self::{clock::Clock, config::Config, devices::Headless, error::AppError};

static USAGE: &str = r#"
usage: orca CMD ROM [CONFIG]

commands:
    run     Run the target ROM file headless, optionally with a YAML config
    dis     Disassemble the target ROM into readable assembly

examples:
    orca run maze.ch8
    orca run breakout.ch8 breakout.yaml
    orca dis maze.ch8

environment:
    RUST_LOG    log level, e.g. RUST_LOG=debug
"#;

fn run_bytecode(filepath: &str, config: Option<&str>) -> Result<(), AppError> {
    let config = match config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    let bytecode = fs::read(filepath)?;

    let mut vm = Chip8Vm::new(config.vm.clone());
    vm.load_bytecode(bytecode.as_slice())?;
    info!("running {filepath}, {} bytes", bytecode.len());

    let mut devices = Headless::new(config.keys.clone());
    let mut clock = Clock::new(config.frame_rate);

    let start = Instant::now();
    let result = run_frames(&mut vm, &mut devices, &mut clock, &config);
    let elapsed = start.elapsed();

    info!(
        "{} frames in {}ms",
        devices.frames(),
        elapsed.as_nanos() as f64 / 1_000_000.0
    );
    let diagnostics = vm.diagnostics();
    if diagnostics.unimplemented > 0 {
        warn!(
            "{} unimplemented instructions, last 0x{:04X}",
            diagnostics.unimplemented,
            diagnostics.last_unimplemented.unwrap_or_default()
        );
    }
    if diagnostics.stalls > 0 {
        warn!("{} cycles stalled on a full call stack", diagnostics.stalls);
    }

    println!("{}", vm.dump_display()?);
    if devices.is_buzzing() {
        println!("buzzer on");
    }
    let keys = vm.dump_keys()?;
    if !keys.is_empty() {
        println!("{keys}");
    }

    result
}

fn run_frames(
    vm: &mut Chip8Vm,
    devices: &mut Headless,
    clock: &mut Clock,
    config: &Config,
) -> Result<(), AppError> {
    clock.reset();

    loop {
        if let Some(max_frames) = config.max_frames {
            if devices.frames() >= max_frames {
                info!("frame limit reached");
                return Ok(());
            }
        }

        let report = vm.run_frame(devices)?;
        if report.halted {
            info!("program halted at 0x{:03X}", vm.cpu().pc());
            return Ok(());
        }

        if config.throttle {
            clock.wait();
        }
    }
}

fn run_disassembler(filepath: &str) -> Result<(), AppError> {
    let bytecode = fs::read(filepath)?;
    Disassembler::new(bytecode.as_slice()).print_bytecode()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new().env().init()?;

    let result = match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_bytecode(&filepath, config.as_deref()),
        Some(Cmd::Dis { filepath }) => run_disassembler(&filepath),
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        return Err(err.into());
    }

    Ok(())
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    match args.next() {
        Some(cmd) => {
            // don't format me T.T
            match cmd.as_str() {
                "run" => Some(Cmd::Run {
                    filepath: consume_arg(&mut args)?,
                    config: consume_arg(&mut args),
                }),
                "dis" => Some(Cmd::Dis {
                    filepath: consume_arg(&mut args)?,
                }),
                _ => None,
            }
        }
        None => None,
    }
}

/// Consumes the next argument, if any.
fn consume_arg(args: &mut impl Iterator<Item = String>) -> Option<String> {
    args.next()
}

fn print_usage() {
    println!("orca v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Disassemble file
    Dis { filepath: String },
}
