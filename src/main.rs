use clap::Parser;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use chip8_vm::display::{MonoTermDisplay, CHIP8_COLS, CHIP8_ROWS, MAX_SCALE};
use chip8_vm::emulator::{Config, Emulator};
use chip8_vm::input::TermKeypad;
use chip8_vm::sound::{Mute, SimpleBeep, Sound};

#[derive(Parser, Debug)]
#[command(name = "chip8-vm")]
#[command(about = "CHIP-8 virtual machine in the terminal", long_about = None)]
struct Args {
    /// Program image to load at 0x200
    rom: PathBuf,

    /// Ticks per second (timer and frame rate)
    #[arg(long, default_value_t = 60)]
    hz: u32,

    /// Instructions executed per tick
    #[arg(long, default_value_t = 10)]
    steps: usize,

    /// Terminal cells per pixel (1-8)
    #[arg(long, default_value_t = 1)]
    scale: usize,

    /// Tone pitch in Hz
    #[arg(long, default_value_t = 440)]
    tone: u16,

    /// Don't beep
    #[arg(long)]
    mute: bool,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// Leave 8xyE's VF as the raw high bit (0x80) instead of 1
    #[arg(long)]
    raw_shift_flag: bool,

    /// Stop on words that name no operation instead of skipping them
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = Config {
        tick_rate: args.hz,
        steps_per_tick: args.steps,
        tone_hz: args.tone,
        scale: args.scale.clamp(1, MAX_SCALE),
        shift_left_raw_flag: args.raw_shift_flag,
        strict_decode: args.strict,
        seed: args.seed,
    };

    // open the rom before the terminal goes into raw mode
    let mut f = File::open(&args.rom)?;

    // initialise
    let mut display = MonoTermDisplay::new(CHIP8_COLS, CHIP8_ROWS, config.scale)?;
    let mut keypad = TermKeypad::new()?;
    let mut sound: Box<dyn Sound> = if args.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let mut emulator = Emulator::new(config, &mut display, &mut keypad, sound.as_mut());

    // load a program
    emulator.load_program(&mut f)?;
    emulator.run(args.ticks)?;
    Ok(())
}
