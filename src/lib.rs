//! A CHIP-8 virtual machine.
//!
//! ## Design
//!
//! * 4K of memory with the hex font at 0x000 and programs loaded at 0x200
//! * instructions decode into an `Instruction` variant, then a single match
//!   carries each one out against the `Machine` state
//! * the screen is a 64x32 grid of XOR-ed pixels, presented through a
//!   `Display` so a variety of screens would work; a TUI one in-console to
//!   start with
//! * keys come in through a `Keypad`, beeps go out through a `Sound`
//! * the emulator ticks at a fixed rate (60Hz by default), running a batch of
//!   instructions per tick, then the timers, the tone and a frame
//!
//! Model
//!
//! ```text
//! Emulator(config, display, keypad, sound)
//!  |-- Machine: memory, V0-VF, I, pc, stack, timers, pending key
//!  |-- FrameBuffer
//!  |-- Interpreter: step() = fetch, decode, execute
//!  `-- main loop
//!       |-- wait for the tick interval to pass
//!       |-- steps_per_tick x step()
//!       |-- tick timers (not while waiting for a key)
//!       |-- sound on while the sound timer runs
//!       `-- draw the frame
//! ```
//!
//! ```
//! use chip8_vm::display::DummyDisplay;
//! use chip8_vm::emulator::{Config, Emulator};
//! use chip8_vm::input::DummyKeypad;
//! use chip8_vm::sound::Mute;
//!
//! let mut display = DummyDisplay::new();
//! let mut keypad = DummyKeypad::new(&[]);
//! let mut sound = Mute::new();
//! let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
//! emu.load_bytes(&[0x00, 0xe0, 0x12, 0x02]).unwrap(); // CLS; JP 0x202
//! emu.tick().unwrap();
//! assert_eq!(emu.machine().pc, 0x202);
//! ```
pub mod display;
pub mod emulator;
pub mod error;
pub mod input;
pub mod instruction;
pub mod interpreter;
pub mod machine;
pub mod memory;
pub mod sound;

pub use error::{Error, MachineError};
