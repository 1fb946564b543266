use std::io;
use thiserror::Error;

/// Fatal failures raised while executing a program. Either one ends the
/// session; the program counter is left on the offending instruction.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    #[error("unknown opcode {opcode:#06x} at {addr:#05x}")]
    Decode { opcode: u16, addr: u16 },

    #[error("return with an empty call stack at {addr:#05x}")]
    StackUnderflow { addr: u16 },
}

/// Everything else that can go wrong around the machine: loading an image,
/// talking to the terminal, making noises.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error("program image is {len} bytes but only {max} fit in memory")]
    ProgramTooLarge { len: usize, max: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("sound device error: {0}")]
    Sound(String),
}
