use crate::error::Error;
use crate::memory::{mask, Memory, MemoryMap, CHIP8_PROGRAM_ADDR};
use log::debug;
use std::io;

/// index of the flag register, VF
pub const VF: usize = 0xf;

/// Everything a running CHIP-8 program can see or change, in one place. The
/// interpreter borrows it exclusively for each step; the emulator owns it.
pub struct Machine {
    pub memory: Memory,
    /// V0-VF
    pub v: [u8; 16],
    /// the address register
    pub i: u16,
    pub pc: u16,
    /// return addresses; grows on CALL, shrinks on RET
    pub stack: Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    /// register still waiting for a key press (Fx0A); while set the machine
    /// is paused
    pub pending_key: Option<usize>,
    /// instructions executed so far
    pub cycles: u64,
}

impl Machine {
    /// a freshly powered-on machine: font in, everything else zeroed, pc at 0x200
    pub fn new() -> Self {
        Machine {
            memory: Memory::new(),
            v: [0; 16],
            i: 0,
            pc: CHIP8_PROGRAM_ADDR,
            stack: Vec::new(),
            delay_timer: 0,
            sound_timer: 0,
            pending_key: None,
            cycles: 0,
        }
    }

    /// load a chip8 program image at 0x200
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, Error> {
        self.memory.load_program(reader)
    }

    /// ditto, from bytes already in hand
    pub fn load_bytes(&mut self, image: &[u8]) -> Result<usize, Error> {
        self.memory.write(image, CHIP8_PROGRAM_ADDR)?;
        debug!("loaded {} byte program at {:#05x}", image.len(), CHIP8_PROGRAM_ADDR);
        Ok(image.len())
    }

    /// the word at pc
    pub fn fetch(&self) -> u16 {
        self.memory.get_word(self.pc)
    }

    /// hop over the next instruction when `cond` holds
    pub fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = mask(self.pc.wrapping_add(2));
        }
    }

    /// waiting on Fx0A
    pub fn is_paused(&self) -> bool {
        self.pending_key.is_some()
    }

    /// Deliver a key press. If a register is waiting for one it gets the key
    /// and the machine carries on; otherwise the press is ignored. Returns
    /// whether the press was consumed.
    pub fn key_pressed(&mut self, key: u8) -> bool {
        match self.pending_key.take() {
            Some(x) => {
                debug!("key {:x} resumes execution into V{:X}", key, x);
                self.v[x] = key & 0x0f;
                true
            }
            None => false,
        }
    }

    /// count both timers down by one, stopping at zero
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    /// the tone plays for as long as the sound timer is running
    pub fn is_sound_active(&self) -> bool {
        self.sound_timer > 0
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
