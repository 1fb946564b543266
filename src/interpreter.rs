//! # interpreter
//!
//! Fetch, decode and execute, one instruction per `step()`. The interpreter
//! owns nothing but its random source and quirk settings; the machine state,
//! frame buffer and key state are lent to it for each step.
//!
//! Instructions are two bytes wide and the program counter moves past the
//! current one before it runs, so jumps, calls and returns simply overwrite
//! it and skips add another 2.
use crate::display::FrameBuffer;
use crate::error::MachineError;
use crate::input::KeyState;
use crate::instruction::Instruction;
use crate::machine::{Machine, VF};
use crate::memory::{mask, MemoryMap, CHIP8_FONT_ADDR, CHIP8_FONT_GLYPH_BYTES};
use log::{debug, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct Interpreter<R: Rng = StdRng> {
    rng: R,
    /// 8xyE leaves VF holding the masked high bit (0x80) rather than 1
    shift_left_raw_flag: bool,
    /// stop on words that name no operation instead of stepping over them
    strict_decode: bool,
}

impl Interpreter<StdRng> {
    /// seeded runs are repeatable; otherwise seed from the OS
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Interpreter::with_rng(rng)
    }
}

impl<R: Rng> Interpreter<R> {
    pub fn with_rng(rng: R) -> Self {
        Interpreter {
            rng,
            shift_left_raw_flag: false,
            strict_decode: false,
        }
    }

    pub fn shift_left_raw_flag(mut self, raw: bool) -> Self {
        self.shift_left_raw_flag = raw;
        self
    }

    pub fn strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    /// Run the instruction at pc, unless the machine is waiting for a key in
    /// which case do nothing at all. A word with no operation in its family
    /// (8xy8, E000, F0FF, ...) is stepped over, or in strict mode is a decode
    /// failure. On error pc still points at the instruction that failed.
    pub fn step(
        &mut self,
        m: &mut Machine,
        display: &mut FrameBuffer,
        keys: &KeyState,
    ) -> Result<(), MachineError> {
        if m.is_paused() {
            return Ok(());
        }

        let addr = m.pc;
        let opcode = m.fetch();
        let decoded = Instruction::decode(opcode);
        if decoded.is_none() && self.strict_decode {
            return Err(MachineError::Decode { opcode, addr });
        }

        m.pc = mask(addr.wrapping_add(2));
        match decoded {
            Some(instruction) => {
                trace!("{:#05x}: {:04x}  {}", addr, opcode, instruction);
                if let Err(e) = self.execute(instruction, addr, m, display, keys) {
                    m.pc = addr;
                    return Err(e);
                }
            }
            None => warn!("{:#05x}: {:04x} is not an instruction, skipped", addr, opcode),
        }
        m.cycles += 1;
        Ok(())
    }

    /// carry out one decoded instruction, pc already advanced past it
    pub fn execute(
        &mut self,
        instruction: Instruction,
        addr: u16,
        m: &mut Machine,
        display: &mut FrameBuffer,
        keys: &KeyState,
    ) -> Result<(), MachineError> {
        use Instruction::*;

        match instruction {
            Sys(_) => {}
            ClearScreen => display.clear(),
            Return => {
                m.pc = m.stack.pop().ok_or(MachineError::StackUnderflow { addr })?;
            }
            Jump(nnn) => m.pc = nnn,
            Call(nnn) => {
                m.stack.push(m.pc);
                m.pc = nnn;
            }
            JumpV0(nnn) => m.pc = mask(nnn + m.v[0] as u16),

            SkipEqImm { x, kk } => m.skip_if(m.v[x] == kk),
            SkipNeImm { x, kk } => m.skip_if(m.v[x] != kk),
            SkipEqReg { x, y } => m.skip_if(m.v[x] == m.v[y]),
            SkipNeReg { x, y } => m.skip_if(m.v[x] != m.v[y]),

            LoadImm { x, kk } => m.v[x] = kk,
            AddImm { x, kk } => m.v[x] = m.v[x].wrapping_add(kk),
            Copy { x, y } => m.v[x] = m.v[y],
            Or { x, y } => m.v[x] |= m.v[y],
            And { x, y } => m.v[x] &= m.v[y],
            Xor { x, y } => m.v[x] ^= m.v[y],

            // flag writes come last, so VF as a destination ends up holding the flag
            AddReg { x, y } => {
                let (sum, carry) = m.v[x].overflowing_add(m.v[y]);
                m.v[x] = sum;
                m.v[VF] = carry as u8;
            }
            Sub { x, y } => {
                let (vx, vy) = (m.v[x], m.v[y]);
                m.v[x] = vx.wrapping_sub(vy);
                m.v[VF] = (vx > vy) as u8;
            }
            SubN { x, y } => {
                let (vx, vy) = (m.v[x], m.v[y]);
                m.v[x] = vy.wrapping_sub(vx);
                m.v[VF] = (vy > vx) as u8;
            }
            ShiftRight { x } => {
                let vx = m.v[x];
                m.v[x] = vx >> 1;
                m.v[VF] = vx & 0x01;
            }
            ShiftLeft { x } => {
                let vx = m.v[x];
                m.v[x] = vx << 1;
                m.v[VF] = if self.shift_left_raw_flag {
                    vx & 0x80
                } else {
                    vx >> 7
                };
            }

            LoadI(nnn) => m.i = nnn,
            AddI { x } => m.i = m.i.wrapping_add(m.v[x] as u16),
            LoadFont { x } => m.i = CHIP8_FONT_ADDR + m.v[x] as u16 * CHIP8_FONT_GLYPH_BYTES,
            Random { x, kk } => m.v[x] = self.rng.random::<u8>() & kk,

            Draw { x, y, n } => draw_sprite(m, display, x, y, n),

            SkipKey { x } => m.skip_if(is_pressed(keys, m.v[x])),
            SkipNotKey { x } => m.skip_if(!is_pressed(keys, m.v[x])),

            LoadDelay { x } => m.v[x] = m.delay_timer,
            WaitKey { x } => {
                debug!("waiting for a key press into V{:X}", x);
                m.pending_key = Some(x);
            }
            SetDelay { x } => m.delay_timer = m.v[x],
            SetSound { x } => m.sound_timer = m.v[x],

            StoreBcd { x } => {
                let vx = m.v[x];
                m.memory.write_byte(m.i, vx / 100);
                m.memory.write_byte(m.i.wrapping_add(1), (vx % 100) / 10);
                m.memory.write_byte(m.i.wrapping_add(2), vx % 10);
            }
            StoreRegs { x } => {
                for r in 0..=x {
                    m.memory.write_byte(m.i.wrapping_add(r as u16), m.v[r]);
                }
            }
            LoadRegs { x } => {
                for r in 0..=x {
                    m.v[r] = m.memory.read_byte(m.i.wrapping_add(r as u16));
                }
            }
        }
        Ok(())
    }
}

/// key values past 0xf are never down
fn is_pressed(keys: &KeyState, key: u8) -> bool {
    keys.get(key as usize).copied().unwrap_or(false)
}

/// XOR an 8 pixel wide, n row sprite from memory at I onto the screen at
/// (Vx, Vy). VF ends up 1 if any lit pixel got turned off.
fn draw_sprite(m: &mut Machine, display: &mut FrameBuffer, x: usize, y: usize, n: u8) {
    let (vx, vy) = (m.v[x] as i32, m.v[y] as i32);
    m.v[VF] = 0;
    for row in 0..n {
        let sprite = m.memory.read_byte(m.i.wrapping_add(row as u16));
        for col in 0..8 {
            if sprite & (0x80 >> col) != 0 && display.set_pixel(vx + col, vy + row as i32) {
                m.v[VF] = 1;
            }
        }
    }
}
