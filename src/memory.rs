use crate::error::Error;
use log::debug;
use std::io;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the machine's addressable memory. Every address is masked to
/// 12 bits first, so nothing can index outside the 4K array.
pub trait MemoryMap {
    /// write unknown len of data into memory at a particular address
    fn write_any(&mut self, reader: &mut impl io::Read, addr: u16) -> Result<usize, Error> {
        let mut buf = Vec::new();
        let len = reader.read_to_end(&mut buf)?;
        self.write(&buf, addr)?;
        Ok(len)
    }

    /// write a chunk of bytes into "RAM"; fails rather than wrapping when the
    /// chunk would run off the end
    fn write(&mut self, data: &[u8], addr: u16) -> Result<(), Error> {
        let a = mask(addr) as usize;
        let max = CHIP8_RAM_SIZE_BYTES - a;
        if data.len() > max {
            return Err(Error::ProgramTooLarge {
                len: data.len(),
                max,
            });
        }
        self.get_rw_slice(addr, data.len()).copy_from_slice(data);
        Ok(())
    }

    /// get one byte
    fn read_byte(&self, addr: u16) -> u8 {
        self.get_ro_slice(addr, 1)[0]
    }

    /// set one byte
    fn write_byte(&mut self, addr: u16, value: u8) {
        self.get_rw_slice(addr, 1)[0] = value;
    }

    /// get a big-endian two-byte word (an instruction); the second byte wraps
    /// round to 0x000 when the first sits at the top of memory
    fn get_word(&self, addr: u16) -> u16 {
        let hi = self.read_byte(addr) as u16;
        let lo = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// get a r/w slice of the underlying memory
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8];

    /// get a r/o slice of the underlying memory
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8];
}

/// keep an address inside the 4K space
pub fn mask(addr: u16) -> u16 {
    addr & ADDR_MASK
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

const ADDR_MASK: u16 = 0x0fff;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// largest program image that fits between 0x200 and the top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// where the built-in hex font lives; glyph g starts at g * 5
pub const CHIP8_FONT_ADDR: u16 = 0x000;

/// bytes per font glyph
pub const CHIP8_FONT_GLYPH_BYTES: u16 = 5;

/// The CHIP-8 memory map:
///   0x0000-0x01ff  interpreter (font at 0x000-0x04f)
///   0x0200-0x0fff  program
pub struct Memory {
    bytes: Box<[u8]>,
}

impl MemoryMap for Memory {
    fn get_rw_slice(&mut self, addr: u16, len: usize) -> &mut [u8] {
        let a = mask(addr) as usize;
        &mut self.bytes[a..(a + len)]
    }
    fn get_ro_slice(&self, addr: u16, len: usize) -> &[u8] {
        let a = mask(addr) as usize;
        &self.bytes[a..(a + len)]
    }
}

impl Memory {
    /// zeroed RAM with the font baked in
    pub fn new() -> Self {
        let mut bytes = vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice();
        let font = CHIP8_FONT_ADDR as usize;
        bytes[font..font + CHIP8_FONT.len()].copy_from_slice(&CHIP8_FONT);
        Memory { bytes }
    }

    /// load a CHIP-8 program at 0x200, returning its length
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, Error> {
        let len = self.write_any(reader, CHIP8_PROGRAM_ADDR)?;
        debug!("loaded {} byte program at {:#05x}", len, CHIP8_PROGRAM_ADDR);
        Ok(len)
    }

    /// the whole 4K, mostly for inspection
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

pub const CHIP8_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
