//! The CHIP-8 instruction set, decoded from two-byte words.
//!
//! Operand naming follows the usual reference material:
//!
//! | Field | Bits | Location               |
//! |-------|------|------------------------|
//! | `x`   | 4    | second nibble          |
//! | `y`   | 4    | third nibble           |
//! | `n`   | 4    | fourth nibble          |
//! | `kk`  | 8    | low byte               |
//! | `nnn` | 12   | low three nibbles      |
use std::fmt;

/// one decoded instruction; register operands are always 0x0-0xf
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// 0nnn - machine code routine on the original hardware; ignored
    Sys(u16),
    /// 00E0
    ClearScreen,
    /// 00EE
    Return,
    /// 1nnn
    Jump(u16),
    /// 2nnn
    Call(u16),
    /// 3xkk
    SkipEqImm { x: usize, kk: u8 },
    /// 4xkk
    SkipNeImm { x: usize, kk: u8 },
    /// 5xy0
    SkipEqReg { x: usize, y: usize },
    /// 6xkk
    LoadImm { x: usize, kk: u8 },
    /// 7xkk
    AddImm { x: usize, kk: u8 },
    /// 8xy0
    Copy { x: usize, y: usize },
    /// 8xy1
    Or { x: usize, y: usize },
    /// 8xy2
    And { x: usize, y: usize },
    /// 8xy3
    Xor { x: usize, y: usize },
    /// 8xy4
    AddReg { x: usize, y: usize },
    /// 8xy5
    Sub { x: usize, y: usize },
    /// 8xy6
    ShiftRight { x: usize },
    /// 8xy7
    SubN { x: usize, y: usize },
    /// 8xyE
    ShiftLeft { x: usize },
    /// 9xy0
    SkipNeReg { x: usize, y: usize },
    /// Annn
    LoadI(u16),
    /// Bnnn
    JumpV0(u16),
    /// Cxkk
    Random { x: usize, kk: u8 },
    /// Dxyn
    Draw { x: usize, y: usize, n: u8 },
    /// Ex9E
    SkipKey { x: usize },
    /// ExA1
    SkipNotKey { x: usize },
    /// Fx07
    LoadDelay { x: usize },
    /// Fx0A
    WaitKey { x: usize },
    /// Fx15
    SetDelay { x: usize },
    /// Fx18
    SetSound { x: usize },
    /// Fx1E
    AddI { x: usize },
    /// Fx29
    LoadFont { x: usize },
    /// Fx33
    StoreBcd { x: usize },
    /// Fx55
    StoreRegs { x: usize },
    /// Fx65
    LoadRegs { x: usize },
}

impl Instruction {
    /// Split a word into its fields and pick the operation. Every top nibble
    /// is a family; `None` means the word's family has no operation for its
    /// sub-opcode.
    pub fn decode(opcode: u16) -> Option<Instruction> {
        use Instruction::*;

        let x = ((opcode & 0x0f00) >> 8) as usize;
        let y = ((opcode & 0x00f0) >> 4) as usize;
        let n = (opcode & 0x000f) as u8;
        let kk = (opcode & 0x00ff) as u8;
        let nnn = opcode & 0x0fff;

        let i = match opcode & 0xf000 {
            0x0000 => match opcode {
                0x00e0 => ClearScreen,
                0x00ee => Return,
                _ => Sys(nnn),
            },
            0x1000 => Jump(nnn),
            0x2000 => Call(nnn),
            0x3000 => SkipEqImm { x, kk },
            0x4000 => SkipNeImm { x, kk },
            // the low nibble of 5xy0 and 9xy0 is never looked at
            0x5000 => SkipEqReg { x, y },
            0x6000 => LoadImm { x, kk },
            0x7000 => AddImm { x, kk },
            0x8000 => match n {
                0x0 => Copy { x, y },
                0x1 => Or { x, y },
                0x2 => And { x, y },
                0x3 => Xor { x, y },
                0x4 => AddReg { x, y },
                0x5 => Sub { x, y },
                0x6 => ShiftRight { x },
                0x7 => SubN { x, y },
                0xe => ShiftLeft { x },
                _ => return None,
            },
            0x9000 => SkipNeReg { x, y },
            0xa000 => LoadI(nnn),
            0xb000 => JumpV0(nnn),
            0xc000 => Random { x, kk },
            0xd000 => Draw { x, y, n },
            0xe000 => match kk {
                0x9e => SkipKey { x },
                0xa1 => SkipNotKey { x },
                _ => return None,
            },
            _ => match kk {
                0x07 => LoadDelay { x },
                0x0a => WaitKey { x },
                0x15 => SetDelay { x },
                0x18 => SetSound { x },
                0x1e => AddI { x },
                0x29 => LoadFont { x },
                0x33 => StoreBcd { x },
                0x55 => StoreRegs { x },
                0x65 => LoadRegs { x },
                _ => return None,
            },
        };
        Some(i)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        match *self {
            Sys(nnn) => write!(f, "SYS {:#05x}", nnn),
            ClearScreen => write!(f, "CLS"),
            Return => write!(f, "RET"),
            Jump(nnn) => write!(f, "JP {:#05x}", nnn),
            Call(nnn) => write!(f, "CALL {:#05x}", nnn),
            SkipEqImm { x, kk } => write!(f, "SE V{:X}, {:#04x}", x, kk),
            SkipNeImm { x, kk } => write!(f, "SNE V{:X}, {:#04x}", x, kk),
            SkipEqReg { x, y } => write!(f, "SE V{:X}, V{:X}", x, y),
            LoadImm { x, kk } => write!(f, "LD V{:X}, {:#04x}", x, kk),
            AddImm { x, kk } => write!(f, "ADD V{:X}, {:#04x}", x, kk),
            Copy { x, y } => write!(f, "LD V{:X}, V{:X}", x, y),
            Or { x, y } => write!(f, "OR V{:X}, V{:X}", x, y),
            And { x, y } => write!(f, "AND V{:X}, V{:X}", x, y),
            Xor { x, y } => write!(f, "XOR V{:X}, V{:X}", x, y),
            AddReg { x, y } => write!(f, "ADD V{:X}, V{:X}", x, y),
            Sub { x, y } => write!(f, "SUB V{:X}, V{:X}", x, y),
            ShiftRight { x } => write!(f, "SHR V{:X}", x),
            SubN { x, y } => write!(f, "SUBN V{:X}, V{:X}", x, y),
            ShiftLeft { x } => write!(f, "SHL V{:X}", x),
            SkipNeReg { x, y } => write!(f, "SNE V{:X}, V{:X}", x, y),
            LoadI(nnn) => write!(f, "LD I, {:#05x}", nnn),
            JumpV0(nnn) => write!(f, "JP V0, {:#05x}", nnn),
            Random { x, kk } => write!(f, "RND V{:X}, {:#04x}", x, kk),
            Draw { x, y, n } => write!(f, "DRW V{:X}, V{:X}, {}", x, y, n),
            SkipKey { x } => write!(f, "SKP V{:X}", x),
            SkipNotKey { x } => write!(f, "SKNP V{:X}", x),
            LoadDelay { x } => write!(f, "LD V{:X}, DT", x),
            WaitKey { x } => write!(f, "LD V{:X}, K", x),
            SetDelay { x } => write!(f, "LD DT, V{:X}", x),
            SetSound { x } => write!(f, "LD ST, V{:X}", x),
            AddI { x } => write!(f, "ADD I, V{:X}", x),
            LoadFont { x } => write!(f, "LD F, V{:X}", x),
            StoreBcd { x } => write!(f, "LD B, V{:X}", x),
            StoreRegs { x } => write!(f, "LD [I], V{:X}", x),
            LoadRegs { x } => write!(f, "LD V{:X}, [I]", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Instruction::*;
    use super::*;

    #[test]
    fn test_decode_control() {
        assert_eq!(Instruction::decode(0x00e0), Some(ClearScreen));
        assert_eq!(Instruction::decode(0x00ee), Some(Return));
        assert_eq!(Instruction::decode(0x0123), Some(Sys(0x123)));
        assert_eq!(Instruction::decode(0x1204), Some(Jump(0x204)));
        assert_eq!(Instruction::decode(0x2300), Some(Call(0x300)));
        assert_eq!(Instruction::decode(0xb210), Some(JumpV0(0x210)));
    }

    #[test]
    fn test_decode_operands() {
        assert_eq!(Instruction::decode(0x3a42), Some(SkipEqImm { x: 0xa, kk: 0x42 }));
        assert_eq!(Instruction::decode(0x8ab4), Some(AddReg { x: 0xa, y: 0xb }));
        assert_eq!(Instruction::decode(0xd125), Some(Draw { x: 1, y: 2, n: 5 }));
        assert_eq!(Instruction::decode(0xf00a), Some(WaitKey { x: 0 }));
        assert_eq!(Instruction::decode(0xfe65), Some(LoadRegs { x: 0xe }));
    }

    #[test]
    fn test_decode_ignores_low_nibble_of_register_compares() {
        assert_eq!(Instruction::decode(0x5127), Some(SkipEqReg { x: 1, y: 2 }));
        assert_eq!(Instruction::decode(0x912f), Some(SkipNeReg { x: 1, y: 2 }));
    }

    #[test]
    fn test_decode_unknown() {
        for op in [0x8008, 0x800f, 0xe000, 0xe19f, 0xf000, 0xf0ff] {
            assert_eq!(Instruction::decode(op), None, "{:#06x}", op);
        }
    }

    #[test]
    fn test_every_family_decodes() {
        let defined = (0..=0xffffu16)
            .filter(|op| Instruction::decode(*op).is_some())
            .count();
        // 0/1/2/3/4/5/6/7/9/A/B/C/D fully populated; 8 has 9 sub-ops over
        // every x and y, E has 2 and F has 9 over every x
        assert_eq!(defined, 13 * 0x1000 + 9 * 0x100 + (2 + 9) * 0x10);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Jump(0x204).to_string(), "JP 0x204");
        assert_eq!(Draw { x: 0, y: 1, n: 5 }.to_string(), "DRW V0, V1, 5");
        assert_eq!(StoreRegs { x: 0xf }.to_string(), "LD [I], VF");
    }
}
