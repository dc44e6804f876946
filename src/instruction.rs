// Copyright 2018 Ian Johnson

// This file is part of Chip-8.

// Chip-8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8.  If not, see <http://www.gnu.org/licenses/>.

//! Chip-8 instructions and opcodes.
//!
//! This module provides the translation of raw 16-bit opcodes into the
//! internal `Instruction` type.  Decoding happens once per fetched word, and
//! the result is a closed enumeration that the CPU matches exhaustively, so
//! every supported form is visible in one place.

use std::fmt;

use num::FromPrimitive;

/// An error resulting from an opcode that matches none of the supported
/// forms.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "unknown opcode: {}", _0)]
pub struct UnknownOpcodeError(pub Opcode);

/// An error resulting from the legacy `SYS addr` (`0nnn`) instruction, which
/// would call a native machine-code routine and is not supported.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "unknown opcode: {} (machine code routines are not supported)", _0)]
pub struct UnsupportedSysCallError(pub Opcode);

enum_from_primitive! {
/// A Chip-8 register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Register {
    V0 = 0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
}

impl Register {
    /// Returns the register whose index is the lowest four bits of the given
    /// value.
    pub fn from_nibble(n: u16) -> Register {
        // Masking to four bits makes the lookup total.
        Register::from_u16(n & 0xF).unwrap()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", *self)
    }
}

/// A Chip-8 opcode.
///
/// Having this as a wrapper around an ordinary `u16` allows for some nice
/// helper methods to be implemented, which make decoding opcodes much easier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Builds an opcode from its big-endian byte pair.
    pub fn from_bytes(high: u8, low: u8) -> Opcode {
        Opcode((high as u16) << 8 | low as u16)
    }

    /// Returns the top nibble, which selects the instruction family.
    fn family(&self) -> u8 {
        (self.0 >> 12) as u8
    }

    /// Returns the `Vx` register corresponding to this opcode.
    ///
    /// This does not guarantee that the result is actually meaningful.
    fn vx(&self) -> Register {
        Register::from_nibble(self.0 >> 8)
    }

    /// Returns the `Vy` register corresponding to this opcode.
    ///
    /// This does not guarantee that the result is actually meaningful.
    fn vy(&self) -> Register {
        Register::from_nibble(self.0 >> 4)
    }

    /// Returns the lowest nibble of this opcode.
    fn nibble(&self) -> u8 {
        self.0 as u8 & 0xF
    }

    /// Returns the low byte of this opcode.
    fn byte(&self) -> u8 {
        self.0 as u8
    }

    /// Returns the 12-bit address field of this opcode.
    fn addr(&self) -> u16 {
        self.0 & 0xFFF
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:04X}", self.0)
    }
}

/// A Chip-8 instruction.
///
/// Every variant corresponds to exactly one opcode form; the legacy `SYS`
/// form is the only one of the 35 classic forms without a variant, because
/// decoding it always fails.
///
/// # Examples
///
/// ```
/// use chip8vm::{Instruction, Opcode, Register};
///
/// let instr = Instruction::from_opcode(Opcode(0x7510)).unwrap();
/// assert_eq!(instr, Instruction::AddByte(Register::V5, 0x10));
/// ```
///
/// Machine code routines are rejected:
///
/// ```
/// use chip8vm::{Instruction, Opcode};
///
/// assert!(Instruction::from_opcode(Opcode(0x0123)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// `CLS` (`00E0`).
    Cls,
    /// `RET` (`00EE`).
    Ret,
    /// `JP addr` (`1nnn`).
    Jp(u16),
    /// `CALL addr` (`2nnn`).
    Call(u16),
    /// `SE Vx, byte` (`3xkk`).
    SeByte(Register, u8),
    /// `SNE Vx, byte` (`4xkk`).
    SneByte(Register, u8),
    /// `SE Vx, Vy` (`5xy0`).
    SeReg(Register, Register),
    /// `LD Vx, byte` (`6xkk`).
    LdByte(Register, u8),
    /// `ADD Vx, byte` (`7xkk`).
    AddByte(Register, u8),
    /// `LD Vx, Vy` (`8xy0`).
    LdReg(Register, Register),
    /// `OR Vx, Vy` (`8xy1`).
    Or(Register, Register),
    /// `AND Vx, Vy` (`8xy2`).
    And(Register, Register),
    /// `XOR Vx, Vy` (`8xy3`).
    Xor(Register, Register),
    /// `ADD Vx, Vy` (`8xy4`).
    AddReg(Register, Register),
    /// `SUB Vx, Vy` (`8xy5`).
    Sub(Register, Register),
    /// `SHR Vx` (`8xy6`, `y` is ignored).
    Shr(Register),
    /// `SUBN Vx, Vy` (`8xy7`).
    Subn(Register, Register),
    /// `SHL Vx` (`8xyE`, `y` is ignored).
    Shl(Register),
    /// `SNE Vx, Vy` (`9xy0`).
    SneReg(Register, Register),
    /// `LD I, addr` (`Annn`).
    LdI(u16),
    /// `JP V0, addr` (`Bnnn`).
    JpV0(u16),
    /// `RND Vx, byte` (`Cxkk`).
    Rnd(Register, u8),
    /// `DRW Vx, Vy, nibble` (`Dxyn`).
    Drw(Register, Register, u8),
    /// `SKP Vx` (`Ex9E`).
    Skp(Register),
    /// `SKNP Vx` (`ExA1`).
    Sknp(Register),
    /// `LD Vx, DT` (`Fx07`).
    LdRegDt(Register),
    /// `LD Vx, K` (`Fx0A`).
    LdKey(Register),
    /// `LD DT, Vx` (`Fx15`).
    LdDtReg(Register),
    /// `LD ST, Vx` (`Fx18`).
    LdSt(Register),
    /// `ADD I, Vx` (`Fx1E`).
    AddI(Register),
    /// `LD F, Vx` (`Fx29`).
    LdF(Register),
    /// `LD B, Vx` (`Fx33`).
    LdB(Register),
    /// `LD [I], Vx` (`Fx55`).
    LdDerefIReg(Register),
    /// `LD Vx, [I]` (`Fx65`).
    LdRegDerefI(Register),
}

impl Instruction {
    /// Returns the instruction corresponding to the given opcode.
    pub fn from_opcode(opcode: Opcode) -> Result<Self, ::failure::Error> {
        use self::Instruction::*;

        Ok(match opcode.family() {
            0x0 => match opcode.0 {
                0x00E0 => Cls,
                0x00EE => Ret,
                _ => Err(UnsupportedSysCallError(opcode))?,
            },
            0x1 => Jp(opcode.addr()),
            0x2 => Call(opcode.addr()),
            0x3 => SeByte(opcode.vx(), opcode.byte()),
            0x4 => SneByte(opcode.vx(), opcode.byte()),
            0x5 => if opcode.nibble() == 0 {
                SeReg(opcode.vx(), opcode.vy())
            } else {
                Err(UnknownOpcodeError(opcode))?
            },
            0x6 => LdByte(opcode.vx(), opcode.byte()),
            0x7 => AddByte(opcode.vx(), opcode.byte()),
            0x8 => match opcode.nibble() {
                0x0 => LdReg(opcode.vx(), opcode.vy()),
                0x1 => Or(opcode.vx(), opcode.vy()),
                0x2 => And(opcode.vx(), opcode.vy()),
                0x3 => Xor(opcode.vx(), opcode.vy()),
                0x4 => AddReg(opcode.vx(), opcode.vy()),
                0x5 => Sub(opcode.vx(), opcode.vy()),
                0x6 => Shr(opcode.vx()),
                0x7 => Subn(opcode.vx(), opcode.vy()),
                0xE => Shl(opcode.vx()),
                _ => Err(UnknownOpcodeError(opcode))?,
            },
            0x9 => if opcode.nibble() == 0 {
                SneReg(opcode.vx(), opcode.vy())
            } else {
                Err(UnknownOpcodeError(opcode))?
            },
            0xA => LdI(opcode.addr()),
            0xB => JpV0(opcode.addr()),
            0xC => Rnd(opcode.vx(), opcode.byte()),
            0xD => Drw(opcode.vx(), opcode.vy(), opcode.nibble()),
            0xE => match opcode.byte() {
                0x9E => Skp(opcode.vx()),
                0xA1 => Sknp(opcode.vx()),
                _ => Err(UnknownOpcodeError(opcode))?,
            },
            0xF => match opcode.byte() {
                0x07 => LdRegDt(opcode.vx()),
                0x0A => LdKey(opcode.vx()),
                0x15 => LdDtReg(opcode.vx()),
                0x18 => LdSt(opcode.vx()),
                0x1E => AddI(opcode.vx()),
                0x29 => LdF(opcode.vx()),
                0x33 => LdB(opcode.vx()),
                0x55 => LdDerefIReg(opcode.vx()),
                0x65 => LdRegDerefI(opcode.vx()),
                _ => Err(UnknownOpcodeError(opcode))?,
            },
            _ => unreachable!("4-bit quantity didn't match 0-15"),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::Instruction::*;

        match *self {
            Cls => write!(f, "CLS"),
            Ret => write!(f, "RET"),
            Jp(addr) => write!(f, "JP #{:03X}", addr),
            Call(addr) => write!(f, "CALL #{:03X}", addr),
            SeByte(reg, b) => write!(f, "SE {}, #{:02X}", reg, b),
            SneByte(reg, b) => write!(f, "SNE {}, #{:02X}", reg, b),
            SeReg(reg1, reg2) => write!(f, "SE {}, {}", reg1, reg2),
            LdByte(reg, b) => write!(f, "LD {}, #{:02X}", reg, b),
            AddByte(reg, b) => write!(f, "ADD {}, #{:02X}", reg, b),
            LdReg(reg1, reg2) => write!(f, "LD {}, {}", reg1, reg2),
            Or(reg1, reg2) => write!(f, "OR {}, {}", reg1, reg2),
            And(reg1, reg2) => write!(f, "AND {}, {}", reg1, reg2),
            Xor(reg1, reg2) => write!(f, "XOR {}, {}", reg1, reg2),
            AddReg(reg1, reg2) => write!(f, "ADD {}, {}", reg1, reg2),
            Sub(reg1, reg2) => write!(f, "SUB {}, {}", reg1, reg2),
            Shr(reg) => write!(f, "SHR {}", reg),
            Subn(reg1, reg2) => write!(f, "SUBN {}, {}", reg1, reg2),
            Shl(reg) => write!(f, "SHL {}", reg),
            SneReg(reg1, reg2) => write!(f, "SNE {}, {}", reg1, reg2),
            LdI(addr) => write!(f, "LD I, #{:03X}", addr),
            JpV0(addr) => write!(f, "JP V0, #{:03X}", addr),
            Rnd(reg, b) => write!(f, "RND {}, #{:02X}", reg, b),
            Drw(reg1, reg2, n) => write!(f, "DRW {}, {}, {}", reg1, reg2, n),
            Skp(reg) => write!(f, "SKP {}", reg),
            Sknp(reg) => write!(f, "SKNP {}", reg),
            LdRegDt(reg) => write!(f, "LD {}, DT", reg),
            LdKey(reg) => write!(f, "LD {}, K", reg),
            LdDtReg(reg) => write!(f, "LD DT, {}", reg),
            LdSt(reg) => write!(f, "LD ST, {}", reg),
            AddI(reg) => write!(f, "ADD I, {}", reg),
            LdF(reg) => write!(f, "LD F, {}", reg),
            LdB(reg) => write!(f, "LD B, {}", reg),
            LdDerefIReg(reg) => write!(f, "LD [I], {}", reg),
            LdRegDerefI(reg) => write!(f, "LD {}, [I]", reg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that every supported form decodes to the expected instruction.
    #[test]
    fn decode_supported() {
        use instruction::Instruction::*;
        use instruction::Register::*;

        let cases = [
            (0x00E0, Cls),
            (0x00EE, Ret),
            (0x1234, Jp(0x234)),
            (0x2123, Call(0x123)),
            (0x3A42, SeByte(VA, 0x42)),
            (0x4B00, SneByte(VB, 0x00)),
            (0x5120, SeReg(V1, V2)),
            (0x6FFF, LdByte(VF, 0xFF)),
            (0x7510, AddByte(V5, 0x10)),
            (0x8120, LdReg(V1, V2)),
            (0x8121, Or(V1, V2)),
            (0x8122, And(V1, V2)),
            (0x8123, Xor(V1, V2)),
            (0x8124, AddReg(V1, V2)),
            (0x8125, Sub(V1, V2)),
            (0x81F6, Shr(V1)),
            (0x8127, Subn(V1, V2)),
            (0x812E, Shl(V1)),
            (0x9340, SneReg(V3, V4)),
            (0xA2F0, LdI(0x2F0)),
            (0xB300, JpV0(0x300)),
            (0xC70F, Rnd(V7, 0x0F)),
            (0xD125, Drw(V1, V2, 5)),
            (0xE39E, Skp(V3)),
            (0xE3A1, Sknp(V3)),
            (0xF407, LdRegDt(V4)),
            (0xF40A, LdKey(V4)),
            (0xF415, LdDtReg(V4)),
            (0xF418, LdSt(V4)),
            (0xF41E, AddI(V4)),
            (0xF429, LdF(V4)),
            (0xF433, LdB(V4)),
            (0xF455, LdDerefIReg(V4)),
            (0xF465, LdRegDerefI(V4)),
        ];

        for &(op, instr) in cases.iter() {
            assert_eq!(
                Instruction::from_opcode(Opcode(op)).unwrap(),
                instr,
                "case {:#06X}",
                op
            );
        }
    }

    /// Tests that opcodes outside the supported forms are rejected.
    #[test]
    fn decode_unknown() {
        let cases = [
            0x0000, 0x0123, 0x00E1, 0x00EF, 0x0FFF, 0x5121, 0x8128, 0x812F, 0x9341, 0xE300,
            0xE39F, 0xF400, 0xF430, 0xF475, 0xFFFF,
        ];

        for &op in cases.iter() {
            assert!(
                Instruction::from_opcode(Opcode(op)).is_err(),
                "case {:#06X}",
                op
            );
        }
    }

    #[test]
    fn sys_call_is_its_own_error() {
        let err = Instruction::from_opcode(Opcode(0x0123)).unwrap_err();
        assert!(err.downcast_ref::<UnsupportedSysCallError>().is_some());
        let err = Instruction::from_opcode(Opcode(0x5121)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<UnknownOpcodeError>(),
            Some(&UnknownOpcodeError(Opcode(0x5121)))
        );
    }

    #[test]
    fn opcode_from_bytes() {
        assert_eq!(Opcode::from_bytes(0x21, 0x23), Opcode(0x2123));
        assert_eq!(Opcode(0x00EE).to_string(), "#00EE");
    }
}
