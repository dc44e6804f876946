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

//! Main memory, the register file and the call stack.

use std::fmt;
use std::io::Read;
use std::num::Wrapping;

use failure::{Error, ResultExt};

use MEM_SIZE;
use N_REGISTERS;
use PROG_SIZE;
use PROG_START;
use display::{HEX_HEIGHT, HEX_SPRITES};
use instruction::Register;

/// An error resulting from an out-of-bounds address.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "address out of bounds: {:#05X} (valid range 0-{:#05X})", _0, _1)]
pub struct AddressOutOfBoundsError(pub usize, pub usize);

/// An error resulting from an out-of-bounds register index.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "no such register: V{:X}", _0)]
pub struct RegisterOutOfBoundsError(pub usize);

/// An error resulting from a bad `RET` instruction.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "no subroutine to return from")]
pub struct StackUnderflowError;

/// The main memory of the machine.
///
/// The hex digit sprites occupy the lowest addresses (sprite `k` starts at
/// `5 * k`), and programs are loaded at `PROG_START`.
#[derive(Clone)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Returns a zeroed memory with the hex digit sprites in place.
    pub fn new() -> Self {
        let mut cells = vec![0; MEM_SIZE];
        for (i, sprite) in HEX_SPRITES.iter().enumerate() {
            let start = i * HEX_HEIGHT;
            cells[start..start + HEX_HEIGHT].copy_from_slice(sprite);
        }
        Memory { cells }
    }

    /// Builds a memory from a full dump, as produced by `as_slice`.
    ///
    /// Returns `None` unless the dump covers exactly `MEM_SIZE` cells.
    pub fn from_cells(cells: &[u8]) -> Option<Self> {
        if cells.len() == MEM_SIZE {
            Some(Memory {
                cells: cells.to_vec(),
            })
        } else {
            None
        }
    }

    /// Returns the byte at the given address.
    pub fn read(&self, addr: usize) -> Result<u8, AddressOutOfBoundsError> {
        self.cells
            .get(addr)
            .cloned()
            .ok_or(AddressOutOfBoundsError(addr, MEM_SIZE - 1))
    }

    /// Stores a byte at the given address.
    pub fn write(&mut self, addr: usize, val: u8) -> Result<(), AddressOutOfBoundsError> {
        match self.cells.get_mut(addr) {
            Some(cell) => {
                *cell = val;
                Ok(())
            }
            None => Err(AddressOutOfBoundsError(addr, MEM_SIZE - 1)),
        }
    }

    /// Zeroes the program area, leaving the hex sprites untouched.
    pub fn clear(&mut self) {
        for cell in self.cells[PROG_START..].iter_mut() {
            *cell = 0;
        }
    }

    /// Loads program data from the specified source.
    ///
    /// At most `PROG_SIZE` bytes are copied to `PROG_START` onward; anything
    /// past that is ignored, and cells past the end of a shorter program keep
    /// their current contents.  Returns the number of bytes copied.
    pub fn load_rom<R: Read>(&mut self, input: &mut R) -> Result<usize, Error> {
        let mut rom = Vec::with_capacity(PROG_SIZE);
        input
            .take(PROG_SIZE as u64)
            .read_to_end(&mut rom)
            .context("could not read program data")?;
        self.cells[PROG_START..PROG_START + rom.len()].copy_from_slice(&rom);
        Ok(rom.len())
    }

    /// Returns the whole memory as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

/// The general-purpose registers `V0`-`VF`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    regs: [Wrapping<u8>; N_REGISTERS],
}

impl Registers {
    /// Returns a register file with every register set to zero.
    pub fn new() -> Self {
        Registers::default()
    }

    /// Returns the value of the register with the given index.
    pub fn peek(&self, index: usize) -> Result<u8, RegisterOutOfBoundsError> {
        self.regs
            .get(index)
            .map(|r| r.0)
            .ok_or(RegisterOutOfBoundsError(index))
    }

    /// Sets the register with the given index.
    pub fn poke(&mut self, index: usize, val: u8) -> Result<(), RegisterOutOfBoundsError> {
        match self.regs.get_mut(index) {
            Some(r) => {
                *r = Wrapping(val);
                Ok(())
            }
            None => Err(RegisterOutOfBoundsError(index)),
        }
    }

    /// Returns the value in the given register.
    pub fn get(&self, reg: Register) -> u8 {
        self.regs[reg as usize].0
    }

    /// Sets the given register to the given value.
    pub fn set(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize] = Wrapping(val);
    }

    /// Adds to the given register without touching `VF`.
    pub fn add(&mut self, reg: Register, val: u8) {
        self.regs[reg as usize] += Wrapping(val);
    }

    /// Sets every register to zero.
    pub fn clear(&mut self) {
        self.regs = [Wrapping(0); N_REGISTERS];
    }

    /// Sets every register from the given values, in order.
    pub fn load(&mut self, values: &[u8; N_REGISTERS]) {
        for (r, &v) in self.regs.iter_mut().zip(values.iter()) {
            *r = Wrapping(v);
        }
    }

    /// Returns the register values in order.
    pub fn values(&self) -> [u8; N_REGISTERS] {
        let mut values = [0; N_REGISTERS];
        for (v, r) in values.iter_mut().zip(self.regs.iter()) {
            *v = r.0;
        }
        values
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, r) in self.regs.iter().enumerate() {
            let sep = match i {
                0 => "",
                8 => "\n",
                _ => "   ",
            };
            write!(f, "{}V{:X}: {:02X}", sep, i, r.0)?;
        }
        Ok(())
    }
}

/// The call stack of return addresses.
///
/// There is no fixed depth limit; only popping an empty stack is an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    frames: Vec<u16>,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    /// Builds a stack from return addresses listed bottom first.
    pub fn from_frames(frames: Vec<u16>) -> Self {
        Stack { frames }
    }

    pub fn push(&mut self, addr: u16) {
        self.frames.push(addr);
    }

    pub fn pop(&mut self) -> Result<u16, StackUnderflowError> {
        self.frames.pop().ok_or(StackUnderflowError)
    }

    pub fn top(&self) -> Option<u16> {
        self.frames.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Returns the return addresses, bottom first.
    pub fn frames(&self) -> &[u16] {
        &self.frames
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[")?;
        for (i, addr) in self.frames.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:#05X}", addr)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_write() {
        let mut memory = Memory::new();

        for &(addr, val) in [(0, 0xAB), (0x200, 1), (0x7FF, 0x80), (MEM_SIZE - 1, 0xFF)].iter() {
            memory.write(addr, val).unwrap();
            assert_eq!(memory.read(addr).unwrap(), val, "case {:?}", (addr, val));
        }
    }

    #[test]
    fn out_of_bounds() {
        let mut memory = Memory::new();

        assert_eq!(
            memory.read(MEM_SIZE),
            Err(AddressOutOfBoundsError(MEM_SIZE, MEM_SIZE - 1))
        );
        assert!(memory.write(MEM_SIZE, 1).is_err());
        assert!(memory.read(0xFFFF).is_err());
    }

    /// Tests that the glyph for digit `k` sits at `5 * k`.
    #[test]
    fn glyphs() {
        let memory = Memory::new();

        for (k, sprite) in HEX_SPRITES.iter().enumerate() {
            assert_eq!(&memory.as_slice()[5 * k..5 * k + 5], sprite, "case {}", k);
        }
        assert_eq!(memory.read(0).unwrap(), 0xF0);
        assert_eq!(memory.read(79).unwrap(), 0x80);
        assert_eq!(memory.read(80).unwrap(), 0);
    }

    #[test]
    fn clear_keeps_glyphs() {
        let mut memory = Memory::new();

        memory.write(PROG_START, 0x12).unwrap();
        memory.write(MEM_SIZE - 1, 0x34).unwrap();
        memory.write(0x100, 0x56).unwrap();
        memory.clear();
        assert_eq!(memory.read(PROG_START).unwrap(), 0);
        assert_eq!(memory.read(MEM_SIZE - 1).unwrap(), 0);
        assert_eq!(memory.read(0x100).unwrap(), 0x56);
        assert_eq!(&memory.as_slice()[..5], &HEX_SPRITES[0]);
    }

    #[test]
    fn load_rom_short() {
        let mut memory = Memory::new();
        memory.write(PROG_START + 3, 0x99).unwrap();

        let read = memory.load_rom(&mut Cursor::new(vec![1, 2, 3])).unwrap();
        assert_eq!(read, 3);
        assert_eq!(&memory.as_slice()[PROG_START..PROG_START + 4], &[1, 2, 3, 0x99]);
    }

    #[test]
    fn load_rom_truncates() {
        let mut memory = Memory::new();

        let rom = vec![0x42; PROG_SIZE + 100];
        let read = memory.load_rom(&mut Cursor::new(rom)).unwrap();
        assert_eq!(read, PROG_SIZE);
        assert_eq!(memory.read(MEM_SIZE - 1).unwrap(), 0x42);
        assert_eq!(memory.as_slice().len(), MEM_SIZE);
    }

    #[test]
    fn registers() {
        let mut regs = Registers::new();

        for i in 0..N_REGISTERS {
            regs.poke(i, i as u8 * 3 + 1).unwrap();
            assert_eq!(regs.peek(i).unwrap(), i as u8 * 3 + 1, "case {}", i);
        }
        regs.clear();
        for i in 0..N_REGISTERS {
            assert_eq!(regs.peek(i).unwrap(), 0, "case {}", i);
        }
        assert_eq!(regs.peek(16), Err(RegisterOutOfBoundsError(16)));
        assert!(regs.poke(16, 0).is_err());
    }

    #[test]
    fn register_add_wraps() {
        let mut regs = Registers::new();

        regs.set(Register::V3, 0xFF);
        regs.add(Register::V3, 2);
        assert_eq!(regs.get(Register::V3), 1);
        assert_eq!(regs.get(Register::VF), 0);
    }

    #[test]
    fn stack() {
        let mut stack = Stack::new();

        assert_eq!(stack.pop(), Err(StackUnderflowError));
        stack.push(0x202);
        stack.push(0x304);
        assert_eq!(stack.top(), Some(0x304));
        assert_eq!(stack.frames(), &[0x202, 0x304]);
        assert_eq!(stack.pop(), Ok(0x304));
        assert_eq!(stack.pop(), Ok(0x202));
        assert!(stack.is_empty());
    }
}
