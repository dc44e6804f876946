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

//! The Chip-8 decode/execute engine.
//!
//! The `Cpu` owns the machine state that only the instruction driver
//! touches (memory, registers, the stack and the random generator) and
//! shares the rest with the host through `Peripherals`: the display buffer
//! is read by the renderer, the timers are ticked by the clock thread, and
//! the keypad and control flags are set by the host at any time.

use std::fmt::Write;
use std::i32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use failure::{Error, ResultExt};
use rand::Rng;

use PROG_START;
use display::{self, HEX_HEIGHT};
use input::Keypad;
use instruction::{Instruction, Opcode, Register};
use memory::{Memory, Registers, Stack};
use rng::Xorshift;
use timer::Timers;

/// The largest value of the cycle counter.
pub const MAX_CYCLES: u32 = i32::MAX as u32;

/// Options for the CPU.
#[derive(Debug, Clone)]
pub struct Options {
    /// How long the instruction driver sleeps between checks of the keypad
    /// while `LD Vx, K` is waiting, in milliseconds (default 20).
    pub key_poll_interval_ms: u64,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            key_poll_interval_ms: 20,
        }
    }

    /// Returns a set of options useful for testing (fast key polling).
    pub fn testing() -> Self {
        Options {
            key_poll_interval_ms: 1,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// The stop and pause flags, observed by the instruction driver.
#[derive(Debug, Default)]
pub struct Control {
    stopped: AtomicBool,
    paused: AtomicBool,
}

impl Control {
    pub fn new() -> Self {
        Control::default()
    }

    /// Requests that the machine stop.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Clears a stop request, which is only done as part of a reset.
    pub fn clear_stop(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

/// The outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The instruction ran to completion.
    Executed,
    /// `LD Vx, K` found no key pressed; the program counter still points at
    /// it.
    WaitingForKey,
}

/// The hardware shared between the CPU and the host.
#[derive(Clone, Default)]
pub struct Peripherals {
    pub display: Arc<display::Buffer>,
    pub timers: Arc<Timers>,
    pub keypad: Arc<Keypad>,
    pub control: Arc<Control>,
}

impl Peripherals {
    /// Returns a fresh set of peripherals, with timers that have no
    /// callbacks.
    pub fn new() -> Self {
        Peripherals::default()
    }
}

/// A Chip-8 CPU.
pub struct Cpu {
    /// The main memory.
    memory: Memory,
    /// The general-purpose registers `V0`-`VF`.
    regs: Registers,
    /// The special register `I`.
    i: u16,
    /// The program counter.
    pc: u16,
    /// The call stack.
    stack: Stack,
    /// The generator behind `RND`.
    rng: Xorshift,
    /// The number of instructions executed, saturating at `MAX_CYCLES`.
    cycles: u32,
    /// The most recently fetched opcode and its mnemonic.
    trace: String,

    peripherals: Peripherals,
    key_poll_interval: Duration,
}

impl Cpu {
    /// Returns a new CPU attached to the given peripherals.
    pub fn new(peripherals: Peripherals, options: Options) -> Self {
        Cpu {
            memory: Memory::new(),
            regs: Registers::new(),
            i: 0,
            pc: PROG_START as u16,
            stack: Stack::new(),
            rng: Xorshift::new(),
            cycles: 0,
            trace: String::new(),

            peripherals,
            key_poll_interval: Duration::from_millis(options.key_poll_interval_ms),
        }
    }

    /// Returns a new CPU with its own set of peripherals.
    pub fn with_options(options: Options) -> Self {
        Cpu::new(Peripherals::new(), options)
    }

    /// Returns the main memory.
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Returns a mutable reference to the main memory.
    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Returns the register file.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Returns a mutable reference to the register file.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Returns the value in the given register.
    pub fn register(&self, reg: Register) -> u8 {
        self.regs.get(reg)
    }

    /// Sets the given register to the given value.
    pub fn set_register(&mut self, reg: Register, val: u8) {
        self.regs.set(reg, val);
    }

    /// Returns the value of register `I`.
    pub fn i(&self) -> u16 {
        self.i
    }

    /// Sets the value of register `I`.
    pub fn set_i(&mut self, val: u16) {
        self.i = val;
    }

    /// Returns the value of the program counter.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Sets the value of the program counter.
    pub fn set_pc(&mut self, val: u16) {
        self.pc = val;
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    pub fn rng(&self) -> &Xorshift {
        &self.rng
    }

    pub fn set_rng(&mut self, rng: Xorshift) {
        self.rng = rng;
    }

    /// Returns the number of executed instructions.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Sets the cycle counter, clamping it to `MAX_CYCLES`.
    pub fn set_cycles(&mut self, cycles: u32) {
        self.cycles = cycles.min(MAX_CYCLES);
    }

    /// Returns the trace of the most recently fetched instruction.
    pub fn trace(&self) -> &str {
        &self.trace
    }

    pub fn set_trace(&mut self, trace: String) {
        self.trace = trace;
    }

    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    /// Returns the display buffer.
    pub fn display(&self) -> &display::Buffer {
        &self.peripherals.display
    }

    pub fn timers(&self) -> &Timers {
        &self.peripherals.timers
    }

    pub fn keypad(&self) -> &Keypad {
        &self.peripherals.keypad
    }

    /// Returns how long to wait before retrying `LD Vx, K`.
    pub fn key_poll_interval(&self) -> Duration {
        self.key_poll_interval
    }

    /// Returns the opcode at the program counter.
    pub fn current_opcode(&self) -> Result<Opcode, Error> {
        let high = self.memory.read(self.pc as usize)?;
        let low = self.memory.read(self.pc as usize + 1)?;
        Ok(Opcode::from_bytes(high, low))
    }

    /// Fetches, decodes and executes the instruction at the program counter.
    ///
    /// The program counter is advanced past the instruction before it is
    /// executed, so `CALL` pushes the address of the following instruction.
    /// A key wait that is still pending is not counted as a cycle.
    pub fn decode_next(&mut self) -> Result<Status, Error> {
        let opcode = self.current_opcode()
            .with_context(|_| format!("could not fetch instruction at {:#05X}", self.pc))?;
        self.trace = opcode.to_string();
        self.pc = self.pc.wrapping_add(2);

        let instr = Instruction::from_opcode(opcode)?;
        self.trace = format!("{} {}", opcode, instr);
        trace!("{}", self.trace);
        let status = self.execute(instr)?;
        if status == Status::WaitingForKey {
            return Ok(status);
        }

        let control = &self.peripherals.control;
        if !control.is_stopped() && !control.is_paused() && self.cycles < MAX_CYCLES {
            self.cycles += 1;
        }
        Ok(status)
    }

    /// Executes the given instruction in the current CPU context.
    ///
    /// The program counter is expected to already point past the
    /// instruction, as it does during `decode_next`.
    pub fn execute(&mut self, ins: Instruction) -> Result<Status, Error> {
        use self::Instruction::*;

        match ins {
            Cls => self.peripherals.display.reset(),
            Ret => {
                self.pc = self.stack
                    .pop()
                    .with_context(|_| format!("error executing {}", ins))?;
            }
            Jp(addr) => self.pc = addr,
            Call(addr) => {
                self.stack.push(self.pc);
                self.pc = addr;
            }
            SeByte(reg, b) => self.skip_if(self.register(reg) == b),
            SneByte(reg, b) => self.skip_if(self.register(reg) != b),
            SeReg(reg1, reg2) => self.skip_if(self.register(reg1) == self.register(reg2)),
            LdByte(reg, b) => self.set_register(reg, b),
            AddByte(reg, b) => self.regs.add(reg, b),
            LdReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.set_register(reg1, r2);
            }
            Or(reg1, reg2) => {
                let val = self.register(reg1) | self.register(reg2);
                self.set_register(reg1, val);
            }
            And(reg1, reg2) => {
                let val = self.register(reg1) & self.register(reg2);
                self.set_register(reg1, val);
            }
            Xor(reg1, reg2) => {
                let val = self.register(reg1) ^ self.register(reg2);
                self.set_register(reg1, val);
            }
            AddReg(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.add(reg1, r2);
            }
            Sub(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.sub(reg1, r2);
            }
            Shr(reg) => self.shr(reg),
            Subn(reg1, reg2) => {
                let r2 = self.register(reg2);
                self.subn(reg1, r2);
            }
            Shl(reg) => self.shl(reg),
            SneReg(reg1, reg2) => self.skip_if(self.register(reg1) != self.register(reg2)),
            LdI(addr) => self.i = addr,
            JpV0(addr) => self.pc = addr.wrapping_add(self.register(Register::V0) as u16),
            Rnd(reg, b) => {
                let val = self.rng.gen::<u8>() & b;
                self.set_register(reg, val);
            }
            Drw(reg1, reg2, n) => self.drw(reg1, reg2, n)
                .with_context(|_| format!("error executing {}", ins))?,
            Skp(reg) => {
                let pressed = self.keypad().pressed().map(|k| k.code());
                self.skip_if(pressed == Some(self.register(reg)));
            }
            Sknp(reg) => {
                let pressed = self.keypad().pressed().map(|k| k.code());
                self.skip_if(pressed != Some(self.register(reg)));
            }
            LdRegDt(reg) => {
                let dt = self.timers().delay.value();
                self.set_register(reg, dt);
            }
            LdKey(reg) => return Ok(self.wait_for_key(reg)),
            LdDtReg(reg) => self.timers().delay.set_value(self.register(reg)),
            LdSt(reg) => self.timers().sound.set_value(self.register(reg)),
            AddI(reg) => self.i = self.i.wrapping_add(self.register(reg) as u16),
            LdF(reg) => self.i = self.register(reg) as u16 * HEX_HEIGHT as u16,
            LdB(reg) => self.ld_b(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdDerefIReg(reg) => self.ld_deref_i_reg(reg)
                .with_context(|_| format!("error executing {}", ins))?,
            LdRegDerefI(reg) => self.ld_reg_deref_i(reg)
                .with_context(|_| format!("error executing {}", ins))?,
        }

        Ok(Status::Executed)
    }

    /// Puts the machine back in its power-on state.
    ///
    /// Memory is left alone; the timers are zeroed without running their
    /// callbacks.
    pub fn reset(&mut self) {
        self.cycles = 0;
        self.trace.clear();
        self.regs.clear();
        self.pc = PROG_START as u16;
        self.peripherals.display.reset();
        self.i = 0;
        self.peripherals.timers.reset();
        self.stack.clear();
    }

    /// Returns a multi-line dump of the machine state for diagnostics.
    pub fn state(&self) -> String {
        let mut s = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(
            s,
            "Cycles: {}{}",
            self.cycles,
            if self.cycles >= MAX_CYCLES { "+" } else { "" }
        );
        let _ = writeln!(s, "Last: {}", self.trace);
        let _ = writeln!(s, "{}", self.regs);
        let _ = writeln!(s, "I: {:#05X}   PC: {:#05X}", self.i, self.pc);
        let _ = writeln!(s, "Stack: {}", self.stack);
        let _ = write!(
            s,
            "DT: {:02X}   ST: {:02X}",
            self.timers().delay.value(),
            self.timers().sound.value()
        );
        s
    }

    /// Skips the next instruction if the condition holds.
    fn skip_if(&mut self, cond: bool) {
        if cond {
            self.pc = self.pc.wrapping_add(2);
        }
    }

    /// Adds the given byte to the given register, setting `VF` to 1 on carry
    /// or 0 otherwise.
    ///
    /// The flag is written last, so it wins when `reg` is `VF`.
    fn add(&mut self, reg: Register, val: u8) {
        let (sum, carry) = self.register(reg).overflowing_add(val);
        self.set_register(reg, sum);
        self.set_register(Register::VF, carry as u8);
    }

    /// Subtracts the given byte from the given register, setting `VF` to 0 on
    /// borrow or 1 otherwise.
    fn sub(&mut self, reg: Register, val: u8) {
        let (diff, borrow) = self.register(reg).overflowing_sub(val);
        self.set_register(reg, diff);
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Sets `reg` to `val - reg`, setting `VF` to 0 on borrow or 1 otherwise.
    fn subn(&mut self, reg: Register, val: u8) {
        let (diff, borrow) = val.overflowing_sub(self.register(reg));
        self.set_register(reg, diff);
        self.set_register(Register::VF, !borrow as u8);
    }

    /// Shifts `reg` right by one, setting `VF` to the old lowest bit.
    fn shr(&mut self, reg: Register) {
        let old = self.register(reg);
        self.set_register(reg, old >> 1);
        self.set_register(Register::VF, old & 1);
    }

    /// Shifts `reg` left by one, setting `VF` to the old highest bit.
    fn shl(&mut self, reg: Register) {
        let old = self.register(reg);
        self.set_register(reg, old << 1);
        self.set_register(Register::VF, old >> 7);
    }

    /// Implements the `DRW` operation.
    ///
    /// `VF` is cleared before the coordinates are read, so drawing at
    /// `VF` uses a zero coordinate.
    fn drw(&mut self, reg1: Register, reg2: Register, n: u8) -> Result<(), Error> {
        self.set_register(Register::VF, 0);
        let x = self.register(reg1) as usize;
        let y = self.register(reg2) as usize;

        let start = self.i as usize;
        let mut sprite = Vec::with_capacity(n as usize);
        for addr in start..start + n as usize {
            sprite.push(self.memory.read(addr)?);
        }

        let collision = self.peripherals.display.draw_sprite(&sprite, x, y);
        self.set_register(Register::VF, collision as u8);
        Ok(())
    }

    /// Implements the `LD Vx, K` operation.
    ///
    /// Never blocks.  With no key pressed, `reg` is left alone and the
    /// program counter is moved back so the instruction runs again on the
    /// next step; the caller decides how long to wait before that.
    fn wait_for_key(&mut self, reg: Register) -> Status {
        match self.keypad().pressed() {
            Some(key) => {
                self.set_register(reg, key.code());
                Status::Executed
            }
            None => {
                self.pc = self.pc.wrapping_sub(2);
                Status::WaitingForKey
            }
        }
    }

    /// Implements the `LD B, Vx` operation.
    fn ld_b(&mut self, reg: Register) -> Result<(), Error> {
        let val = self.register(reg);
        let addr = self.i as usize;

        self.memory.write(addr, val / 100)?;
        self.memory.write(addr + 1, val % 100 / 10)?;
        self.memory.write(addr + 2, val % 10)?;
        Ok(())
    }

    /// Implements the `LD [I], Vx` operation.
    fn ld_deref_i_reg(&mut self, reg: Register) -> Result<(), Error> {
        let start = self.i as usize;

        for r in 0..reg as usize + 1 {
            let val = self.regs.peek(r)?;
            self.memory.write(start + r, val)?;
        }
        Ok(())
    }

    /// Implements the `LD Vx, [I]` operation.
    fn ld_reg_deref_i(&mut self, reg: Register) -> Result<(), Error> {
        let start = self.i as usize;

        for r in 0..reg as usize + 1 {
            let val = self.memory.read(start + r)?;
            self.regs.poke(r, val)?;
        }
        Ok(())
    }
}
