/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! A Chip-8 virtual machine.
//!
//! The machine is split the way the hardware is: `memory` holds main memory,
//! the registers and the call stack, `display` the framebuffer, `timer` the
//! delay and sound timers, and `input` the keypad.  The `cpu` module decodes
//! and executes instructions against all of these, and `emulator` runs the
//! CPU on its own thread alongside the timer clock.  Whole machines can be
//! saved and restored with `savestate`, and host keyboards are mapped onto
//! the keypad with `keyconfig`.

#[macro_use]
extern crate combine;
#[macro_use]
extern crate enum_primitive;
extern crate failure;
#[macro_use]
extern crate failure_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate maplit;
extern crate num;
extern crate rand;
extern crate time;

/// The size of the Chip-8's memory, in bytes.
pub const MEM_SIZE: usize = 0xFFF;
/// The address where programs should be loaded.
pub const PROG_START: usize = 0x200;
/// The maximum size of a Chip-8 program, in bytes.
pub const PROG_SIZE: usize = MEM_SIZE - PROG_START;
/// The number of general-purpose registers.
pub const N_REGISTERS: usize = 16;

pub mod audio;
pub mod cpu;
pub mod display;
pub mod emulator;
pub mod input;
pub mod instruction;
pub mod keyconfig;
pub mod memory;
mod parse;
pub mod rng;
pub mod savestate;
pub mod timer;
mod util;

pub use audio::Audio;
pub use cpu::Cpu;
pub use emulator::Emulator;
pub use input::Key;
pub use instruction::{Instruction, Opcode, Register, UnknownOpcodeError,
                      UnsupportedSysCallError};
pub use keyconfig::{HostKey, KeyAction, KeyConfiguration};
pub use memory::{AddressOutOfBoundsError, RegisterOutOfBoundsError, StackUnderflowError};
pub use savestate::{SaveState, SaveStateError};
