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

//! Saving and restoring the complete machine state.
//!
//! A save state is plain text, one tagged section per line:
//!
//! ```text
//! v{1}
//! c{<cycles>}
//! o{<trace>}
//! m{<4095 comma-separated bytes>}
//! s{<32 comma-separated rows of 64 '0'/'1' pixels>}
//! r{<16 comma-separated bytes>}
//! a{<I>}
//! p{<PC>}
//! k{<return addresses, bottom first>}
//! d{<delay timer>}
//! t{<sound timer>}
//! i{<16 comma-separated bytes of generator state>}
//! ```
//!
//! All numbers are decimal.  Reading is strict: every section must appear
//! exactly once with a payload of the right shape, or the whole state is
//! rejected and nothing is restored.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::str::FromStr;

use combine::Parser;

use MEM_SIZE;
use N_REGISTERS;
use cpu::{Cpu, MAX_CYCLES};
use display::{HEIGHT, WIDTH};
use memory::{Memory, Stack};
use parse::{decimal_list, section};
use rng::{self, Xorshift};
use util::format_parse_error;

/// The current format version.
pub const VERSION: u32 = 1;

/// The section tags, in the order they are written.
const TAGS: [char; 12] = ['v', 'c', 'o', 'm', 's', 'r', 'a', 'p', 'k', 'd', 't', 'i'];

/// An error resulting from an unreadable or malformed save state.
#[derive(Debug, Fail)]
pub enum SaveStateError {
    #[fail(display = "malformed section on line {}: {}", line, message)]
    Malformed { line: usize, message: String },
    #[fail(display = "unknown section '{}'", _0)]
    UnknownSection(char),
    #[fail(display = "missing section '{}'", _0)]
    MissingSection(char),
    #[fail(display = "duplicate section '{}'", _0)]
    DuplicateSection(char),
    #[fail(display = "section '{}' has {} entries (expected {})", tag, found, expected)]
    WrongLength {
        tag: char,
        found: usize,
        expected: usize,
    },
    #[fail(display = "bad value in section '{}': '{}'", tag, value)]
    BadValue { tag: char, value: String },
    #[fail(display = "unsupported save state version '{}'", _0)]
    UnsupportedVersion(String),
    #[fail(display = "could not access save state file")]
    Io(#[cause] io::Error),
}

/// A snapshot of everything needed to resume a machine.
///
/// The audio binding is not part of the state; a restored machine keeps
/// whatever audio sink it already had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveState {
    pub cycles: u32,
    pub trace: String,
    /// The full memory, `MEM_SIZE` bytes.
    pub memory: Vec<u8>,
    /// The display pixels, row by row.
    pub screen: Vec<bool>,
    pub registers: [u8; N_REGISTERS],
    pub i: u16,
    pub pc: u16,
    /// Return addresses, bottom first.
    pub stack: Vec<u16>,
    pub delay: u8,
    pub sound: u8,
    pub rng: [u8; rng::STATE_SIZE],
}

impl SaveState {
    /// Takes a snapshot of the given CPU and its peripherals.
    pub fn capture(cpu: &Cpu) -> Self {
        let display = cpu.display();
        let mut screen = Vec::with_capacity(WIDTH * HEIGHT);
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                screen.push(display.read(x, y));
            }
        }

        SaveState {
            cycles: cpu.cycles(),
            trace: cpu.trace().to_owned(),
            memory: cpu.memory().as_slice().to_vec(),
            screen,
            registers: cpu.registers().values(),
            i: cpu.i(),
            pc: cpu.pc(),
            stack: cpu.stack().frames().to_vec(),
            delay: cpu.timers().delay.value(),
            sound: cpu.timers().sound.value(),
            rng: cpu.rng().state_bytes(),
        }
    }

    /// Replaces the state of the given CPU with this snapshot.
    ///
    /// No timer callbacks run, so restoring never starts a tone by itself.
    /// The CPU is left untouched if the snapshot is inconsistent.
    pub fn restore(&self, cpu: &mut Cpu) -> Result<(), SaveStateError> {
        let memory = Memory::from_cells(&self.memory).ok_or(SaveStateError::WrongLength {
            tag: 'm',
            found: self.memory.len(),
            expected: MEM_SIZE,
        })?;
        if self.screen.len() != WIDTH * HEIGHT {
            return Err(SaveStateError::WrongLength {
                tag: 's',
                found: self.screen.len(),
                expected: WIDTH * HEIGHT,
            });
        }

        *cpu.memory_mut() = memory;
        cpu.set_cycles(self.cycles);
        cpu.set_trace(self.trace.clone());
        cpu.registers_mut().load(&self.registers);
        cpu.set_i(self.i);
        cpu.set_pc(self.pc);
        *cpu.stack_mut() = Stack::from_frames(self.stack.clone());
        for (n, &pixel) in self.screen.iter().enumerate() {
            cpu.display().write(n % WIDTH, n / WIDTH, pixel);
        }
        cpu.timers().delay.set_value(self.delay);
        cpu.timers().sound.load(self.sound);
        cpu.set_rng(Xorshift::from_state_bytes(&self.rng));
        Ok(())
    }

    /// Reads a save state from the given file.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self, SaveStateError> {
        fs::read_to_string(path)
            .map_err(SaveStateError::Io)?
            .parse()
    }

    /// Writes this save state to the given file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        fs::write(path, self.to_string()).map_err(SaveStateError::Io)
    }
}

impl fmt::Display for SaveState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "v{{{}}}", VERSION)?;
        writeln!(f, "c{{{}}}", self.cycles)?;
        writeln!(f, "o{{{}}}", self.trace)?;
        writeln!(f, "m{{{}}}", join(&self.memory))?;
        let rows = self.screen
            .chunks(WIDTH)
            .map(|row| row.iter().map(|&p| if p { '1' } else { '0' }).collect())
            .collect::<Vec<String>>();
        writeln!(f, "s{{{}}}", rows.join(","))?;
        writeln!(f, "r{{{}}}", join(&self.registers))?;
        writeln!(f, "a{{{}}}", self.i)?;
        writeln!(f, "p{{{}}}", self.pc)?;
        writeln!(f, "k{{{}}}", join(&self.stack))?;
        writeln!(f, "d{{{}}}", self.delay)?;
        writeln!(f, "t{{{}}}", self.sound)?;
        writeln!(f, "i{{{}}}", join(&self.rng))
    }
}

impl FromStr for SaveState {
    type Err = SaveStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sections = split_sections(s)?;
        let mut take = |tag: char| {
            sections
                .remove(&tag)
                .ok_or(SaveStateError::MissingSection(tag))
        };

        let version = take('v')?;
        if version != VERSION.to_string() {
            return Err(SaveStateError::UnsupportedVersion(version));
        }

        let cycles = parse_number::<u32>('c', &take('c')?)?;
        if cycles > MAX_CYCLES {
            return Err(SaveStateError::BadValue {
                tag: 'c',
                value: cycles.to_string(),
            });
        }
        let trace = take('o')?;
        let memory = parse_list::<u8>('m', &take('m')?, Some(MEM_SIZE))?;
        let screen = parse_screen(&take('s')?)?;
        let mut registers = [0; N_REGISTERS];
        registers.copy_from_slice(&parse_list::<u8>('r', &take('r')?, Some(N_REGISTERS))?);
        let i = parse_number::<u16>('a', &take('a')?)?;
        let pc = parse_number::<u16>('p', &take('p')?)?;
        let stack = parse_list::<u16>('k', &take('k')?, None)?;
        let delay = parse_number::<u8>('d', &take('d')?)?;
        let sound = parse_number::<u8>('t', &take('t')?)?;
        let mut rng = [0; rng::STATE_SIZE];
        rng.copy_from_slice(&parse_list::<u8>('i', &take('i')?, Some(rng::STATE_SIZE))?);

        Ok(SaveState {
            cycles,
            trace,
            memory,
            screen,
            registers,
            i,
            pc,
            stack,
            delay,
            sound,
            rng,
        })
    }
}

/// Joins numbers with commas.
fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Splits the text into sections keyed by tag, checking that every tag is
/// known and appears at most once.
fn split_sections(s: &str) -> Result<BTreeMap<char, String>, SaveStateError> {
    let mut sections = BTreeMap::new();

    for (n, line) in s.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let ((tag, payload), rest) = section().parse(line).map_err(|e| {
            SaveStateError::Malformed {
                line: n + 1,
                message: format_parse_error(&e),
            }
        })?;
        if !rest.is_empty() {
            return Err(SaveStateError::Malformed {
                line: n + 1,
                message: format!("unexpected '{}' after section", rest),
            });
        }
        if !TAGS.contains(&tag) {
            return Err(SaveStateError::UnknownSection(tag));
        }
        if sections.insert(tag, payload).is_some() {
            return Err(SaveStateError::DuplicateSection(tag));
        }
    }

    Ok(sections)
}

/// Parses a single decimal number.
fn parse_number<T: FromStr>(tag: char, payload: &str) -> Result<T, SaveStateError> {
    let values = parse_list(tag, payload, Some(1))?;
    Ok(values.into_iter().next().ok_or(SaveStateError::WrongLength {
        tag,
        found: 0,
        expected: 1,
    })?)
}

/// Parses a comma-separated list of decimal numbers, optionally checking its
/// length.
fn parse_list<T: FromStr>(
    tag: char,
    payload: &str,
    expected: Option<usize>,
) -> Result<Vec<T>, SaveStateError> {
    let entries = parse_entries(tag, payload)?;
    if let Some(expected) = expected {
        if entries.len() != expected {
            return Err(SaveStateError::WrongLength {
                tag,
                found: entries.len(),
                expected,
            });
        }
    }

    entries
        .into_iter()
        .map(|entry| {
            entry
                .parse()
                .map_err(|_| SaveStateError::BadValue { tag, value: entry })
        })
        .collect()
}

/// Parses the display rows.
fn parse_screen(payload: &str) -> Result<Vec<bool>, SaveStateError> {
    let rows = parse_entries('s', payload)?;
    if rows.len() != HEIGHT {
        return Err(SaveStateError::WrongLength {
            tag: 's',
            found: rows.len(),
            expected: HEIGHT,
        });
    }

    let mut screen = Vec::with_capacity(WIDTH * HEIGHT);
    for row in rows {
        if row.len() != WIDTH {
            return Err(SaveStateError::WrongLength {
                tag: 's',
                found: row.len(),
                expected: WIDTH,
            });
        }
        for c in row.chars() {
            match c {
                '0' => screen.push(false),
                '1' => screen.push(true),
                _ => return Err(SaveStateError::BadValue { tag: 's', value: row }),
            }
        }
    }
    Ok(screen)
}

/// Splits a payload into its digit-string entries.
fn parse_entries(tag: char, payload: &str) -> Result<Vec<String>, SaveStateError> {
    match decimal_list().parse(payload) {
        Ok((entries, "")) => Ok(entries),
        Ok((_, rest)) => Err(SaveStateError::BadValue {
            tag,
            value: rest.to_owned(),
        }),
        Err(e) => Err(SaveStateError::BadValue {
            tag,
            value: format_parse_error(&e),
        }),
    }
}
