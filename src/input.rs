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

//! Input handling for the Chip-8 machine.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};

use num::traits::FromPrimitive;

/// The number of keys on the Chip-8 controller.
pub const N_KEYS: usize = 16;

/// The raw key code meaning "no key is pressed".
pub const NO_KEY: u8 = 0xFF;

/// An error resulting from a logical key name outside `0`-`F`.
#[derive(Debug, Fail, PartialEq, Eq)]
#[fail(display = "unknown key name: '{}'", _0)]
pub struct UnknownKeyNameError(pub String);

enum_from_primitive!{
/// The keys on the Chip-8 controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    K0 = 0,
    K1,
    K2,
    K3,
    K4,
    K5,
    K6,
    K7,
    K8,
    K9,
    KA,
    KB,
    KC,
    KD,
    KE,
    KF
}
}

impl Key {
    /// Returns the key with the given code, if there is one.
    pub fn from_code(code: u8) -> Option<Key> {
        Key::from_u8(code)
    }

    /// Returns the key code as seen by the machine.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Key {
    /// Formats the key as its single hex digit name.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:X}", *self as u8)
    }
}

impl FromStr for Key {
    type Err = UnknownKeyNameError;

    /// Parses a single hex digit (either case) as a key name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_digit(16)
                .and_then(|d| Key::from_u32(d))
                .ok_or_else(|| UnknownKeyNameError(s.to_owned())),
            _ => Err(UnknownKeyNameError(s.to_owned())),
        }
    }
}

/// The currently pressed key, shared between the host and the machine.
///
/// Only one key is tracked at a time: pressing a key replaces whatever was
/// pressed before, and releasing clears it.
#[derive(Debug)]
pub struct Keypad {
    code: AtomicUsize,
}

impl Keypad {
    /// Returns a keypad with no key pressed.
    pub fn new() -> Self {
        Keypad {
            code: AtomicUsize::new(NO_KEY as usize),
        }
    }

    /// Marks the given key as pressed.
    pub fn press(&self, key: Key) {
        self.code.store(key as usize, Ordering::SeqCst);
    }

    /// Marks no key as pressed.
    pub fn release(&self) {
        self.code.store(NO_KEY as usize, Ordering::SeqCst);
    }

    /// Marks no key as pressed, but only if the given key is the one
    /// pressed.
    pub fn release_key(&self, key: Key) {
        let _ = self.code.compare_exchange(
            key as usize,
            NO_KEY as usize,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Returns the pressed key, if any.
    pub fn pressed(&self) -> Option<Key> {
        Key::from_code(self.raw())
    }

    /// Returns the raw key code, which is `NO_KEY` when nothing is pressed.
    pub fn raw(&self) -> u8 {
        self.code.load(Ordering::SeqCst) as u8
    }
}

impl Default for Keypad {
    fn default() -> Self {
        Keypad::new()
    }
}
