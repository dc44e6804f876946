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

//! The random number generator behind `RND`.
//!
//! The generator is a plain xorshift128, chosen because its whole state is
//! four words and can therefore be written into a save state and restored
//! exactly; a restored machine draws the same numbers the original would
//! have.

use std::fmt;

use rand::{self, Rng, SeedableRng};

/// The number of bytes in an exported generator state.
pub const STATE_SIZE: usize = 16;

/// A xorshift128 generator with an exportable state.
#[derive(Clone, PartialEq, Eq)]
pub struct Xorshift {
    x: u32,
    y: u32,
    z: u32,
    w: u32,
}

impl Xorshift {
    /// Returns a generator seeded from the thread-local entropy source.
    pub fn new() -> Self {
        let mut seed = [0u32; 4];
        for word in seed.iter_mut() {
            *word = rand::random();
        }
        Xorshift::from_seed(seed)
    }

    /// Restores a generator from a state produced by `state_bytes`.
    pub fn from_state_bytes(bytes: &[u8; STATE_SIZE]) -> Self {
        let mut words = [0u32; 4];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks(4)) {
            *word = chunk.iter().fold(0, |acc, &b| acc << 8 | b as u32);
        }
        Xorshift::from_seed(words)
    }

    /// Returns the current state as big-endian bytes.
    pub fn state_bytes(&self) -> [u8; STATE_SIZE] {
        let mut bytes = [0; STATE_SIZE];
        for (chunk, word) in bytes
            .chunks_mut(4)
            .zip([self.x, self.y, self.z, self.w].iter())
        {
            for (i, b) in chunk.iter_mut().enumerate() {
                *b = (word >> (24 - 8 * i)) as u8;
            }
        }
        bytes
    }
}

impl Default for Xorshift {
    fn default() -> Self {
        Xorshift::new()
    }
}

impl fmt::Debug for Xorshift {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Xorshift {{ .. }}")
    }
}

impl Rng for Xorshift {
    fn next_u32(&mut self) -> u32 {
        let t = self.x ^ (self.x << 11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w = self.w ^ (self.w >> 19) ^ (t ^ (t >> 8));
        self.w
    }
}

impl SeedableRng<[u32; 4]> for Xorshift {
    /// Replaces the state with the given seed.
    ///
    /// The all-zero state is a fixed point of the generator, so it is
    /// replaced by a constant nonzero one.
    fn reseed(&mut self, seed: [u32; 4]) {
        let seed = if seed == [0; 4] {
            [0x193A_6754, 0xA8A7_D469, 0x9783_0E05, 0x113B_A7BB]
        } else {
            seed
        };
        self.x = seed[0];
        self.y = seed[1];
        self.z = seed[2];
        self.w = seed[3];
    }

    fn from_seed(seed: [u32; 4]) -> Self {
        let mut rng = Xorshift {
            x: 0,
            y: 0,
            z: 0,
            w: 0,
        };
        rng.reseed(seed);
        rng
    }
}
