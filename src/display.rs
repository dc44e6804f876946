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

//! The Chip-8 display buffer.
//!
//! The buffer is shared between the instruction driver, which draws into it,
//! and whatever renderer the host attaches, which only ever reads it.  Each
//! pixel is its own atomic cell, so a renderer may observe a frame that is
//! partway through a sprite draw; that is acceptable, since the next redraw
//! will pick up the rest.

use std::default::Default;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// The width of the display.
pub const WIDTH: usize = 64;
/// The height of the display.
pub const HEIGHT: usize = 32;

/// The height of a hex digit sprite.
pub const HEX_HEIGHT: usize = 5;

/// The hex digit sprites, in order from `0` to `F`.
pub const HEX_SPRITES: [[u8; HEX_HEIGHT]; 16] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0],
    [0x20, 0x60, 0x20, 0x20, 0x70],
    [0xF0, 0x10, 0xF0, 0x80, 0xF0],
    [0xF0, 0x10, 0xF0, 0x10, 0xF0],
    [0x90, 0x90, 0xF0, 0x10, 0x10],
    [0xF0, 0x80, 0xF0, 0x10, 0xF0],
    [0xF0, 0x80, 0xF0, 0x90, 0xF0],
    [0xF0, 0x10, 0x20, 0x40, 0x40],
    [0xF0, 0x90, 0xF0, 0x90, 0xF0],
    [0xF0, 0x90, 0xF0, 0x10, 0xF0],
    [0xF0, 0x90, 0xF0, 0x90, 0x90],
    [0xE0, 0x90, 0xE0, 0x90, 0xE0],
    [0xF0, 0x80, 0x80, 0x80, 0xF0],
    [0xE0, 0x90, 0x90, 0x90, 0xE0],
    [0xF0, 0x80, 0xF0, 0x80, 0xF0],
    [0xF0, 0x80, 0xF0, 0x80, 0x80],
];

/// A full copy of the display, indexed as `[x][y]`.
pub type Snapshot = [[bool; HEIGHT]; WIDTH];

/// A Chip-8 display buffer.
pub struct Buffer {
    /// The pixels, stored column by column.
    data: Vec<AtomicBool>,
}

impl Buffer {
    /// Returns a new display buffer with all pixels clear.
    pub fn new() -> Self {
        Buffer {
            data: (0..WIDTH * HEIGHT).map(|_| AtomicBool::new(false)).collect(),
        }
    }

    /// Clears the display.
    pub fn reset(&self) {
        for pixel in self.data.iter() {
            pixel.store(false, Ordering::Relaxed);
        }
    }

    /// Returns the pixel at the given position.
    ///
    /// Coordinates wrap around the edges of the display.
    pub fn read(&self, x: usize, y: usize) -> bool {
        self.data[Buffer::index(x, y)].load(Ordering::Relaxed)
    }

    /// Sets the pixel at the given position.
    ///
    /// Coordinates wrap around the edges of the display.
    pub fn write(&self, x: usize, y: usize, on: bool) {
        self.data[Buffer::index(x, y)].store(on, Ordering::Relaxed);
    }

    /// Flips the on/off state of the given pixel, returning whether it was
    /// flipped off from the on state.
    pub fn toggle(&self, x: usize, y: usize) -> bool {
        let old = self.read(x, y);
        self.write(x, y, !old);
        old
    }

    /// Draws the given sprite at the given position.
    ///
    /// Each byte is one row, most significant bit leftmost.  Returns whether
    /// any pixel was switched off (a collision).
    pub fn draw_sprite(&self, sprite: &[u8], x: usize, y: usize) -> bool {
        let mut collision = false;

        for (j, row) in sprite.iter().enumerate() {
            for i in 0..8 {
                if row & (0x80 >> i) != 0 && self.toggle(x + i, y + j) {
                    collision = true;
                }
            }
        }

        collision
    }

    /// Returns a copy of the whole display, suitable for painting.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = [[false; HEIGHT]; WIDTH];
        for (x, col) in snapshot.iter_mut().enumerate() {
            for (y, pixel) in col.iter_mut().enumerate() {
                *pixel = self.read(x, y);
            }
        }
        snapshot
    }

    fn index(x: usize, y: usize) -> usize {
        (x % WIDTH) * HEIGHT + y % HEIGHT
    }
}

impl Default for Buffer {
    fn default() -> Self {
        Buffer::new()
    }
}

impl fmt::Display for Buffer {
    /// Renders the display as rows of `#` and `.`.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                write!(f, "{}", if self.read(x, y) { '#' } else { '.' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraparound() {
        let display = Buffer::new();

        display.write(WIDTH, 3, true);
        assert!(display.read(0, 3));
        display.write(5, HEIGHT, true);
        assert!(display.read(5, 0));
        assert!(display.read(WIDTH + 5, 2 * HEIGHT));
    }

    #[test]
    fn draw_collision() {
        let display = Buffer::new();
        let sprite = [0x80];

        assert!(!display.draw_sprite(&sprite, 10, 10));
        assert!(display.read(10, 10));
        assert!(display.draw_sprite(&sprite, 10, 10));
        assert!(!display.read(10, 10));
    }

    /// Tests that a sprite drawn over the corner comes out on the other
    /// sides.
    #[test]
    fn draw_wraps() {
        let display = Buffer::new();

        display.draw_sprite(&[0xC0, 0xC0], WIDTH - 1, HEIGHT - 1);
        let cases = [(WIDTH - 1, HEIGHT - 1), (0, HEIGHT - 1), (WIDTH - 1, 0), (0, 0)];
        for &(x, y) in cases.iter() {
            assert!(display.read(x, y), "case {:?}", (x, y));
        }
    }

    #[test]
    fn reset_and_snapshot() {
        let display = Buffer::new();

        display.write(1, 2, true);
        assert!(display.snapshot()[1][2]);
        display.reset();
        assert!(display.snapshot().iter().all(|col| col.iter().all(|&p| !p)));
    }
}
