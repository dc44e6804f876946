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

//! The audio collaborator seam.
//!
//! The machine never synthesizes sound itself; it only tells the host when a
//! tone should start and stop.

/// A sink for tone events, driven by the sound timer.
///
/// Implementations are called from both the instruction driver (tone on,
/// when the sound timer is set) and the timer clock thread (tone off, on
/// every tick while the sound timer sits at zero), so they must be cheap and
/// tolerate repeated calls.
pub trait Audio: Send + Sync {
    /// Starts the tone.
    fn tone_on(&self);
    /// Stops the tone.
    fn tone_off(&self);
}

/// An audio sink that produces no sound and only logs the events.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl Audio for Silent {
    fn tone_on(&self) {
        debug!("tone on");
    }

    fn tone_off(&self) {
        trace!("tone off");
    }
}
