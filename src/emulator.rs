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

//! The running machine.
//!
//! An `Emulator` ties a `Cpu` to the two threads that drive it: an
//! instruction driver, which executes instructions at the configured speed,
//! and the timer clock, which counts the delay and sound timers down at
//! roughly 60 Hz.  The host talks to the emulator from its own thread to
//! start, pause and stop the machine, press keys and save or restore state.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use failure::{Error, ResultExt};
use time;

use audio::{Audio, Silent};
use cpu::{self, Control, Cpu, Peripherals, Status};
use display;
use input::Keypad;
use keyconfig::{HostKey, KeyConfiguration};
use savestate::{SaveState, SaveStateError};
use timer::{Clock, Timers};

/// An error resulting from starting a machine that was stopped.
#[derive(Debug, Fail)]
#[fail(display = "the machine was stopped and must be reset before it can run again")]
pub struct NotStartableError;

/// An error resulting from a speed that is not a positive number.
#[derive(Debug, Fail)]
#[fail(display = "invalid speed: {}", _0)]
pub struct InvalidSpeedError(pub f64);

/// Options for the emulator.
#[derive(Debug, Clone)]
pub struct Options {
    /// The instruction speed multiplier (default 1.0).
    pub speed: f64,
    /// The base period of the timer clock in milliseconds, before the speed
    /// multiplier is applied (default 17, which approximates 60 Hz).
    pub timer_period_ms: u64,
    /// How long the instruction driver sleeps between batches, in
    /// milliseconds (default 2).  One instruction is owed per period at
    /// speed 1.0.
    pub cycle_wait_ms: u64,
    /// Options for the CPU.
    pub cpu: cpu::Options,
    /// Whether to run the timer clock (default `true`).
    pub start_timer: bool,
}

impl Options {
    /// Returns the default set of options.
    pub fn new() -> Self {
        Options {
            speed: 1.0,
            timer_period_ms: 17,
            cycle_wait_ms: 2,
            cpu: cpu::Options::new(),
            start_timer: true,
        }
    }

    /// Returns a set of options useful for testing (no timer clock, fast key
    /// polling).
    pub fn testing() -> Self {
        Options {
            cpu: cpu::Options::testing(),
            start_timer: false,
            ..Options::new()
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::new()
    }
}

/// A Chip-8 machine together with the threads that run it.
pub struct Emulator {
    cpu: Arc<Mutex<Cpu>>,
    peripherals: Peripherals,
    /// The speed multiplier, stored as the bits of an `f64`.
    speed: Arc<AtomicU64>,
    clock: Option<Clock>,
    driver: Option<JoinHandle<()>>,
    cycle_wait: Duration,
    keys: KeyConfiguration,
}

impl Emulator {
    /// Returns a new emulator without sound.
    pub fn new(options: Options) -> Result<Self, Error> {
        Emulator::with_audio(Arc::new(Silent), options)
    }

    /// Returns a new emulator whose sound timer drives the given audio sink.
    pub fn with_audio(audio: Arc<Audio>, options: Options) -> Result<Self, Error> {
        if !(options.speed > 0.0 && options.speed.is_finite()) {
            Err(InvalidSpeedError(options.speed))?;
        }

        let mut timers = Timers::new();
        let on = Arc::clone(&audio);
        timers.sound.set_on_value(Box::new(move || on.tone_on()));
        timers.sound.set_on_zero(Box::new(move || audio.tone_off()));
        let peripherals = Peripherals {
            timers: Arc::new(timers),
            ..Peripherals::new()
        };

        let clock = if options.start_timer {
            let mut clock = Clock::start(
                Arc::clone(&peripherals.timers),
                Duration::from_millis(options.timer_period_ms),
            );
            if options.speed != 1.0 {
                clock.reschedule(options.speed);
            }
            Some(clock)
        } else {
            None
        };

        Ok(Emulator {
            cpu: Arc::new(Mutex::new(Cpu::new(peripherals.clone(), options.cpu))),
            peripherals,
            speed: Arc::new(AtomicU64::new(options.speed.to_bits())),
            clock,
            driver: None,
            cycle_wait: Duration::from_millis(options.cycle_wait_ms),
            keys: KeyConfiguration::new(),
        })
    }

    /// Starts the instruction driver.
    ///
    /// Does nothing if the driver is already running.  A stopped machine
    /// cannot be started again until it is reset.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.control().is_stopped() {
            Err(NotStartableError)?;
        }
        if self.driver.is_some() {
            return Ok(());
        }

        let cpu = Arc::clone(&self.cpu);
        let control = Arc::clone(&self.peripherals.control);
        let speed = Arc::clone(&self.speed);
        let wait = self.cycle_wait;
        let handle = thread::Builder::new()
            .name("chip8-driver".to_owned())
            .spawn(move || drive(&cpu, &control, &speed, wait))
            .context("could not start the instruction driver")?;
        self.driver = Some(handle);
        info!("instruction driver started");
        Ok(())
    }

    /// Pauses instruction execution.  The timers keep running.
    pub fn pause(&self) {
        self.control().pause();
    }

    /// Resumes instruction execution after a pause.
    pub fn resume(&self) {
        self.control().resume();
    }

    pub fn is_paused(&self) -> bool {
        self.control().is_paused()
    }

    /// Stops the machine for good: the instruction driver and the timer
    /// clock both exit, and only a reset makes the machine runnable again.
    pub fn stop(&mut self) {
        self.halt();
        if let Some(ref mut clock) = self.clock {
            clock.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.control().is_stopped()
    }

    /// Returns whether the instruction driver is running.
    pub fn is_running(&self) -> bool {
        self.driver.is_some() && !self.is_stopped()
    }

    /// Puts the machine back in its power-on state, leaving memory alone.
    ///
    /// A running driver is halted first; the caller starts it again.
    pub fn reset(&mut self) {
        self.halt();
        self.lock().reset();
        self.control().clear_stop();
        let speed = self.speed();
        if let Some(ref mut clock) = self.clock {
            if !clock.is_running() {
                clock.reschedule(speed);
            }
        }
    }

    /// Replaces the program with one read from the given source.
    ///
    /// The driver is halted, program memory is cleared and the machine is
    /// reset before loading; the caller starts the driver again.  Returns
    /// the number of bytes loaded.
    pub fn load_rom<R: Read>(&mut self, input: &mut R) -> Result<usize, Error> {
        self.halt();
        self.lock().memory_mut().clear();
        self.reset();
        let read = self.lock().memory_mut().load_rom(input)?;
        if read == 0 {
            warn!("the program is empty");
        } else {
            info!("loaded {} bytes of program data", read);
        }
        Ok(read)
    }

    /// Loads a program from the given file.
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, Error> {
        let path = path.as_ref();
        let mut input = File::open(path)
            .with_context(|_| format!("could not open file '{}'", path.display()))?;
        Ok(self.load_rom(&mut input)
            .with_context(|_| format!("could not load program from file '{}'", path.display()))?)
    }

    /// Returns the speed multiplier.
    pub fn speed(&self) -> f64 {
        f64::from_bits(self.speed.load(Ordering::SeqCst))
    }

    /// Changes the speed multiplier for both instruction execution and the
    /// timer clock.
    pub fn set_speed(&mut self, factor: f64) -> Result<(), Error> {
        if !(factor > 0.0 && factor.is_finite()) {
            Err(InvalidSpeedError(factor))?;
        }

        self.speed.store(factor.to_bits(), Ordering::SeqCst);
        if let Some(ref mut clock) = self.clock {
            // A stopped clock only picks up the new period on reset.
            if clock.is_running() {
                clock.reschedule(factor);
            } else {
                clock.set_factor(factor);
            }
        }
        info!("speed set to {}", factor);
        Ok(())
    }

    /// Executes the whole number of instructions in `owed`, returning the
    /// fractional part that is left over.
    ///
    /// If an instruction fails, the error and the machine state are logged,
    /// the machine is stopped and the rest of the batch is abandoned.
    pub fn execute_cycles(&self, owed: f64) -> f64 {
        run_cycles(&self.cpu, self.control(), owed)
    }

    /// Executes a single instruction on the calling thread.
    ///
    /// A pending key wait returns at once with `Status::WaitingForKey`.
    pub fn step(&self) -> Result<Status, Error> {
        self.lock().decode_next()
    }

    /// Takes a snapshot of the machine.
    pub fn save_state(&self) -> SaveState {
        SaveState::capture(&*self.lock())
    }

    /// Replaces the machine state with the given snapshot.
    pub fn load_state(&self, state: &SaveState) -> Result<(), SaveStateError> {
        state.restore(&mut *self.lock())
    }

    /// Writes a snapshot of the machine to the given file.
    pub fn save_state_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        let path = path.as_ref();
        self.save_state().write_to(path)?;
        info!("saved state to {}", path.display());
        Ok(())
    }

    /// Restores the machine from a snapshot in the given file.
    ///
    /// The machine is left as it was if the file cannot be read or is
    /// malformed.
    pub fn load_state_from<P: AsRef<Path>>(&self, path: P) -> Result<(), SaveStateError> {
        let path = path.as_ref();
        let loaded = SaveState::read_from(path).and_then(|state| self.load_state(&state));
        match loaded {
            Ok(()) => info!("loaded state from {}", path.display()),
            Err(ref e) => warn!("rejected state from {}: {}", path.display(), e),
        }
        loaded
    }

    /// Handles a host key press through the key configuration.
    pub fn key_down(&self, key: &HostKey) {
        self.keys.get_or_noop(key).trigger(self.keypad());
    }

    /// Handles a host key release.
    ///
    /// The keypad is only released if it still holds the key this host key
    /// presses, so letting go of an earlier key keeps a later one held.
    pub fn key_up(&self, key: &HostKey) {
        if let Some(key) = self.keys.get_or_noop(key).key() {
            self.keypad().release_key(key);
        }
    }

    pub fn key_configuration(&self) -> &KeyConfiguration {
        &self.keys
    }

    pub fn set_key_configuration(&mut self, keys: KeyConfiguration) {
        self.keys = keys;
    }

    /// Returns the display buffer, for rendering.
    pub fn display(&self) -> &display::Buffer {
        &self.peripherals.display
    }

    pub fn keypad(&self) -> &Keypad {
        &self.peripherals.keypad
    }

    pub fn timers(&self) -> &Timers {
        &self.peripherals.timers
    }

    /// Returns a multi-line dump of the machine state.
    pub fn state(&self) -> String {
        self.lock().state()
    }

    /// Runs the given function with exclusive access to the CPU.
    pub fn with_cpu<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&mut Cpu) -> T,
    {
        f(&mut *self.lock())
    }

    fn control(&self) -> &Control {
        &self.peripherals.control
    }

    fn lock(&self) -> MutexGuard<Cpu> {
        // A panic on the driver thread leaves the CPU in a usable state.
        self.cpu.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stops the instruction driver and waits for it to exit.
    fn halt(&mut self) {
        self.control().stop();
        if let Some(handle) = self.driver.take() {
            if handle.join().is_err() {
                error!("instruction driver panicked");
            }
        }
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The body of the instruction driver thread.
///
/// After each batch the driver sleeps for `wait`, then works out how many
/// instructions are owed from how long it actually slept, so oversleeping is
/// made up for in the next batch.  Fractions of an instruction carry over.
fn drive(cpu: &Mutex<Cpu>, control: &Control, speed: &AtomicU64, wait: Duration) {
    let wait_ns = wait.as_secs() as f64 * 1e9 + wait.subsec_nanos() as f64;
    let mut owed = 1.0;

    while !control.is_stopped() {
        if control.is_paused() {
            thread::sleep(wait);
            continue;
        }

        let left = run_cycles(cpu, control, owed);
        let start = time::precise_time_ns();
        thread::sleep(wait);
        let elapsed = (time::precise_time_ns() - start) as f64;
        owed = elapsed / wait_ns * f64::from_bits(speed.load(Ordering::SeqCst)) + left;
    }
    info!("instruction driver stopped");
}

/// Executes the whole number of instructions in `owed` and returns the rest.
///
/// A pending key wait ends the batch: the CPU lock is released and the
/// keypad is checked again after the poll interval, so the host can save or
/// inspect the machine in the meantime.
fn run_cycles(cpu: &Mutex<Cpu>, control: &Control, mut owed: f64) -> f64 {
    while owed >= 1.0 && !control.is_stopped() {
        let mut cpu = cpu.lock().unwrap_or_else(PoisonError::into_inner);
        let status = cpu.decode_next();
        match status {
            Ok(Status::Executed) => owed -= 1.0,
            Ok(Status::WaitingForKey) => {
                let interval = cpu.key_poll_interval();
                drop(cpu);
                thread::sleep(interval);
                return owed.fract();
            }
            Err(e) => {
                control.stop();
                error!("{}", e);
                for cause in e.iter_chain().skip(1) {
                    error!("caused by: {}", cause);
                }
                error!("machine state:\n{}", cpu.state());
                return owed.fract();
            }
        }
    }
    owed
}
