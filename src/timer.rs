/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! The delay and sound timers, and the clock that drives them.
//!
//! Both timers count down once per clock tick.  The clock runs on its own
//! thread, independently of instruction execution, so the timers are
//! atomics and can be read and set from the instruction driver at any time.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use time;

/// The base clock period in milliseconds, which approximates 60 Hz.
pub const BASE_PERIOD_MS: u64 = 17;

/// A hook invoked by a timer.
pub type Callback = Box<Fn() + Send + Sync>;

/// A countdown timer.
pub struct Timer {
    /// The current value.
    value: AtomicUsize,
    /// Called on every tick that finds the timer already at zero.
    on_zero: Option<Callback>,
}

impl Timer {
    /// Returns a new timer at zero with no callback.
    pub fn new() -> Self {
        Timer {
            value: AtomicUsize::new(0),
            on_zero: None,
        }
    }

    /// Sets the callback run on each tick at zero.
    pub fn set_on_zero(&mut self, on_zero: Callback) {
        self.on_zero = Some(on_zero);
    }

    /// Returns the current value of the timer.
    pub fn value(&self) -> u8 {
        self.value.load(Ordering::SeqCst) as u8
    }

    /// Sets the value of the timer.
    pub fn set_value(&self, val: u8) {
        self.value.store(val as usize, Ordering::SeqCst);
    }

    /// Counts down by one.
    ///
    /// A timer that is already at zero stays there and runs its zero
    /// callback instead, once for every such tick.
    pub fn decrement(&self) {
        let mut current = self.value.load(Ordering::SeqCst);
        loop {
            if current == 0 {
                if let Some(ref on_zero) = self.on_zero {
                    on_zero();
                }
                return;
            }
            match self.value
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sets the timer back to zero without running any callback.
    pub fn reset(&self) {
        self.set_value(0);
    }
}

impl Default for Timer {
    fn default() -> Self {
        Timer::new()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Timer")
            .field("value", &self.value())
            .field("on_zero", &self.on_zero.is_some())
            .finish()
    }
}

/// The sound timer, which additionally reports every new value so that a
/// tone can be started.
#[derive(Default)]
pub struct SoundTimer {
    timer: Timer,
    on_value: Option<Callback>,
}

impl fmt::Debug for SoundTimer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SoundTimer")
            .field("timer", &self.timer)
            .field("on_value", &self.on_value.is_some())
            .finish()
    }
}

impl SoundTimer {
    pub fn new() -> Self {
        SoundTimer::default()
    }

    /// Sets the callback run whenever a value is set.
    pub fn set_on_value(&mut self, on_value: Callback) {
        self.on_value = Some(on_value);
    }

    /// Sets the callback run on each tick at zero.
    pub fn set_on_zero(&mut self, on_zero: Callback) {
        self.timer.set_on_zero(on_zero);
    }

    pub fn value(&self) -> u8 {
        self.timer.value()
    }

    /// Sets the value of the timer and runs the value callback.
    ///
    /// The callback runs even when the new value is zero.
    pub fn set_value(&self, val: u8) {
        self.timer.set_value(val);
        if let Some(ref on_value) = self.on_value {
            on_value();
        }
    }

    /// Sets the value without running the value callback (used when
    /// restoring a saved machine).
    pub fn load(&self, val: u8) {
        self.timer.set_value(val);
    }

    pub fn decrement(&self) {
        self.timer.decrement();
    }

    pub fn reset(&self) {
        self.timer.reset();
    }
}

/// The pair of timers ticked by the clock.
#[derive(Debug, Default)]
pub struct Timers {
    pub delay: Timer,
    pub sound: SoundTimer,
}

impl Timers {
    pub fn new() -> Self {
        Timers::default()
    }

    /// Advances both timers by one tick.
    pub fn tick(&self) {
        self.delay.decrement();
        self.sound.decrement();
    }

    /// Sets both timers to zero without running any callback.
    pub fn reset(&self) {
        self.delay.reset();
        self.sound.reset();
    }
}

/// A background thread ticking a set of timers at a fixed period.
pub struct Clock {
    timers: Arc<Timers>,
    base_period: Duration,
    period: Duration,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Starts ticking the given timers every `base_period`.
    pub fn start(timers: Arc<Timers>, base_period: Duration) -> Self {
        let mut clock = Clock {
            timers,
            base_period,
            period: base_period,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        clock.spawn();
        clock
    }

    /// Returns the current tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Returns whether the clock thread is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Cancels the current schedule and restarts it with the period
    /// `base_period / factor`.
    pub fn reschedule(&mut self, factor: f64) {
        self.stop();
        self.period = scale_period(self.base_period, factor);
        self.spawn();
    }

    /// Changes the period to `base_period / factor` without starting the
    /// clock; a stopped clock stays stopped until it is rescheduled.
    pub fn set_factor(&mut self, factor: f64) {
        self.period = scale_period(self.base_period, factor);
    }

    /// Stops the clock thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("timer clock thread panicked");
            }
        }
    }

    fn spawn(&mut self) {
        // Each schedule gets its own flag so a stopped thread can never be
        // revived by a later one.
        let running = Arc::new(AtomicBool::new(true));
        let timers = Arc::clone(&self.timers);
        let period_ns = duration_ns(self.period);
        self.running = Arc::clone(&running);
        self.handle = Some(thread::spawn(move || {
            let mut deadline = time::precise_time_ns() + period_ns;
            while running.load(Ordering::SeqCst) {
                let now = time::precise_time_ns();
                if now < deadline {
                    thread::sleep(Duration::from_nanos(deadline - now));
                    continue;
                }
                timers.tick();
                deadline += period_ns;
            }
        }));
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Divides a period by a speed factor, never going below one millisecond.
pub fn scale_period(base: Duration, factor: f64) -> Duration {
    let scaled = duration_ns(base) as f64 / factor;
    let min = 1_000_000.0;
    Duration::from_nanos(if scaled.is_finite() && scaled > min {
        scaled as u64
    } else {
        min as u64
    })
}

fn duration_ns(d: Duration) -> u64 {
    d.as_secs() * 1_000_000_000 + d.subsec_nanos() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, Callback) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&count);
        (
            count,
            Box::new(move || {
                hook.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn decrement_stops_at_zero() {
        let (zeros, on_zero) = counter();
        let mut timer = Timer::new();
        timer.set_on_zero(on_zero);

        timer.set_value(2);
        timer.decrement();
        assert_eq!(timer.value(), 1);
        timer.decrement();
        assert_eq!(timer.value(), 0);
        assert_eq!(zeros.load(Ordering::SeqCst), 0);
        timer.decrement();
        timer.decrement();
        assert_eq!(timer.value(), 0);
        assert_eq!(zeros.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn decrement_without_callback() {
        let timer = Timer::new();

        timer.decrement();
        assert_eq!(timer.value(), 0);
    }

    /// Tests that setting the sound timer always reports the new value, even
    /// a zero one.
    #[test]
    fn sound_timer_value_callback() {
        let (values, on_value) = counter();
        let mut timer = SoundTimer::new();
        timer.set_on_value(on_value);

        timer.set_value(5);
        timer.set_value(0);
        assert_eq!(values.load(Ordering::SeqCst), 2);
        timer.load(9);
        assert_eq!(values.load(Ordering::SeqCst), 2);
        assert_eq!(timer.value(), 9);
    }

    #[test]
    fn scaled_periods() {
        let base = Duration::from_millis(BASE_PERIOD_MS);

        assert_eq!(scale_period(base, 1.0), base);
        assert_eq!(scale_period(base, 2.0), Duration::from_micros(8500));
        assert_eq!(scale_period(base, 0.5), Duration::from_millis(34));
        assert_eq!(scale_period(base, 1000.0), Duration::from_millis(1));
    }

    #[test]
    fn clock_ticks_and_stops() {
        let timers = Arc::new(Timers::new());
        timers.delay.set_value(200);

        let mut clock = Clock::start(Arc::clone(&timers), Duration::from_millis(2));
        thread::sleep(Duration::from_millis(60));
        clock.stop();
        let stopped_at = timers.delay.value();
        assert!(stopped_at < 200);

        thread::sleep(Duration::from_millis(20));
        assert_eq!(timers.delay.value(), stopped_at);
        assert!(!clock.is_running());

        clock.reschedule(2.0);
        assert!(clock.is_running());
        assert_eq!(clock.period(), Duration::from_millis(1));
    }

    #[test]
    fn set_factor_keeps_clock_stopped() {
        let timers = Arc::new(Timers::new());
        let mut clock = Clock::start(Arc::clone(&timers), Duration::from_millis(BASE_PERIOD_MS));
        clock.stop();
        timers.delay.set_value(50);

        clock.set_factor(2.0);
        assert!(!clock.is_running());
        assert_eq!(clock.period(), Duration::from_micros(8500));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(timers.delay.value(), 50);

        clock.reschedule(2.0);
        assert!(clock.is_running());
        assert_eq!(clock.period(), Duration::from_micros(8500));
    }
}
