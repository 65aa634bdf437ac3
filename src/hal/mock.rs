//! Mock platform implementation for testing.
//!
//! This module provides a mock implementation of [`Platform`] that can
//! drive the full capture engine from host tests without hardware: pin
//! levels are plain fields, the clocks advance only when told to, and
//! every write-pin transition is recorded with its timestamp so tests
//! can assert the exact bit slots a virtual keypad write asserted.
//!
//! ## Example
//!
//! ```rust
//! use keybus_classic::hal::{Level, MockPlatform, Platform};
//!
//! let mut mock = MockPlatform::new();
//! mock.clock = Level::Low;
//! mock.advance_us(250);
//! assert_eq!(mock.micros(), 250);
//! assert_eq!(mock.millis(), 0);
//! ```

use super::platform::{Level, Platform};

/// Maximum number of recorded write-pin transitions.
const WRITE_EVENT_CAPACITY: usize = 64;

/// Mock platform for testing the engine without real hardware.
///
/// Tests mutate the public fields directly (through
/// [`Keybus::with_platform`](crate::Keybus::with_platform) once the
/// platform is owned by the interface) and step time with
/// [`advance_us`](MockPlatform::advance_us).
#[derive(Debug)]
pub struct MockPlatform {
    /// Level presented on the clock line.
    pub clock: Level,
    /// Level presented on the data line.
    pub data: Level,
    /// Level presented on the PC16 line.
    pub pc16: Level,
    /// Current level of the write pin.
    pub write_pin: Level,
    /// Write-pin transitions as `(micros, level)` pairs, in order.
    pub write_events: heapless::Vec<(u32, Level), WRITE_EVENT_CAPACITY>,
    /// Pending one-shot delay, if armed.
    pub armed_delay_us: Option<u32>,
    /// Total number of `arm_sample_timer` calls.
    pub timer_arms: u32,
    now_us: u32,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPlatform {
    /// Create a mock with all lines high (bus idle) at time zero.
    pub fn new() -> Self {
        Self {
            clock: Level::High,
            data: Level::High,
            pc16: Level::High,
            write_pin: Level::Low,
            write_events: heapless::Vec::new(),
            armed_delay_us: None,
            timer_arms: 0,
            now_us: 0,
        }
    }

    /// Advance both clocks by `us` microseconds.
    pub fn advance_us(&mut self, us: u32) {
        self.now_us = self.now_us.wrapping_add(us);
    }

    /// Advance both clocks by `ms` milliseconds.
    pub fn advance_ms(&mut self, ms: u32) {
        self.advance_us(ms * 1000);
    }

    /// Forget recorded write-pin transitions.
    pub fn clear_write_events(&mut self) {
        self.write_events.clear();
    }
}

impl Platform for MockPlatform {
    fn clock_level(&self) -> Level {
        self.clock
    }

    fn data_level(&self) -> Level {
        self.data
    }

    fn pc16_level(&self) -> Level {
        self.pc16
    }

    fn write_level(&mut self, level: Level) {
        if self.write_pin != level {
            self.write_pin = level;
            // Capacity overflow just drops the event; tests size for it.
            let _ = self.write_events.push((self.now_us, level));
        }
    }

    fn micros(&self) -> u32 {
        self.now_us
    }

    fn millis(&self) -> u32 {
        self.now_us / 1000
    }

    fn arm_sample_timer(&mut self, delay_us: u32) {
        self.armed_delay_us = Some(delay_us);
        self.timer_arms += 1;
    }

    fn stop_sample_timer(&mut self) {
        self.armed_delay_us = None;
    }
}
