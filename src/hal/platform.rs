//! Platform trait abstracting pins, clocks, and the sample timer.
//!
//! The Classic series targets differ only in how the 250 µs one-shot is
//! produced (AVR Timer1 vs. the SoC hardware-timer APIs); everything the
//! engine needs collapses into this one trait. Critical sections are not
//! part of the trait - they come from the `critical-section` crate, which
//! each target provides an implementation for.
//!
//! ## Implementing for a target
//!
//! ```rust,ignore
//! struct Board { clock: Input, data: Input, pc16: Input, write: Output, timer: OneShot }
//!
//! impl Platform for Board {
//!     fn clock_level(&self) -> Level { self.clock.level().into() }
//!     fn data_level(&self) -> Level { self.data.level().into() }
//!     fn pc16_level(&self) -> Level { self.pc16.level().into() }
//!     fn write_level(&mut self, level: Level) { self.write.set(level) }
//!     fn micros(&self) -> u32 { now_us() }
//!     fn millis(&self) -> u32 { now_ms() }
//!     fn arm_sample_timer(&mut self, delay_us: u32) { self.timer.arm(delay_us) }
//!     fn stop_sample_timer(&mut self) { self.timer.stop() }
//! }
//! ```

/// Delay between a clock edge and the deferred data-line sample.
///
/// Keypad data has been observed up to 160 µs late after a clock change;
/// 250 µs rides that out while staying well inside the ~500 µs half-bit.
pub const SAMPLE_DELAY_US: u32 = 250;

/// Digital level of a bus line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Line pulled low.
    Low,
    /// Line at idle/high.
    High,
}

impl Level {
    /// Returns `true` for [`Level::High`].
    #[inline(always)]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Returns `true` for [`Level::Low`].
    #[inline(always)]
    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    #[inline(always)]
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Hardware access needed by the capture engine.
///
/// All methods are called from interrupt context (under a critical
/// section) as well as from the foreground poll; implementations must be
/// safe to call from both and should avoid blocking.
pub trait Platform {
    /// Current level of the Keybus clock line.
    fn clock_level(&self) -> Level;

    /// Current level of the Keybus data line.
    fn data_level(&self) -> Level;

    /// Current level of the PC16 status line.
    fn pc16_level(&self) -> Level;

    /// Drive the virtual keypad write pin.
    ///
    /// The write circuit is an open-collector inverter: driving the pin
    /// [`Level::High`] pulls the bus data line low.
    fn write_level(&mut self, level: Level);

    /// Free-running microsecond counter. Wraps; only differences are used.
    fn micros(&self) -> u32;

    /// Free-running millisecond counter. Wraps; only differences are used.
    fn millis(&self) -> u32;

    /// Arm the one-shot sample timer to fire once after `delay_us`.
    ///
    /// Re-arming before expiry restarts the countdown.
    fn arm_sample_timer(&mut self, delay_us: u32);

    /// Disarm the sample timer.
    fn stop_sample_timer(&mut self);
}
