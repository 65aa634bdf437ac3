//! Keypad light blink detection and beep duration metering.
//!
//! The panel has no "programming" or "memory" message; it blinks the
//! corresponding light instead. A light counts as blinking when an ON
//! observation lands within 600 ms of an OFF observation, and stops
//! counting once ON has been absent for 1200 ms. Four detectors run in
//! parallel, one per light that the panel blinks (memory, armed, bypass,
//! trouble).
//!
//! Beeps carry meaning through their duration: a short chirp
//! acknowledges a keypress, long patterns signal lockout or a rejected
//! code. [`BeepMeter`] times the ON phase and buckets it on the OFF
//! transition.

use crate::proto::constants::{
    BEEP_INVALID_MS, BEEP_KEYPRESS_MS, BEEP_LOCKOUT_MS, BLINK_OFF_WINDOW_MS, BLINK_ON_WINDOW_MS,
};

/// Blink state for one keypad light.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlinkDetector {
    time_on: u32,
    time_off: u32,
    blinking: bool,
}

impl BlinkDetector {
    /// A detector that has seen neither ON nor OFF.
    pub const fn new() -> Self {
        Self {
            time_on: 0,
            time_off: 0,
            blinking: false,
        }
    }

    /// Feed one observation of the light; returns the blink state.
    ///
    /// While the light is off and the 1200 ms window has not expired the
    /// previous verdict stands, so a blinking light stays blinking
    /// through its dark half-cycles.
    pub fn update(&mut self, lit: bool, now_ms: u32) -> bool {
        if lit {
            self.time_on = now_ms;
            self.blinking = now_ms.wrapping_sub(self.time_off) < BLINK_ON_WINDOW_MS;
        } else {
            self.time_off = now_ms;
            if now_ms.wrapping_sub(self.time_on) > BLINK_OFF_WINDOW_MS {
                self.blinking = false;
            }
        }
        self.blinking
    }

    /// Current blink verdict without a new observation.
    #[inline(always)]
    pub const fn is_blinking(&self) -> bool {
        self.blinking
    }

    /// Timestamp of the most recent ON observation.
    #[inline(always)]
    pub const fn last_on(&self) -> u32 {
        self.time_on
    }
}

/// Meaning of a completed beep, derived from its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeepCue {
    /// Up to 90 ms: keypress acknowledgement.
    Keypress,
    /// 90-800 ms: keypad lockout.
    Lockout,
    /// 800-1200 ms: invalid access code (no lights) or function not
    /// available (lights on); the decoder picks by light state.
    Rejected,
}

/// Times the beeper bit and buckets each completed beep.
#[derive(Debug, Clone, Copy, Default)]
pub struct BeepMeter {
    start_ms: u32,
    on: bool,
}

impl BeepMeter {
    /// A quiet meter.
    pub const fn new() -> Self {
        Self { start_ms: 0, on: false }
    }

    /// Feed one observation of the beep bit. Returns a cue exactly once
    /// per beep, on the ON-to-OFF transition.
    pub fn update(&mut self, beeping: bool, now_ms: u32) -> Option<BeepCue> {
        if beeping {
            self.start_ms = now_ms;
            self.on = true;
            return None;
        }
        if !self.on {
            return None;
        }
        self.on = false;

        let duration = now_ms.wrapping_sub(self.start_ms);
        if duration <= BEEP_KEYPRESS_MS {
            Some(BeepCue::Keypress)
        } else if duration <= BEEP_LOCKOUT_MS {
            Some(BeepCue::Lockout)
        } else if duration < BEEP_INVALID_MS {
            Some(BeepCue::Rejected)
        } else {
            None
        }
    }

    /// Whether a beep is currently sounding.
    #[inline(always)]
    pub const fn is_on(&self) -> bool {
        self.on
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_light_is_not_blinking() {
        let mut blink = BlinkDetector::new();
        let mut now = 5000;
        for _ in 0..10 {
            assert!(!blink.update(true, now));
            now += 500;
        }
    }

    #[test]
    fn test_alternating_light_blinks() {
        let mut blink = BlinkDetector::new();
        let mut now = 5000;
        blink.update(true, now);
        now += 400;
        assert!(!blink.update(false, now));
        now += 400;
        // ON 400 ms after OFF: inside the 600 ms window.
        assert!(blink.update(true, now));
        now += 400;
        // Verdict holds through the dark half-cycle.
        assert!(blink.update(false, now));
    }

    #[test]
    fn test_blink_decays_after_off_window() {
        let mut blink = BlinkDetector::new();
        blink.update(false, 5000);
        assert!(blink.update(true, 5400));
        blink.update(false, 5800);
        // Still inside 1200 ms of the last ON.
        assert!(blink.update(false, 6500));
        // 1201 ms after the last ON observation.
        assert!(!blink.update(false, 6601));
    }

    #[test]
    fn test_slow_cycle_is_not_blinking() {
        let mut blink = BlinkDetector::new();
        blink.update(false, 1000);
        // ON arrives 700 ms after OFF: outside the window.
        assert!(!blink.update(true, 1700));
    }

    #[test]
    fn test_beep_keypress() {
        let mut beep = BeepMeter::new();
        assert_eq!(beep.update(true, 1000), None);
        assert!(beep.is_on());
        assert_eq!(beep.update(false, 1080), Some(BeepCue::Keypress));
        assert!(!beep.is_on());
        // Only one cue per beep.
        assert_eq!(beep.update(false, 1100), None);
    }

    #[test]
    fn test_beep_lockout_and_rejected() {
        let mut beep = BeepMeter::new();
        beep.update(true, 0);
        assert_eq!(beep.update(false, 400), Some(BeepCue::Lockout));

        beep.update(true, 2000);
        assert_eq!(beep.update(false, 3000), Some(BeepCue::Rejected));
    }

    #[test]
    fn test_very_long_beep_has_no_cue() {
        let mut beep = BeepMeter::new();
        beep.update(true, 0);
        assert_eq!(beep.update(false, 1500), None);
    }
}
