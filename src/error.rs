//! Error types for Keybus operations.
//!
//! Runtime anomalies on the bus itself (buffer overflow, lost clock,
//! short frames) are reported through sticky status flags, not errors;
//! the capture loop never returns `Err`. This module covers the
//! construction and encoding surfaces: configuration validation, key
//! lookup, and write queueing.

use core::fmt;

/// Result type alias for Keybus operations.
pub type Result<T> = core::result::Result<T, KeybusError>;

/// Keybus interface error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeybusError {
    /// A character with no Classic series key code was given.
    ///
    /// Valid keys are `0`-`9`, `*`, `#`, and the alarm keys `F`, `A`,
    /// `P` (either case).
    InvalidKey(char),

    /// The configured access code exceeds the 6 digit maximum.
    AccessCodeTooLong,

    /// A multi-key write exceeds the pending key buffer.
    KeyBufferFull,

    /// A write was requested but no write pin is configured.
    WriteDisabled,
}

impl fmt::Display for KeybusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "no Classic key code for {key:?}"),
            Self::AccessCodeTooLong => write!(f, "access code longer than 6 digits"),
            Self::KeyBufferFull => write!(f, "pending key buffer full"),
            Self::WriteDisabled => write!(f, "virtual keypad write pin not configured"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KeybusError {}
