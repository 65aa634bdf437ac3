//! Unified logging macros.
//!
//! This module provides a logging interface that selects between
//! `defmt::` and `log::` based on the active feature flags, so the same
//! call sites work on RTT-equipped embedded targets and on the host.
//!
//! # Usage
//!
//! ```rust,ignore
//! bus_log!(info, "keybus connected");
//! bus_log!(debug, "frame: {} bytes", n);
//! bus_log!(warn, "panel buffer overflow");
//! ```
//!
//! # Feature Flags
//!
//! - `defmt` - routes through `defmt::` (preferred on embedded targets)
//! - `log` - routes through `log::`
//! - neither - compiles to nothing

/// Unified logging macro - selects defmt:: or log:: based on features.
#[macro_export]
#[cfg(feature = "defmt")]
macro_rules! bus_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

/// Unified logging macro - selects defmt:: or log:: based on features.
#[macro_export]
#[cfg(all(feature = "log", not(feature = "defmt")))]
macro_rules! bus_log {
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
}

/// Unified logging macro - compiles to nothing without a backend.
#[macro_export]
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! bus_log {
    ($level:ident, $($arg:tt)*) => {{}};
}
