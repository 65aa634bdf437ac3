#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

//! # keybus-classic
//!
//! DSC Classic series Keybus interface for embedded systems.
//!
//! This crate provides a `no_std` implementation of the Classic series
//! (PC1500/PC1550/PC3000) Keybus protocol: interrupt-driven bus capture,
//! frame segmentation, virtual keypad writes, and a partition status
//! decoder compatible with the PowerSeries status vocabulary.
//!
//! ## Features
//!
//! - Bit-level bus capture driven by clock-edge interrupts and a 250 µs
//!   deferred sampler
//! - Frame segmentation on the 2 ms inter-command clock idle
//! - Virtual keypad key injection in lockstep with the panel clock
//! - Partition status decoding: ready/armed/alarm/zones/trouble/fire
//! - Platform-agnostic via the [`Platform`] trait, host-testable with
//!   [`MockPlatform`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use keybus_classic::{Config, Keybus, MockPlatform};
//!
//! let mut keybus = Keybus::new(MockPlatform::new(), Config::with_access_code(true, "1234"))?;
//! keybus.begin();
//!
//! // Called repeatedly from the main loop:
//! if keybus.poll() && keybus.status.status_changed {
//!     keybus.status.status_changed = false;
//!     // react to keybus.status ...
//! }
//! # Ok::<(), keybus_classic::KeybusError>(())
//! ```

// Macro module (must be declared before the modules using it)
#[macro_use]
pub mod logging;

pub mod capture;
pub mod error;
pub mod hal;
pub mod interface;
pub mod proto;
pub mod status;

// Re-export commonly used types
#[doc(inline)]
pub use error::{KeybusError, Result};
#[doc(inline)]
pub use hal::{Level, MockPlatform, Platform};
#[doc(inline)]
pub use interface::{Config, Keybus};
#[doc(inline)]
pub use proto::keys::Key;
#[doc(inline)]
pub use status::{ExitState, PartitionState};
