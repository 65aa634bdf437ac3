//! Hardware abstraction for the Keybus capture engine.
//!
//! The three supported pin functions (clock, data, PC16) plus the write
//! pin, the free-running clocks, and the deferred-sample one-shot timer
//! all sit behind the [`Platform`] trait, so the engine itself carries no
//! target-specific code. Interrupt attachment stays with the integrator:
//! wire a change interrupt on the clock pin to
//! [`Keybus::on_clock_edge`](crate::Keybus::on_clock_edge) and the
//! one-shot timer to
//! [`Keybus::on_sample_timer`](crate::Keybus::on_sample_timer).

pub mod mock;
pub mod platform;

pub use mock::MockPlatform;
pub use platform::{Level, Platform, SAMPLE_DELAY_US};
