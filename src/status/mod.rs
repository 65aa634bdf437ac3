//! Partition status decoding.
//!
//! The Classic series panel reports state only through its keypad
//! lights, the beeper bit, and the PC16 side channel. This module lifts
//! those raw signals into a partition state model using the PowerSeries
//! status vocabulary, so consumers written against the newer panels work
//! unchanged: light bits are remapped, blinking lights are debounced
//! into logical flags, beep durations become status cues, and every
//! observable carries a paired `*_changed` flag the caller clears.

pub mod blink;
pub mod decoder;

pub use blink::{BeepCue, BeepMeter, BlinkDetector};
pub use decoder::{Decoder, ExitState, PartitionState};
