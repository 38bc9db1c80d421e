//! Trigger engine
//!
//! Triggers are stored rules mapping an input pattern to a macro id. The
//! [`TriggerEngine`] owns the trigger catalogue, consumes raw input events
//! (key down/up, joystick samples), classifies them against the registered
//! patterns — press, hold, double-tap, modifier combo, joystick button and
//! axis — and requests macro playback on a match without ever blocking the
//! event path.
//!
//! # Key Types
//!
//! - [`Trigger`] - a stored pattern rule
//! - [`TriggerEngine`] - catalogue owner and event classifier
//! - [`JoystickInput`] - one polled joystick sample

pub mod engine;
pub mod trigger;

pub use engine::{JoystickInput, TriggerEngine};
pub use trigger::{Trigger, TriggerCatalogue, TriggerError, TriggerKind, TriggerResult};
