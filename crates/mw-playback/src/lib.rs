//! Macro playback
//!
//! A Macro is an ordered, repeatable sequence of [`Action`]s. The
//! [`MacroEngine`] owns the macro catalogue and runs playback sessions:
//! one cancellable task per macro id, stop observed cooperatively at pass
//! and action boundaries, repetition bounded by the macro's repeat count
//! (0 = until stopped).
//!
//! # Key Types
//!
//! - [`Action`] - one atomic playback step (simulated input or delay)
//! - [`Macro`] - a stored action sequence with repeat count
//! - [`MacroEngine`] - catalogue owner and session runner

pub mod action;
pub mod engine;
pub mod keymap;
pub mod model;

pub use action::{Action, ActionKind};
pub use engine::{ActiveSession, MacroEngine, PlaybackError, PlaybackResult};
pub use keymap::native_key;
pub use model::{Macro, MacroCatalogue};
