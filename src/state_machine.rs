//! Turn queue and playback phase state machine
//!
//! Elm-style: a pure `transition` returns the next state plus effects for
//! the runtime to execute.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConvState, Phase, PlaybackQueue, Turn};
pub use transition::{transition, TransitionError, TransitionResult};
