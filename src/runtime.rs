//! Runtime: executes state machine effects against the transport, the
//! animation engine, attention locks and the simulation, driven by a
//! fixed-rate tick

mod driver;
mod executor;
mod timers;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use driver::TickDriver;
pub use executor::ConversationRuntime;
pub use timers::{DeferredAction, TimerId, Timers};
pub use traits::*;
