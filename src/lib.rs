//! Colloquy - conversation sync engine
//!
//! Keeps a simulation client in step with a speech backend: framed
//! transport with reconnect backoff, a turn queue and playback state machine,
//! drift-corrected mouth animation, and attention locks that turn speakers
//! toward each other for the length of a turn.

pub mod attention;
pub mod config;
pub mod protocol;
pub mod runtime;
pub mod state_machine;
pub mod transport;
pub mod viseme;

pub use config::{ConfigError, SyncConfig};
pub use runtime::{ConversationRuntime, TickDriver};
