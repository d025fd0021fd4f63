//! Events that drive playback

use crate::state_machine::state::Turn;
use crate::viseme::VisemeFrame;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Backend events
    /// A new turn was announced and its entities resolved
    TurnAdmitted { turn: Turn },
    /// Backend is about to start the turn's audio. `turn_id` may be omitted,
    /// meaning the turn at the head of the queue.
    LipsyncStart {
        turn_id: Option<String>,
        visemes: Vec<VisemeFrame>,
        scale: Option<f32>,
    },
    LipsyncStop,
    /// `conversation_state{state: "idle"}`
    BackendIdle,
    /// `conversation_state{state: "playing"}`
    BackendPlaying { interrupted: bool },
    Reset,

    // Local events
    /// The viseme engine finished easing the mouth shut
    CloseComplete,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TurnAdmitted { .. } => "turn_admitted",
            Event::LipsyncStart { .. } => "lipsync_start",
            Event::LipsyncStop => "lipsync_stop",
            Event::BackendIdle => "backend_idle",
            Event::BackendPlaying { .. } => "backend_playing",
            Event::Reset => "reset",
            Event::CloseComplete => "close_complete",
        }
    }
}
