//! Effects produced by state transitions

use crate::viseme::VisemeFrame;

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    // Outbound protocol
    /// Report entity resolution for a newly admitted turn
    SendTurnReady { turn_id: String },
    /// Ack the start handshake so the backend starts audio
    SendLipsyncReady { turn_id: String },
    /// Mouth finished closing
    SendTurnComplete,
    SendResetAck,

    // Viseme engine
    StartTimeline {
        turn_id: String,
        visemes: Vec<VisemeFrame>,
        scale: Option<f32>,
    },
    /// Begin closing from the current pose
    StopTimeline,
    /// Drop timeline and snap the pose to neutral
    ResetTimeline,

    // Attention
    /// Face speaker toward target and target toward speaker
    LockAttention { turn_id: String },
    ReleaseAllLocks,

    // Collaborators
    MuteSpeaker { turn_id: String },
    UnmuteAll,
    ShowTurnText { turn_id: String },
    HideText,
    /// Forget resolved entities
    ClearActorCache,
    /// Invalidate every pending deferred action
    CancelTimers,
}

impl Effect {
    /// Everything that returns the client to rest when a conversation ends
    pub fn idle_cleanup() -> Vec<Effect> {
        vec![
            Effect::ReleaseAllLocks,
            Effect::UnmuteAll,
            Effect::ClearActorCache,
            Effect::HideText,
        ]
    }
}
