//! Messages sent to the backend

use serde::Serialize;

/// Camera and speaker positions used by the backend for 3D audio panning
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioAnchors {
    pub cam_x: f32,
    pub cam_y: f32,
    pub cam_z: f32,
    pub cam_yaw: f32,
    pub cam_pitch: f32,
    pub npc_x: f32,
    pub npc_y: f32,
    pub npc_z: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Handshake ack; the backend starts audio after receiving it
    LipsyncReady { turn_id: String },
    /// Admission result for a turn
    TurnReady {
        turn_id: String,
        actor_found: bool,
        is_player_speaker: bool,
        has_positions: bool,
        #[serde(flatten)]
        positions: Option<AudioAnchors>,
    },
    /// Mouth-close finished for the current turn
    TurnComplete,
    Positions(AudioAnchors),
    SpeakerReady { speaker_id: String, found: bool },
    Reset,
}

impl OutboundMessage {
    /// Message type name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::LipsyncReady { .. } => "lipsync_ready",
            OutboundMessage::TurnReady { .. } => "turn_ready",
            OutboundMessage::TurnComplete => "turn_complete",
            OutboundMessage::Positions(_) => "positions",
            OutboundMessage::SpeakerReady { .. } => "speaker_ready",
            OutboundMessage::Reset => "reset",
        }
    }
}
