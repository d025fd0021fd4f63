//! Messages received from the backend

use crate::viseme::VisemeFrame;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Turn announcement carried by `play_turn` and `queue_item`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TurnAnnouncement {
    pub turn_id: String,
    pub speaker_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub turn_index: u32,
}

/// Decoded inbound message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Audio is about to start for a turn; ack with `lipsync_ready`
    LipsyncStart {
        #[serde(default)]
        turn_id: Option<String>,
        #[serde(default)]
        visemes: Vec<VisemeFrame>,
        #[serde(default)]
        speaker: String,
        #[serde(default)]
        scale: Option<f32>,
    },
    LipsyncStop,
    /// Streamed samples for the playing turn
    Visemes {
        #[serde(default)]
        turn_id: Option<String>,
        #[serde(default)]
        frames: Vec<VisemeFrame>,
    },
    /// Authoritative audio playback position in seconds
    AudioSync { turn_id: String, position: f64 },
    PlayTurn(TurnAnnouncement),
    QueueItem { item: TurnAnnouncement },
    ConversationState {
        state: String,
        #[serde(default)]
        interrupted: bool,
    },
    Reset,
    PlayerMessage {
        #[serde(default)]
        speaker: String,
        text: String,
    },
    Notification { text: String },
    PrepareSpeaker {
        speaker_id: String,
        #[serde(default)]
        speaker_name: Option<String>,
    },
}

const KNOWN_TYPES: &[&str] = &[
    "lipsync_start",
    "lipsync_stop",
    "visemes",
    "audio_sync",
    "play_turn",
    "queue_item",
    "conversation_state",
    "reset",
    "player_message",
    "notification",
    "prepare_speaker",
];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unhandled message type `{0}`")]
    UnknownType(String),
    #[error("malformed `{kind}` message: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
}

impl InboundMessage {
    /// Decode one frame body.
    ///
    /// Unknown types are reported separately from malformed known types so the
    /// caller can log them at a lower level.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(body)?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();
        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Err(DecodeError::UnknownType(kind));
        }
        serde_json::from_value(value).map_err(|source| DecodeError::Malformed { kind, source })
    }

    /// Normalized turn id for `lipsync_start`; the backend sends `""` for "current"
    pub fn non_empty(id: Option<String>) -> Option<String> {
        id.filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lipsync_start_with_array_visemes() {
        let body = br#"{"type":"lipsync_start","turn_id":"turn_0001","speaker":"Nellie",
            "visemes":[[0.0,0.1,0.2,0.3],[0.05,0.4,0.0,0.0]],"scale":1.2}"#;
        let msg = InboundMessage::decode(body).unwrap();
        match msg {
            InboundMessage::LipsyncStart {
                turn_id,
                visemes,
                scale,
                ..
            } => {
                assert_eq!(turn_id.as_deref(), Some("turn_0001"));
                assert_eq!(visemes.len(), 2);
                assert!((visemes[1].jaw - 0.4).abs() < 1e-6);
                assert_eq!(scale, Some(1.2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_object_visemes_and_optional_turn() {
        let body = br#"{"type":"visemes","frames":[{"t":0.5,"jaw":0.2,"smile":0.0,"funnel":0.1}]}"#;
        let msg = InboundMessage::decode(body).unwrap();
        assert!(matches!(
            msg,
            InboundMessage::Visemes { turn_id: None, ref frames } if frames.len() == 1
        ));
    }

    #[test]
    fn test_queue_item_wraps_announcement() {
        let body = br#"{"type":"queue_item","item":{"turn_id":"t1","speaker_id":"Ronen",
            "display_name":"Ronen","text":"Hello","turn_index":1}}"#;
        let InboundMessage::QueueItem { item } = InboundMessage::decode(body).unwrap() else {
            panic!("expected queue_item");
        };
        assert_eq!(item.speaker_id, "Ronen");
        assert_eq!(item.target_id, None);
    }

    #[test]
    fn test_play_turn_flat_fields() {
        let body = br#"{"type":"play_turn","turn_id":"t2","speaker_id":"Ronen",
            "target_id":"Nellie","display_name":"Ronen","text":"Hi","turn_index":2}"#;
        let InboundMessage::PlayTurn(turn) = InboundMessage::decode(body).unwrap() else {
            panic!("expected play_turn");
        };
        assert_eq!(turn.target_id.as_deref(), Some("Nellie"));
        assert_eq!(turn.turn_index, 2);
    }

    #[test]
    fn test_unit_messages() {
        assert_eq!(
            InboundMessage::decode(br#"{"type":"lipsync_stop"}"#).unwrap(),
            InboundMessage::LipsyncStop
        );
        assert_eq!(
            InboundMessage::decode(br#"{"type":"reset"}"#).unwrap(),
            InboundMessage::Reset
        );
    }

    #[test]
    fn test_unknown_and_malformed_are_distinct() {
        assert!(matches!(
            InboundMessage::decode(br#"{"type":"reload_history"}"#),
            Err(DecodeError::UnknownType(t)) if t == "reload_history"
        ));
        assert!(matches!(
            InboundMessage::decode(br#"{"type":"audio_sync","turn_id":"t1"}"#),
            Err(DecodeError::Malformed { .. })
        ));
        assert!(matches!(
            InboundMessage::decode(b"hello"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            InboundMessage::decode(br#"{"kind":"x"}"#),
            Err(DecodeError::MissingType)
        ));
    }

    #[test]
    fn test_empty_turn_id_normalizes_to_none() {
        assert_eq!(InboundMessage::non_empty(Some(String::new())), None);
        assert_eq!(
            InboundMessage::non_empty(Some("t1".into())).as_deref(),
            Some("t1")
        );
    }
}
