//! Conversation playback state types

use crate::protocol::TurnAnnouncement;
use crate::runtime::EntityRef;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Phase
// ============================================================================

/// Coarse playback state of the active turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    /// A turn is queued and the backend has not started its audio yet
    Preparing,
    /// Audio and mouth animation running
    Playing,
    /// Audio finished; mouth easing back to neutral
    Closing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Preparing => "preparing",
            Phase::Playing => "playing",
            Phase::Closing => "closing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Turn
// ============================================================================

/// One utterance, with entity references resolved when it was admitted
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub turn_id: String,
    pub speaker_id: String,
    pub target_id: Option<String>,
    pub display_name: String,
    pub text: String,
    pub turn_index: u32,
    pub speaker: Option<EntityRef>,
    pub target: Option<EntityRef>,
}

impl Turn {
    pub fn from_announcement(
        announcement: TurnAnnouncement,
        speaker: Option<EntityRef>,
        target: Option<EntityRef>,
    ) -> Self {
        Self {
            turn_id: announcement.turn_id,
            speaker_id: announcement.speaker_id,
            target_id: announcement.target_id,
            display_name: announcement.display_name,
            text: announcement.text,
            turn_index: announcement.turn_index,
            speaker,
            target,
        }
    }

    /// Subtitle speaker label, falling back to the backend id
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.speaker_id
        } else {
            &self.display_name
        }
    }
}

// ============================================================================
// Playback Queue
// ============================================================================

/// Turns in arrival order.
///
/// `current_index` is either a valid index or 0 on an empty queue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackQueue {
    turns: Vec<Turn>,
    current_index: usize,
}

impl PlaybackQueue {
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current(&self) -> Option<&Turn> {
        self.turns.get(self.current_index)
    }

    pub fn position(&self, turn_id: &str) -> Option<usize> {
        self.turns.iter().position(|t| t.turn_id == turn_id)
    }

    pub fn get(&self, turn_id: &str) -> Option<&Turn> {
        self.turns.iter().find(|t| t.turn_id == turn_id)
    }

    pub fn contains(&self, turn_id: &str) -> bool {
        self.position(turn_id).is_some()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Point at `index`; out-of-range indexes are ignored
    pub fn set_current(&mut self, index: usize) -> bool {
        if index < self.turns.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// Evict the current turn and everything before it
    pub fn complete_current(&mut self) {
        if self.turns.is_empty() {
            return;
        }
        let end = self.current_index.min(self.turns.len() - 1);
        self.turns.drain(..=end);
        self.current_index = 0;
    }

    /// Keep only `keep` (the active turn), or nothing
    pub fn truncate_to(&mut self, keep: Option<&str>) -> usize {
        let before = self.turns.len();
        match keep.and_then(|id| self.position(id)) {
            Some(index) => {
                let turn = self.turns.swap_remove(index);
                self.turns.clear();
                self.turns.push(turn);
            }
            None => self.turns.clear(),
        }
        self.current_index = 0;
        before - self.turns.len()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.current_index = 0;
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Complete playback state. Transitions replace it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvState {
    pub phase: Phase,
    /// Turn being prepared or played; always present in `queue` when set
    pub current_turn_id: Option<String>,
    pub queue: PlaybackQueue,
    /// Current turn's text has been displayed
    pub message_shown: bool,
    /// Backend said idle while we were still playing/closing
    pub pending_idle: bool,
}

impl ConvState {
    pub fn current_turn(&self) -> Option<&Turn> {
        self.current_turn_id
            .as_deref()
            .and_then(|id| self.queue.get(id))
    }
}

/// Static inputs to the transition function
#[derive(Debug, Clone)]
pub struct ConvContext {
    /// Speaker/target id the backend uses for the player character
    pub player_id: String,
}

impl ConvContext {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
        }
    }

    pub fn is_player(&self, id: &str) -> bool {
        id.eq_ignore_ascii_case(&self.player_id)
    }
}
