//! Pure state transition function
//!
//! Given the same state and event this always produces the same new state
//! and effects; all I/O happens in the runtime when effects execute.

use super::state::Phase;
use super::{ConvContext, ConvState, Effect, Event};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition. None are fatal; the runtime logs
/// them and keeps the previous state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Turn {0} is already queued")]
    DuplicateTurn(String),
    #[error("Turn {0} is not queued")]
    UnknownTurn(String),
    #[error("No queued turn to start")]
    EmptyQueue,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    _context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state.phase, event) {
        // ============================================================
        // Reset (any phase)
        // ============================================================

        // Any + Reset -> Idle, everything cleared
        (_, Event::Reset) => Ok(TransitionResult::new(ConvState::default())
            .with_effect(Effect::CancelTimers)
            .with_effect(Effect::ResetTimeline)
            .with_effects(Effect::idle_cleanup())
            .with_effect(Effect::SendResetAck)),

        // ============================================================
        // Turn Admission
        // ============================================================
        (phase, Event::TurnAdmitted { turn }) => {
            if state.queue.contains(&turn.turn_id) {
                return Err(TransitionError::DuplicateTurn(turn.turn_id));
            }
            let turn_id = turn.turn_id.clone();
            let mut new_state = state.clone();
            new_state.queue.push(turn);

            // Idle + TurnAdmitted -> Preparing, addressable immediately
            if phase == Phase::Idle {
                let index = new_state.queue.len() - 1;
                new_state.queue.set_current(index);
                new_state.phase = Phase::Preparing;
                new_state.current_turn_id = Some(turn_id.clone());
                new_state.message_shown = false;
            }
            Ok(TransitionResult::new(new_state).with_effect(Effect::SendTurnReady { turn_id }))
        }

        // ============================================================
        // Start Handshake
        // ============================================================

        // Preparing + LipsyncStart -> Playing. Also accepted while playing or
        // closing when the backend hands off without waiting for our close.
        (
            Phase::Preparing | Phase::Playing | Phase::Closing,
            Event::LipsyncStart {
                turn_id,
                visemes,
                scale,
            },
        ) => {
            let index = match turn_id.as_deref() {
                Some(id) => state
                    .queue
                    .position(id)
                    .ok_or_else(|| TransitionError::UnknownTurn(id.to_string()))?,
                None if state.queue.is_empty() => return Err(TransitionError::EmptyQueue),
                None => state.queue.current_index(),
            };

            let mut new_state = state.clone();
            new_state.queue.set_current(index);
            let turn_id = new_state
                .queue
                .current()
                .map(|t| t.turn_id.clone())
                .ok_or(TransitionError::EmptyQueue)?;

            let same_turn = state.current_turn_id.as_deref() == Some(turn_id.as_str());
            let show_text = !(same_turn && state.message_shown);

            new_state.phase = Phase::Playing;
            new_state.current_turn_id = Some(turn_id.clone());
            new_state.message_shown = true;

            let mut result = TransitionResult::new(new_state)
                .with_effect(Effect::StartTimeline {
                    turn_id: turn_id.clone(),
                    visemes,
                    scale,
                })
                .with_effect(Effect::MuteSpeaker {
                    turn_id: turn_id.clone(),
                })
                .with_effect(Effect::LockAttention {
                    turn_id: turn_id.clone(),
                });
            if show_text {
                result = result.with_effect(Effect::ShowTurnText {
                    turn_id: turn_id.clone(),
                });
            }
            Ok(result.with_effect(Effect::SendLipsyncReady { turn_id }))
        }

        // ============================================================
        // Stop and Close
        // ============================================================

        // Playing + LipsyncStop -> Closing
        (Phase::Playing, Event::LipsyncStop) => {
            let mut new_state = state.clone();
            new_state.phase = Phase::Closing;
            Ok(TransitionResult::new(new_state).with_effect(Effect::StopTimeline))
        }

        // Closing + CloseComplete -> Preparing | Idle
        (Phase::Closing, Event::CloseComplete) => {
            let mut new_state = state.clone();
            new_state.queue.complete_current();
            new_state.current_turn_id = None;
            new_state.message_shown = false;

            if new_state.queue.is_empty() && new_state.pending_idle {
                // Latched idle applies now that the mouth is shut
                return Ok(TransitionResult::new(ConvState::default())
                    .with_effect(Effect::SendTurnComplete)
                    .with_effects(Effect::idle_cleanup()));
            }
            new_state.phase = Phase::Preparing;
            Ok(TransitionResult::new(new_state).with_effect(Effect::SendTurnComplete))
        }

        // ============================================================
        // Backend Conversation State
        // ============================================================

        // Idle + BackendIdle -> Idle (nothing to do)
        (Phase::Idle, Event::BackendIdle) => Ok(TransitionResult::new(state.clone())),

        // Preparing + BackendIdle -> Idle; nothing is animating
        (Phase::Preparing, Event::BackendIdle) => {
            Ok(TransitionResult::new(ConvState::default()).with_effects(Effect::idle_cleanup()))
        }

        // Playing/Closing + BackendIdle -> latch until close completes
        (Phase::Playing | Phase::Closing, Event::BackendIdle) => {
            let mut new_state = state.clone();
            new_state.pending_idle = true;
            Ok(TransitionResult::new(new_state))
        }

        // Any + interrupt -> queue truncated to the active turn
        (_, Event::BackendPlaying { interrupted: true }) => {
            let mut new_state = state.clone();
            new_state
                .queue
                .truncate_to(state.current_turn_id.as_deref());
            if new_state.queue.is_empty() {
                new_state.current_turn_id = None;
            }
            Ok(TransitionResult::new(new_state))
        }

        // Any + playing -> more is in flight, cancel any latched idle
        (_, Event::BackendPlaying { interrupted: false }) => {
            let mut new_state = state.clone();
            new_state.pending_idle = false;
            Ok(TransitionResult::new(new_state))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (phase, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {phase} with event {}",
            event.name()
        ))),
    }
}
