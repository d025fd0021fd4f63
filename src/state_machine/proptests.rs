//! Property-based tests for the playback state machine
//!
//! Random event streams, including out-of-order and duplicate backend
//! signals, must never break the queue invariants.

use super::state::*;
use super::transition::*;
use super::*;
use crate::viseme::VisemeFrame;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new("player")
}

fn turn(id: &str) -> Turn {
    Turn {
        turn_id: id.to_string(),
        speaker_id: "npc".into(),
        target_id: Some("player".into()),
        display_name: "Npc".into(),
        text: "hello".into(),
        turn_index: 0,
        speaker: None,
        target: None,
    }
}

/// currentTurnId is null or names a queued turn; the index is valid
fn is_valid_state(state: &ConvState) -> bool {
    let index_ok = state.queue.is_empty() || state.queue.current_index() < state.queue.len();
    let current_ok = state
        .current_turn_id
        .as_deref()
        .map_or(true, |id| state.queue.contains(id));
    let idle_ok = state.phase != Phase::Idle
        || (state.queue.is_empty() && state.current_turn_id.is_none() && !state.pending_idle);
    let playing_ok = !matches!(state.phase, Phase::Playing | Phase::Closing)
        || state.current_turn_id.is_some();
    index_ok && current_ok && idle_ok && playing_ok
}

fn count_turn_complete(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|e| matches!(e, Effect::SendTurnComplete))
        .count()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_turn_id() -> impl Strategy<Value = String> {
    (0u8..6).prop_map(|n| format!("turn_{n:04}"))
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        3 => arb_turn_id().prop_map(|id| Event::TurnAdmitted { turn: turn(&id) }),
        3 => proptest::option::of(arb_turn_id()).prop_map(|turn_id| Event::LipsyncStart {
            turn_id,
            visemes: vec![VisemeFrame::new(0.0, 0.5, 0.0, 0.0)],
            scale: None,
        }),
        2 => Just(Event::LipsyncStop),
        2 => Just(Event::CloseComplete),
        1 => Just(Event::BackendIdle),
        1 => any::<bool>().prop_map(|interrupted| Event::BackendPlaying { interrupted }),
        1 => Just(Event::Reset),
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    // Queue invariants hold after every accepted transition
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..40)) {
        let mut state = ConvState::default();
        let ctx = test_context();

        for event in events {
            match transition(&state, &ctx, event) {
                Ok(result) => {
                    state = result.new_state;
                    prop_assert!(is_valid_state(&state), "Invalid state: {:?}", state);
                }
                Err(_) => { /* rejected events leave the state untouched */ }
            }
        }
    }

    // Interrupt leaves only the active turn (or nothing)
    #[test]
    fn prop_interrupt_keeps_only_active(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut state = ConvState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }

        let result = transition(&state, &ctx, Event::BackendPlaying { interrupted: true }).unwrap();
        let after = result.new_state;
        match state.current_turn_id.as_deref() {
            Some(id) => {
                prop_assert_eq!(after.queue.len(), 1);
                prop_assert_eq!(after.queue.turns()[0].turn_id.as_str(), id);
                prop_assert_eq!(after.current_turn_id.as_deref(), Some(id));
            }
            None => prop_assert!(after.queue.is_empty()),
        }
        prop_assert_eq!(after.phase, state.phase);
    }

    // Exactly one turn_complete per accepted close, none otherwise
    #[test]
    fn prop_turn_complete_only_on_close(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = test_context();
        let mut state = ConvState::default();
        for event in events {
            let is_close = matches!(event, Event::CloseComplete);
            if let Ok(result) = transition(&state, &ctx, event) {
                let expected = usize::from(is_close);
                prop_assert_eq!(count_turn_complete(&result.effects), expected);
                state = result.new_state;
            }
        }
    }

    // Reset always lands on the default state and acknowledges
    #[test]
    fn prop_reset_from_anywhere(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut state = ConvState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }
        let result = transition(&state, &ctx, Event::Reset).unwrap();
        prop_assert_eq!(result.new_state, ConvState::default());
        prop_assert!(result.effects.contains(&Effect::SendResetAck));
        prop_assert!(result.effects.contains(&Effect::ReleaseAllLocks));
    }

    // Lock release is reachable from every phase: reset and idle cleanup
    // both carry it, and idle is only entered through one of them
    #[test]
    fn prop_idle_entry_releases_locks(events in proptest::collection::vec(arb_event(), 0..40)) {
        let ctx = test_context();
        let mut state = ConvState::default();
        for event in events {
            let was = state.phase;
            if let Ok(result) = transition(&state, &ctx, event) {
                if was != Phase::Idle && result.new_state.phase == Phase::Idle {
                    prop_assert!(result.effects.contains(&Effect::ReleaseAllLocks));
                    prop_assert!(result.effects.contains(&Effect::UnmuteAll));
                }
                state = result.new_state;
            }
        }
    }

    // Admission while idle makes the turn addressable right away
    #[test]
    fn prop_idle_admission_sets_current(id in arb_turn_id()) {
        let result = transition(&ConvState::default(), &test_context(), Event::TurnAdmitted { turn: turn(&id) }).unwrap();
        prop_assert_eq!(result.new_state.phase, Phase::Preparing);
        prop_assert_eq!(result.new_state.current_turn_id, Some(id));
    }

    // Rejected events do not change anything the caller can observe
    #[test]
    fn prop_errors_are_side_effect_free(
        events in proptest::collection::vec(arb_event(), 0..20),
        extra in arb_event()
    ) {
        let ctx = test_context();
        let mut state = ConvState::default();
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }
        let before = state.clone();
        if transition(&state, &ctx, extra).is_err() {
            prop_assert_eq!(state, before);
        }
    }
}

// ============================================================================
// Worked example
// ============================================================================

#[test]
fn test_two_turn_example_sequence() {
    let ctx = test_context();
    let mut state = ConvState::default();
    let mut apply = |event: Event| {
        state = transition(&state, &ctx, event).unwrap().new_state;
        state.clone()
    };

    let s = apply(Event::TurnAdmitted { turn: turn("1") });
    assert_eq!((s.phase, s.current_turn_id.as_deref()), (Phase::Preparing, Some("1")));
    apply(Event::TurnAdmitted { turn: turn("2") });

    let s = apply(Event::LipsyncStart {
        turn_id: Some("1".into()),
        visemes: vec![],
        scale: None,
    });
    assert_eq!(s.phase, Phase::Playing);

    let s = apply(Event::LipsyncStop);
    assert_eq!(s.phase, Phase::Closing);

    let s = apply(Event::CloseComplete);
    assert_eq!(s.phase, Phase::Preparing);
    assert_eq!(s.current_turn_id, None);
    assert!(s.queue.contains("2"));
}
