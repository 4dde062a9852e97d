//! Property-based tests for the conversation state machine
//!
//! Random operation sequences are applied to a [`Conversation`]; the log and
//! turn state invariants must hold after every step.

use super::*;
use crate::error::InvalidStateError;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Submit(String),
    BeginPlaceholder,
    Bytes,
    Append(String),
    Context(String),
    Finalize,
    Fail(String),
    Cancel,
    Acknowledge,
}

fn arb_turn_state() -> impl Strategy<Value = TurnState> {
    prop_oneof![
        Just(TurnState::Idle),
        Just(TurnState::AwaitingFirstByte),
        Just(TurnState::Streaming),
        Just(TurnState::Completed),
        Just(TurnState::Failed),
    ]
}

fn arb_turn_event() -> impl Strategy<Value = TurnEvent> {
    prop_oneof![
        Just(TurnEvent::Submit),
        Just(TurnEvent::BytesReceived),
        Just(TurnEvent::Finish),
        Just(TurnEvent::Fail),
        Just(TurnEvent::Cancel),
        Just(TurnEvent::Acknowledge),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-zA-Z ?]{0,20}".prop_map(Op::Submit),
        2 => Just(Op::BeginPlaceholder),
        2 => Just(Op::Bytes),
        4 => "[a-zA-Z ]{0,10}".prop_map(Op::Append),
        1 => "[a-z]{0,10}".prop_map(Op::Context),
        1 => Just(Op::Finalize),
        1 => "[a-z ]{1,10}".prop_map(Op::Fail),
        1 => Just(Op::Cancel),
        1 => Just(Op::Acknowledge),
    ]
}

// ============================================================================
// Invariant Checkers
// ============================================================================

fn no_adjacent_assistant_messages(messages: &[ConversationMessage]) -> bool {
    messages
        .windows(2)
        .all(|pair| !(pair[0].role == Role::Assistant && pair[1].role == Role::Assistant))
}

fn apply(conv: &mut Conversation, handle: &mut Option<AssistantHandle>, op: Op) {
    match op {
        Op::Submit(text) => {
            let _ = conv.append_user_message(&text);
        }
        Op::BeginPlaceholder => {
            if let Ok(h) = conv.begin_assistant_placeholder() {
                *handle = Some(h);
            }
        }
        Op::Bytes => {
            if let Some(h) = handle.as_ref() {
                let _ = conv.mark_streaming(h);
            }
        }
        Op::Append(fragment) => {
            if let Some(h) = handle.as_ref() {
                let _ = conv.append_to_assistant(h, &fragment);
            }
        }
        Op::Context(text) => conv.set_context(text),
        Op::Finalize => {
            if let Some(h) = handle.take() {
                let _ = conv.finalize_turn(h, None);
            }
        }
        Op::Fail(reason) => {
            if let Some(h) = handle.take() {
                let _ = conv.fail_turn(h, &reason);
            }
        }
        Op::Cancel => {
            if let Some(h) = handle.take() {
                let _ = conv.cancel_turn(h, "cancelled");
            }
        }
        Op::Acknowledge => {
            let _ = conv.acknowledge();
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Transition is total and busy states always refuse submission
    #[test]
    fn prop_transition_total(state in arb_turn_state(), event in arb_turn_event()) {
        match transition(state, event) {
            Ok(next) => {
                if event == TurnEvent::Submit {
                    prop_assert!(state.accepts_submission());
                    prop_assert_eq!(next, TurnState::AwaitingFirstByte);
                }
                if matches!(event, TurnEvent::Fail | TurnEvent::Cancel) {
                    prop_assert_eq!(next, TurnState::Failed);
                }
            }
            Err(TransitionError::TurnInFlight) => prop_assert!(state.is_busy()),
            Err(_) => {}
        }
    }

    // Frozen messages never change and the log only grows
    #[test]
    fn prop_log_append_only(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let mut conv = Conversation::new("doc");
        let mut handle = None;

        for op in ops {
            let before = conv.messages().to_vec();
            let mutable_index = handle.as_ref().and_then(|_| {
                before.iter().rposition(|m: &ConversationMessage| m.role == Role::Assistant)
            });

            apply(&mut conv, &mut handle, op);

            let after = conv.messages();
            prop_assert!(after.len() >= before.len());
            for (i, (old, new)) in before.iter().zip(after).enumerate() {
                if Some(i) == mutable_index {
                    prop_assert!(new.content.starts_with(&old.content));
                } else {
                    prop_assert_eq!(old, new);
                }
            }
            prop_assert!(no_adjacent_assistant_messages(after));
        }
    }

    // A view refreshed after every step matches a fresh snapshot
    #[test]
    fn prop_refreshed_view_matches_snapshot(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let mut conv = Conversation::new("doc");
        let mut handle = None;
        let mut view = conv.view();

        for op in ops {
            apply(&mut conv, &mut handle, op);
            conv.refresh_view(&mut view);
            prop_assert_eq!(&view, &conv.view());
        }
    }

    // Submitting while busy leaves the log and state untouched
    #[test]
    fn prop_submit_noop_while_busy(
        prefix in proptest::collection::vec(arb_op(), 0..30),
        text in "[a-zA-Z ]{1,20}",
    ) {
        let mut conv = Conversation::new("doc");
        let mut handle = None;
        for op in prefix {
            apply(&mut conv, &mut handle, op);
        }
        prop_assume!(conv.is_busy());

        let messages = conv.messages().to_vec();
        let state = conv.turn_state();
        prop_assert_eq!(
            conv.append_user_message(&text),
            Err(InvalidStateError::TurnInFlight)
        );
        prop_assert_eq!(conv.messages(), messages.as_slice());
        prop_assert_eq!(conv.turn_state(), state);
    }

    // Appended fragments concatenate exactly
    #[test]
    fn prop_fragments_concatenate(fragments in proptest::collection::vec(".{0,8}", 0..20)) {
        let mut conv = Conversation::new("doc");
        conv.append_user_message("q").unwrap();
        let handle = conv.begin_assistant_placeholder().unwrap();
        conv.mark_streaming(&handle).unwrap();
        for fragment in &fragments {
            conv.append_to_assistant(&handle, fragment).unwrap();
        }
        conv.finalize_turn(handle, None).unwrap();

        prop_assert_eq!(&conv.messages()[1].content, &fragments.concat());
        prop_assert_eq!(conv.turn_state(), TurnState::Completed);
    }
}
