//! Property-based tests for stream decoding
//!
//! - Frame output does not depend on where chunk boundaries fall
//! - The line limit trips identically for every chunking
//! - Answer fragments concatenate exactly, in arrival order

use super::*;
use crate::error::TransportError;
use crate::state_machine::{Conversation, TurnState};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies
// ============================================================================

/// One line of a response body, without terminator
fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Zé€😀 {}\":,]{0,24}".prop_map(|s| format!("data: {s}")),
        1 => Just(String::new()),
        1 => "[a-z ]{0,10}".prop_map(|s| format!(": {s}")),
        1 => Just("event: message".to_string()),
        1 => Just("data: [DONE]".to_string()),
    ]
}

fn arb_body() -> impl Strategy<Value = Vec<u8>> {
    (proptest::collection::vec(arb_line(), 0..20), any::<bool>()).prop_map(|(lines, crlf)| {
        let terminator = if crlf { "\r\n" } else { "\n" };
        lines
            .iter()
            .map(|l| format!("{l}{terminator}"))
            .collect::<String>()
            .into_bytes()
    })
}

/// Split `body` at the given (unsorted, possibly repeated) cut points
fn chunk(body: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (body.len() + 1)).collect();
    points.sort_unstable();
    let mut chunks = Vec::new();
    let mut start = 0;
    for point in points {
        chunks.push(body[start..point].to_vec());
        start = point;
    }
    chunks.push(body[start..].to_vec());
    chunks
}

fn decode_all(chunks: &[Vec<u8>]) -> Vec<StreamFrame> {
    let (frames, error) = decode_limited(chunks, DEFAULT_MAX_FRAME_BYTES);
    assert_eq!(error, None);
    frames
}

/// Decode until the first error, as the turn controller does
fn decode_limited(
    chunks: &[Vec<u8>],
    max_frame_bytes: usize,
) -> (Vec<StreamFrame>, Option<TransportError>) {
    let mut decoder = FrameDecoder::new(max_frame_bytes);
    let mut frames = Vec::new();
    for c in chunks {
        if let Err(e) = decoder.push(c, &mut frames) {
            return (frames, Some(e));
        }
    }
    assert_eq!(decoder.finish(), None);
    (frames, None)
}

/// Terminated lines of varying length around a small limit
fn arb_sized_body() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(0usize..40, 0..12).prop_map(|lengths| {
        lengths
            .iter()
            .map(|n| format!("data: {}\n", "x".repeat(*n)))
            .collect::<String>()
            .into_bytes()
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_chunk_boundary_independence(
        body in arb_body(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let whole = decode_all(&[body.clone()]);
        let chunked = decode_all(&chunk(&body, &cuts));
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn prop_line_limit_independent_of_chunking(
        body in arb_sized_body(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
        limit in 4usize..32,
    ) {
        let whole = decode_limited(&[body.clone()], limit);
        let chunked = decode_limited(&chunk(&body, &cuts), limit);
        prop_assert_eq!(&whole, &chunked);

        let longest = body.split(|b| *b == b'\n').map(<[u8]>::len).max().unwrap_or(0);
        prop_assert_eq!(whole.1.is_some(), longest > limit);
    }

    #[test]
    fn prop_byte_at_a_time_matches_whole(body in arb_body()) {
        let whole = decode_all(&[body.clone()]);
        let singles: Vec<Vec<u8>> = body.iter().map(|b| vec![*b]).collect();
        prop_assert_eq!(whole, decode_all(&singles));
    }

    #[test]
    fn prop_answer_fragments_concatenate(
        fragments in proptest::collection::vec("[a-zA-Z0-9 .,é\n]{0,12}", 0..15),
        cuts in proptest::collection::vec(any::<usize>(), 0..10),
    ) {
        let mut body = String::from("data: {\"type\":\"context\",\"content\":\"ctx\"}\n\n");
        for fragment in &fragments {
            let payload = json!({ "type": "answer", "content": fragment });
            body.push_str(&format!("data: {payload}\n\n"));
        }
        body.push_str("data: [DONE]\n\n");

        let mut conv = Conversation::new("doc");
        conv.append_user_message("q").unwrap();
        let handle = conv.begin_assistant_placeholder().unwrap();
        conv.mark_streaming(&handle).unwrap();

        let mut decoder = FrameDecoder::default();
        let mut done = false;
        'chunks: for c in chunk(body.as_bytes(), &cuts) {
            let mut frames = Vec::new();
            decoder.push(&c, &mut frames).unwrap();
            for frame in &frames {
                if route(&mut conv, &handle, frame) == RouteOutcome::Done {
                    done = true;
                    break 'chunks;
                }
            }
        }
        prop_assert!(done);
        conv.finalize_turn(handle, None).unwrap();

        prop_assert_eq!(&conv.messages()[1].content, &fragments.concat());
        prop_assert_eq!(conv.context_text(), "ctx");
        prop_assert_eq!(conv.turn_state(), TurnState::Completed);
    }
}
