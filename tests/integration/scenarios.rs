//! End-to-end transfer scenarios.

use lumen_core::{Phase, SessionBuilder};

use crate::channel::{flip_data_char, looped, reversed_data};
use crate::*;

#[test]
fn test_in_order_transfer() {
    let frames = wire("hello world", 5);
    assert_eq!(frames.len(), 4);
    assert!(frames[0].starts_with("HDR|v1|total:4|size:11|hash:b94d27b9934d|enc:UTF8"));

    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames.iter().map(String::as_str));
    assert_eq!(delivery.payload.as_deref(), Some("hello world"));
    assert_eq!(state.phase(), Phase::Complete);
}

#[test]
fn test_reverse_order_transfer() {
    let frames = reversed_data(&wire("order does not matter here", 4));
    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames.iter().map(String::as_str));
    assert_eq!(delivery.payload.as_deref(), Some("order does not matter here"));
    assert!(delivery.errors.is_empty());
}

/// Data scanned before the Header is refused; the loop offers it again
/// after the Header and the transfer completes.
#[test]
fn test_data_before_header_then_loop() {
    let frames = wire("hello world", 5);
    let mut stream: Vec<&str> = vec![&frames[2], &frames[1], &frames[3], &frames[0]];
    let second_loop = looped(&frames, 1);
    stream.extend(second_loop.iter().map(String::as_str));

    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, stream);
    assert_eq!(delivery.payload.as_deref(), Some("hello world"));
    assert_eq!(
        delivery.errors,
        vec![
            ReassemblyError::MissingHeader,
            ReassemblyError::MissingHeader,
            ReassemblyError::MissingHeader,
        ]
    );
}

#[test]
fn test_duplicates_are_idempotent() {
    let frames = wire("hello world", 5);
    let mut state = ReassemblyState::new();
    for raw in [&frames[0], &frames[1], &frames[1], &frames[0], &frames[2]] {
        state.ingest_wire(raw).unwrap();
    }
    assert_eq!(state.received_count(), 2);
    assert_eq!(state.phase(), Phase::Collecting);
    assert_eq!(
        state.ingest_wire(&frames[2]).unwrap(),
        Ingested::Duplicate { sequence: 2 }
    );

    let completed = state.ingest_wire(&frames[3]).unwrap();
    assert_eq!(
        completed,
        Ingested::Completed {
            payload: "hello world".into()
        }
    );
}

#[test]
fn test_corrupted_base64_rejected_then_recovered() {
    let frames = wire("hello", 5);
    assert_eq!(frames[1], "DAT|seq:1|data:aGVsbG8=|crc:3610a686|b64:1");
    let corrupted = frames[1].replace("aGVsbG8=", "aGFsbG8=");

    let mut state = ReassemblyState::new();
    state.ingest_wire(&frames[0]).unwrap();
    assert_eq!(
        state.ingest_wire(&corrupted).unwrap_err(),
        ReassemblyError::FrameIntegrity { sequence: 1 }
    );
    assert!(!state.has(1));
    assert_eq!(state.phase(), Phase::Collecting);

    let recovered = state.ingest_wire(&frames[1]).unwrap();
    assert_eq!(
        recovered,
        Ingested::Completed {
            payload: "hello".into()
        }
    );
}

#[test]
fn test_corrupted_raw_frame_rejected() {
    let builder = SessionBuilder {
        base64: false,
        ..SessionBuilder::new(5)
    };
    let frames = builder.build("hello world").unwrap().wire_frames();
    assert!(frames[1].ends_with("|b64:0"));

    let swapped = swap_data(&frames[1], "jello");
    let flipped = flip_data_char(&frames, 2);

    let mut state = ReassemblyState::new();
    state.ingest_wire(&frames[0]).unwrap();
    assert_eq!(
        state.ingest_wire(&swapped).unwrap_err(),
        ReassemblyError::FrameIntegrity { sequence: 1 }
    );
    assert_eq!(
        state.ingest_wire(&flipped[2]).unwrap_err(),
        ReassemblyError::FrameIntegrity { sequence: 2 }
    );
    assert_eq!(state.received_count(), 0);

    let delivery = deliver(&mut state, frames.iter().map(String::as_str));
    assert_eq!(delivery.payload.as_deref(), Some("hello world"));
}

/// Every fragment verifies on its own but the whole does not match the
/// Header's hash.
#[test]
fn test_payload_hash_mismatch_fails_session() {
    let honest = wire("hello world", 5);
    let other = wire("hello there", 5);

    let mut state = ReassemblyState::new();
    let delivery = deliver(
        &mut state,
        [&other[0], &honest[1], &honest[2], &honest[3]].map(String::as_str),
    );
    assert!(delivery.payload.is_none());
    assert!(matches!(
        delivery.errors.last(),
        Some(ReassemblyError::IntegrityMismatch { .. })
    ));
    assert_eq!(state.phase(), Phase::Failed);
    assert!(state.failure().is_some());

    // the failed session refuses further data until a new header arrives
    assert_eq!(
        state.ingest_wire(&honest[1]).unwrap_err(),
        ReassemblyError::SessionFailed
    );

    let retry = deliver(&mut state, honest.iter().map(String::as_str));
    assert_eq!(retry.payload.as_deref(), Some("hello world"));
}

#[test]
fn test_new_session_supersedes_old() {
    let first = wire("first payload, abandoned", 4);
    let second = wire("second payload", 4);

    let mut state = ReassemblyState::new();
    deliver(&mut state, first[..3].iter().map(String::as_str));
    assert_eq!(state.received_count(), 2);

    let delivery = deliver(&mut state, second.iter().map(String::as_str));
    assert_eq!(delivery.payload.as_deref(), Some("second payload"));
    assert_eq!(state.header().unwrap().total_frames, second.len() as u32);
}

#[test]
fn test_out_of_range_sequence_rejected() {
    let frames = wire("hello world", 5);
    let stray = "DAT|seq:9|data:ZA==|crc:98dd4acc|b64:1";

    let mut state = ReassemblyState::new();
    state.ingest_wire(&frames[0]).unwrap();
    assert_eq!(
        state.ingest_wire(stray).unwrap_err(),
        ReassemblyError::SequenceOutOfRange {
            sequence: 9,
            expected: 3
        }
    );
    assert_eq!(state.received_count(), 0);
}

#[test]
fn test_payload_with_delimiters_survives() {
    let text = "fields|crc:like|this\nand a second line|b64:0";
    for base64 in [true, false] {
        let builder = SessionBuilder {
            base64,
            ..SessionBuilder::new(7)
        };
        let frames = builder.build(text).unwrap().wire_frames();
        let mut state = ReassemblyState::new();
        let delivery = deliver(&mut state, frames.iter().map(String::as_str));
        assert_eq!(delivery.payload.as_deref(), Some(text), "base64={base64}");
    }
}

#[test]
fn test_progress_tracks_missing() {
    let frames = wire("hello world", 5);
    let mut state = ReassemblyState::new();
    deliver(&mut state, [&frames[0], &frames[2]].map(String::as_str));

    let progress = state.progress();
    assert_eq!(progress.received, 1);
    assert_eq!(progress.expected, 3);
    assert_eq!(progress.missing, vec![1, 3]);

    state.reset();
    assert_eq!(state.phase(), Phase::Idle);
    assert!(state.header().is_none());
}
