//! Simulated optical channel.
//!
//! A camera pointed at a looping display sees every frame eventually, but in
//! whatever order its scan timing allows, repeated, and with some frames
//! missed. These helpers produce such streams deterministically.

use crate::*;

/// `loops` complete passes of the carousel, header first each time.
pub fn looped(frames: &[String], loops: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(frames.len() * loops);
    for _ in 0..loops {
        out.extend(frames.iter().cloned());
    }
    out
}

/// Drop every frame whose index in `frames` is a multiple of `every`.
pub fn lossy(frames: &[String], every: usize) -> Vec<String> {
    frames
        .iter()
        .enumerate()
        .filter(|(i, _)| i % every != 0)
        .map(|(_, f)| f.clone())
        .collect()
}

/// Reverse the data frames, keeping the header in front.
pub fn reversed_data(frames: &[String]) -> Vec<String> {
    let mut out = vec![frames[0].clone()];
    out.extend(frames[1..].iter().rev().cloned());
    out
}

/// Flip one character of the frame at `index`, inside its data field.
pub fn flip_data_char(frames: &[String], index: usize) -> Vec<String> {
    let mut out = frames.to_vec();
    let frame = &out[index];
    let start = frame.find("|data:").expect("data frame") + "|data:".len();
    let mut bytes = frame.clone().into_bytes();
    bytes[start] = if bytes[start] == b'A' { b'B' } else { b'A' };
    out[index] = String::from_utf8(bytes).expect("ascii flip");
    out
}

#[test]
fn lossy_channel_drops_and_looping_recovers() {
    let frames = wire("a channel that loses frames", 3);
    let first = lossy(&frames, 3);
    assert!(first.len() < frames.len());

    let mut state = ReassemblyState::new();
    let partial = deliver(&mut state, first.iter().map(String::as_str));
    assert!(partial.payload.is_none());
    assert!(state.received_count() > 0);

    let second = deliver(&mut state, frames.iter().map(String::as_str));
    assert_eq!(second.payload.as_deref(), Some("a channel that loses frames"));
}
