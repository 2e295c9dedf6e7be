//! Frames as produced by other senders of the same protocol.
//!
//! Some senders render CRC-32 as a signed 32-bit value, so `crc:-174841bd`
//! is the same checksum as `crc:e8b7be43`.

use lumen_core::{Checksum, Phase};

use crate::*;

#[test]
fn test_signed_checksum_frames_reassemble() {
    let frames = [
        "HDR|v1|total:2|size:1|hash:ca978112ca1b|enc:UTF8",
        "DAT|seq:1|data:YQ==|crc:-174841bd|b64:1",
    ];
    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames);
    assert_eq!(delivery.payload.as_deref(), Some("a"));
    assert_eq!(
        "-174841bd".parse::<Checksum>().unwrap(),
        "e8b7be43".parse::<Checksum>().unwrap()
    );
}

/// Short negative checksums arrive zero-padded in front of the sign.
#[test]
fn test_zero_padded_signed_checksum_reassembles() {
    let frames = [
        "HDR|v1|total:2|size:4|hash:b1f3d306c024|enc:UTF8",
        "DAT|seq:1|data:eDEyNw==|crc:0-54d64a|b64:1",
    ];
    assert!(Frame::decode(frames[1]).is_ok());

    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames);
    assert_eq!(delivery.payload.as_deref(), Some("x127"));
    assert!(delivery.errors.is_empty());
}

#[test]
fn test_multibyte_fragments_from_foreign_sender() {
    let frames = [
        "DAT|seq:2|data:5LiW55WM|crc:-3fe18d15|b64:1",
        "HDR|v1|total:3|size:21|hash:c6a304536826|enc:UTF8",
        "DAT|seq:2|data:5LiW55WM|crc:-3fe18d15|b64:1",
        "DAT|seq:1|data:44GT44KT44Gr44Gh44Gv|crc:-477be419|b64:1",
    ];
    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames);
    assert_eq!(delivery.payload.as_deref(), Some("こんにちは世界"));
    assert_eq!(delivery.errors, vec![ReassemblyError::MissingHeader]);
    assert_eq!(state.phase(), Phase::Complete);
}

#[test]
fn test_own_frames_use_unsigned_checksums() {
    let frames = wire("a", 800);
    assert_eq!(
        frames,
        vec![
            "HDR|v1|total:2|size:1|hash:ca978112ca1b|enc:UTF8".to_string(),
            "DAT|seq:1|data:YQ==|crc:e8b7be43|b64:1".to_string(),
        ]
    );
}

#[test]
fn test_uppercase_hash_accepted() {
    let frames = [
        "HDR|v1|total:2|size:1|hash:CA978112CA1B|enc:UTF8",
        "DAT|seq:1|data:a|crc:e8b7be43|b64:0",
    ];
    let mut state = ReassemblyState::new();
    let delivery = deliver(&mut state, frames);
    assert_eq!(delivery.payload.as_deref(), Some("a"));
}

#[test]
fn test_noise_is_rejected_without_disturbing_state() {
    let frames = wire("hello world", 5);
    let mut state = ReassemblyState::new();
    state.ingest_wire(&frames[0]).unwrap();
    state.ingest_wire(&frames[1]).unwrap();

    for noise in [
        "",
        "https://example.com/not-a-frame",
        "HDR|v2|total:2|size:1|hash:ca978112ca1b|enc:UTF8",
        "DAT|seq:x|data:YQ==|crc:e8b7be43|b64:1",
        "DAT|seq:2|data:!!!|crc:e8b7be43|b64:1",
    ] {
        let err = state.ingest_wire(noise).unwrap_err();
        assert!(matches!(err, ReassemblyError::Malformed(_)), "{noise:?}: {err}");
    }

    assert_eq!(state.phase(), Phase::Collecting);
    assert_eq!(state.received_count(), 1);
    let delivery = deliver(&mut state, frames[2..].iter().map(String::as_str));
    assert_eq!(delivery.payload.as_deref(), Some("hello world"));
}
