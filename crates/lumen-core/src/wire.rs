//! Lumen wire format — the text carried by each optical symbol.
//!
//! These strings ARE the protocol. Every tag, key, and delimiter is part of
//! the wire format and is read by receivers that were built independently of
//! this crate. Changing anything here is a breaking change.
//!
//! ```text
//! HDR|v1|total:<N>|size:<N>|hash:<H>|enc:<E>
//! DAT|seq:<N>|data:<payload-or-base64>|crc:<H>|b64:<0|1>
//! ```
//!
//! The `data` field may itself contain `|`, so Data frames are never split
//! naively: the payload runs from `data:` up to the LAST `|crc:`.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::integrity::{fragment_checksum, Checksum, PayloadHash};

// ── Constants ─────────────────────────────────────────────────────────────────

/// The only protocol version this crate speaks. There is no negotiation:
/// a frame carrying any other version token is unparseable.
pub const PROTOCOL_VERSION: &str = "v1";

/// First token of a Header frame.
pub const HEADER_TAG: &str = "HDR";

/// First token of a Data frame.
pub const DATA_TAG: &str = "DAT";

/// Encoding label announced in the Header when none is configured.
pub const DEFAULT_ENCODING: &str = "UTF8";

/// Exact number of pipe-delimited segments in a Header frame.
pub const HEADER_SEGMENTS: usize = 6;

const DATA_PREFIX: &str = "data:";
const CRC_MARKER: &str = "|crc:";
const B64_FLAG_SET: &str = "b64:1";

/// Fixed framing around a Data payload: `DAT|seq:` `|data:` `|crc:` + 8 hex + `|b64:1`.
const DATA_FRAMING_LEN: usize = 8 + 6 + 5 + 8 + 6;

/// Widest decimal rendering of a u32 sequence number.
const MAX_SEQUENCE_DIGITS: usize = 10;

// ── Frames ────────────────────────────────────────────────────────────────────

/// Announces a session. Sent first and repeated on every transmission loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub protocol_version: String,
    /// Header plus all Data frames.
    pub total_frames: u32,
    /// UTF-8 byte length of the whole payload.
    pub payload_size_bytes: u32,
    pub payload_hash: PayloadHash,
    pub encoding: String,
}

impl Header {
    /// Number of Data frames the session carries.
    pub fn data_frame_count(&self) -> u32 {
        self.total_frames.saturating_sub(1)
    }

    /// Check that the frame count is one a sender could have produced: at
    /// least one Data frame, and no more Data frames than payload bytes.
    pub fn check_counts(&self) -> Result<(), FrameError> {
        let total = u64::from(self.total_frames);
        if total < 2 || total > u64::from(self.payload_size_bytes) + 1 {
            return Err(invalid("total", &self.total_frames.to_string()));
        }
        Ok(())
    }
}

/// One fragment of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    /// 1-based position of the fragment.
    pub sequence: u32,
    /// The fragment text, never base64 — encoding happens at the wire.
    pub payload: String,
    /// CRC-32 of `payload` as UTF-8, before any base64 encoding.
    pub checksum: Checksum,
    /// Whether `payload` travels base64-encoded.
    pub base64: bool,
}

impl DataFrame {
    /// Build a Data frame, computing its checksum.
    ///
    /// Base64 is forced on when the raw fragment could not be delimited
    /// unambiguously (it contains the checksum marker or a line break).
    pub fn new(sequence: u32, payload: impl Into<String>, base64: bool) -> Self {
        let payload = payload.into();
        let base64 = base64 || needs_base64(&payload);
        Self {
            sequence,
            checksum: fragment_checksum(&payload),
            payload,
            base64,
        }
    }

    /// True when the carried checksum matches the payload.
    pub fn verify(&self) -> bool {
        fragment_checksum(&self.payload) == self.checksum
    }
}

fn needs_base64(fragment: &str) -> bool {
    fragment.contains(CRC_MARKER) || fragment.contains(['\n', '\r'])
}

/// A wire-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Header(Header),
    Data(DataFrame),
}

impl Frame {
    /// Render the frame as its wire string.
    pub fn encode(&self) -> String {
        match self {
            Frame::Header(h) => format!(
                "{HEADER_TAG}|{}|total:{}|size:{}|hash:{}|enc:{}",
                h.protocol_version, h.total_frames, h.payload_size_bytes, h.payload_hash, h.encoding
            ),
            Frame::Data(d) => {
                let (data, flag) = if d.base64 {
                    (BASE64_STANDARD.encode(d.payload.as_bytes()), 1)
                } else {
                    (d.payload.clone(), 0)
                };
                format!(
                    "{DATA_TAG}|seq:{}|{DATA_PREFIX}{data}{CRC_MARKER}{}|b64:{flag}",
                    d.sequence, d.checksum
                )
            }
        }
    }

    /// Parse a wire string. Surrounding whitespace is ignored.
    pub fn decode(raw: &str) -> Result<Self, FrameError> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(FrameError::Empty);
        }

        let segments: Vec<&str> = s.split('|').collect();
        if segments.len() < 2 {
            return Err(FrameError::TooFewSegments(segments.len()));
        }

        match segments[0] {
            HEADER_TAG => decode_header(&segments).map(Frame::Header),
            DATA_TAG => decode_data(s, &segments).map(Frame::Data),
            other => Err(FrameError::UnknownKind(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Header(_) => HEADER_TAG,
            Frame::Data(_) => DATA_TAG,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Frame {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Frame::decode(s)
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn decode_header(segments: &[&str]) -> Result<Header, FrameError> {
    if segments.len() != HEADER_SEGMENTS {
        return Err(FrameError::HeaderSegmentCount(segments.len()));
    }

    let version = segments[1];
    if version != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(version.to_string()));
    }

    let mut total = None;
    let mut size = None;
    let mut hash = None;
    let mut encoding = None;

    for segment in &segments[2..] {
        let Some((key, value)) = segment.split_once(':') else {
            continue;
        };
        match key {
            "total" => total = Some(parse_u32("total", value)?),
            "size" => size = Some(parse_u32("size", value)?),
            "hash" => {
                let h = value.parse::<PayloadHash>().map_err(|_| invalid("hash", value))?;
                hash = Some(h);
            }
            "enc" => encoding = Some(value.to_string()),
            _ => {}
        }
    }

    let header = Header {
        protocol_version: version.to_string(),
        total_frames: total.ok_or(FrameError::MissingField("total"))?,
        payload_size_bytes: size.ok_or(FrameError::MissingField("size"))?,
        payload_hash: hash.ok_or(FrameError::MissingField("hash"))?,
        encoding: encoding.ok_or(FrameError::MissingField("enc"))?,
    };
    header.check_counts()?;
    Ok(header)
}

fn decode_data(s: &str, segments: &[&str]) -> Result<DataFrame, FrameError> {
    let sequence = segments[1]
        .strip_prefix("seq:")
        .and_then(|v| v.parse::<u32>().ok())
        .ok_or(FrameError::MissingSequence)?;

    // The token right after seq must open the data field.
    if !segments.get(2).is_some_and(|t| t.starts_with(DATA_PREFIX)) {
        return Err(FrameError::MissingData);
    }
    let data_start = segments[0].len() + 1 + segments[1].len() + 1 + DATA_PREFIX.len();

    let crc_pos = match s.rfind(CRC_MARKER) {
        Some(pos) if pos >= data_start => pos,
        _ => return Err(FrameError::MissingChecksum),
    };
    let encoded = &s[data_start..crc_pos];

    let mut tail = s[crc_pos + CRC_MARKER.len()..].split('|');
    let crc_token = tail.next().unwrap_or_default();
    let checksum = crc_token
        .parse::<Checksum>()
        .map_err(|_| invalid("crc", crc_token))?;
    let base64 = tail.any(|token| token == B64_FLAG_SET);

    let payload = if base64 {
        match decode_base64_text(encoded) {
            Some(text) => text,
            None => {
                tracing::warn!(sequence, len = encoded.len(), "base64 payload failed to decode");
                return Err(FrameError::PayloadDecodeFailed {
                    sequence,
                    raw: encoded.to_string(),
                });
            }
        }
    } else {
        encoded.to_string()
    };

    Ok(DataFrame {
        sequence,
        payload,
        checksum,
        base64,
    })
}

fn decode_base64_text(encoded: &str) -> Option<String> {
    let bytes = BASE64_STANDARD.decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32, FrameError> {
    value.parse().map_err(|_| invalid(field, value))
}

fn invalid(field: &'static str, value: &str) -> FrameError {
    FrameError::InvalidField {
        field,
        value: value.to_string(),
    }
}

// ── Sizing ────────────────────────────────────────────────────────────────────

/// Worst-case wire length of a Data frame carrying `max_fragment_bytes`.
///
/// Compare against the symbol capacity of the renderer.
pub fn max_data_frame_len(max_fragment_bytes: usize, base64: bool) -> usize {
    let data = if base64 {
        max_fragment_bytes.div_ceil(3) * 4
    } else {
        max_fragment_bytes
    };
    DATA_FRAMING_LEN + MAX_SEQUENCE_DIGITS + data
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting a wire string.
///
/// Every variant except `PayloadDecodeFailed` means the string was not a
/// well-formed frame and should be discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("frame has {0} segment(s), need at least 2")]
    TooFewSegments(usize),

    #[error("unknown frame kind {0:?}")]
    UnknownKind(String),

    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),

    #[error("header has {0} segments, expected {HEADER_SEGMENTS}")]
    HeaderSegmentCount(usize),

    #[error("header is missing the {0:?} field")]
    MissingField(&'static str),

    #[error("invalid {field} value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("data frame has no recoverable seq token")]
    MissingSequence,

    #[error("data frame has no data field")]
    MissingData,

    #[error("data frame has no crc field")]
    MissingChecksum,

    #[error("frame {sequence}: base64 payload could not be decoded")]
    PayloadDecodeFailed { sequence: u32, raw: String },
}

impl FrameError {
    /// True for every variant that means "not a frame".
    pub fn is_malformed(&self) -> bool {
        !matches!(self, FrameError::PayloadDecodeFailed { .. })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
