//! Sender side — turns a payload into the frames of one transfer session.
//!
//! A session is immutable once built. Sending a different payload means
//! building a new session, which replaces the old one entirely.

use crate::chunker::{self, ChunkError};
use crate::config::ChunkingConfig;
use crate::integrity::{byte_length, payload_hash, PayloadHash};
use crate::wire::{DataFrame, Frame, Header, DEFAULT_ENCODING, PROTOCOL_VERSION};

/// Default fragment budget in bytes, sized so a base64 Data frame fits in
/// one symbol of roughly 1000 characters.
pub const DEFAULT_MAX_FRAGMENT_BYTES: usize = 800;

/// Options for building sessions.
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    pub max_fragment_bytes: usize,
    pub base64: bool,
    pub encoding: String,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
            base64: true,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

impl SessionBuilder {
    pub fn new(max_fragment_bytes: usize) -> Self {
        Self {
            max_fragment_bytes,
            ..Self::default()
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            max_fragment_bytes: config.max_fragment_bytes,
            base64: config.base64,
            encoding: config.encoding.clone(),
        }
    }

    /// Build the session for `text`.
    ///
    /// Hash and size are computed once over the whole text; each fragment
    /// becomes a Data frame numbered from 1, preceded by one Header.
    pub fn build(&self, text: &str) -> Result<TransferSession, SessionError> {
        if text.is_empty() {
            return Err(SessionError::EmptyPayload);
        }
        if u32::try_from(text.len()).is_err() {
            return Err(SessionError::PayloadTooLarge(text.len()));
        }

        let payload_hash = payload_hash(text);
        let payload_size_bytes = byte_length(text);

        let fragments: Vec<String> = chunker::split(text, self.max_fragment_bytes)?
            .into_iter()
            .map(str::to_owned)
            .collect();

        // fragments.len() <= text.len() < u32::MAX, so this cannot truncate
        let total_frames = fragments.len() as u32 + 1;

        let header = Header {
            protocol_version: PROTOCOL_VERSION.to_string(),
            total_frames,
            payload_size_bytes,
            payload_hash: payload_hash.clone(),
            encoding: self.encoding.clone(),
        };

        let mut frames = Vec::with_capacity(fragments.len() + 1);
        frames.push(Frame::Header(header.clone()));
        for (i, fragment) in fragments.iter().enumerate() {
            frames.push(Frame::Data(DataFrame::new(
                i as u32 + 1,
                fragment.as_str(),
                self.base64,
            )));
        }

        tracing::debug!(
            hash = %payload_hash,
            bytes = payload_size_bytes,
            total_frames,
            max_fragment_bytes = self.max_fragment_bytes,
            "transfer session built"
        );

        Ok(TransferSession {
            payload_hash,
            payload_size_bytes,
            fragments,
            header,
            frames,
        })
    }
}

/// Build a session with default options and the given fragment budget.
pub fn build_session(text: &str, max_fragment_bytes: usize) -> Result<TransferSession, SessionError> {
    SessionBuilder::new(max_fragment_bytes).build(text)
}

/// One complete transfer: the payload and the frames that carry it.
#[derive(Debug, Clone)]
pub struct TransferSession {
    payload_hash: PayloadHash,
    payload_size_bytes: u32,
    fragments: Vec<String>,
    header: Header,
    frames: Vec<Frame>,
}

impl TransferSession {
    pub fn payload_hash(&self) -> &PayloadHash {
        &self.payload_hash
    }

    pub fn payload_size_bytes(&self) -> u32 {
        self.payload_size_bytes
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Header first, then Data frames in ascending sequence.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn total_frames(&self) -> u32 {
        self.header.total_frames
    }

    /// Wire strings in transmission order.
    pub fn wire_frames(&self) -> Vec<String> {
        self.frames.iter().map(Frame::encode).collect()
    }

    /// Endless transmission order: Header, Data 1..N, Header, ...
    pub fn carousel(&self) -> FrameCarousel {
        FrameCarousel::new(self.wire_frames())
    }
}

/// Cycles through a session's wire strings indefinitely.
///
/// Each call to `next` is one display tick. Repetition is the only recovery
/// mechanism the channel has: a frame missed on one loop is offered again on
/// the next.
#[derive(Debug, Clone)]
pub struct FrameCarousel {
    wire: Vec<String>,
    position: usize,
    loops: u64,
}

impl FrameCarousel {
    fn new(wire: Vec<String>) -> Self {
        Self {
            wire,
            position: 0,
            loops: 0,
        }
    }

    /// Index of the frame the next tick will show.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of full passes completed.
    pub fn loops(&self) -> u64 {
        self.loops
    }

    pub fn len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }
}

impl Iterator for FrameCarousel {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let frame = self.wire.get(self.position)?.clone();
        self.position += 1;
        if self.position == self.wire.len() {
            self.position = 0;
            self.loops += 1;
        }
        Some(frame)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("payload of {0} bytes exceeds the 32-bit size field")]
    PayloadTooLarge(usize),

    #[error(transparent)]
    Chunk(#[from] ChunkError),
}
