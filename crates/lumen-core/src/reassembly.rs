//! Receiver side — collects Data frames and recovers the payload.
//!
//! Frames arrive in any order, any number of times, at whatever rate the
//! scanner produces them. The state is keyed by the Header's payload hash: a
//! Header with a different hash abandons whatever was in flight and starts
//! over. There is no timeout at this layer.
//!
//! ```text
//!   Idle ──HDR──▶ Collecting ──last DAT──▶ Complete
//!                  │   ▲                  │
//!                  │   └──HDR (new hash)──┤
//!                  └──hash mismatch──▶ Failed
//! ```

use std::collections::BTreeMap;

use serde::Serialize;

use crate::integrity::{fragment_checksum, payload_hash, PayloadHash};
use crate::wire::{DataFrame, Frame, FrameError, Header};

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No Header seen yet.
    #[default]
    Idle,
    /// Header known, fragments still missing.
    Collecting,
    /// Every fragment arrived and the payload hash matched.
    Complete,
    /// Every fragment arrived but the payload hash did not match.
    Failed,
}

/// What a successful ingestion did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// A Header with a new hash reset the state.
    SessionStarted { hash: PayloadHash, expected: u32 },
    /// The current session's Header was announced again.
    HeaderRepeated,
    /// A new fragment was stored.
    Stored {
        sequence: u32,
        received: u32,
        expected: u32,
    },
    /// The fragment was already stored.
    Duplicate { sequence: u32 },
    /// The last fragment arrived and the payload verified.
    Completed { payload: String },
}

/// Longest `missing` list a [`Progress`] snapshot carries.
pub const MISSING_LIST_LIMIT: usize = 64;

/// Snapshot of collection progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub received: u32,
    pub expected: u32,
    pub percent: u8,
    /// Sequences not yet received, ascending, at most
    /// [`MISSING_LIST_LIMIT`] of them.
    pub missing: Vec<u32>,
}

/// Receiver state for one in-flight session.
///
/// Mutated only through `ingest`; owned by a single receiver.
#[derive(Debug, Default)]
pub struct ReassemblyState {
    current_header: Option<Header>,
    received: BTreeMap<u32, String>,
    expected_count: u32,
    phase: Phase,
    payload: Option<String>,
    failure: Option<ReassemblyError>,
}

impl ReassemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a scanned string and ingest it.
    pub fn ingest_wire(&mut self, raw: &str) -> Result<Ingested, ReassemblyError> {
        let frame = Frame::decode(raw).map_err(|e| {
            tracing::debug!(error = %e, "discarding unparseable frame");
            ReassemblyError::Malformed(e)
        })?;
        tracing::trace!(kind = frame.kind(), "frame decoded");
        self.ingest(frame)
    }

    /// Apply one frame to the state.
    ///
    /// Every error except `IntegrityMismatch` (and the unreachable
    /// `ReassemblyGap`) leaves the session collecting.
    pub fn ingest(&mut self, frame: Frame) -> Result<Ingested, ReassemblyError> {
        match frame {
            Frame::Header(header) => {
                header.check_counts()?;
                Ok(self.ingest_header(header))
            }
            Frame::Data(data) => self.ingest_data(data),
        }
    }

    fn ingest_header(&mut self, header: Header) -> Ingested {
        if let Some(current) = &self.current_header {
            if current.payload_hash == header.payload_hash {
                tracing::trace!(hash = %header.payload_hash, "header repeated");
                return Ingested::HeaderRepeated;
            }
            tracing::info!(
                previous = %current.payload_hash,
                hash = %header.payload_hash,
                dropped = self.received.len(),
                "new session supersedes the one in flight"
            );
        }

        let hash = header.payload_hash.clone();
        let expected = header.data_frame_count();

        self.received.clear();
        self.expected_count = expected;
        self.current_header = Some(header);
        self.phase = Phase::Collecting;
        self.payload = None;
        self.failure = None;

        tracing::info!(%hash, expected, "session started");
        Ingested::SessionStarted { hash, expected }
    }

    fn ingest_data(&mut self, data: DataFrame) -> Result<Ingested, ReassemblyError> {
        let sequence = data.sequence;

        if self.current_header.is_none() {
            tracing::warn!(sequence, "data frame before any header");
            return Err(ReassemblyError::MissingHeader);
        }
        if self.phase == Phase::Failed {
            return Err(ReassemblyError::SessionFailed);
        }

        if fragment_checksum(&data.payload) != data.checksum {
            tracing::warn!(sequence, "fragment checksum mismatch, discarding");
            return Err(ReassemblyError::FrameIntegrity { sequence });
        }

        if sequence == 0 || sequence > self.expected_count {
            tracing::warn!(sequence, expected = self.expected_count, "sequence out of range");
            return Err(ReassemblyError::SequenceOutOfRange {
                sequence,
                expected: self.expected_count,
            });
        }

        if self.received.contains_key(&sequence) {
            tracing::trace!(sequence, "duplicate fragment");
            return Ok(Ingested::Duplicate { sequence });
        }

        self.received.insert(sequence, data.payload);
        let received = self.received_count();
        tracing::debug!(sequence, received, expected = self.expected_count, "fragment stored");

        if received < self.expected_count {
            return Ok(Ingested::Stored {
                sequence,
                received,
                expected: self.expected_count,
            });
        }

        match self.reconstruct() {
            Ok(payload) => {
                tracing::info!(bytes = payload.len(), fragments = received, "payload recovered");
                self.phase = Phase::Complete;
                self.payload = Some(payload.clone());
                Ok(Ingested::Completed { payload })
            }
            Err(e) => {
                tracing::warn!(error = %e, "reassembly failed");
                self.phase = Phase::Failed;
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Concatenate fragments 1..=expected and verify the payload hash.
    fn reconstruct(&self) -> Result<String, ReassemblyError> {
        let header = self
            .current_header
            .as_ref()
            .ok_or(ReassemblyError::MissingHeader)?;

        let mut candidate = String::with_capacity(self.received.values().map(String::len).sum());
        for sequence in 1..=self.expected_count {
            let fragment = self
                .received
                .get(&sequence)
                .ok_or(ReassemblyError::ReassemblyGap { sequence })?;
            candidate.push_str(fragment);
        }

        let actual = payload_hash(&candidate);
        if actual != header.payload_hash {
            return Err(ReassemblyError::IntegrityMismatch {
                expected: header.payload_hash.clone(),
                actual,
            });
        }
        Ok(candidate)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn header(&self) -> Option<&Header> {
        self.current_header.as_ref()
    }

    pub fn expected_count(&self) -> u32 {
        self.expected_count
    }

    pub fn received_count(&self) -> u32 {
        // bounded by expected_count, which is a u32
        self.received.len() as u32
    }

    pub fn has(&self, sequence: u32) -> bool {
        self.received.contains_key(&sequence)
    }

    /// The recovered payload, once Complete.
    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    /// Why the session failed, once Failed.
    pub fn failure(&self) -> Option<&ReassemblyError> {
        self.failure.as_ref()
    }

    pub fn progress(&self) -> Progress {
        let received = self.received_count();
        let expected = self.expected_count;
        let percent = if expected > 0 {
            ((u64::from(received) * 100 + u64::from(expected) / 2) / u64::from(expected)) as u8
        } else {
            0
        };
        let missing = (1..=expected)
            .filter(|s| !self.received.contains_key(s))
            .take(MISSING_LIST_LIMIT)
            .collect();
        Progress {
            received,
            expected,
            percent,
            missing,
        }
    }

    /// Forget everything, back to Idle.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReassemblyError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] FrameError),

    #[error("data frame received before any header")]
    MissingHeader,

    #[error("frame {sequence} failed its checksum")]
    FrameIntegrity { sequence: u32 },

    #[error("frame {sequence} is outside 1..={expected}")]
    SequenceOutOfRange { sequence: u32, expected: u32 },

    #[error("session failed verification; waiting for a new header")]
    SessionFailed,

    #[error("fragment {sequence} missing at reconstruction")]
    ReassemblyGap { sequence: u32 },

    #[error("payload hash mismatch: header declared {expected}, reassembled {actual}")]
    IntegrityMismatch {
        expected: PayloadHash,
        actual: PayloadHash,
    },
}

impl ReassemblyError {
    /// True when the session cannot recover without a new Header.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReassemblyError::IntegrityMismatch { .. } | ReassemblyError::ReassemblyGap { .. }
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
