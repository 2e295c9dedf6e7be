//! Integrity primitives for Lumen.
//!
//! Provides three things:
//!   1. Payload hashes — truncated SHA-256 over the whole payload, carried in
//!      the Header frame and verified after reassembly
//!   2. Fragment checksums — CRC-32 over one fragment, carried in each Data
//!      frame and verified on arrival
//!   3. Byte lengths — frames are bounded by encoded bytes, not characters
//!
//! All hashing operates on the UTF-8 bytes of the text. There is no unsafe
//! code in this module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ── Payload hash ──────────────────────────────────────────────────────────────

/// Number of hex characters kept from the SHA-256 digest.
///
/// 48 bits. Symbol capacity is scarce, so the full digest is not sent.
pub const PAYLOAD_HASH_LEN: usize = 12;

/// Truncated SHA-256 of a complete payload, as lowercase hex.
///
/// Identifies a session: two Header frames with the same hash announce the
/// same transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadHash(String);

impl PayloadHash {
    /// Hash the UTF-8 bytes of `text`.
    pub fn of(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(PAYLOAD_HASH_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayloadHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PayloadHash {
    type Err = IntegrityError;

    /// Accepts exactly 12 hex characters. Uppercase is normalised.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != PAYLOAD_HASH_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IntegrityError::InvalidHash(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for PayloadHash {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PayloadHash> for String {
    fn from(h: PayloadHash) -> String {
        h.0
    }
}

/// Compute the truncated payload hash of `text`.
pub fn payload_hash(text: &str) -> PayloadHash {
    PayloadHash::of(text)
}

// ── Fragment checksum ─────────────────────────────────────────────────────────

/// IEEE CRC-32 of one fragment.
///
/// Rendered as 8 lowercase, zero-padded hex digits. Parsing also accepts the
/// signed rendering some senders emit when the high bit is set, so
/// `-174841bd` and `e8b7be43` are the same checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u32);

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = IntegrityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IntegrityError::InvalidChecksum(s.to_string());

        // Signed renderings may be zero-padded in front of the sign to eight
        // characters, e.g. `0-54d64a`.
        let (negative, digits) = match s.split_once('-') {
            Some(("", rest)) => (true, rest),
            Some((zeros, rest)) if s.len() == 8 && zeros.bytes().all(|b| b == b'0') => (true, rest),
            Some(_) => return Err(invalid()),
            None => (false, s),
        };
        if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(invalid());
        }
        let magnitude = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;

        if negative {
            // Signed 32-bit reading: only magnitudes up to 2^31 are valid.
            if magnitude > 0x8000_0000 {
                return Err(invalid());
            }
            Ok(Self(magnitude.wrapping_neg()))
        } else {
            Ok(Self(magnitude))
        }
    }
}

/// Compute the CRC-32 of the UTF-8 bytes of `fragment`.
pub fn fragment_checksum(fragment: &str) -> Checksum {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(fragment.as_bytes());
    Checksum(hasher.finalize())
}

// ── Byte length ───────────────────────────────────────────────────────────────

/// Number of bytes in the UTF-8 encoding of `text`.
///
/// Saturates at `u32::MAX`; the session builder rejects payloads that large.
pub fn byte_length(text: &str) -> u32 {
    u32::try_from(text.len()).unwrap_or(u32::MAX)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityError {
    #[error("invalid payload hash {0:?}: expected {PAYLOAD_HASH_LEN} hex characters")]
    InvalidHash(String),

    #[error("invalid checksum {0:?}")]
    InvalidChecksum(String),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
