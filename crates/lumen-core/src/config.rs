//! Configuration system for Lumen.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $LUMEN_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/lumen/config.toml
//!   3. ~/.config/lumen/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::session::DEFAULT_MAX_FRAGMENT_BYTES;
use crate::wire::{max_data_frame_len, DEFAULT_ENCODING};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    pub chunking: ChunkingConfig,
    pub display: DisplayConfig,
    pub sender: SenderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Largest fragment, in UTF-8 bytes, carried by one Data frame.
    pub max_fragment_bytes: usize,
    /// Base64-encode Data payloads on the wire.
    pub base64: bool,
    /// Encoding label announced in the Header.
    pub encoding: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Time each symbol stays on screen.
    pub interval_ms: u64,
    /// Characters one rendered symbol can hold.
    pub symbol_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Strip leading and trailing whitespace before building a session.
    pub trim_input: bool,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_fragment_bytes: DEFAULT_MAX_FRAGMENT_BYTES,
            base64: true,
            encoding: DEFAULT_ENCODING.to_string(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            symbol_capacity: 1000,
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self { trim_input: true }
    }
}

impl DisplayConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("lumen")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl LumenConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            LumenConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("LUMEN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = LumenConfig::default().to_toml()?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)
    }

    /// Reject settings the protocol cannot work with.
    ///
    /// A fragment budget whose worst-case Data frame overflows the symbol
    /// capacity is only warned about: renderers differ in what they accept.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunking.max_fragment_bytes == 0 {
            return Err(ConfigError::Invalid(
                "chunking.max_fragment_bytes must be at least 1".into(),
            ));
        }
        if self.chunking.encoding.is_empty() || self.chunking.encoding.contains('|') {
            return Err(ConfigError::Invalid(format!(
                "chunking.encoding {:?} must be non-empty and contain no '|'",
                self.chunking.encoding
            )));
        }
        if self.display.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "display.interval_ms must be at least 1".into(),
            ));
        }

        let worst = max_data_frame_len(self.chunking.max_fragment_bytes, self.chunking.base64);
        if worst > self.display.symbol_capacity {
            tracing::warn!(
                max_fragment_bytes = self.chunking.max_fragment_bytes,
                worst_frame_len = worst,
                symbol_capacity = self.display.symbol_capacity,
                "largest data frame may not fit in one symbol"
            );
        }
        Ok(())
    }

    /// Apply LUMEN_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("LUMEN_CHUNKING__MAX_FRAGMENT_BYTES") {
            if let Ok(n) = v.parse() {
                self.chunking.max_fragment_bytes = n;
            }
        }
        if let Ok(v) = std::env::var("LUMEN_CHUNKING__BASE64") {
            self.chunking.base64 = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("LUMEN_DISPLAY__INTERVAL_MS") {
            if let Ok(n) = v.parse() {
                self.display.interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("LUMEN_DISPLAY__SYMBOL_CAPACITY") {
            if let Ok(n) = v.parse() {
                self.display.symbol_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("LUMEN_SENDER__TRIM_INPUT") {
            self.sender.trim_input = v == "true" || v == "1";
        }
    }
}
