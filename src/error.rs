//! Error types for edit recording and playback.

use crate::types::SnapshotHash;
use thiserror::Error;

/// Main error type for history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid edit index: {index} (log has {len} edits)")]
    InvalidIndex { index: usize, len: usize },

    #[error("Invalid playback speed: {0} (must be positive)")]
    InvalidSpeed(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Another playback operation is running on this engine")]
    PlaybackBusy,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Hash mismatch: expected {expected}, got {got}")]
    HashMismatch {
        expected: SnapshotHash,
        got: SnapshotHash,
    },

    #[error("History file is locked by another process")]
    Locked,
}

impl From<serde_json::Error> for HistoryError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_data() || e.is_syntax() || e.is_eof() {
            HistoryError::Deserialization(e.to_string())
        } else {
            HistoryError::Serialization(e.to_string())
        }
    }
}

impl From<rmp_serde::encode::Error> for HistoryError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        HistoryError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for HistoryError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        HistoryError::Deserialization(e.to_string())
    }
}

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
