//! Error types for cmdlet-replay

use std::io;
use thiserror::Error;

use crate::matcher::MismatchError;

/// Result type for cmdlet-replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that can occur while recording, replaying or running cmdlets
#[derive(Debug, Error)]
pub enum ReplayError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid session file format
    #[error("Invalid session file format: {0}")]
    InvalidFormat(String),

    /// Session file corrupted (CRC mismatch)
    #[error("Session file corrupted at offset {offset}: expected CRC {expected:#x}, got {actual:#x}")]
    CorruptedData {
        /// Offset where corruption was detected
        offset: u64,
        /// Expected CRC32 value
        expected: u32,
        /// Actual CRC32 value
        actual: u32,
    },

    /// Session file not found
    #[error("Session file not found: {0}")]
    FileNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request/response too large
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },

    /// Invalid session name
    #[error("Invalid session name: {0}")]
    InvalidSessionName(String),

    /// Requested recording is missing from the collection
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// More requests were issued than the session recorded
    #[error("No more requests expected in session '{session}' ({len} recorded)")]
    ExhaustedSession {
        /// Session name
        session: String,
        /// Number of recorded messages
        len: usize,
    },

    /// Recorded and actual request disagree
    #[error("Request #{index} in session '{session}' mismatched: {mismatch}")]
    RequestMismatch {
        /// Session name
        session: String,
        /// Position of the expected message
        index: usize,
        /// Differing field
        mismatch: MismatchError,
    },

    /// Recorded messages were left unused at teardown
    #[error("Session '{session}' consumed {consumed} of {len} recorded requests")]
    UnconsumedRecordings {
        /// Session name
        session: String,
        /// Messages served
        consumed: usize,
        /// Messages recorded
        len: usize,
    },

    /// Malformed cmdlet input
    #[error("{0}")]
    Validation(String),

    /// Non-success response from the service
    #[error("Service returned status {status}: {body}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Response body (lossy UTF-8)
        body: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl ReplayError {
    /// Whether this error comes from recorded-session playback
    #[must_use]
    pub fn is_playback_failure(&self) -> bool {
        matches!(
            self,
            Self::SessionNotFound(_)
                | Self::ExhaustedSession { .. }
                | Self::RequestMismatch { .. }
                | Self::UnconsumedRecordings { .. }
        )
    }
}
