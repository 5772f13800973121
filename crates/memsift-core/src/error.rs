//! Error types for memsift-core.

use thiserror::Error;

/// Result type alias using memsift-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    // Adapter errors
    #[error("Adapter unavailable: {name}: {detail}")]
    AdapterUnavailable { name: String, detail: String },

    #[error("Unknown adapter: {0}")]
    UnknownAdapter(String),

    #[error("Session unreadable: {session_id}: {reason}")]
    SessionUnreadable { session_id: String, reason: String },

    // Analysis errors
    #[error("Analysis call exceeded {secs}s timeout")]
    AnalysisTimeout { secs: u64 },

    #[error("Malformed analysis result: {0}")]
    MalformedAnalysisResult(String),

    // Store errors
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Observation not found: {0}")]
    ObservationNotFound(String),

    #[error("Store write failed: {0}")]
    StoreWriteFailure(rusqlite::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    // Promotion errors
    #[error("Memory write failed for {target}: {reason}")]
    MemoryWriteFailure { target: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic errors
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a per-session read failure
    pub fn session_unreadable(session_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionUnreadable {
            session_id: session_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a per-target promotion failure
    pub fn memory_write_failure(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MemoryWriteFailure {
            target: target.into(),
            reason: reason.into(),
        }
    }
}
