//! Engine-wide error taxonomy.
//!
//! Per §7 of the design: errors fall into four categories — Transient,
//! PermanentPerRecord, PermanentPerRun, and StateError — and callers decide
//! how to propagate based on the category rather than the concrete variant.

use thiserror::Error;

/// Result type used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Error classification used to decide retry/abort/continue behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Worth retrying at the Gateway layer (network blip, rate limit, deadline).
    Transient,
    /// One record (document or user) rejected; does not halt the batch.
    PermanentPerRecord,
    /// The whole run cannot proceed (bad credentials, neither side usable).
    PermanentPerRun,
    /// Attempted to start a run while one was already in flight.
    StateError,
}

/// Top-level engine error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend is unreachable or timed out.
    #[error("endpoint unavailable: {0}")]
    Unavailable(String),

    /// The request was malformed or the backend rejected its shape.
    #[error("invalid request: {0}")]
    Invalid(String),

    /// The backend is throttling us.
    #[error("throttled: {0}")]
    Throttled(String),

    /// A single record (document or user) failed; the batch continues.
    #[error("record {id} rejected: {reason}")]
    PermanentPerRecord { id: String, reason: String },

    /// The run cannot proceed at all.
    #[error("run aborted: {0}")]
    PermanentPerRun(String),

    /// A run was requested while one was already active.
    #[error("busy: a run is already in progress")]
    Busy,

    /// Stats file or other local I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stats file content was not valid JSON for our schema.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Classify this error for propagation-policy purposes.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Unavailable(_) | EngineError::Throttled(_) => ErrorClass::Transient,
            EngineError::PermanentPerRecord { .. } => ErrorClass::PermanentPerRecord,
            EngineError::PermanentPerRun(_) | EngineError::Invalid(_) => ErrorClass::PermanentPerRun,
            EngineError::Busy => ErrorClass::StateError,
            EngineError::Io(_) | EngineError::Serialization(_) => ErrorClass::PermanentPerRun,
        }
    }

    /// Whether the Gateway should retry this error with backoff.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}
