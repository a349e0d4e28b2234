//! Error types for the practice engine.
//!
//! Every failure here is scoped to a single client: the caller reports it back to
//! whoever sent the request and carries on with every other session untouched.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of a `SessionManager` operation.
#[derive(Error, Debug)]
pub enum SessionError {
    /// No active session exists for the client (or the session buffer is gone).
    #[error("no active session found for {0}")]
    SessionNotFound(String),

    /// The client already has an active session.
    #[error("session already exists for {0}")]
    DuplicateSession(String),

    /// The reference catalog has no score with this id.
    #[error("reference score not found: {0}")]
    ReferenceNotFound(String),

    /// The audio chunk was empty or contained non-finite samples.
    #[error("invalid audio chunk: {0}")]
    InvalidAudioChunk(String),

    /// The catalog failed for a reason other than a missing id.
    #[error("catalog error: {0}")]
    Catalog(#[source] CatalogError),
}

impl SessionError {
    /// Short machine-readable name used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::SessionNotFound(_) => "sessionNotFound",
            SessionError::DuplicateSession(_) => "duplicateSession",
            SessionError::ReferenceNotFound(_) => "referenceNotFound",
            SessionError::InvalidAudioChunk(_) => "invalidAudioChunk",
            SessionError::Catalog(_) => "catalog",
        }
    }
}

impl From<CatalogError> for SessionError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => SessionError::ReferenceNotFound(id),
            other => SessionError::Catalog(other),
        }
    }
}

/// Failures of a reference catalog lookup.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// No song with this id.
    #[error("not found: {0}")]
    NotFound(String),

    /// The song document exists but cannot be used as a reference score.
    #[error("invalid song {id}: {reason}")]
    Invalid { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed song document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration loading or validation error.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
