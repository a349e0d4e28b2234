// practice-core/src/lib.rs

//! The core logic for scoring musical practice sessions.
//! This crate is responsible for session lifecycle, streaming audio buffers,
//! pitch detection, note debouncing and scoring against a reference score.
//! It is transport-agnostic: callers drive it through `SessionManager`,
//! directly or through the `events` adapter.

pub mod audio;
pub mod config;
pub mod debounce;
pub mod error;
pub mod events;
pub mod fft;
pub mod pitch;
pub mod reference;
pub mod scoring;
pub mod session;
pub mod stream_buffer;
pub mod tuning;

pub use config::{EstimatorKind, PracticeConfig};
pub use error::{CatalogError, ConfigError, Result, SessionError};
pub use events::{ClientEvent, ServerEvent};
pub use reference::{
    DirectoryCatalog, InMemoryCatalog, ReferenceCatalog, ReferenceNote, ReferenceScore, Song,
};
pub use scoring::{ScoreResult, ScoreWeights};
pub use session::{
    AudioUpdate, Clock, DetectedNote, ManualClock, Session, SessionId, SessionManager,
    SessionOutcome, SessionSnapshot, SystemClock,
};
