//! # Session Module
//!
//! Owns the lifecycle of practice sessions and drives the analysis pipeline for
//! each incoming audio chunk.
//!
//! A session moves `Absent -> Active -> Terminated`. Terminated sessions are
//! removed from the registry together with their sample buffer, so a client id
//! that has ended its session looks exactly like one that never started.
//!
//! ## Locking
//! - The registry maps client ids to `Arc<Mutex<Session>>`. Registry guards are
//!   never held while a session is locked or while audio is analysed.
//! - The per-session mutex serialises buffer pushes, detection, debouncing and
//!   scoring for one client. Distinct clients never contend on it.
//! - Ending a session removes it from the registry first and then takes its lock,
//!   so teardown waits for any chunk still being analysed. A chunk that looked the
//!   session up before removal sees `active == false` and is rejected.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PracticeConfig;
use crate::debounce::NoteDebouncer;
use crate::error::{ConfigError, Result, SessionError};
use crate::pitch::PitchDetector;
use crate::reference::{ReferenceCatalog, ReferenceScore};
use crate::scoring::{self, ScoreResult, ScoreWeights};
use crate::stream_buffer::StreamBuffer;

/// Unique id of one practice attempt.
pub type SessionId = Uuid;

/// Source of "now" in milliseconds for note timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic wall clock measured from its own creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to. Used for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now: AtomicU64::new(start_ms) }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A note confirmed by the debouncer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedNote {
    pub note: String,
    /// Offset from the session start in ms.
    pub timestamp_ms: u64,
    /// Time since the previous confirmed note (or the session start) in ms.
    pub duration_ms: u64,
}

/// Server-side state of one client's practice attempt.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub client_id: String,
    pub reference_id: String,
    pub reference: Arc<ReferenceScore>,
    /// Clock reading when the session started.
    pub start_time: u64,
    pub recorded_notes: Vec<DetectedNote>,
    /// Clock reading of the last confirmed note, the start time until then.
    pub last_note_time: u64,
    /// `None` until the first note is confirmed.
    pub current_note: Option<DetectedNote>,
    pub active: bool,
}

impl Session {
    pub fn new(
        client_id: impl Into<String>,
        reference_id: impl Into<String>,
        reference: Arc<ReferenceScore>,
        start_time: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id: client_id.into(),
            reference_id: reference_id.into(),
            reference,
            start_time,
            recorded_notes: Vec::new(),
            last_note_time: start_time,
            current_note: None,
            active: true,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            reference_id: self.reference_id.clone(),
            reference_score: (*self.reference).clone(),
            start_time: self.start_time,
            recorded_notes: self.recorded_notes.clone(),
            current_note: self.current_note.clone(),
            active: self.active,
        }
    }
}

/// Read-only copy of a session, safe to hand to transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub reference_id: String,
    pub reference_score: ReferenceScore,
    pub start_time: u64,
    pub recorded_notes: Vec<DetectedNote>,
    pub current_note: Option<DetectedNote>,
    pub active: bool,
}

/// Result of feeding one audio chunk into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioUpdate {
    /// The session's current note after this chunk, which may predate it.
    pub current_note: Option<DetectedNote>,
    /// Notes confirmed while processing this chunk, oldest first.
    pub new_notes: Vec<DetectedNote>,
    /// Number of full windows analysed for this chunk.
    pub windows_analyzed: usize,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcome {
    pub score_result: ScoreResult,
    pub recorded_notes: Vec<DetectedNote>,
}

fn lock(session: &Mutex<Session>) -> MutexGuard<'_, Session> {
    // A poisoned session is still structurally valid; recover the guard.
    session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry and orchestrator of every active practice session.
pub struct SessionManager {
    config: PracticeConfig,
    detector: PitchDetector,
    debouncer: NoteDebouncer,
    weights: ScoreWeights,
    catalog: Arc<dyn ReferenceCatalog>,
    clock: Arc<dyn Clock>,
    sessions: DashMap<String, Arc<Mutex<Session>>>,
    buffers: StreamBuffer,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("active_sessions", &self.sessions.len())
            .finish()
    }
}

impl SessionManager {
    /// Creates a manager stamping notes with the system clock.
    pub fn new(
        config: PracticeConfig,
        catalog: Arc<dyn ReferenceCatalog>,
    ) -> std::result::Result<Self, ConfigError> {
        Self::with_clock(config, catalog, Arc::new(SystemClock::new()))
    }

    /// # Errors
    /// * `ConfigError::Invalid` - `config` fails [`PracticeConfig::validate`]
    pub fn with_clock(
        config: PracticeConfig,
        catalog: Arc<dyn ReferenceCatalog>,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            detector: PitchDetector::new(&config),
            debouncer: NoteDebouncer::new(config.min_note_gap_ms),
            weights: ScoreWeights {
                pitch: config.pitch_weight,
                rhythm: config.rhythm_weight,
            },
            buffers: StreamBuffer::new(config.window_size)?,
            sessions: DashMap::new(),
            config,
            catalog,
            clock,
        })
    }

    /// Number of active sessions.
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Snapshot of the client's active session, if any.
    pub fn session(&self, client_id: &str) -> Option<SessionSnapshot> {
        let session = self.sessions.get(client_id).map(|entry| Arc::clone(entry.value()))?;
        let guard = lock(&session);
        guard.active.then(|| guard.snapshot())
    }

    /// Queued samples that have not yet filled a window.
    pub fn pending_samples(&self, client_id: &str) -> Option<usize> {
        let session = self.sessions.get(client_id).map(|entry| Arc::clone(entry.value()))?;
        let id = lock(&session).id;
        self.buffers.pending(&id)
    }

    /// Starts a session for `client_id` graded against the catalog's `reference_id`.
    ///
    /// # Errors
    /// * `DuplicateSession` - the client already has an active session
    /// * `ReferenceNotFound` - the catalog has no such score
    /// * `Catalog` - the catalog failed to load it
    pub fn start_session(&self, client_id: &str, reference_id: &str) -> Result<SessionSnapshot> {
        if self.sessions.contains_key(client_id) {
            return Err(SessionError::DuplicateSession(client_id.to_string()));
        }

        let reference = self.catalog.get_reference_score(reference_id)?;
        let session = Session::new(client_id, reference_id, reference, self.clock.now_ms());
        let snapshot = session.snapshot();

        match self.sessions.entry(client_id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateSession(client_id.to_string())),
            Entry::Vacant(slot) => {
                self.buffers.open(session.id);
                slot.insert(Arc::new(Mutex::new(session)));
                info!(
                    client_id = %client_id,
                    session_id = %snapshot.session_id,
                    reference_id = %reference_id,
                    expected_notes = snapshot.reference_score.note_sequence.len(),
                    "Practice session started"
                );
                Ok(snapshot)
            }
        }
    }

    /// Feeds a chunk of samples into the client's session.
    ///
    /// Every full window now available is analysed in order; detected pitches go
    /// through the debouncer. The last window ends at the chunk's arrival time and
    /// each earlier one is stamped a window duration before the next. A malformed
    /// chunk is dropped and the session kept.
    ///
    /// # Errors
    /// * `SessionNotFound` - no active session for the client
    /// * `InvalidAudioChunk` - the chunk is empty or holds NaN/infinite samples
    pub fn submit_audio(&self, client_id: &str, samples: &[f32]) -> Result<AudioUpdate> {
        let session = self
            .sessions
            .get(client_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::SessionNotFound(client_id.to_string()))?;

        if samples.is_empty() {
            warn!(client_id = %client_id, "Dropping empty audio chunk");
            return Err(SessionError::InvalidAudioChunk("empty chunk".to_string()));
        }
        if let Some(position) = samples.iter().position(|s| !s.is_finite()) {
            warn!(client_id = %client_id, position, "Dropping audio chunk with non-finite sample");
            return Err(SessionError::InvalidAudioChunk(format!(
                "non-finite sample at index {}",
                position
            )));
        }

        let mut guard = lock(&session);
        if !guard.active {
            return Err(SessionError::SessionNotFound(client_id.to_string()));
        }
        let session_id = guard.id;
        self.buffers.push(&session_id, samples)?;

        let mut windows = Vec::new();
        while let Some(window) = self.buffers.drain_window_if_ready(&session_id)? {
            windows.push(window);
        }
        let windows_analyzed = windows.len();
        let arrived_ms = self.clock.now_ms();
        let window_ms = self.config.window_duration_ms();

        let mut new_notes = Vec::new();
        for (index, window) in windows.iter().enumerate() {
            let Some(note) = self.detector.detect_note(window) else {
                continue;
            };
            let windows_after = (windows_analyzed - 1 - index) as f64;
            let now = arrived_ms.saturating_sub((windows_after * window_ms).round() as u64);
            if let Some(detected) = self.debouncer.on_detection(&mut guard, note, now) {
                debug!(
                    client_id = %client_id,
                    note = %detected.note,
                    timestamp_ms = detected.timestamp_ms,
                    duration_ms = detected.duration_ms,
                    "Note detected"
                );
                new_notes.push(detected);
            }
        }

        Ok(AudioUpdate {
            current_note: guard.current_note.clone(),
            new_notes,
            windows_analyzed,
        })
    }

    /// Ends the client's session, scores it and frees its state.
    ///
    /// A second call for the same client fails with `SessionNotFound`.
    pub fn end_session(&self, client_id: &str) -> Result<SessionOutcome> {
        let (_, session) = self
            .sessions
            .remove(client_id)
            .ok_or_else(|| SessionError::SessionNotFound(client_id.to_string()))?;

        // Waits for any chunk of this session still being analysed.
        let mut guard = lock(&session);
        guard.active = false;
        let leftover = self.buffers.close(&guard.id).unwrap_or(0);

        let score_result = scoring::score_performance(
            &guard.reference.note_sequence,
            &guard.recorded_notes,
            guard.reference.tempo_bpm,
            self.weights,
        );
        info!(
            client_id = %client_id,
            session_id = %guard.id,
            recorded_notes = guard.recorded_notes.len(),
            leftover_samples = leftover,
            pitch_score = score_result.pitch_score,
            rhythm_score = score_result.rhythm_score,
            overall_score = score_result.overall_score,
            "Practice session ended"
        );

        Ok(SessionOutcome {
            score_result,
            recorded_notes: std::mem::take(&mut guard.recorded_notes),
        })
    }

    /// Implicit termination when a client goes away. Ending an absent session is
    /// not an error here.
    pub fn disconnect(&self, client_id: &str) -> Option<SessionOutcome> {
        match self.end_session(client_id) {
            Ok(outcome) => Some(outcome),
            Err(_) => {
                debug!(client_id = %client_id, "Client disconnected without an active session");
                None
            }
        }
    }
}
