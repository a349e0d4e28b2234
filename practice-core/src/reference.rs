//! # Reference Score Module
//!
//! The expected performance a session is graded against, the song documents it is
//! read from, and the catalog seam through which sessions resolve a song id.

use serde::{Deserialize, Serialize};
use tracing::debug;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CatalogError;
use crate::tuning;

/// One expected note of a reference performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNote {
    /// Note label, e.g. "C#4".
    pub note: String,
    /// Offset from the start of the performance in ms.
    pub timestamp: f64,
    /// Length in ms.
    pub duration: f64,
}

impl ReferenceNote {
    pub fn new(note: impl Into<String>, timestamp: f64, duration: f64) -> Self {
        Self {
            note: note.into(),
            timestamp,
            duration,
        }
    }
}

/// The note sequence, tempo and meter a performance is scored against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceScore {
    /// Expected notes ordered by timestamp.
    pub note_sequence: Vec<ReferenceNote>,
    pub tempo_bpm: f64,
    pub time_signature: String,
}

impl ReferenceScore {
    /// Builds a score, ordering the notes by timestamp.
    pub fn new(
        mut note_sequence: Vec<ReferenceNote>,
        tempo_bpm: f64,
        time_signature: impl Into<String>,
    ) -> Self {
        note_sequence.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            note_sequence,
            tempo_bpm,
            time_signature: time_signature.into(),
        }
    }

    /// Duration of one beat in ms.
    pub fn beat_duration_ms(&self) -> f64 {
        60_000.0 / self.tempo_bpm
    }

    /// Checks the tempo and every note so the score can be used for grading.
    pub fn validate(&self) -> Result<(), String> {
        if !self.tempo_bpm.is_finite() || self.tempo_bpm <= 0.0 {
            return Err(format!("tempo must be positive, got {}", self.tempo_bpm));
        }
        for (i, note) in self.note_sequence.iter().enumerate() {
            if tuning::note_to_midi(&note.note).is_none() {
                return Err(format!("note {} has an unknown label {:?}", i, note.note));
            }
            if !note.timestamp.is_finite() || note.timestamp < 0.0 {
                return Err(format!("note {} has an invalid timestamp {}", i, note.timestamp));
            }
            if !note.duration.is_finite() || note.duration < 0.0 {
                return Err(format!("note {} has an invalid duration {}", i, note.duration));
            }
        }
        Ok(())
    }
}

fn default_tempo() -> f64 {
    120.0
}

fn default_time_signature() -> String {
    "4/4".to_string()
}

/// A song document as stored by the song catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub note_data: Vec<ReferenceNote>,
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    #[serde(default = "default_time_signature")]
    pub time_signature: String,
}

impl Song {
    /// Extracts a validated reference score from the song.
    pub fn to_reference_score(&self, id: &str) -> Result<ReferenceScore, CatalogError> {
        let score = ReferenceScore::new(
            self.note_data.clone(),
            self.tempo,
            self.time_signature.clone(),
        );
        score.validate().map_err(|reason| CatalogError::Invalid {
            id: id.to_string(),
            reason,
        })?;
        Ok(score)
    }
}

/// Read-only source of reference scores, consulted once per session start.
pub trait ReferenceCatalog: Send + Sync {
    fn get_reference_score(&self, id: &str) -> Result<Arc<ReferenceScore>, CatalogError>;
}

/// Catalog held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    scores: HashMap<String, Arc<ReferenceScore>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a score under `id`.
    pub fn insert(&mut self, id: impl Into<String>, score: ReferenceScore) {
        self.scores.insert(id.into(), Arc::new(score));
    }

    pub fn with_score(mut self, id: impl Into<String>, score: ReferenceScore) -> Self {
        self.insert(id, score);
        self
    }
}

impl ReferenceCatalog for InMemoryCatalog {
    fn get_reference_score(&self, id: &str) -> Result<Arc<ReferenceScore>, CatalogError> {
        self.scores
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }
}

/// Catalog backed by a directory of `<id>.json` song documents.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads the song document for `id` without converting it.
    pub fn load_song(&self, id: &str) -> Result<Song, CatalogError> {
        // Ids name files directly under the root, nothing else.
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        let path = self.root.join(format!("{}.json", id));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }
}

impl ReferenceCatalog for DirectoryCatalog {
    fn get_reference_score(&self, id: &str) -> Result<Arc<ReferenceScore>, CatalogError> {
        let song = self.load_song(id)?;
        debug!(song_id = %id, title = %song.title, notes = song.note_data.len(), "Loaded song");
        Ok(Arc::new(song.to_reference_score(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG_JSON: &str = r#"{
        "title": "Ode to Joy",
        "artist": "Beethoven",
        "audioUrl": "https://example.com/ode.mp3",
        "noteData": [
            { "note": "E4", "timestamp": 500, "duration": 500 },
            { "note": "E4", "timestamp": 0, "duration": 500 }
        ]
    }"#;

    #[test]
    fn song_defaults_tempo_and_meter() {
        let song: Song = serde_json::from_str(SONG_JSON).unwrap();
        assert_eq!(song.tempo, 120.0);
        assert_eq!(song.time_signature, "4/4");
        let score = song.to_reference_score("ode").unwrap();
        assert_eq!(score.beat_duration_ms(), 500.0);
        // Ordered by timestamp regardless of document order.
        assert_eq!(score.note_sequence[0].timestamp, 0.0);
        assert_eq!(score.note_sequence[1].timestamp, 500.0);
    }

    #[test]
    fn rejects_bad_tempo_and_labels() {
        let mut song: Song = serde_json::from_str(SONG_JSON).unwrap();
        song.tempo = 0.0;
        assert!(matches!(
            song.to_reference_score("ode"),
            Err(CatalogError::Invalid { .. })
        ));
        song.tempo = 90.0;
        song.note_data[0].note = "X9".to_string();
        assert!(song.to_reference_score("ode").is_err());
    }

    #[test]
    fn in_memory_lookup() {
        let catalog = InMemoryCatalog::new()
            .with_score("scale", ReferenceScore::new(vec![], 100.0, "3/4"));
        assert_eq!(catalog.get_reference_score("scale").unwrap().tempo_bpm, 100.0);
        assert!(matches!(
            catalog.get_reference_score("missing"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn directory_catalog_reads_song_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ode.json"), SONG_JSON).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        let catalog = DirectoryCatalog::new(dir.path());

        let score = catalog.get_reference_score("ode").unwrap();
        assert_eq!(score.note_sequence.len(), 2);
        assert!(matches!(
            catalog.get_reference_score("missing"),
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.get_reference_score("broken"),
            Err(CatalogError::Json(_))
        ));
        assert!(matches!(
            catalog.get_reference_score("../ode"),
            Err(CatalogError::NotFound(_))
        ));
    }
}
