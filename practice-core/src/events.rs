//! Transport-facing event types.
//!
//! A connection delivers [`ClientEvent`]s and receives [`ServerEvent`]s; both
//! serialise to JSON objects tagged by `type`. [`SessionManager::handle_event`]
//! maps one onto the other so a transport adapter only has to move bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SessionError;
use crate::scoring::ScoreResult;
use crate::session::{DetectedNote, SessionManager, SessionOutcome, SessionSnapshot};

/// Inbound events for one client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Begin practising the song with this id.
    #[serde(rename_all = "camelCase")]
    StartPractice { reference_id: String },
    /// A chunk of mono f32 samples.
    AudioData { samples: Vec<f32> },
    EndPractice,
    /// The connection went away.
    Disconnect,
}

/// Outbound events for one client connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    SessionStarted { session: SessionSnapshot },
    /// Emitted once per newly confirmed note.
    #[serde(rename_all = "camelCase")]
    NoteDetected { note: String, timestamp_ms: u64 },
    #[serde(rename_all = "camelCase")]
    SessionEnded {
        score_result: ScoreResult,
        recorded_notes: Vec<DetectedNote>,
        feedback: Vec<String>,
    },
    /// A request from this client failed; other clients are unaffected.
    Error { kind: String, message: String },
}

impl From<&SessionError> for ServerEvent {
    fn from(err: &SessionError) -> Self {
        ServerEvent::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<SessionOutcome> for ServerEvent {
    fn from(outcome: SessionOutcome) -> Self {
        let feedback = outcome
            .score_result
            .feedback()
            .into_iter()
            .map(str::to_string)
            .collect();
        ServerEvent::SessionEnded {
            score_result: outcome.score_result,
            recorded_notes: outcome.recorded_notes,
            feedback,
        }
    }
}

impl SessionManager {
    /// Applies one client event and returns what should be sent back to that client.
    ///
    /// A disconnect ends the session like `EndPractice` but produces no reply, since
    /// nobody is left to receive it.
    pub fn handle_event(&self, client_id: &str, event: ClientEvent) -> Vec<ServerEvent> {
        match event {
            ClientEvent::StartPractice { reference_id } => {
                match self.start_session(client_id, &reference_id) {
                    Ok(session) => vec![ServerEvent::SessionStarted { session }],
                    Err(err) => vec![ServerEvent::from(&err)],
                }
            }
            ClientEvent::AudioData { samples } => match self.submit_audio(client_id, &samples) {
                Ok(update) => update
                    .new_notes
                    .into_iter()
                    .map(|note| ServerEvent::NoteDetected {
                        note: note.note,
                        timestamp_ms: note.timestamp_ms,
                    })
                    .collect(),
                Err(err) => vec![ServerEvent::from(&err)],
            },
            ClientEvent::EndPractice => match self.end_session(client_id) {
                Ok(outcome) => vec![outcome.into()],
                Err(err) => vec![ServerEvent::from(&err)],
            },
            ClientEvent::Disconnect => {
                debug!(client_id = %client_id, "Client disconnected");
                self.disconnect(client_id);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PracticeConfig;
    use crate::reference::{InMemoryCatalog, ReferenceNote, ReferenceScore};
    use std::sync::Arc;

    fn manager() -> SessionManager {
        let catalog = InMemoryCatalog::new().with_score(
            "song-1",
            ReferenceScore::new(vec![ReferenceNote::new("A4", 0.0, 500.0)], 120.0, "4/4"),
        );
        SessionManager::new(PracticeConfig::default(), Arc::new(catalog)).unwrap()
    }

    #[test]
    fn client_events_parse_from_json() {
        let start: ClientEvent =
            serde_json::from_str(r#"{"type":"startPractice","referenceId":"song-1"}"#).unwrap();
        assert_eq!(
            start,
            ClientEvent::StartPractice { reference_id: "song-1".to_string() }
        );
        let audio: ClientEvent =
            serde_json::from_str(r#"{"type":"audioData","samples":[0.0,0.5,-0.5]}"#).unwrap();
        assert_eq!(audio, ClientEvent::AudioData { samples: vec![0.0, 0.5, -0.5] });
        let end: ClientEvent = serde_json::from_str(r#"{"type":"endPractice"}"#).unwrap();
        assert_eq!(end, ClientEvent::EndPractice);
    }

    #[test]
    fn note_detected_wire_shape() {
        let event = ServerEvent::NoteDetected { note: "A4".to_string(), timestamp_ms: 250 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "noteDetected", "note": "A4", "timestampMs": 250 })
        );
    }

    #[test]
    fn start_end_flow() {
        let manager = manager();
        let started = manager.handle_event(
            "c1",
            ClientEvent::StartPractice { reference_id: "song-1".to_string() },
        );
        assert!(matches!(started.as_slice(), [ServerEvent::SessionStarted { .. }]));

        let duplicate = manager.handle_event(
            "c1",
            ClientEvent::StartPractice { reference_id: "song-1".to_string() },
        );
        assert!(matches!(
            duplicate.as_slice(),
            [ServerEvent::Error { kind, .. }] if kind == "duplicateSession"
        ));

        let ended = manager.handle_event("c1", ClientEvent::EndPractice);
        match ended.as_slice() {
            [ServerEvent::SessionEnded { score_result, recorded_notes, feedback }] => {
                assert_eq!(score_result.overall_score, 0.0);
                assert!(recorded_notes.is_empty());
                assert!(!feedback.is_empty());
            }
            other => panic!("unexpected events: {:?}", other),
        }
    }

    #[test]
    fn errors_are_reported_to_the_sender() {
        let manager = manager();
        let events = manager.handle_event("c2", ClientEvent::AudioData { samples: vec![0.0; 4] });
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::Error { kind, .. }] if kind == "sessionNotFound"
        ));
        let events = manager.handle_event(
            "c2",
            ClientEvent::StartPractice { reference_id: "missing".to_string() },
        );
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::Error { kind, .. }] if kind == "referenceNotFound"
        ));
    }

    #[test]
    fn disconnect_cleans_up_silently() {
        let manager = manager();
        manager.handle_event(
            "c3",
            ClientEvent::StartPractice { reference_id: "song-1".to_string() },
        );
        assert!(manager.handle_event("c3", ClientEvent::Disconnect).is_empty());
        assert_eq!(manager.active_sessions(), 0);
        assert!(manager.handle_event("c3", ClientEvent::Disconnect).is_empty());
    }
}
