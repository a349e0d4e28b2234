//! # Note Debouncing Module
//!
//! A sustained note is detected in every analysis window (~46ms apart at the default
//! settings). The debouncer turns that stream of per-window labels into one event per
//! played note by ignoring detections that arrive too soon after the last one.

use crate::session::{DetectedNote, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteDebouncer {
    min_gap_ms: u64,
}

impl NoteDebouncer {
    pub fn new(min_gap_ms: u64) -> Self {
        Self { min_gap_ms }
    }

    /// Records `note` on the session unless it arrives within the minimum gap of the
    /// previous confirmed note.
    ///
    /// On success the new note is appended to `recorded_notes`, becomes the
    /// session's current note and moves `last_note_time` forward. A clock reading
    /// earlier than `last_note_time` counts as a zero gap.
    pub fn on_detection(
        &self,
        session: &mut Session,
        note: String,
        now_ms: u64,
    ) -> Option<DetectedNote> {
        let gap = now_ms.saturating_sub(session.last_note_time);
        if gap < self.min_gap_ms || now_ms < session.last_note_time {
            return None;
        }
        let detected = DetectedNote {
            note,
            timestamp_ms: now_ms.saturating_sub(session.start_time),
            duration_ms: gap,
        };
        session.last_note_time = now_ms;
        session.current_note = Some(detected.clone());
        session.recorded_notes.push(detected.clone());
        Some(detected)
    }
}
