//! # Scoring Module
//!
//! Grades a recorded performance against its reference score.
//!
//! Notes are aligned by index: the i-th played note is compared with the i-th
//! expected note over `min(expected, played)` pairs. A missed or extra note shifts
//! every later pair.

use serde::{Deserialize, Serialize};

use crate::reference::ReferenceNote;
use crate::session::DetectedNote;

/// Relative weight of the pitch and rhythm scores in the overall score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub pitch: f64,
    pub rhythm: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            pitch: crate::config::DEFAULT_PITCH_WEIGHT,
            rhythm: crate::config::DEFAULT_RHYTHM_WEIGHT,
        }
    }
}

/// Final grade of a session. Every field lies in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub pitch_score: f64,
    pub rhythm_score: f64,
    pub overall_score: f64,
}

impl ScoreResult {
    /// Feedback lines for the performer, most general first.
    pub fn feedback(&self) -> Vec<&'static str> {
        let mut feedback = Vec::new();
        feedback.push(if self.overall_score >= 90.0 {
            "Excellent performance! You've mastered this piece!"
        } else if self.overall_score >= 80.0 {
            "Great job! Your performance shows strong understanding of the piece."
        } else if self.overall_score >= 70.0 {
            "Good effort! Keep practicing to improve your performance."
        } else {
            "Keep practicing! Focus on the areas that need improvement."
        });
        if self.pitch_score < 80.0 {
            feedback.push("Work on your pitch accuracy. Try practicing with a tuner to improve intonation.");
        }
        if self.rhythm_score < 80.0 {
            feedback.push("Focus on your timing. Practice with a metronome to improve rhythm accuracy.");
        }
        feedback
    }
}

/// Clamps into [0, 100], mapping NaN to 0.
fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Percentage of expected notes whose aligned played note has the same label.
pub fn pitch_score(expected: &[ReferenceNote], played: &[DetectedNote]) -> f64 {
    if expected.is_empty() {
        return 0.0;
    }
    let matches = expected
        .iter()
        .zip(played)
        .filter(|(e, p)| e.note == p.note)
        .count();
    clamp_score(100.0 * matches as f64 / expected.len() as f64)
}

/// Timing and duration accuracy, measured in beats at `tempo_bpm`.
///
/// Each aligned pair scores the mean of `max(0, 1 - timing_diff_beats)` and
/// `max(0, 1 - duration_diff_beats)`; the sum is normalised by the expected count.
pub fn rhythm_score(expected: &[ReferenceNote], played: &[DetectedNote], tempo_bpm: f64) -> f64 {
    if expected.is_empty() || !tempo_bpm.is_finite() || tempo_bpm <= 0.0 {
        return 0.0;
    }
    let beat_duration = 60_000.0 / tempo_bpm;
    let total: f64 = expected
        .iter()
        .zip(played)
        .map(|(e, p)| {
            let timing_diff = (p.timestamp_ms as f64 - e.timestamp).abs() / beat_duration;
            let duration_diff = (p.duration_ms as f64 - e.duration).abs() / beat_duration;
            let timing = (1.0 - timing_diff).max(0.0);
            let duration = (1.0 - duration_diff).max(0.0);
            (timing + duration) / 2.0
        })
        .sum();
    clamp_score(100.0 * total / expected.len() as f64)
}

/// Computes all three scores. Pure: the same inputs always give the same result.
pub fn score_performance(
    expected: &[ReferenceNote],
    played: &[DetectedNote],
    tempo_bpm: f64,
    weights: ScoreWeights,
) -> ScoreResult {
    if expected.is_empty() {
        return ScoreResult::default();
    }
    let pitch_score = pitch_score(expected, played);
    let rhythm_score = rhythm_score(expected, played, tempo_bpm);
    let overall_score = clamp_score(weights.pitch * pitch_score + weights.rhythm * rhythm_score);
    ScoreResult {
        pitch_score,
        rhythm_score,
        overall_score,
    }
}
