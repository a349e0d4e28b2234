//! # Musical Tuning Module
//!
//! Equal-temperament conversions between frequencies, MIDI note numbers and note
//! labels such as `"A4"` or `"C#3"`. A4 = 440 Hz is MIDI note 69.
//!
//! ## Features
//! - Frequency to nearest note label
//! - Note label to MIDI number and frequency
//! - Cent difference between two frequencies

use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Reference pitch of A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;
/// MIDI note number of A4.
pub const A4_MIDI: i64 = 69;

/// Chromatic note names starting at C, used when rendering labels.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch-class lookup for parsing labels, including flat spellings.
static PITCH_CLASSES: Lazy<BTreeMap<&'static str, i64>> = Lazy::new(|| {
    let mut map: BTreeMap<&'static str, i64> = NOTE_NAMES
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i as i64))
        .collect();
    for (name, class) in [("Db", 1), ("Eb", 3), ("Gb", 6), ("Ab", 8), ("Bb", 10)] {
        map.insert(name, class);
    }
    map
});

/// Fractional MIDI note number of a frequency: `12 * log2(freq / 440) + 69`.
pub fn frequency_to_midi(freq: f64) -> f64 {
    12.0 * (freq / A4_FREQUENCY).log2() + A4_MIDI as f64
}

/// Renders a MIDI note number as `<NoteName><Octave>`, e.g. 60 -> `"C4"`.
pub fn midi_to_note(midi: i64) -> String {
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Maps a frequency to the label of the nearest equal-tempered semitone.
///
/// Returns `None` when `freq <= 0` or the frequency is not finite, which is how
/// "no pitch" flows out of the estimators.
///
/// # Examples
/// ```
/// use practice_core::tuning::frequency_to_note;
/// assert_eq!(frequency_to_note(440.0).as_deref(), Some("A4"));
/// assert_eq!(frequency_to_note(261.63).as_deref(), Some("C4"));
/// assert_eq!(frequency_to_note(0.0), None);
/// ```
pub fn frequency_to_note(freq: f64) -> Option<String> {
    if !freq.is_finite() || freq <= 0.0 {
        return None;
    }
    let midi = frequency_to_midi(freq).round();
    if !midi.is_finite() {
        return None;
    }
    Some(midi_to_note(midi as i64))
}

/// Parses a label such as `"A4"`, `"C#3"`, `"Bb2"` or `"C-1"` into its MIDI number.
pub fn note_to_midi(label: &str) -> Option<i64> {
    let split = label.find(|c: char| c.is_ascii_digit() || c == '-')?;
    let (name, octave) = label.split_at(split);
    let class = *PITCH_CLASSES.get(name)?;
    let octave: i64 = octave.parse().ok()?;
    Some((octave + 1) * 12 + class)
}

/// Equal-tempered frequency of a note label.
pub fn note_to_frequency(label: &str) -> Option<f64> {
    note_to_midi(label).map(midi_to_frequency)
}

/// Equal-tempered frequency of a MIDI note number.
pub fn midi_to_frequency(midi: i64) -> f64 {
    A4_FREQUENCY * 2.0_f64.powf((midi - A4_MIDI) as f64 / 12.0)
}

/// Distance between two frequencies in cents (100 cents = 1 semitone).
/// Positive when `freq` is sharp of `target_freq`.
pub fn cents_difference(freq: f64, target_freq: f64) -> f64 {
    1200.0 * (freq / target_freq).log2()
}
