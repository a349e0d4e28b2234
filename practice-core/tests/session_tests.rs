//! Integration tests for practice sessions driven through `SessionManager`.

use practice_core::{
    DirectoryCatalog, InMemoryCatalog, ManualClock, PracticeConfig, ReferenceNote,
    ReferenceScore, SessionError, SessionManager,
};
use std::sync::Arc;

const SAMPLE_RATE: f32 = 44_100.0;
const WINDOW: usize = 2048;

/// One window of a sine tone at half amplitude.
fn tone(freq: f32) -> Vec<f32> {
    (0..WINDOW)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE).sin())
        .collect()
}

fn melody_catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_score(
            "c-g",
            ReferenceScore::new(
                vec![
                    ReferenceNote::new("C4", 0.0, 500.0),
                    ReferenceNote::new("G4", 500.0, 500.0),
                ],
                120.0,
                "4/4",
            ),
        )
        .with_score("silence", ReferenceScore::new(vec![], 90.0, "3/4"))
}

fn manager_with_clock() -> (SessionManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(0));
    let manager = SessionManager::with_clock(
        PracticeConfig::default(),
        Arc::new(melody_catalog()),
        clock.clone(),
    )
    .unwrap();
    (manager, clock)
}

#[test]
fn played_melody_is_scored_against_reference() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();

    clock.set(100);
    let update = manager.submit_audio("player", &tone(261.63)).unwrap();
    assert_eq!(update.new_notes.len(), 1);

    clock.set(600);
    let update = manager.submit_audio("player", &tone(392.0)).unwrap();
    assert_eq!(update.current_note.as_ref().map(|n| n.note.as_str()), Some("G4"));

    let outcome = manager.end_session("player").unwrap();
    let notes: Vec<(&str, u64, u64)> = outcome
        .recorded_notes
        .iter()
        .map(|n| (n.note.as_str(), n.timestamp_ms, n.duration_ms))
        .collect();
    assert_eq!(notes, vec![("C4", 100, 100), ("G4", 600, 500)]);

    // Pair 0: (0.8 + 0.2) / 2, pair 1: (0.8 + 1.0) / 2.
    let score = outcome.score_result;
    assert!((score.pitch_score - 100.0).abs() < 1e-9);
    assert!((score.rhythm_score - 70.0).abs() < 1e-9);
    assert!((score.overall_score - 88.0).abs() < 1e-9);
}

#[test]
fn empty_reference_scores_zero_never_nan() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "silence").unwrap();
    clock.set(300);
    manager.submit_audio("player", &tone(440.0)).unwrap();

    let outcome = manager.end_session("player").unwrap();
    assert_eq!(outcome.recorded_notes.len(), 1);
    for value in [
        outcome.score_result.pitch_score,
        outcome.score_result.rhythm_score,
        outcome.score_result.overall_score,
    ] {
        assert_eq!(value, 0.0);
    }
}

#[test]
fn sustained_note_is_debounced() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();

    clock.set(200);
    manager.submit_audio("player", &tone(440.0)).unwrap();
    clock.set(250);
    let update = manager.submit_audio("player", &tone(440.0)).unwrap();
    assert!(update.new_notes.is_empty());
    // The current note is still reported even though nothing new was recorded.
    assert_eq!(update.current_note.as_ref().map(|n| n.note.as_str()), Some("A4"));

    clock.set(400);
    let update = manager.submit_audio("player", &tone(440.0)).unwrap();
    assert_eq!(update.new_notes.len(), 1);

    let outcome = manager.end_session("player").unwrap();
    assert_eq!(outcome.recorded_notes.len(), 2);
    assert!(outcome.recorded_notes[1].timestamp_ms - outcome.recorded_notes[0].timestamp_ms >= 100);
}

#[test]
fn silence_records_nothing() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();
    for step in 1..=5 {
        clock.set(step * 200);
        let update = manager.submit_audio("player", &vec![0.0; WINDOW]).unwrap();
        assert_eq!(update.windows_analyzed, 1);
        assert!(update.current_note.is_none());
    }
    let outcome = manager.end_session("player").unwrap();
    assert!(outcome.recorded_notes.is_empty());
    assert_eq!(outcome.score_result.overall_score, 0.0);
}

#[test]
fn one_chunk_holding_several_windows_keeps_each_note() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();

    let mut chunk = tone(261.63);
    chunk.extend(vec![0.0; WINDOW * 2]);
    chunk.extend(tone(392.0));
    clock.set(1000);
    let update = manager.submit_audio("player", &chunk).unwrap();
    assert_eq!(update.windows_analyzed, 4);

    // A window spans 2048 / 44.1 kHz = 46.4ms; the C4 window started three windows
    // before the chunk arrived.
    let notes: Vec<(&str, u64, u64)> = update
        .new_notes
        .iter()
        .map(|n| (n.note.as_str(), n.timestamp_ms, n.duration_ms))
        .collect();
    assert_eq!(notes, vec![("C4", 861, 861), ("G4", 1000, 139)]);
}

#[test]
fn sample_by_sample_pushes_drain_whole_windows() {
    let (manager, _) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();

    let total = WINDOW * 3 + 17;
    let mut windows = 0;
    for _ in 0..total {
        windows += manager.submit_audio("player", &[0.0]).unwrap().windows_analyzed;
    }
    assert_eq!(windows, total / WINDOW);
    assert_eq!(manager.pending_samples("player"), Some(total % WINDOW));
}

#[test]
fn ending_twice_reports_missing_session() {
    let (manager, clock) = manager_with_clock();
    manager.start_session("player", "c-g").unwrap();
    clock.set(500);
    manager.submit_audio("player", &tone(261.63)).unwrap();

    let first = manager.end_session("player").unwrap();
    assert!(matches!(
        manager.end_session("player"),
        Err(SessionError::SessionNotFound(_))
    ));
    assert_eq!(first.recorded_notes.len(), 1);
    assert_eq!(first.recorded_notes[0].note, "C4");
    assert!(matches!(
        manager.submit_audio("player", &tone(261.63)),
        Err(SessionError::SessionNotFound(_))
    ));
}

#[test]
fn concurrent_sessions_stay_isolated() {
    let clock = Arc::new(ManualClock::new(0));
    let manager = SessionManager::with_clock(
        PracticeConfig::default(),
        Arc::new(melody_catalog()),
        clock.clone(),
    )
    .unwrap();
    manager.start_session("alice", "c-g").unwrap();
    manager.start_session("bob", "c-g").unwrap();

    const ROUNDS: usize = 8;
    std::thread::scope(|scope| {
        for (client, freq) in [("alice", 440.0), ("bob", 261.63)] {
            let manager = &manager;
            let clock = &clock;
            scope.spawn(move || {
                let window = tone(freq);
                for _ in 0..ROUNDS {
                    clock.advance(150);
                    // Split each window so the two clients interleave mid-window.
                    manager.submit_audio(client, &window[..700]).unwrap();
                    manager.submit_audio(client, &window[700..]).unwrap();
                }
            });
        }
    });

    let alice = manager.end_session("alice").unwrap();
    let bob = manager.end_session("bob").unwrap();
    assert_eq!(alice.recorded_notes.len(), ROUNDS);
    assert_eq!(bob.recorded_notes.len(), ROUNDS);
    assert!(alice.recorded_notes.iter().all(|n| n.note == "A4"));
    assert!(bob.recorded_notes.iter().all(|n| n.note == "C4"));
    for notes in [&alice.recorded_notes, &bob.recorded_notes] {
        assert!(notes.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }
}

#[test]
fn sessions_resolve_songs_from_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("twinkle.json"),
        r#"{
            "title": "Twinkle Twinkle",
            "artist": "Traditional",
            "audioUrl": "twinkle.mp3",
            "noteData": [
                { "note": "C4", "timestamp": 0, "duration": 500 },
                { "note": "C4", "timestamp": 500, "duration": 500 }
            ],
            "tempo": 100,
            "timeSignature": "4/4"
        }"#,
    )
    .unwrap();

    let manager = SessionManager::with_clock(
        PracticeConfig::default(),
        Arc::new(DirectoryCatalog::new(dir.path())),
        Arc::new(ManualClock::new(0)),
    )
    .unwrap();
    let snapshot = manager.start_session("player", "twinkle").unwrap();
    assert_eq!(snapshot.reference_score.tempo_bpm, 100.0);
    assert_eq!(snapshot.reference_score.note_sequence.len(), 2);
    assert!(matches!(
        manager.start_session("other", "unknown-song"),
        Err(SessionError::ReferenceNotFound(_))
    ));
}

#[test]
fn ending_while_audio_streams_in_leaves_nothing_behind() {
    let window = tone(440.0);
    for _ in 0..100 {
        let (manager, clock) = manager_with_clock();
        manager.start_session("player", "c-g").unwrap();

        std::thread::scope(|scope| {
            let feeder = scope.spawn(|| {
                let mut ended = false;
                for _ in 0..20 {
                    clock.advance(150);
                    match manager.submit_audio("player", &window[..WINDOW / 2]) {
                        Ok(_) => assert!(!ended, "chunk accepted after the session ended"),
                        Err(SessionError::SessionNotFound(_)) => ended = true,
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            });
            let outcome = manager.end_session("player").unwrap();
            assert!(outcome.recorded_notes.len() <= 10);
            feeder.join().unwrap();
        });

        assert_eq!(manager.active_sessions(), 0);
        assert_eq!(manager.pending_samples("player"), None);
        assert!(matches!(
            manager.submit_audio("player", &window),
            Err(SessionError::SessionNotFound(_))
        ));
    }
}
