//! # Practice - Local Practice Session Runner
//!
//! Captures the default microphone, feeds it through a practice session graded
//! against a song from a catalog directory, and prints the scores at the end.
//!
//! ## Architecture
//! - **Capture**: CPAL input stream pushing raw mono chunks into a crossbeam channel
//! - **Analysis**: main thread draining the channel into the `SessionManager`
//! - **Shutdown**: session ends when the time limit passes or capture stops

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::StreamTrait;
use crossbeam_channel::{after, select};
use practice_core::{
    ClientEvent, DirectoryCatalog, PracticeConfig, ServerEvent, SessionManager, audio,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for a local practice run.
#[derive(Parser, Debug)]
#[command(name = "practice")]
#[command(about = "Practice a song against its reference performance")]
#[command(version)]
struct Args {
    /// Directory of `<song-id>.json` song documents
    #[arg(short, long, env = "PRACTICE_CATALOG")]
    catalog: PathBuf,

    /// Song id to practice
    #[arg(short, long)]
    song: String,

    /// TOML file overriding the default analysis settings
    #[arg(long, env = "PRACTICE_CONFIG")]
    config: Option<PathBuf>,

    /// Stop the session after this many seconds
    #[arg(long, default_value = "30")]
    seconds: u64,

    /// Print the final result as JSON instead of text
    #[arg(long)]
    json: bool,
}

/// Client id of the single local performer.
const LOCAL_CLIENT: &str = "local";

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "practice_core=info,practice=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PracticeConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PracticeConfig::default(),
    };

    let (raw_audio_tx, raw_audio_rx) = crossbeam_channel::unbounded::<Vec<f32>>();
    let (stream, sample_rate) = audio::start_audio_capture(raw_audio_tx, config.sample_rate_hz)
        .context("Failed to start audio capture")?;
    if sample_rate != config.sample_rate_hz {
        warn!(
            requested = config.sample_rate_hz,
            actual = sample_rate,
            "Input device does not support the configured sample rate"
        );
        config.sample_rate_hz = sample_rate;
    }

    let manager = SessionManager::new(config, Arc::new(DirectoryCatalog::new(&args.catalog)))
        .context("Invalid practice configuration")?;

    for event in manager.handle_event(
        LOCAL_CLIENT,
        ClientEvent::StartPractice { reference_id: args.song.clone() },
    ) {
        match event {
            ServerEvent::SessionStarted { session } => info!(
                song = %args.song,
                expected_notes = session.reference_score.note_sequence.len(),
                tempo = session.reference_score.tempo_bpm,
                "Practice started, play now"
            ),
            ServerEvent::Error { message, .. } => {
                anyhow::bail!("Could not start practice session: {}", message)
            }
            _ => {}
        }
    }

    let deadline = after(Duration::from_secs(args.seconds));
    loop {
        select! {
            recv(raw_audio_rx) -> msg => match msg {
                Ok(chunk) => {
                    for event in manager.handle_event(LOCAL_CLIENT, ClientEvent::AudioData { samples: chunk }) {
                        match event {
                            ServerEvent::NoteDetected { note, timestamp_ms } => {
                                info!(note = %note, timestamp_ms, "Note detected");
                            }
                            ServerEvent::Error { message, .. } => warn!("{}", message),
                            _ => {}
                        }
                    }
                }
                Err(_) => {
                    error!("Audio channel closed");
                    break;
                }
            },
            recv(deadline) -> _ => {
                info!("Time limit reached");
                break;
            },
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Error pausing stream: {}", e);
    }
    drop(stream);

    let mut outcome = None;
    for event in manager.handle_event(LOCAL_CLIENT, ClientEvent::EndPractice) {
        if let ServerEvent::SessionEnded { .. } = event {
            outcome = Some(event);
        }
    }

    match outcome {
        Some(event) if args.json => println!("{}", serde_json::to_string_pretty(&event)?),
        Some(ServerEvent::SessionEnded { score_result, recorded_notes, feedback }) => {
            println!("Notes played:    {}", recorded_notes.len());
            println!("Overall score:   {:.0}%", score_result.overall_score);
            println!("Pitch accuracy:  {:.0}%", score_result.pitch_score);
            println!("Rhythm accuracy: {:.0}%", score_result.rhythm_score);
            for line in feedback {
                println!("{}", line);
            }
        }
        _ => anyhow::bail!("Practice session ended without a result"),
    }

    Ok(())
}
