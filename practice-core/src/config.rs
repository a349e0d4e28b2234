//! # Configuration Module
//!
//! Analysis and scoring parameters for practice sessions. Window size and sample
//! rate travel together because the frequency resolution of every estimator
//! depends on both.

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Samples per analysis window (~46ms at 44.1kHz).
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 44_100;
pub const DEFAULT_MIN_NOTE_GAP_MS: u64 = 100;
pub const DEFAULT_PITCH_WEIGHT: f64 = 0.6;
pub const DEFAULT_RHYTHM_WEIGHT: f64 = 0.4;
/// Minimum RMS amplitude for the YIN noise gate.
pub const DEFAULT_AMPLITUDE_THRESHOLD: f32 = 0.01;

/// Which dominant-frequency estimator turns a window into Hz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// Index of the largest absolute sample, scaled by sample rate / window length.
    Peak,
    /// YIN difference function with noise gate and clarity check.
    #[default]
    Yin,
    /// Largest FFT magnitude bin with parabolic interpolation.
    Spectrum,
}

/// Practice engine configuration.
///
/// Every field has a default, so a TOML file only needs the values it overrides:
///
/// ```toml
/// window_size = 4096
/// estimator = "spectrum"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    /// Samples per analysis window.
    pub window_size: usize,
    /// Sample rate of incoming audio in Hz.
    pub sample_rate_hz: u32,
    /// Detections closer than this to the previous note are discarded.
    pub min_note_gap_ms: u64,
    /// Weight of the pitch score in the overall score.
    pub pitch_weight: f64,
    /// Weight of the rhythm score in the overall score.
    pub rhythm_weight: f64,
    pub estimator: EstimatorKind,
    /// RMS below which a window is treated as silence by the YIN estimator.
    pub amplitude_threshold: f32,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            min_note_gap_ms: DEFAULT_MIN_NOTE_GAP_MS,
            pitch_weight: DEFAULT_PITCH_WEIGHT,
            rhythm_weight: DEFAULT_RHYTHM_WEIGHT,
            estimator: EstimatorKind::default(),
            amplitude_threshold: DEFAULT_AMPLITUDE_THRESHOLD,
        }
    }
}

impl PracticeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: PracticeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks that the values can produce finite scores in [0, 100].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 4 {
            return Err(ConfigError::Invalid(format!(
                "window_size must be at least 4 samples, got {}",
                self.window_size
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("sample_rate_hz must be positive".to_string()));
        }
        for (name, weight) in [("pitch_weight", self.pitch_weight), ("rhythm_weight", self.rhythm_weight)] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if ((self.pitch_weight + self.rhythm_weight) - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid(format!(
                "pitch_weight + rhythm_weight must equal 1.0, got {}",
                self.pitch_weight + self.rhythm_weight
            )));
        }
        if !self.amplitude_threshold.is_finite() || self.amplitude_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "amplitude_threshold must be a non-negative number, got {}",
                self.amplitude_threshold
            )));
        }
        Ok(())
    }

    /// Duration of one analysis window in milliseconds.
    pub fn window_duration_ms(&self) -> f64 {
        self.window_size as f64 * 1000.0 / self.sample_rate_hz as f64
    }
}
