//! # Pitch Detection Module
//!
//! Turns one fixed-size window of samples into a dominant frequency and a note label.
//! Three estimators share one contract: the window is monophonic, the result is a
//! frequency in Hz, and silence (or anything the estimator rejects as noise) is 0 Hz.
//!
//! ## Estimators
//! - Peak amplitude index scaling (baseline)
//! - YIN with noise gate, clarity check and parabolic interpolation
//! - FFT magnitude peak refined by log-parabolic interpolation

use crate::config::{EstimatorKind, PracticeConfig};
use crate::fft::SpectrumAnalyzer;
use crate::tuning;

/// Estimates the dominant frequency of analysis windows for one configuration.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    estimator: EstimatorKind,
    sample_rate: u32,
    amplitude_threshold: f32,
    spectrum: Option<SpectrumAnalyzer>,
}

impl PitchDetector {
    pub fn new(config: &PracticeConfig) -> Self {
        let spectrum = match config.estimator {
            EstimatorKind::Spectrum => Some(SpectrumAnalyzer::new(config.window_size)),
            _ => None,
        };
        Self {
            estimator: config.estimator,
            sample_rate: config.sample_rate_hz,
            amplitude_threshold: config.amplitude_threshold,
            spectrum,
        }
    }

    /// Dominant frequency of `window` in Hz, or 0.0 when no pitch is present.
    pub fn estimate_frequency(&self, window: &[f32]) -> f64 {
        let estimate = match self.estimator {
            EstimatorKind::Peak => Some(peak_amplitude_frequency(window, self.sample_rate)),
            EstimatorKind::Yin => {
                detect_pitch_yin(window, self.sample_rate, self.amplitude_threshold)
            }
            EstimatorKind::Spectrum => self.spectrum.as_ref().and_then(|analyzer| {
                if rms(window) < self.amplitude_threshold {
                    return None;
                }
                let magnitudes = analyzer.magnitudes(window)?;
                detect_pitch_spectrum(&magnitudes, self.sample_rate)
            }),
        };
        match estimate {
            Some(freq) if freq.is_finite() && freq > 0.0 => freq as f64,
            _ => 0.0,
        }
    }

    /// Note label of the dominant frequency, `None` for silence or noise.
    pub fn detect_note(&self, window: &[f32]) -> Option<String> {
        tuning::frequency_to_note(self.estimate_frequency(window))
    }
}

fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Baseline estimator: index of the largest absolute sample scaled by
/// `sample_rate / window_len`. Only the first strictly-greater peak counts,
/// so an all-zero window yields 0 Hz.
pub fn peak_amplitude_frequency(signal: &[f32], sample_rate: u32) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    let mut max_amplitude = 0.0_f32;
    let mut dominant_frequency = 0.0_f32;
    let bin_width = sample_rate as f32 / signal.len() as f32;
    for (i, sample) in signal.iter().enumerate() {
        if sample.abs() > max_amplitude {
            max_amplitude = sample.abs();
            dominant_frequency = i as f32 * bin_width;
        }
    }
    dominant_frequency
}

/// YIN pitch detection.
///
/// # Arguments
/// * `signal` - One analysis window
/// * `sample_rate` - Sample rate in Hz
/// * `amplitude_threshold` - Minimum RMS for pitch detection
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - No pitch detected (silence, noise, or invalid signal)
pub fn detect_pitch_yin(
    signal: &[f32],
    sample_rate: u32,
    amplitude_threshold: f32,
) -> Option<f32> {
    let half = signal.len() / 2;
    if half < 3 {
        return None;
    }
    let mut yin_buffer = vec![0.0; half];

    // --- Noise Gate: Calculate RMS to filter out silence/noise ---
    let level = rms(signal);
    if level == 0.0 || level < amplitude_threshold {
        return None;
    }

    // --- Step 1 & 2: Difference function and squared difference ---
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // --- Step 3: Cumulative mean normalized difference ---
    let mut running_sum = 0.0;
    yin_buffer[0] = 1.0;
    for tau in 1..half {
        running_sum += yin_buffer[tau];
        if running_sum != 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    // --- Step 4: First dip under the threshold, then down to its local minimum ---
    let min_val = yin_buffer
        .iter()
        .skip(1) // Skip tau = 0
        .cloned()
        .fold(f32::INFINITY, f32::min);

    let threshold = min_val + 0.05;
    let mut period = 0;
    for tau in 2..half {
        if yin_buffer[tau] < threshold && yin_buffer[tau] < yin_buffer[tau - 1] {
            period = tau;
            break;
        }
    }
    while period != 0 && period + 1 < half && yin_buffer[period + 1] < yin_buffer[period] {
        period += 1;
    }

    // --- Step 5: Clarity check to reject noise ---
    const CLARITY_THRESHOLD: f32 = 0.1;
    if period == 0 || yin_buffer[period] > CLARITY_THRESHOLD {
        return None;
    }

    // --- Step 6: Parabolic interpolation for better precision ---
    if period + 1 >= half {
        return None;
    }

    let y1 = yin_buffer[period - 1];
    let y2 = yin_buffer[period];
    let y3 = yin_buffer[period + 1];

    let period_float = if (y1 - 2.0 * y2 + y3) != 0.0 {
        let peak_shift = (y1 - y3) / (2.0 * (y1 - 2.0 * y2 + y3));
        period as f32 + peak_shift
    } else {
        period as f32
    };

    let frequency = sample_rate as f32 / period_float;

    // Only audible frequencies count as a pitch.
    if frequency.is_finite() && frequency > 20.0 {
        Some(frequency)
    } else {
        None
    }
}

/// Spectrum estimator: strongest non-DC bin, refined by [`refine_from_spectrum`].
pub fn detect_pitch_spectrum(spectrum_magnitudes: &[f32], sample_rate: u32) -> Option<f32> {
    let (peak_bin, peak_mag) = spectrum_magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if !peak_mag.is_finite() || *peak_mag <= 1e-6 {
        return None;
    }
    let buffer_size = spectrum_magnitudes.len() * 2;
    let rough_freq = peak_bin as f32 * sample_rate as f32 / buffer_size as f32;
    refine_from_spectrum(spectrum_magnitudes, rough_freq, sample_rate)
}

/// Refines a frequency estimate using a pre-computed magnitude spectrum.
///
/// Searches two bins either side of the rough estimate and fits a parabola to the
/// log magnitudes around the strongest one.
///
/// # Returns
/// * `Some(refined_freq)` - Refined frequency estimate
/// * `Some(rough_freq)` - Refinement not possible, rough estimate kept
/// * `None` - `rough_freq` was not positive
pub fn refine_from_spectrum(
    spectrum_magnitudes: &[f32],
    rough_freq: f32,
    sample_rate: u32,
) -> Option<f32> {
    if rough_freq <= 0.0 || spectrum_magnitudes.len() < 3 { return None; }
    let buffer_size = spectrum_magnitudes.len() * 2;
    let target_bin = (rough_freq * buffer_size as f32) / sample_rate as f32;
    let search_radius = 2.0;
    let start_bin = (target_bin - search_radius).max(0.0) as usize;
    let end_bin = (target_bin + search_radius).min((spectrum_magnitudes.len() - 1) as f32) as usize;
    if start_bin >= end_bin { return Some(rough_freq); }

    let peak_bin = match spectrum_magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        Some((offset, _)) => start_bin + offset,
        None => return Some(rough_freq),
    };

    if peak_bin == 0 || peak_bin >= spectrum_magnitudes.len() - 1 { return Some(rough_freq); }

    let y1 = spectrum_magnitudes[peak_bin - 1].ln();
    let y2 = spectrum_magnitudes[peak_bin].ln();
    let y3 = spectrum_magnitudes[peak_bin + 1].ln();

    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() { return Some(rough_freq); }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 { return Some(rough_freq); }

    let peak_shift = (y3 - y1) / (2.0 * denominator);
    let interpolated_bin = peak_bin as f32 + peak_shift;
    let final_freq = (interpolated_bin * sample_rate as f32) / buffer_size as f32;

    if final_freq.is_finite() && final_freq > 0.0 {
        Some(final_freq)
    } else {
        Some(rough_freq)
    }
}
