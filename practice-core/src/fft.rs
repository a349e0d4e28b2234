//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain view of one analysis window, used by the spectrum estimator.
//!
//! ## Features
//! - FFT planned once per window size using RustFFT
//! - Hann windowing for reduced spectral leakage
//! - DC offset removal

use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::fmt;
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 { return; }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Forward FFT for a fixed window length.
///
/// Planning is the expensive part of RustFFT, so a plan is built once and shared
/// by every session that uses the same configuration.
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    window_size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("window_size", &self.window_size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(window_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);
        Self { window_size, fft }
    }

    /// Performs DC removal, Hann windowing and a forward FFT.
    ///
    /// Returns `None` if `signal` is not exactly one window long.
    pub fn perform_fft(&self, signal: &[f32]) -> Option<Vec<Complex<f32>>> {
        if signal.len() != self.window_size {
            return None;
        }

        let mut processed_signal = signal.to_vec();
        remove_dc_offset(&mut processed_signal);
        apply_hann_window(&mut processed_signal);

        let mut buffer: Vec<Complex<f32>> = processed_signal
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);
        Some(buffer)
    }

    /// Magnitudes of the bins up to the Nyquist frequency.
    pub fn magnitudes(&self, signal: &[f32]) -> Option<Vec<f32>> {
        self.perform_fft(signal)
            .map(|spectrum| spectrum_to_magnitudes(&spectrum))
    }
}

/// Magnitude of the first half of a complex spectrum.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
        .collect()
}
