//! # Audio Capture Module
//!
//! Real-time microphone capture using CPAL (Cross-Platform Audio Library). Captured
//! samples are mixed down to mono and forwarded as raw chunks; cutting them into
//! analysis windows is the session's job, not the capture callback's.

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;
use tracing::{error, info, trace};

/// Starts audio capture from the default input device.
///
/// # Arguments
/// * `sender` - Channel receiving each captured chunk of mono samples
/// * `target_rate` - Desired sample rate in Hz
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Running stream handle and the actual sample rate
/// * `Err(e)` - No usable input device or format
pub fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!(device = %device.name()?, "Using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate_val = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    info!(sample_rate = sample_rate_val, channels, "Selected input format");

    let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let chunk = downmix(data, channels);
            // The receiver going away just means nobody is listening any more.
            if sender.try_send(chunk).is_err() {
                trace!("Dropping captured chunk, no receiver");
            }
        },
        err_fn,
        None
    )?;

    stream.play()?;

    Ok((stream, sample_rate_val))
}

/// Averages interleaved frames into mono samples.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Picks the f32 input configuration whose sample-rate range is closest to the
/// target, preferring mono over multichannel.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_rate = c.min_sample_rate().0;
            let max_rate = c.max_sample_rate().0;
            let rate_distance = if (min_rate..=max_rate).contains(&target_rate) {
                0
            } else {
                (min_rate as i64 - target_rate as i64).abs().min((max_rate as i64 - target_rate as i64).abs())
            };
            (rate_distance, c.channels())
        })
}
