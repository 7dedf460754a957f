//! Leading/trailing silence removal
//!
//! Synthesized clips routinely carry silence at both ends, and the
//! time-stretcher appends more at the tail. Duration targeting needs
//! those gone before measuring.

use crate::wav::{load_audio, write_wav, AudioBuffer};
use anyhow::Result;
use std::path::Path;

/// Silence detection parameters
#[derive(Debug, Clone, Copy)]
pub struct SilenceOptions {
    /// Upper bound for "silent" in dBFS
    pub threshold_db: f32,
    /// Minimum silent window length in milliseconds
    pub min_silence_ms: u32,
    /// Scan step in milliseconds
    pub seek_step_ms: u32,
}

impl Default for SilenceOptions {
    fn default() -> Self {
        Self {
            threshold_db: -50.0,
            min_silence_ms: 10,
            seek_step_ms: 1,
        }
    }
}

impl SilenceOptions {
    fn amplitude_threshold(&self) -> f32 {
        10f32.powf(self.threshold_db / 20.0)
    }
}

/// Strip silence from both ends of a WAV file
pub fn strip_silence(input: &Path, output: &Path, opts: &SilenceOptions) -> Result<()> {
    let audio = load_audio(input)?;
    let trimmed = match nonsilent_bounds(&audio, opts) {
        Some((start, end)) => AudioBuffer::new(audio.samples[start..end].to_vec(), audio.sample_rate),
        None => {
            tracing::warn!("no nonsilent audio detected in {}, keeping as is", input.display());
            audio
        }
    };
    write_wav(output, &trimmed)
}

/// Strip silence from the tail only, keeping any leading quiet intact
pub fn strip_trailing_silence(input: &Path, output: &Path, opts: &SilenceOptions) -> Result<()> {
    let audio = load_audio(input)?;
    let trimmed = match nonsilent_bounds(&audio, opts) {
        Some((_, end)) => AudioBuffer::new(audio.samples[..end].to_vec(), audio.sample_rate),
        None => {
            tracing::warn!("no nonsilent audio detected in {}, keeping as is", input.display());
            audio
        }
    };
    write_wav(output, &trimmed)
}

/// Sample bounds `[start, end)` of the nonsilent region, or None when the
/// whole buffer is below the threshold
pub fn nonsilent_bounds(audio: &AudioBuffer, opts: &SilenceOptions) -> Option<(usize, usize)> {
    let threshold = opts.amplitude_threshold();
    let window = ms_to_samples(opts.min_silence_ms, audio.sample_rate).max(1);
    let step = ms_to_samples(opts.seek_step_ms, audio.sample_rate).max(1);

    let loud = |chunk: &[f32]| chunk.iter().any(|s| s.abs() >= threshold);

    let mut start = None;
    let mut pos = 0;
    while pos < audio.samples.len() {
        let end = (pos + window).min(audio.samples.len());
        if loud(&audio.samples[pos..end]) {
            start = Some(pos);
            break;
        }
        pos += step;
    }
    let start = start?;

    // scan backwards for the last loud window
    let mut end = audio.samples.len();
    while end > start {
        let from = end.saturating_sub(window).max(start);
        if loud(&audio.samples[from..end]) {
            break;
        }
        end = end.saturating_sub(step);
    }

    Some((start, end))
}

fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}
