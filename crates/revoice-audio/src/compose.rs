//! Sequential speech-track assembly
//!
//! Lays synthesized clips onto a silent track in start order. Gaps are
//! filled with silence; stretch inaccuracy is swallowed by the following
//! silence block, so a clip that ran long never pushes later clips out.

use crate::wav::{load_audio, AudioBuffer};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// A synthesized clip and the time it should start at
#[derive(Debug, Clone)]
pub struct PlacedClip {
    pub start: f64,
    pub path: PathBuf,
}

/// Concatenate clips into one track of exactly `total_duration` seconds
///
/// Clips must be ordered by `start`. The returned track length matches
/// `total_duration` to within one sample.
pub fn compose_track(
    clips: &[PlacedClip],
    total_duration: f64,
    sample_rate: u32,
) -> Result<AudioBuffer> {
    let mut loaded = Vec::with_capacity(clips.len());
    for clip in clips {
        let audio = load_audio(&clip.path)
            .with_context(|| format!("Failed to load clip {}", clip.path.display()))?
            .at_rate(sample_rate)?;
        loaded.push((clip.start, audio));
    }
    Ok(compose_buffers(&loaded, total_duration, sample_rate))
}

/// Sample-level composer over already-loaded clips
pub fn compose_buffers(
    clips: &[(f64, AudioBuffer)],
    total_duration: f64,
    sample_rate: u32,
) -> AudioBuffer {
    let total_samples = (total_duration * sample_rate as f64).round() as usize;
    let mut track: Vec<f32> = Vec::with_capacity(total_samples);

    for (start, clip) in clips {
        let start_sample = (start * sample_rate as f64).round() as usize;
        if start_sample > track.len() {
            track.resize(start_sample, 0.0);
        }
        // a negative implied gap means the previous clip ran long; the
        // clip is appended immediately instead of overlapping
        track.extend_from_slice(&clip.samples);
    }

    match track.len().cmp(&total_samples) {
        std::cmp::Ordering::Less => track.resize(total_samples, 0.0),
        std::cmp::Ordering::Greater => {
            tracing::warn!(
                "composed track ran {} samples past the source duration, trimming",
                track.len() - total_samples
            );
            track.truncate(total_samples);
        }
        std::cmp::Ordering::Equal => {}
    }

    AudioBuffer::new(track, sample_rate)
}
