//! Background track construction
//!
//! Where a synthesized voice will play, the background must come from the
//! vocal-less accompaniment stem; everywhere else the original audio is
//! kept untouched. Each transition walks through a crossfade bridge so the
//! seams stay inaudible.

use crate::wav::AudioBuffer;
use anyhow::Result;

/// Background mixing parameters
#[derive(Debug, Clone, Copy)]
pub struct MixOptions {
    /// Crossfade length at each seam in seconds
    pub crossfade: f64,
    /// Expansion applied to each replacement span, compensating word
    /// timestamp error
    pub timestamp_correction: f64,
}

impl Default for MixOptions {
    fn default() -> Self {
        Self {
            crossfade: 0.70,
            timestamp_correction: 0.1,
        }
    }
}

/// Expand, clamp and coalesce replacement spans
///
/// Spans must be sorted by start. Two spans closer than
/// `2 * correction + 2 * crossfade` are merged; a crossfade squeezed into
/// a smaller gap would be too short to mask the seam.
pub fn merge_replacement_spans(
    spans: &[(f64, f64)],
    duration: f64,
    opts: &MixOptions,
) -> Vec<(f64, f64)> {
    let min_gap = 2.0 * opts.timestamp_correction + 2.0 * opts.crossfade;

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(spans.len());
    for &(start, end) in spans {
        let start = (start - opts.timestamp_correction).max(0.0);
        let end = (end + opts.timestamp_correction).min(duration);

        match merged.last_mut() {
            Some((_, prev_end)) if start - *prev_end < min_gap => {
                *prev_end = prev_end.max(end);
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Build the background track for the whole media
///
/// `spans` are the merged replacement intervals. Inside a span the track
/// is the accompaniment stem; between spans it is the original audio,
/// bridged with crossfades of `opts.crossfade` seconds (shortened when a
/// gap is too small to hold them).
pub fn mix_background(
    original: &AudioBuffer,
    accompaniment: &AudioBuffer,
    spans: &[(f64, f64)],
    opts: &MixOptions,
) -> Result<AudioBuffer> {
    let rate = original.sample_rate;
    let accompaniment = accompaniment.at_rate(rate)?;
    let duration = original.duration();

    let mut out = vec![0.0f32; original.samples.len()];

    let mut prev_end = 0.0;
    for (i, &(start, end)) in spans.iter().enumerate() {
        write_bridge(
            &mut out,
            original,
            &accompaniment,
            prev_end,
            start,
            i > 0,
            true,
            opts.crossfade,
        );

        for idx in original.index_at(start)..original.index_at(end) {
            out[idx] = sample_at(&accompaniment, idx);
        }

        prev_end = end;
    }

    write_bridge(
        &mut out,
        original,
        &accompaniment,
        prev_end,
        duration,
        !spans.is_empty(),
        false,
        opts.crossfade,
    );

    Ok(AudioBuffer::new(out, rate))
}

/// Fill `[from, to]` with original audio, fading against the
/// accompaniment at whichever ends border a replaced region
#[allow(clippy::too_many_arguments)]
fn write_bridge(
    out: &mut [f32],
    original: &AudioBuffer,
    accompaniment: &AudioBuffer,
    from: f64,
    to: f64,
    fade_head: bool,
    fade_tail: bool,
    crossfade: f64,
) {
    let gap = to - from;
    if gap <= 0.0 {
        return;
    }
    let cf = crossfade.min(gap);
    let rate = original.sample_rate as f64;

    for idx in original.index_at(from)..original.index_at(to) {
        let t = idx as f64 / rate;

        let head_ramp = if fade_head && cf > 0.0 {
            ((t - from) / cf).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let tail_ramp = if fade_tail && cf > 0.0 {
            ((to - t) / cf).clamp(0.0, 1.0)
        } else {
            1.0
        };

        let original_gain = head_ramp * tail_ramp;
        let accompaniment_gain = ((1.0 - head_ramp) + (1.0 - tail_ramp)).min(1.0);

        out[idx] = sample_at(original, idx) * original_gain as f32
            + sample_at(accompaniment, idx) * accompaniment_gain as f32;
    }
}

fn sample_at(audio: &AudioBuffer, idx: usize) -> f32 {
    audio.samples.get(idx).copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> MixOptions {
        MixOptions {
            crossfade: 0.5,
            timestamp_correction: 0.1,
        }
    }

    #[test]
    fn test_spans_expand_and_clamp() {
        let merged = merge_replacement_spans(&[(0.05, 1.0), (9.95, 12.0)], 10.0, &opts());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, 0.0);
        assert!((merged[0].1 - 1.1).abs() < 1e-9);
        assert_eq!(merged[1].1, 10.0);
    }

    #[test]
    fn test_close_spans_coalesce() {
        // gap after expansion is 0.8s, below 2*0.1 + 2*0.5 = 1.2s
        let merged = merge_replacement_spans(&[(1.0, 2.0), (3.0, 4.0)], 10.0, &opts());
        assert_eq!(merged.len(), 1);
        assert!((merged[0].0 - 0.9).abs() < 1e-9);
        assert!((merged[0].1 - 4.1).abs() < 1e-9);
    }

    #[test]
    fn test_distant_spans_stay_apart() {
        let merged = merge_replacement_spans(&[(1.0, 2.0), (5.0, 6.0)], 10.0, &opts());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_overlapping_spans_coalesce() {
        let merged = merge_replacement_spans(&[(1.0, 3.0), (2.5, 4.0)], 10.0, &opts());
        assert_eq!(merged.len(), 1);
        assert!((merged[0].1 - 4.1).abs() < 1e-9);
    }

    #[test]
    fn test_mix_region_identities() {
        let rate = 1000u32;
        let original = AudioBuffer::new(vec![0.8; 10_000], rate);
        let accompaniment = AudioBuffer::new(vec![0.2; 10_000], rate);
        let spans = vec![(3.0, 5.0)];
        let o = opts();

        let mixed = mix_background(&original, &accompaniment, &spans, &o).unwrap();
        assert_eq!(mixed.samples.len(), 10_000);

        // inside the replaced span: pure accompaniment
        for idx in 3500..4500 {
            assert!((mixed.samples[idx] - 0.2).abs() < 1e-6, "idx {idx}");
        }
        // well before the span (more than a crossfade away): pure original
        for idx in 0..2400 {
            assert!((mixed.samples[idx] - 0.8).abs() < 1e-6, "idx {idx}");
        }
        // well after the span: pure original again
        for idx in 5600..10_000 {
            assert!((mixed.samples[idx] - 0.8).abs() < 1e-6, "idx {idx}");
        }
        // in the middle of the leading crossfade both stems contribute
        let seam = mixed.samples[2750];
        assert!(seam > 0.2 && seam < 0.8);
    }

    #[test]
    fn test_no_spans_keeps_original() {
        let rate = 1000u32;
        let original = AudioBuffer::new(vec![0.7; 3000], rate);
        let accompaniment = AudioBuffer::new(vec![0.1; 3000], rate);

        let mixed = mix_background(&original, &accompaniment, &[], &opts()).unwrap();
        for (i, s) in mixed.samples.iter().enumerate() {
            assert!((s - 0.7).abs() < 1e-6, "idx {i}");
        }
    }
}
