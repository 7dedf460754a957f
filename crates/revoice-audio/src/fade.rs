//! Linear gain ramps for click-free clip edges

use crate::wav::AudioBuffer;

/// Ramp the first `seconds` of the buffer from zero gain to unity
pub fn fade_in(audio: &mut AudioBuffer, seconds: f64) {
    let count = ramp_len(audio, seconds);
    for i in 0..count {
        let gain = i as f32 / count as f32;
        audio.samples[i] *= gain;
    }
}

/// Ramp the last `seconds` of the buffer from unity gain to zero
pub fn fade_out(audio: &mut AudioBuffer, seconds: f64) {
    let count = ramp_len(audio, seconds);
    let len = audio.samples.len();
    for i in 0..count {
        let gain = i as f32 / count as f32;
        audio.samples[len - 1 - i] *= gain;
    }
}

fn ramp_len(audio: &AudioBuffer, seconds: f64) -> usize {
    let count = (seconds * audio.sample_rate as f64).round() as usize;
    count.min(audio.samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_in_silences_first_sample() {
        let mut audio = AudioBuffer::new(vec![1.0; 1000], 1000);
        fade_in(&mut audio, 0.1);
        assert_eq!(audio.samples[0], 0.0);
        assert!(audio.samples[50] > 0.4 && audio.samples[50] < 0.6);
        assert_eq!(audio.samples[200], 1.0);
    }

    #[test]
    fn test_fade_out_silences_last_sample() {
        let mut audio = AudioBuffer::new(vec![1.0; 1000], 1000);
        fade_out(&mut audio, 0.1);
        assert_eq!(*audio.samples.last().unwrap(), 0.0);
        assert_eq!(audio.samples[800], 1.0);
    }

    #[test]
    fn test_fade_longer_than_clip_is_clamped() {
        let mut audio = AudioBuffer::new(vec![1.0; 10], 1000);
        fade_in(&mut audio, 1.0);
        assert_eq!(audio.samples[0], 0.0);
    }
}
