//! Audio resampling using rubato

use crate::wav::AudioBuffer;
use anyhow::Result;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Resample a mono buffer to `target_rate`
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer> {
    if audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }
    if audio.samples.is_empty() {
        return Ok(AudioBuffer::new(Vec::new(), target_rate));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / audio.sample_rate as f64,
        2.0,
        params,
        audio.samples.len(),
        1, // mono
    )?;

    let input = vec![audio.samples.clone()];
    let output = resampler.process(&input, None)?;

    Ok(AudioBuffer::new(
        output.into_iter().next().unwrap_or_default(),
        target_rate,
    ))
}
