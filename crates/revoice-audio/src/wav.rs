//! Audio file I/O

use anyhow::{Context, Result};
use hound::{WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Mono audio samples together with their sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// A buffer of silence with the given duration
    pub fn silence(duration: f64, sample_rate: u32) -> Self {
        let count = (duration * sample_rate as f64).round().max(0.0) as usize;
        Self {
            samples: vec![0.0; count],
            sample_rate,
        }
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Convert a time offset to a sample index, clamped to the buffer
    pub fn index_at(&self, seconds: f64) -> usize {
        let idx = (seconds * self.sample_rate as f64).round().max(0.0) as usize;
        idx.min(self.samples.len())
    }

    /// This buffer converted to `target_rate`, resampling if needed
    pub fn at_rate(&self, target_rate: u32) -> Result<AudioBuffer> {
        if self.sample_rate == target_rate {
            return Ok(self.clone());
        }
        crate::resampling::resample(self, target_rate)
    }
}

/// Load an audio file as mono samples at its native sample rate
pub fn load_audio(path: &Path) -> Result<AudioBuffer> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "wav" => load_wav(path),
        "mp3" | "m4a" | "mp4" | "ogg" | "flac" | "opus" | "webm" => load_with_symphonia(path),
        _ => anyhow::bail!("Unsupported audio format: {:?}", path),
    }
}

/// Duration of a WAV file in seconds, without decoding the samples
pub fn wav_duration(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;
    let spec = reader.spec();
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Write mono samples as a 16-bit PCM WAV file
pub fn write_wav(path: &Path, audio: &AudioBuffer) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file {}", path.display()))?;
    for &sample in &audio.samples {
        let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer.write_sample(sample_i16)?;
    }
    writer.finalize()?;

    Ok(())
}

fn load_wav(path: &Path) -> Result<AudioBuffer> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };

    Ok(AudioBuffer::new(downmix(samples, channels), sample_rate))
}

/// Load a compressed audio file (mp3, m4a, ogg, flac) via symphonia
fn load_with_symphonia(path: &Path) -> Result<AudioBuffer> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed =
        symphonia::default::get_probe().format(&hint, mss, &format_opts, &metadata_opts)?;

    let mut format = probed.format;

    let track = format.default_track().context("No audio track found")?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Unknown sample rate")?;
    let channels = track
        .codec_params
        .channels
        .context("Unknown channel count")?
        .count();

    let mut decoder = symphonia::default::get_codecs().make(&track.codec_params, &decoder_opts)?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(AudioBuffer::new(downmix(samples, channels), sample_rate))
}

fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels)
        .map(|chunk| chunk.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_buffer() {
        let buf = AudioBuffer::silence(0.5, 16000);
        assert_eq!(buf.samples.len(), 8000);
        assert!((buf.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_wav_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..4410)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        let original = AudioBuffer::new(samples, 44100);
        write_wav(&path, &original).unwrap();

        let loaded = load_audio(&path).unwrap();
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.samples.len(), original.samples.len());
        for (a, b) in loaded.samples.iter().zip(&original.samples) {
            assert!((a - b).abs() < 1.0 / 16384.0);
        }

        assert!((wav_duration(&path).unwrap() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(stereo, 2), vec![0.5, 0.5, 0.0]);
    }
}
