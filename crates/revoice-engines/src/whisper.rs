//! Local ASR via whisper.cpp with word-level timestamps
//!
//! Used twice per run: once to transcribe the source audio and once per
//! synthesized clip to verify the synthesis round-trip. The model context
//! is loaded lazily and can be released with [`SpeechRecognizer::unload`]
//! so a GPU-resident TTS engine does not have to share memory with it.

use crate::traits::{SpeechRecognizer, Transcription};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use revoice_types::Word;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Clips shorter than this are treated as containing no speech
const MIN_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize / 10;

/// Matches whisper special tokens: [_TT_xxx], [_EOT_], [_SOT_], [_BEG_], ...
fn special_tokens_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[_[A-Z]+_?\d*\]").unwrap())
}

/// Whisper transcription engine with an explicit load/unload lifecycle
pub struct WhisperRecognizer {
    model_path: PathBuf,
    use_gpu: bool,
    ctx: Mutex<Option<Arc<WhisperContext>>>,
}

impl WhisperRecognizer {
    pub fn new(model_path: impl Into<PathBuf>, use_gpu: bool) -> Self {
        Self {
            model_path: model_path.into(),
            use_gpu,
            ctx: Mutex::new(None),
        }
    }

    /// Get or lazily load the model context
    fn context(&self) -> Result<Arc<WhisperContext>> {
        let mut guard = self.ctx.lock();
        if let Some(ctx) = guard.as_ref() {
            return Ok(ctx.clone());
        }

        tracing::info!("loading whisper model from {}", self.model_path.display());

        let mut params = WhisperContextParameters::default();
        params.use_gpu(self.use_gpu);

        let model_path = self
            .model_path
            .to_str()
            .context("Model path is not valid UTF-8")?;
        let ctx = Arc::new(
            WhisperContext::new_with_params(model_path, params)
                .context("Failed to load whisper model")?,
        );

        *guard = Some(ctx.clone());
        Ok(ctx)
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperRecognizer {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<Transcription> {
        let ctx = self.context()?;
        let audio = audio.to_path_buf();
        let language = language
            .map(str::to_owned)
            .filter(|lang| !lang.is_empty() && lang != "auto");

        tokio::task::spawn_blocking(move || run_inference(&ctx, &audio, language.as_deref()))
            .await
            .context("Whisper inference task panicked")?
    }

    fn unload(&self) {
        if self.ctx.lock().take().is_some() {
            tracing::info!("whisper model released");
        }
    }
}

fn run_inference(
    ctx: &WhisperContext,
    audio: &Path,
    language: Option<&str>,
) -> Result<Transcription> {
    let samples = revoice_audio::load_audio(audio)
        .with_context(|| format!("Failed to load audio {}", audio.display()))?
        .at_rate(WHISPER_SAMPLE_RATE)?
        .samples;

    if samples.len() < MIN_SAMPLES {
        return Ok(Transcription {
            words: Vec::new(),
            language: language.unwrap_or("en").to_string(),
        });
    }

    let mut state = ctx.create_state().context("Failed to create whisper state")?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    if let Some(lang) = language {
        params.set_language(Some(lang));
    }
    params.set_token_timestamps(true);
    params.set_n_threads(4);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, &samples)
        .context("Whisper inference failed")?;

    let detected = match language {
        Some(lang) => lang.to_string(),
        None => state
            .full_lang_id_from_state()
            .ok()
            .and_then(whisper_rs::get_lang_str)
            .unwrap_or("en")
            .to_string(),
    };

    let mut words = Vec::new();

    let num_segments = state.full_n_segments();
    for i in 0..num_segments {
        let segment = match state.get_segment(i) {
            Some(seg) => seg,
            None => continue,
        };

        let segment_start = centis_to_seconds(segment.start_timestamp());
        let segment_end = centis_to_seconds(segment.end_timestamp());

        let mut current_word = String::new();
        let mut word_start = segment_start;
        let mut token_probs: Vec<f64> = Vec::new();

        let num_tokens = segment.n_tokens();
        for j in 0..num_tokens {
            let Some(token) = segment.get_token(j) else {
                continue;
            };

            let token_text = match token.to_str() {
                Ok(t) => t.to_string(),
                Err(_) => match token.to_str_lossy() {
                    Ok(t) => t.to_string(),
                    Err(_) => continue,
                },
            };

            if token_text.starts_with("[_") || token_text.starts_with(" [_") {
                continue;
            }

            let token_data = token.token_data();
            let token_prob = token.token_probability() as f64;

            // a leading space marks the start of the next word
            if token_text.starts_with(' ') && !current_word.is_empty() {
                let word_end = centis_to_seconds(token_data.t0);
                push_word(&mut words, &current_word, word_start, word_end, &token_probs);

                current_word = token_text.trim_start().to_string();
                token_probs = vec![token_prob];
                word_start = word_end;
            } else {
                current_word.push_str(&token_text);
                token_probs.push(token_prob);
            }
        }

        if !current_word.is_empty() {
            push_word(&mut words, &current_word, word_start, segment_end, &token_probs);
        }
    }

    tracing::debug!(
        "whisper: {} words, language {detected}, {:.1}s audio",
        words.len(),
        samples.len() as f64 / WHISPER_SAMPLE_RATE as f64
    );

    Ok(Transcription {
        words,
        language: detected,
    })
}

fn push_word(words: &mut Vec<Word>, text: &str, start: f64, end: f64, probs: &[f64]) {
    let cleaned = special_tokens_regex().replace_all(text.trim(), "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return;
    }

    let probability = if probs.is_empty() {
        0.0
    } else {
        probs.iter().sum::<f64>() / probs.len() as f64
    };

    words.push(Word {
        text: cleaned.to_string(),
        start,
        end,
        probability,
    });
}

fn centis_to_seconds(timestamp: i64) -> f64 {
    timestamp as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_tokens_are_dropped() {
        let mut words = Vec::new();
        push_word(&mut words, "[_TT_150]", 0.0, 0.5, &[0.9]);
        assert!(words.is_empty());

        push_word(&mut words, "hello[_EOT_]", 0.0, 0.5, &[0.8, 1.0]);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "hello");
        assert!((words[0].probability - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_centisecond_conversion() {
        assert!((centis_to_seconds(150) - 1.5).abs() < 1e-9);
        assert_eq!(centis_to_seconds(0), 0.0);
    }
}
