//! Duration-targeted fragment synthesis
//!
//! Two nested loops per fragment. The inner loop fights hallucination:
//! synthesize, strip silence, re-transcribe, and accept only when the
//! text survives the round trip and no unexplained audio trails the last
//! word; thresholds relax slightly on every retry. The outer loop fits
//! the accepted clip to the fragment's original speaking time by
//! iteratively refining a time-stretch factor, always stretching the
//! accepted original so artifacts don't compound.

use crate::verify::{self, SynthesisCheck, VerifyThresholds};
use anyhow::Result;
use revoice_audio::silence::{strip_silence, strip_trailing_silence, SilenceOptions};
use revoice_audio::{fade, load_audio, wav_duration, write_wav};
use revoice_engines::{SpeechRecognizer, SpeechSynthesizer, TimeStretcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Tunables of both synthesis loops
#[derive(Debug, Clone, Copy)]
pub struct SynthesisOptions {
    /// Inner-loop attempts per fragment
    pub synthesis_attempts: usize,
    /// Initial maximum distance from last word to file end, seconds
    pub last_word_threshold: f64,
    /// Added to the last-word threshold after each failed attempt
    pub last_word_relaxation: f64,
    /// Initial minimum normalized Levenshtein similarity
    pub levenshtein_threshold: f64,
    /// Initial minimum Jaro-Winkler similarity
    pub jaro_winkler_threshold: f64,
    /// Subtracted from both similarity thresholds per failed attempt
    pub similarity_relaxation: f64,
    /// Outer-loop attempts to land on the target duration
    pub stretch_attempts: usize,
    /// Accepted |duration - target| in seconds
    pub desired_accuracy: f64,
    /// Stretch factor clamp
    pub min_speed: f64,
    pub max_speed: f64,
    /// Fade-in/out applied to the final clip, seconds
    pub fade_duration: f64,
    pub silence: SilenceOptions,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            synthesis_attempts: 5,
            last_word_threshold: 0.35,
            last_word_relaxation: 0.02,
            levenshtein_threshold: 0.90,
            jaro_winkler_threshold: 0.90,
            similarity_relaxation: 0.01,
            stretch_attempts: 5,
            desired_accuracy: 0.05,
            min_speed: 0.3,
            max_speed: 2.5,
            fade_duration: 0.05,
            silence: SilenceOptions::default(),
        }
    }
}

/// Outcome of rendering one fragment
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentRender {
    /// The output WAV exists and may be composed
    pub synthesized: bool,
    /// The stretch factor ended at the clamp; the duration target may be
    /// missed in that case
    pub speed_clamped: bool,
    /// Duration of the final clip, when one was produced
    pub final_duration: Option<f64>,
}

impl FragmentRender {
    fn skipped() -> Self {
        Self::default()
    }
}

/// Renders fragments to WAV clips that match their original timing
pub struct FragmentSynthesizer {
    voices: Vec<Arc<dyn SpeechSynthesizer>>,
    recognizer: Arc<dyn SpeechRecognizer>,
    stretcher: Arc<dyn TimeStretcher>,
    /// Language hint for verification transcripts
    language: Option<String>,
    options: SynthesisOptions,
}

impl FragmentSynthesizer {
    pub fn new(
        voices: Vec<Arc<dyn SpeechSynthesizer>>,
        recognizer: Arc<dyn SpeechRecognizer>,
        stretcher: Arc<dyn TimeStretcher>,
        language: Option<String>,
        options: SynthesisOptions,
    ) -> Self {
        Self {
            voices,
            recognizer,
            stretcher,
            language,
            options,
        }
    }

    /// Synthesize `text` into `out_path`, landing within the accuracy
    /// window of `target_duration` unless the speed clamp is hit
    pub async fn render_fragment(
        &self,
        text: &str,
        target_duration: f64,
        speaker_index: usize,
        out_path: &Path,
    ) -> Result<FragmentRender> {
        if target_duration <= 0.0 {
            anyhow::bail!("fragment has a non-positive duration");
        }

        // with a single configured voice every speaker maps onto it
        let speaker_index = if self.voices.len() == 1 {
            0
        } else {
            speaker_index
        };

        let Some(voice) = self.voices.get(speaker_index) else {
            tracing::warn!(
                "skipping fragment {text:?}: no voice for speaker {speaker_index} \
                 ({} configured)",
                self.voices.len()
            );
            return Ok(FragmentRender::skipped());
        };

        let Some(accepted) = self
            .hallucination_free(voice.as_ref(), text, out_path)
            .await?
        else {
            tracing::warn!("no usable synthesis for fragment {text:?}");
            return Ok(FragmentRender::skipped());
        };

        let (fitted, speed_clamped, final_duration) = self
            .fit_duration(&accepted, out_path, target_duration)
            .await?;

        let mut clip = load_audio(&fitted)?;
        fade::fade_in(&mut clip, self.options.fade_duration);
        fade::fade_out(&mut clip, self.options.fade_duration);
        write_wav(out_path, &clip)?;

        tracing::info!(
            "synthesized {:.2}s clip for {:.2}s target: {text:?}",
            final_duration,
            target_duration
        );

        Ok(FragmentRender {
            synthesized: out_path.exists(),
            speed_clamped,
            final_duration: Some(final_duration),
        })
    }

    /// Inner loop: synthesize until the round-trip transcript matches
    ///
    /// Returns the accepted (silence-stripped) clip, a best-effort pick
    /// when every attempt missed its thresholds, or `None` when nothing
    /// useful was produced.
    async fn hallucination_free(
        &self,
        voice: &dyn SpeechSynthesizer,
        text: &str,
        out_path: &Path,
    ) -> Result<Option<PathBuf>> {
        let opts = &self.options;
        let mut thresholds = VerifyThresholds {
            last_word: opts.last_word_threshold,
            levenshtein: opts.levenshtein_threshold,
            jaro_winkler: opts.jaro_winkler_threshold,
        };

        let mut attempts: Vec<(PathBuf, SynthesisCheck)> = Vec::new();

        for attempt in 0..opts.synthesis_attempts {
            let raw = sibling(out_path, &format!("synthesis_{attempt}"));
            if let Err(error) = voice.synthesize(text, &raw).await {
                tracing::warn!("synthesis attempt {attempt} failed: {error:#}");
                continue;
            }

            let trimmed = sibling(out_path, &format!("trimmed_{attempt}"));
            strip_silence(&raw, &trimmed, &opts.silence)?;

            let check = verify::verify_clip(
                self.recognizer.as_ref(),
                &trimmed,
                text,
                self.language.as_deref(),
            )
            .await?
            .unwrap_or(SynthesisCheck {
                last_word_distance: 0.0,
                levenshtein: 0.0,
                jaro_winkler: 0.0,
            });

            tracing::debug!(
                "attempt {attempt}: last word {:.2}, lev {:.2}, jaro {:.2}",
                check.last_word_distance,
                check.levenshtein,
                check.jaro_winkler
            );
            attempts.push((trimmed.clone(), check));

            if check.passes(&thresholds) {
                return Ok(Some(trimmed));
            }

            thresholds.last_word += opts.last_word_relaxation;
            thresholds.levenshtein -= opts.similarity_relaxation;
            thresholds.jaro_winkler -= opts.similarity_relaxation;
        }

        if attempts.is_empty() {
            return Ok(None);
        }

        // the attempt trailing the most audio after its last word is the
        // likeliest hallucination; never fall back to it
        attempts.sort_by(|a, b| {
            b.1.last_word_distance
                .partial_cmp(&a.1.last_word_distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        attempts.remove(0);

        let best = attempts.into_iter().max_by(|a, b| {
            a.1.average_similarity()
                .partial_cmp(&b.1.average_similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        match best {
            Some((path, check)) => {
                tracing::info!(
                    "no attempt met the thresholds; keeping best fallback \
                     (lev {:.2}, jaro {:.2}, last word {:.2})",
                    check.levenshtein,
                    check.jaro_winkler,
                    check.last_word_distance
                );
                Ok(Some(path))
            }
            None => Ok(None),
        }
    }

    /// Outer loop: refine the stretch factor until the clip duration
    /// lands inside the accuracy window
    async fn fit_duration(
        &self,
        accepted: &Path,
        out_path: &Path,
        target_duration: f64,
    ) -> Result<(PathBuf, bool, f64)> {
        let opts = &self.options;

        let mut processing = accepted.to_path_buf();
        let mut speed = 1.0;
        let mut clamped = false;
        let mut duration = wav_duration(&processing)?;

        for attempt in 1..=opts.stretch_attempts {
            if duration <= 0.0 {
                break;
            }

            speed *= duration / target_duration;
            clamped = speed <= opts.min_speed || speed >= opts.max_speed;
            speed = speed.clamp(opts.min_speed, opts.max_speed);

            tracing::debug!(
                "stretch attempt {attempt}: {duration:.2}s -> {target_duration:.2}s \
                 at {speed:.2}x"
            );

            let stretched = sibling(out_path, &format!("stretched_{attempt}"));
            self.stretcher.stretch(accepted, &stretched, speed).await?;

            // the stretcher tends to introduce silence at the tail
            let trimmed = sibling(out_path, &format!("trimmed_stretched_{attempt}"));
            strip_trailing_silence(&stretched, &trimmed, &opts.silence)?;

            processing = trimmed;
            duration = wav_duration(&processing)?;

            if (duration - target_duration).abs() <= opts.desired_accuracy {
                break;
            }
        }

        Ok((processing, clamped, duration))
    }
}

/// `sentence3.wav` with suffix `synthesis_0` becomes
/// `sentence3_synthesis_0.wav` next to it
fn sibling(out_path: &Path, suffix: &str) -> PathBuf {
    let stem = out_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("clip");
    out_path.with_file_name(format!("{stem}_{suffix}.wav"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use revoice_audio::AudioBuffer;
    use revoice_engines::Transcription;
    use revoice_types::Word;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    const RATE: u32 = 16_000;

    /// Writes a constant-amplitude clip of the next queued duration
    struct MockTts {
        durations: Mutex<VecDeque<f64>>,
        fallback: f64,
    }

    impl MockTts {
        fn with(durations: &[f64]) -> Self {
            Self {
                durations: Mutex::new(durations.iter().copied().collect()),
                fallback: 2.0,
            }
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for MockTts {
        fn name(&self) -> &str {
            "mock"
        }

        async fn synthesize(&self, _text: &str, out_wav: &Path) -> anyhow::Result<()> {
            let duration = self
                .durations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.fallback);
            let samples = vec![0.5f32; (duration * RATE as f64).round() as usize];
            write_wav(out_wav, &AudioBuffer::new(samples, RATE))?;
            Ok(())
        }
    }

    /// Returns the next queued (text, trailing_gap) as a transcript of
    /// whatever clip it is handed
    struct MockRecognizer {
        plan: Mutex<VecDeque<(String, f64)>>,
        fallback_text: String,
    }

    impl MockRecognizer {
        fn with(plan: &[(&str, f64)]) -> Self {
            Self {
                plan: Mutex::new(
                    plan.iter()
                        .map(|(text, gap)| (text.to_string(), *gap))
                        .collect(),
                ),
                fallback_text: "fallback transcript".to_string(),
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for MockRecognizer {
        async fn transcribe(
            &self,
            audio: &Path,
            _language: Option<&str>,
        ) -> anyhow::Result<Transcription> {
            let duration = wav_duration(audio)?;
            let (text, gap) = self
                .plan
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((self.fallback_text.clone(), 0.0));

            let speech_end = (duration - gap).max(0.0);
            let tokens: Vec<&str> = text.split_whitespace().collect();
            let step = speech_end / tokens.len().max(1) as f64;
            let words = tokens
                .iter()
                .enumerate()
                .map(|(i, token)| Word::new(*token, i as f64 * step, (i + 1) as f64 * step))
                .collect();

            Ok(Transcription {
                words,
                language: "en".to_string(),
            })
        }

        fn unload(&self) {}
    }

    /// Nearest-neighbor "stretcher": length divides by the factor
    struct MockStretcher;

    #[async_trait]
    impl TimeStretcher for MockStretcher {
        async fn stretch(&self, input: &Path, output: &Path, factor: f64) -> anyhow::Result<()> {
            let audio = load_audio(input)?;
            let new_len = (audio.samples.len() as f64 / factor).round() as usize;
            let samples = (0..new_len)
                .map(|i| {
                    let src = ((i as f64) * factor) as usize;
                    audio.samples.get(src).copied().unwrap_or(0.5)
                })
                .collect();
            write_wav(output, &AudioBuffer::new(samples, audio.sample_rate))?;
            Ok(())
        }
    }

    const TEXT: &str = "hello world out there";

    fn synthesizer(
        tts: MockTts,
        recognizer: MockRecognizer,
        options: SynthesisOptions,
    ) -> FragmentSynthesizer {
        FragmentSynthesizer::new(
            vec![Arc::new(tts)],
            Arc::new(recognizer),
            Arc::new(MockStretcher),
            Some("en".to_string()),
            options,
        )
    }

    #[tokio::test]
    async fn test_happy_path_hits_duration_target() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        let synth = synthesizer(
            MockTts::with(&[2.0]),
            MockRecognizer::with(&[(TEXT, 0.1)]),
            SynthesisOptions::default(),
        );

        let render = synth.render_fragment(TEXT, 1.0, 0, &out).await.unwrap();

        assert!(render.synthesized);
        assert!(!render.speed_clamped);
        assert!(out.exists());
        let duration = wav_duration(&out).unwrap();
        assert!((duration - 1.0).abs() <= 0.05, "got {duration}");
    }

    #[tokio::test]
    async fn test_trailing_audio_forces_retry() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        // first attempt trails 0.5s of audio after the last word
        let recognizer = Arc::new(MockRecognizer::with(&[(TEXT, 0.5), (TEXT, 0.1)]));
        let synth = FragmentSynthesizer::new(
            vec![Arc::new(MockTts::with(&[2.0, 2.0]))],
            recognizer.clone(),
            Arc::new(MockStretcher),
            Some("en".to_string()),
            SynthesisOptions::default(),
        );

        let render = synth.render_fragment(TEXT, 2.0, 0, &out).await.unwrap();

        assert!(render.synthesized);
        assert!(out.exists());
        // both planned transcripts were consumed by the retry
        assert!(recognizer.plan.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_thresholds_relax_across_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        // 0.36s trailing gap fails the initial 0.35s threshold but passes
        // the relaxed 0.37s one on the second attempt
        let synth = synthesizer(
            MockTts::with(&[2.0, 2.0]),
            MockRecognizer::with(&[(TEXT, 0.36), (TEXT, 0.36)]),
            SynthesisOptions::default(),
        );

        let render = synth.render_fragment(TEXT, 2.0, 0, &out).await.unwrap();
        assert!(render.synthesized);
    }

    #[tokio::test]
    async fn test_fallback_drops_worst_last_word_then_picks_best_text() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        // attempt 0: perfect text but 2s of trailing audio (hallucination)
        // attempt 2: closest text of the remaining ones
        let recognizer = MockRecognizer::with(&[
            (TEXT, 2.0),
            ("zzz qqq", 0.2),
            ("hello world out", 0.2),
            ("zzz qqq", 0.2),
            ("zzz qqq", 0.2),
        ]);
        let synth = synthesizer(
            MockTts::with(&[3.0, 3.0, 3.0, 3.0, 3.0]),
            recognizer,
            SynthesisOptions::default(),
        );

        let voice = synth.voices[0].clone();
        let accepted = synth
            .hallucination_free(voice.as_ref(), TEXT, &out)
            .await
            .unwrap()
            .expect("a fallback attempt should be kept");

        assert!(accepted.to_string_lossy().ends_with("trimmed_2.wav"));
    }

    #[tokio::test]
    async fn test_speed_clamp_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        // 10s of speech cannot fit into 1s even at the 2.5x clamp
        let synth = synthesizer(
            MockTts::with(&[10.0]),
            MockRecognizer::with(&[(TEXT, 0.1)]),
            SynthesisOptions::default(),
        );

        let render = synth.render_fragment(TEXT, 1.0, 0, &out).await.unwrap();

        assert!(render.synthesized);
        assert!(render.speed_clamped);
        let duration = render.final_duration.unwrap();
        assert!((duration - 4.0).abs() < 0.1, "got {duration}");
    }

    #[tokio::test]
    async fn test_out_of_range_speaker_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        let synth = FragmentSynthesizer::new(
            vec![
                Arc::new(MockTts::with(&[])),
                Arc::new(MockTts::with(&[])),
            ],
            Arc::new(MockRecognizer::with(&[])),
            Arc::new(MockStretcher),
            Some("en".to_string()),
            SynthesisOptions::default(),
        );

        let render = synth.render_fragment(TEXT, 1.0, 3, &out).await.unwrap();

        assert!(!render.synthesized);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_single_voice_serves_every_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sentence0.wav");

        let synth = synthesizer(
            MockTts::with(&[2.0]),
            MockRecognizer::with(&[(TEXT, 0.1)]),
            SynthesisOptions::default(),
        );

        // speaker 4 does not exist, but one voice covers everybody
        let render = synth.render_fragment(TEXT, 2.0, 4, &out).await.unwrap();
        assert!(render.synthesized);
    }
}
