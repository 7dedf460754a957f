//! The analysis phase
//!
//! Runs every step whose outcome is a content decision: acquisition,
//! separation, transcription, filtering, fragmentation, speaker
//! assignment, style rewrite and translation. Its product is the render
//! script; nothing after this phase changes what will be spoken or when.

use crate::config::{GpuMode, PipelineConfig};
use crate::error::PipelineError;
use crate::fragment;
use crate::rewrite;
use crate::script;
use crate::speakers;
use crate::timestr::parse_time;
use anyhow::Context;
use revoice_engines::{
    media, Diarizer, SourceSeparator, SpeakerCountHints, SpeechRecognizer, StyleRewriter,
    Translator,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use revoice_types::{RenderMetadata, RenderScript, TimeRange, Word};

/// The collaborators the analysis phase talks to
pub struct AnalysisCollaborators {
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub diarizer: Arc<dyn Diarizer>,
    pub separator: Arc<dyn SourceSeparator>,
    pub translator: Option<Arc<dyn Translator>>,
    pub rewriter: Option<Arc<dyn StyleRewriter>>,
}

/// Cached transcription, so re-runs skip the recognizer entirely
#[derive(Serialize, Deserialize)]
struct WordsCache {
    language: String,
    words: Vec<Word>,
}

/// Run the analysis phase and write the render script
///
/// Returns `None` when the run stops early by request (`--analysis`).
pub async fn prepare(
    config: &PipelineConfig,
    collab: &AnalysisCollaborators,
) -> Result<Option<RenderScript>, PipelineError> {
    tokio::fs::create_dir_all(&config.download_directory)
        .await
        .context("Failed to create download directory")?;
    tokio::fs::create_dir_all(&config.synthesis_directory)
        .await
        .context("Failed to create synthesis directory")?;

    // fetch or extract audio + muted video
    let acquired = media::acquire(
        &config.input_video,
        &config.download_directory,
        config.extract,
    )
    .await
    .map_err(|error| PipelineError::MediaUnreachable {
        source_path: config.input_video.clone(),
        reason: format!("{error:#}"),
    })?;

    let duration = media::probe_duration(&acquired.audio).await?;
    tracing::info!(
        "acquired {:.1}s of audio from {}",
        duration,
        config.input_video
    );

    let working_dir = working_directory(config, &acquired.audio)?;
    tokio::fs::create_dir_all(&working_dir)
        .await
        .context("Failed to create working directory")?;

    // processing windows from timefiles or --from/--to
    let (windows, processing_window) = processing_windows(config, &working_dir, duration)?;

    // vocal separation; skipped entirely in clean-audio mode
    let stems = if config.clean_audio {
        None
    } else {
        Some(
            collab
                .separator
                .split(&acquired.audio, &config.download_directory)
                .await?,
        )
    };
    let transcription_audio = stems
        .as_ref()
        .map(|s| s.vocals.clone())
        .unwrap_or_else(|| acquired.audio.clone());

    // transcribe (or load the cached words)
    let (mut words, source_language) = transcribed_words(
        config,
        collab.recognizer.as_ref(),
        &transcription_audio,
        &working_dir,
    )
    .await?;
    tracing::info!(
        "{} words transcribed, input language {source_language}",
        words.len()
    );
    if config.debug {
        for word in &words {
            tracing::debug!("{:.1}s - {:.1}s: {}", word.start, word.end, word.text);
        }
    }

    words = speakers::filter_by_time(
        words,
        &windows,
        config.time_filter_policy,
        config.time_filter_correction,
    );

    // diarize and restrict to the processing window
    let hints = SpeakerCountHints {
        num_speakers: config.num_speakers,
        min_speakers: config.min_speakers,
        max_speakers: config.max_speakers,
    };
    let diarized = collab
        .diarizer
        .diarize(&transcription_audio, &hints)
        .await?;
    let diarized = speakers::filter_speaker_window(diarized, &processing_window);
    log_speakers(&diarized);
    speakers::write_speaker_timefiles(&diarized, &working_dir)?;

    if config.analysis {
        tracing::info!("analysis requested, stopping before synthesis");
        return Ok(None);
    }

    // optional restriction to a single speaker (1-based)
    if let Some(number) = config.speaker {
        match diarized.get(number.wrapping_sub(1)) {
            Some(speaker) => {
                tracing::info!("filtering words to speaker {number}");
                words = speakers::filter_by_speaker(words, speaker);
            }
            None => {
                tracing::warn!(
                    "speaker {number} does not exist ({} detected), keeping no words",
                    diarized.len()
                );
                words.clear();
            }
        }
    }

    if words.is_empty() {
        return Err(PipelineError::NoWords);
    }

    // two tokenization passes plus containment attachment
    let mut fragments = fragment::fragment_words(&words, config.gap_duration)?;
    let mut sentences = fragment::full_sentences(&words, config.gap_duration)?;
    fragment::attach_fragments(&mut fragments, &mut sentences)?;

    for sentence in &sentences {
        tracing::debug!(
            "sentence {:?} ({:.1}s - {:.1}s) holds {} fragments",
            sentence.text,
            sentence.start,
            sentence.end,
            sentence.fragment_indices.len()
        );
    }

    // style rewrite while the sentence structure is still intact
    if let (Some(prompt), Some(rewriter)) = (&config.prompt, &collab.rewriter) {
        rewrite::rewrite_sentences(rewriter.as_ref(), &mut fragments, &sentences, prompt).await;
    }

    let mut fragments = fragment::merge_short_sentences(
        fragments,
        config.merge_gap,
        config.min_sentence_duration,
    );
    tracing::info!("{} fragments after merging", fragments.len());

    speakers::assign_speakers(&mut fragments, &diarized);

    if config.gpu_mode == GpuMode::Exclusive {
        collab.recognizer.unload();
    }

    // translate fragment by fragment; a single failure keeps the original
    if let Some(translator) = &collab.translator {
        let target = &config.target_language;
        if !target.is_empty() && *target != source_language {
            tracing::info!("translating from {source_language} to {target}");
            for fragment in fragments.iter_mut() {
                match translator
                    .translate(&fragment.text, &source_language, target)
                    .await
                {
                    Ok(translated) => fragment.text = translated,
                    Err(error) => tracing::warn!(
                        "translation of {:?} failed, keeping original: {error:#}",
                        fragment.text
                    ),
                }
            }
        }
    }

    let synthesis_language = if config.target_language.is_empty() {
        source_language.clone()
    } else {
        config.target_language.clone()
    };
    tracing::info!("language selected for synthesis: {synthesis_language}");

    let script = RenderScript {
        metadata: RenderMetadata {
            input_video: config.input_video.clone(),
            audio_file: acquired.audio.clone(),
            accompaniment_path: stems.map(|s| s.accompaniment),
            video_file_muted: acquired.video_muted.clone(),
            duration,
            source_language,
            target_language: config.target_language.clone(),
            synthesis_language,
            voices: config.voices.clone(),
            engines: config.engines.clone(),
            clean_audio: config.clean_audio,
            synthesis_directory: config.synthesis_directory.clone(),
            output_video: config.output_video.clone(),
            extra: Default::default(),
        },
        sentences: fragments,
        extra: Default::default(),
    };

    script::write_script(&working_dir.join("render_script.json"), &script)?;

    Ok(Some(script))
}

/// Per-media working directory under the download directory
fn working_directory(config: &PipelineConfig, audio: &Path) -> Result<PathBuf, PipelineError> {
    let stem = audio
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Audio file has no usable name")?;
    Ok(config.download_directory.join(stem))
}

/// Resolve processing windows and the global window used for speaker
/// filtering
///
/// A lone `--from` runs to the end of the media; a lone `--to` starts at
/// zero. Timefiles may carry many windows; the global window then spans
/// the whole media.
fn processing_windows(
    config: &PipelineConfig,
    working_dir: &Path,
    duration: f64,
) -> Result<(Vec<TimeRange>, TimeRange), PipelineError> {
    if !config.time_files.is_empty() {
        let mut windows = Vec::new();
        for file in &config.time_files {
            let path = if file.exists() {
                file.clone()
            } else {
                working_dir.join(file)
            };
            tracing::info!("importing timefile {}", path.display());
            windows.extend(speakers::read_timefile(&path)?);
        }
        return Ok((windows, TimeRange::new(0.0, duration)));
    }

    let start = config
        .from_time
        .as_deref()
        .map(parse_time)
        .transpose()?
        .unwrap_or(0.0);
    let end = config
        .to_time
        .as_deref()
        .map(parse_time)
        .transpose()?
        .unwrap_or(duration);
    let window = TimeRange::new(start, end);

    if config.from_time.is_none() && config.to_time.is_none() {
        Ok((Vec::new(), window))
    } else {
        tracing::info!("processing limited to {:.1}s - {:.1}s", start, end);
        Ok((vec![window], window))
    }
}

async fn transcribed_words(
    config: &PipelineConfig,
    recognizer: &dyn SpeechRecognizer,
    audio: &Path,
    working_dir: &Path,
) -> Result<(Vec<Word>, String), PipelineError> {
    let cache_path = working_dir.join("words.json");

    if cache_path.exists() {
        tracing::info!("loading cached words from {}", cache_path.display());
        let contents =
            std::fs::read_to_string(&cache_path).context("Failed to read words cache")?;
        let cache: WordsCache =
            serde_json::from_str(&contents).context("Words cache is not valid")?;
        return Ok((cache.words, cache.language));
    }

    let language = if config.source_language.is_empty() {
        None
    } else {
        Some(config.source_language.as_str())
    };
    let transcription = recognizer.transcribe(audio, language).await?;

    let cache = WordsCache {
        language: transcription.language.clone(),
        words: transcription.words.clone(),
    };
    std::fs::write(
        &cache_path,
        serde_json::to_string_pretty(&cache).context("Failed to serialize words cache")?,
    )
    .context("Failed to write words cache")?;
    tracing::info!("words saved to {}", cache_path.display());

    Ok((transcription.words, transcription.language))
}

fn log_speakers(speakers: &[revoice_types::Speaker]) {
    tracing::info!("{} speakers detected, sorted by speaking time:", speakers.len());
    for (number, speaker) in speakers.iter().enumerate() {
        tracing::info!(
            "speaker {} total: {:.1}s over {} segments",
            number + 1,
            speaker.total_time,
            speaker.segments.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speakers::TimeFilterPolicy;

    fn config_with(from: Option<&str>, to: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            from_time: from.map(str::to_owned),
            to_time: to.map(str::to_owned),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_lone_from_runs_to_end_of_media() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(Some("1m0s"), None);

        let (windows, global) = processing_windows(&config, dir.path(), 300.0).unwrap();

        assert_eq!(windows, vec![TimeRange::new(60.0, 300.0)]);
        assert_eq!(global, TimeRange::new(60.0, 300.0));
    }

    #[test]
    fn test_lone_to_starts_at_zero() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(None, Some("2:00"));

        let (windows, _) = processing_windows(&config, dir.path(), 300.0).unwrap();
        assert_eq!(windows, vec![TimeRange::new(0.0, 120.0)]);
    }

    #[test]
    fn test_no_bounds_means_no_windows() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(None, None);

        let (windows, global) = processing_windows(&config, dir.path(), 300.0).unwrap();
        assert!(windows.is_empty());
        assert_eq!(global, TimeRange::new(0.0, 300.0));
    }

    #[test]
    fn test_bad_time_string_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_with(Some("banana"), None);

        assert!(matches!(
            processing_windows(&config, dir.path(), 300.0),
            Err(PipelineError::TimeParse { .. })
        ));
    }

    #[test]
    fn test_timefiles_override_from_to() {
        let dir = tempfile::tempdir().unwrap();
        let timefile = dir.path().join("speaker1.txt");
        std::fs::write(&timefile, "Speaker 1 total: 8.0s\n\n[2.0-6.0]\n[10.0-14.0]\n").unwrap();

        let config = PipelineConfig {
            time_files: vec![timefile],
            from_time: Some("0:30".to_string()),
            ..PipelineConfig::default()
        };

        let (windows, global) = processing_windows(&config, dir.path(), 300.0).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], TimeRange::new(10.0, 14.0));
        assert_eq!(global, TimeRange::new(0.0, 300.0));
    }

    #[test]
    fn test_default_policy_is_forgiving() {
        assert_eq!(
            PipelineConfig::default().time_filter_policy,
            TimeFilterPolicy::Forgiving
        );
    }
}
