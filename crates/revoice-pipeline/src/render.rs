//! The render phase
//!
//! Everything after the checkpoint: synthesize each fragment against its
//! original duration, compose the sequential speech track, rebuild the
//! background, and mux with the muted video. Runs identically whether it
//! follows a fresh analysis or a `--render script.json` resume.

use crate::error::PipelineError;
use crate::synth::{FragmentRender, FragmentSynthesizer};
use anyhow::Context;
use futures::stream::{self, StreamExt};
use revoice_audio::compose::PlacedClip;
use revoice_audio::{compose, mix, wav, MixOptions};
use revoice_engines::media;
use revoice_types::RenderScript;
use std::path::PathBuf;

/// Render-phase tunables, frozen from the configuration
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Bounded synthesis worker pool size
    pub workers: usize,
    /// Sample rate of the composed speech track
    pub output_sample_rate: u32,
    pub mix: MixOptions,
    /// Re-encode the video instead of stream-copying it
    pub hd: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            output_sample_rate: 44_100,
            mix: MixOptions::default(),
            hd: false,
        }
    }
}

/// Run the render phase over a prepared script
pub async fn render(
    script: &mut RenderScript,
    synthesizer: &FragmentSynthesizer,
    options: &RenderOptions,
) -> Result<(), PipelineError> {
    let synthesis_dir = script.metadata.synthesis_directory.clone();
    tokio::fs::create_dir_all(&synthesis_dir)
        .await
        .context("Failed to create synthesis directory")?;

    let total = script.sentences.len();
    tracing::info!("synthesizing {total} fragments with {} workers", options.workers);

    // fan out to the bounded pool; results are committed by fragment
    // index, so pool scheduling never changes the output
    let jobs: Vec<(usize, String, f64, usize, PathBuf)> = script
        .sentences
        .iter()
        .enumerate()
        .map(|(index, fragment)| {
            (
                index,
                fragment.text.clone(),
                fragment.duration(),
                fragment.speaker_index,
                synthesis_dir.join(format!("sentence{index}.wav")),
            )
        })
        .collect();

    let results: Vec<(usize, PathBuf, FragmentRender)> = stream::iter(jobs)
        .map(|(index, text, duration, speaker_index, out_path)| async move {
            tracing::info!("[{}/{total}] {:.2}s target: {text:?}", index + 1, duration);
            let render = match synthesizer
                .render_fragment(&text, duration, speaker_index, &out_path)
                .await
            {
                Ok(render) => render,
                Err(error) => {
                    tracing::warn!("fragment {index} failed: {error:#}");
                    FragmentRender::default()
                }
            };
            (index, out_path, render)
        })
        .buffer_unordered(options.workers.max(1))
        .collect()
        .await;

    let mut clips: Vec<(usize, PlacedClip)> = Vec::new();
    for (index, out_path, render) in results {
        script.sentences[index].synthesis_ok = render.synthesized;
        if render.synthesized {
            clips.push((
                index,
                PlacedClip {
                    start: script.sentences[index].start,
                    path: out_path,
                },
            ));
        }
    }
    clips.sort_by_key(|(index, _)| *index);
    let clips: Vec<PlacedClip> = clips.into_iter().map(|(_, clip)| clip).collect();

    if clips.is_empty() {
        return Err(PipelineError::NothingSynthesized);
    }
    tracing::info!("{}/{total} fragments synthesized", clips.len());

    // the sequential speech track, padded to the source duration
    let speech_track = compose::compose_track(
        &clips,
        script.metadata.duration,
        options.output_sample_rate,
    )?;
    let speech_path = synthesis_dir.join("final_cut_audio.wav");
    wav::write_wav(&speech_path, &speech_track)?;

    if script.metadata.clean_audio {
        media::mux(
            &script.metadata.video_file_muted,
            &speech_path,
            None,
            &script.metadata.output_video,
            options.hd,
        )
        .await?;
    } else {
        let background_path = build_background(script, options, &synthesis_dir)?;
        media::mux(
            &script.metadata.video_file_muted,
            &speech_path,
            Some(&background_path),
            &script.metadata.output_video,
            options.hd,
        )
        .await?;
    }

    tracing::info!(
        "video processing complete: {}",
        script.metadata.output_video.display()
    );
    Ok(())
}

/// Splice original audio and accompaniment around the replaced spans
fn build_background(
    script: &RenderScript,
    options: &RenderOptions,
    synthesis_dir: &std::path::Path,
) -> Result<PathBuf, PipelineError> {
    let accompaniment_path = script
        .metadata
        .accompaniment_path
        .as_ref()
        .context("render script has no accompaniment stem")?;

    let original = revoice_audio::load_audio(&script.metadata.audio_file)?;
    let accompaniment = revoice_audio::load_audio(accompaniment_path)?;

    let spans: Vec<(f64, f64)> = script
        .sentences
        .iter()
        .filter(|fragment| fragment.synthesis_ok)
        .map(|fragment| (fragment.start, fragment.end))
        .collect();
    let merged = mix::merge_replacement_spans(&spans, script.metadata.duration, &options.mix);
    tracing::info!(
        "replacing background in {} merged spans (from {} fragments)",
        merged.len(),
        spans.len()
    );

    let background = mix::mix_background(&original, &accompaniment, &merged, &options.mix)?;
    let background_path = synthesis_dir.join("final_cut_audio_merged.wav");
    wav::write_wav(&background_path, &background)?;
    Ok(background_path)
}
