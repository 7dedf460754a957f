//! Typed pipeline configuration
//!
//! One well-typed struct replaces the original's parameter bag. Defaults
//! here are the canonical ones; the CLI only overrides what the user
//! passed.

use crate::speakers::TimeFilterPolicy;
use crate::synth::SynthesisOptions;
use revoice_audio::MixOptions;
use revoice_types::EngineKind;
use std::path::PathBuf;
use std::str::FromStr;

/// GPU residency of the analysis models versus the TTS engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuMode {
    /// Release the recognizer before TTS construction; verification
    /// reloads it on demand
    #[default]
    Exclusive,
    /// Keep everything resident; needs enough memory for both
    Coexist,
}

impl FromStr for GpuMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exclusive" => Ok(GpuMode::Exclusive),
            "coexist" => Ok(GpuMode::Coexist),
            other => Err(format!(
                "unknown gpu mode {other:?} (expected exclusive or coexist)"
            )),
        }
    }
}

/// Everything a pipeline run needs to know
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Local path, URL, or bare 11-character video id
    pub input_video: String,
    /// Translation target, empty for none
    pub target_language: String,
    /// Forced transcription language, empty for auto-detection
    pub source_language: String,
    pub download_directory: PathBuf,
    pub synthesis_directory: PathBuf,
    /// Download one file and split locally instead of fetching audio and
    /// muted video separately
    pub extract: bool,
    /// Voice references, one per speaker index
    pub voices: Vec<String>,
    /// Engines paired positionally with the voices
    pub engines: Vec<EngineKind>,
    pub output_video: PathBuf,
    /// Discard original audio and accompaniment, keep synthesis only
    pub clean_audio: bool,
    /// Processing window bounds as raw time strings
    pub from_time: Option<String>,
    pub to_time: Option<String>,
    /// Print the speaker analysis and stop
    pub analysis: bool,
    /// Restrict to one diarized speaker (1-based)
    pub speaker: Option<usize>,
    pub num_speakers: usize,
    pub min_speakers: usize,
    pub max_speakers: usize,
    /// Timefiles defining processing windows
    pub time_files: Vec<PathBuf>,
    /// Style/tone rewrite instruction
    pub prompt: Option<String>,
    /// Stop after writing the render script
    pub prepare: bool,
    /// Render an existing script instead of analyzing
    pub render_script: Option<PathBuf>,
    pub debug: bool,
    /// Path to the whisper model file
    pub model: PathBuf,
    pub gpu_mode: GpuMode,
    /// Bounded synthesis worker pool size
    pub workers: usize,
    pub time_filter_policy: TimeFilterPolicy,
    /// Word-timestamp correction for time filtering, seconds
    pub time_filter_correction: f64,
    /// Re-encode the video instead of stream-copying it
    pub hd: bool,
    /// Sample rate of the composed speech track
    pub output_sample_rate: u32,
    pub synthesis: SynthesisOptions,
    pub mix: MixOptions,
    /// Command for the external diarization helper
    pub diarizer_command: PathBuf,
    /// Gap that forces a fragment boundary, seconds
    pub gap_duration: f64,
    /// Short-sentence merge parameters
    pub merge_gap: f64,
    pub min_sentence_duration: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_video: String::new(),
            target_language: String::new(),
            source_language: String::new(),
            download_directory: PathBuf::from("downloads"),
            synthesis_directory: PathBuf::from("synthesis"),
            extract: false,
            voices: Vec::new(),
            engines: Vec::new(),
            output_video: PathBuf::from("final_cut.mp4"),
            clean_audio: false,
            from_time: None,
            to_time: None,
            analysis: false,
            speaker: None,
            num_speakers: 0,
            min_speakers: 0,
            max_speakers: 0,
            time_files: Vec::new(),
            prompt: None,
            prepare: false,
            render_script: None,
            debug: false,
            model: PathBuf::from("models/ggml-large-v3.bin"),
            gpu_mode: GpuMode::default(),
            workers: 2,
            time_filter_policy: TimeFilterPolicy::default(),
            time_filter_correction: 0.2,
            hd: false,
            output_sample_rate: 44_100,
            synthesis: SynthesisOptions::default(),
            mix: MixOptions::default(),
            diarizer_command: PathBuf::from("revoice-diarize"),
            gap_duration: crate::fragment::DEFAULT_GAP_DURATION,
            merge_gap: crate::fragment::DEFAULT_MERGE_GAP,
            min_sentence_duration: crate::fragment::DEFAULT_MIN_SENTENCE_DURATION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.time_filter_correction, 0.2);
        assert_eq!(config.mix.timestamp_correction, 0.1);
        assert_eq!(config.mix.crossfade, 0.70);
        assert_eq!(config.synthesis.desired_accuracy, 0.05);
        assert_eq!(config.gap_duration, 1.0);
        assert_eq!(config.time_filter_policy, TimeFilterPolicy::Forgiving);
        assert_eq!(config.gpu_mode, GpuMode::Exclusive);
    }

    #[test]
    fn test_gpu_mode_parsing() {
        assert_eq!("exclusive".parse::<GpuMode>().unwrap(), GpuMode::Exclusive);
        assert_eq!("COEXIST".parse::<GpuMode>().unwrap(), GpuMode::Coexist);
        assert!("shared".parse::<GpuMode>().is_err());
    }
}
