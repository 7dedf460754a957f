//! revoice: replace the voices in a video with synthetic ones
//!
//! ```text
//! revoice video.mp4 de --voice male.wav --prompt "speak like a pirate"
//! revoice dQw4w9WgXcQ --analysis
//! revoice video.mp4 --prepare
//! revoice --render downloads/video_audio/render_script.json
//! ```

use clap::Parser;
use revoice_pipeline::config::GpuMode;
use revoice_pipeline::speakers::TimeFilterPolicy;
use revoice_pipeline::PipelineConfig;
use revoice_types::EngineKind;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "revoice",
    about = "Replaces and translates voices in videos",
    version
)]
struct Args {
    /// Local video path, full URL, or 11-character video id
    #[arg(value_name = "INPUT_VIDEO", required_unless_present_any = ["render", "input"])]
    input_video: Option<String>,

    /// Target language for translation (empty = keep the source language)
    #[arg(value_name = "TARGET_LANGUAGE", default_value = "")]
    target_language: String,

    /// Input video (alternative to the positional argument)
    #[arg(long = "in", value_name = "PATH_OR_URL")]
    input: Option<String>,

    /// Target language for translation
    #[arg(long)]
    language: Option<String>,

    /// Source language, set only when auto-detection gets it wrong
    #[arg(long = "input_language", default_value = "")]
    input_language: String,

    /// Voice reference(s), one per speaker
    #[arg(long = "voice", num_args = 1.., value_name = "VOICE")]
    voices: Vec<String>,

    /// TTS engine(s), paired positionally with the voices
    #[arg(long = "engine", num_args = 1.., value_name = "ENGINE")]
    engines: Vec<EngineKind>,

    /// Filename for the output video
    #[arg(long = "output_video", default_value = "final_cut.mp4")]
    output_video: PathBuf,

    /// Discard the original audio entirely, keep only synthesized speech
    #[arg(long = "clean_audio")]
    clean_audio: bool,

    /// Time to start processing from (e.g. 1m30s, 0:90, 90)
    #[arg(long = "from", value_name = "TIME")]
    from_time: Option<String>,

    /// Time to stop processing at
    #[arg(long = "to", value_name = "TIME")]
    to_time: Option<String>,

    /// Print the speaker analysis and stop
    #[arg(long)]
    analysis: bool,

    /// Only replace the given speaker (1-based, as printed by --analysis)
    #[arg(long, value_name = "N")]
    speaker: Option<usize>,

    /// Exact number of speakers, if known in advance
    #[arg(long = "num_speakers", default_value_t = 0)]
    num_speakers: usize,

    /// Minimum number of speakers, if known in advance
    #[arg(long = "min_speakers", default_value_t = 0)]
    min_speakers: usize,

    /// Maximum number of speakers, if known in advance
    #[arg(long = "max_speakers", default_value_t = 0)]
    max_speakers: usize,

    /// Directory for downloaded and extracted media
    #[arg(long = "download_directory", default_value = "downloads")]
    download_directory: PathBuf,

    /// Directory for synthesized audio
    #[arg(long = "synthesis_directory", default_value = "synthesis")]
    synthesis_directory: PathBuf,

    /// Download one file and extract locally (smaller transfer, may
    /// reduce quality)
    #[arg(long)]
    extract: bool,

    /// Timefile(s) restricting processing to listed intervals
    #[arg(long = "timefile", num_args = 1.., value_name = "PATH")]
    time_files: Vec<PathBuf>,

    /// Style/tone instruction, e.g. "speak like a pirate"
    #[arg(long, value_name = "STYLE")]
    prompt: Option<String>,

    /// Stop after writing the render script
    #[arg(long)]
    prepare: bool,

    /// Render a prepared script instead of analyzing
    #[arg(long, value_name = "SCRIPT_JSON")]
    render: Option<PathBuf>,

    /// Verbose debugging output
    #[arg(long)]
    debug: bool,

    /// Whisper model file for transcription
    #[arg(long, default_value = "models/ggml-large-v3.bin")]
    model: PathBuf,

    /// GPU residency: exclusive releases the recognizer before TTS loads
    #[arg(long = "gpu_mode", default_value = "exclusive")]
    gpu_mode: GpuMode,

    /// Synthesis worker pool size
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Word/window matching policy: precise, balanced or forgiving
    #[arg(long = "time_policy", default_value = "forgiving")]
    time_policy: TimeFilterPolicy,

    /// Re-encode the video track (libx264 crf 18) instead of stream copy
    #[arg(long)]
    hd: bool,

    /// Command used for the external diarization helper
    #[arg(long = "diarizer_command", default_value = "revoice-diarize")]
    diarizer_command: PathBuf,
}

impl Args {
    fn into_config(self) -> PipelineConfig {
        let defaults = PipelineConfig::default();
        PipelineConfig {
            input_video: self
                .input
                .or(self.input_video)
                .unwrap_or_default(),
            target_language: self.language.unwrap_or(self.target_language),
            source_language: self.input_language,
            download_directory: self.download_directory,
            synthesis_directory: self.synthesis_directory,
            extract: self.extract,
            voices: self.voices,
            engines: self.engines,
            output_video: self.output_video,
            clean_audio: self.clean_audio,
            from_time: self.from_time,
            to_time: self.to_time,
            analysis: self.analysis,
            speaker: self.speaker,
            num_speakers: self.num_speakers,
            min_speakers: self.min_speakers,
            max_speakers: self.max_speakers,
            time_files: self.time_files,
            prompt: self.prompt,
            prepare: self.prepare,
            render_script: self.render,
            debug: self.debug,
            model: self.model,
            gpu_mode: self.gpu_mode,
            workers: self.workers,
            time_filter_policy: self.time_policy,
            hd: self.hd,
            diarizer_command: self.diarizer_command,
            ..defaults
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.into_config();
    tracing::debug!("configuration: {config:#?}");

    if let Err(error) = revoice_pipeline::run(config).await {
        tracing::error!("{error}");
        std::process::exit(error.exit_code());
    }
}
