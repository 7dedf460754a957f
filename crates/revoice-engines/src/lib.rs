//! External-collaborator adapters for revoice
//!
//! Every long-running dependency of the pipeline lives behind a small
//! async trait defined in [`traits`]:
//! - **ASR** with word timestamps via whisper.cpp ([`whisper`])
//! - **Diarization** via an external helper process ([`diarize`])
//! - **Source separation** via the spleeter CLI ([`separate`])
//! - **TTS engines** (coqui, openai, elevenlabs, system) ([`tts`])
//! - **Time stretching** via the Rubber Band CLI ([`stretch`])
//! - **Media acquisition and muxing** via ffmpeg / ffprobe / yt-dlp
//!   ([`media`])
//! - **Chat LLM** for style rewriting and translation ([`llm`])

pub mod diarize;
pub mod llm;
pub mod media;
pub mod separate;
pub mod stretch;
pub mod tools;
pub mod traits;
pub mod tts;
pub mod whisper;

pub use diarize::SubprocessDiarizer;
pub use llm::{ChatClient, ChatConfig, ChatRewriter, ChatTranslator};
pub use separate::SpleeterSeparator;
pub use stretch::RubberbandStretcher;
pub use tools::{missing_tools, ToolRequirement};
pub use traits::{
    Diarizer, SeparatedStems, SourceSeparator, SpeakerCountHints, SpeechRecognizer,
    SpeechSynthesizer, StyleRewriter, TimeStretcher, Transcription, Translator,
};
pub use whisper::WhisperRecognizer;
