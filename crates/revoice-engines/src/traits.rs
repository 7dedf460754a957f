//! Collaborator traits
//!
//! The pipeline only talks to its external dependencies through these
//! interfaces; every call is a suspension point and may take seconds to
//! minutes.

use anyhow::Result;
use async_trait::async_trait;
use revoice_types::{Speaker, Word};
use std::path::{Path, PathBuf};

/// Word-timestamped transcription of one audio file
#[derive(Debug, Clone)]
pub struct Transcription {
    pub words: Vec<Word>,
    /// Detected (or forced) language, ISO 639-1
    pub language: String,
}

/// Speech-to-text with word-level timestamps
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Transcribe `audio`, forcing `language` when given
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<Transcription>;

    /// Release the underlying model resources; the next `transcribe`
    /// call reloads them
    fn unload(&self);
}

/// Speaker-count hints passed through to the diarizer (0 = unknown)
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerCountHints {
    pub num_speakers: usize,
    pub min_speakers: usize,
    pub max_speakers: usize,
}

/// Attribution of speech segments to anonymous speakers
#[async_trait]
pub trait Diarizer: Send + Sync {
    /// Returns speakers sorted by total speaking time, descending
    async fn diarize(&self, audio: &Path, hints: &SpeakerCountHints) -> Result<Vec<Speaker>>;
}

/// Output of vocal/accompaniment separation
#[derive(Debug, Clone)]
pub struct SeparatedStems {
    pub vocals: PathBuf,
    pub accompaniment: PathBuf,
}

/// Vocal/accompaniment source separation
#[async_trait]
pub trait SourceSeparator: Send + Sync {
    /// Split `audio` into stems under `out_dir`; idempotent when both
    /// stems already exist
    async fn split(&self, audio: &Path, out_dir: &Path) -> Result<SeparatedStems>;
}

/// Text-to-speech synthesis of one clip
///
/// A synthesizer is bound to one voice and one language at construction;
/// the registry builds one per configured voice. Implementations must
/// write a WAV file to `out_wav` regardless of their internal format.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Engine name for diagnostics
    fn name(&self) -> &str;

    async fn synthesize(&self, text: &str, out_wav: &Path) -> Result<()>;
}

/// Pitch-preserving time stretching
#[async_trait]
pub trait TimeStretcher: Send + Sync {
    /// Stretch `input` by `factor` (2.0 = twice as fast) into `output`
    async fn stretch(&self, input: &Path, output: &Path, factor: f64) -> Result<()>;
}

/// Sentence-level text translation
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Style/tone rewriting of the fragments of one full sentence
///
/// The rewriter proposes texts; validation of the length contract happens
/// in the pipeline, which feeds a rejection reason back through
/// `feedback` on the next attempt.
#[async_trait]
pub trait StyleRewriter: Send + Sync {
    async fn transform(
        &self,
        fragments: &[String],
        prompt: &str,
        full_sentence: &str,
        feedback: Option<&str>,
    ) -> Result<Vec<String>>;
}
