//! Shared types for revoice
//!
//! This crate contains the plain data structures passed between pipeline
//! stages and persisted in the render script.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A transcribed word with timing information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// The word text, without surrounding whitespace
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Recognizer confidence (0.0 - 1.0)
    #[serde(default)]
    pub probability: f64,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            probability: 0.0,
        }
    }

    /// Midpoint of the spoken interval, used for speaker attribution
    pub fn midpoint(&self) -> f64 {
        (self.start + self.end) / 2.0
    }
}

/// A synthesizable span of speech bounded by punctuation or a speaking gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// Start of the original spoken interval in seconds
    pub start: f64,
    /// End of the original spoken interval in seconds
    pub end: f64,
    /// Index into the configured voice list
    #[serde(default)]
    pub speaker_index: usize,
    /// Text of the full sentence this fragment belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_sentence_text: Option<String>,
    /// Set by the synthesizer once a clip exists on disk
    #[serde(default)]
    pub synthesis_ok: bool,
    /// Foreign keys preserved across script read-modify-write
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Fragment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            speaker_index: 0,
            parent_sentence_text: None,
            synthesis_ok: false,
            extra: BTreeMap::new(),
        }
    }

    /// Duration of the original spoken interval in seconds
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A coarser span bounded only by sentence-ending punctuation
///
/// Holds indices into the pipeline's fragment list rather than copies, so
/// fragment text rewrites stay observable through the sentence view.
#[derive(Debug, Clone, PartialEq)]
pub struct FullSentence {
    pub text: String,
    pub start: f64,
    pub end: f64,
    /// Indices of the fragments fully contained in this sentence
    pub fragment_indices: Vec<usize>,
}

/// A single diarized speaking turn
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
}

impl SpeakerSegment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// A diarized speaker with their speaking turns
///
/// Speaker lists are sorted by `total_time` descending, so index 0 is the
/// speaker with the most speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    /// Diarizer-assigned label (e.g. "SPEAKER_00")
    pub label: String,
    /// Total speaking time in seconds
    pub total_time: f64,
    pub segments: Vec<SpeakerSegment>,
}

/// A processing window in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// The range grown by `correction` seconds on each side, floored at zero
    pub fn expanded(&self, correction: f64) -> Self {
        Self {
            start: (self.start - correction).max(0.0),
            end: self.end + correction,
        }
    }

    /// True when `[start, end]` and `other` share a non-empty interval
    pub fn intersects(&self, other: &TimeRange) -> bool {
        !(self.end <= other.start || other.end <= self.start)
    }

    /// True when `other` lies fully inside this range
    pub fn contains(&self, other: &TimeRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

/// Text-to-speech engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Coqui,
    Openai,
    Elevenlabs,
    System,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::Coqui
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::Coqui => "coqui",
            EngineKind::Openai => "openai",
            EngineKind::Elevenlabs => "elevenlabs",
            EngineKind::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coqui" => Ok(EngineKind::Coqui),
            "openai" => Ok(EngineKind::Openai),
            "elevenlabs" => Ok(EngineKind::Elevenlabs),
            "system" => Ok(EngineKind::System),
            other => Err(format!(
                "unknown engine {other:?} (expected coqui, openai, elevenlabs or system)"
            )),
        }
    }
}

/// Everything the render phase needs to know about the prepared media
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderMetadata {
    /// Original input as given on the command line (path, URL or video id)
    pub input_video: String,
    /// Extracted or downloaded audio track
    pub audio_file: PathBuf,
    /// Vocal-less stem from source separation (absent in clean-audio mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accompaniment_path: Option<PathBuf>,
    /// Video stream without audio
    pub video_file_muted: PathBuf,
    /// Total media duration in seconds
    pub duration: f64,
    /// Language detected from the transcription
    pub source_language: String,
    /// Requested translation target, empty for none
    pub target_language: String,
    /// Language the fragments will be synthesized in
    pub synthesis_language: String,
    pub voices: Vec<String>,
    pub engines: Vec<EngineKind>,
    pub clean_audio: bool,
    pub synthesis_directory: PathBuf,
    pub output_video: PathBuf,
    /// Foreign keys preserved across script read-modify-write
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The checkpoint artifact: all content decisions, frozen
///
/// Rendering from a script reproduces identical fragment timing and
/// synthesis inputs without rerunning any analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderScript {
    pub metadata: RenderMetadata,
    /// Fragments ordered by start time, with final text and speaker
    pub sentences: Vec<Fragment>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_range_intersects() {
        let a = TimeRange::new(1.0, 2.0);
        assert!(a.intersects(&TimeRange::new(1.5, 3.0)));
        assert!(!a.intersects(&TimeRange::new(2.0, 3.0)));
        assert!(!a.intersects(&TimeRange::new(0.0, 1.0)));
    }

    #[test]
    fn test_time_range_expanded_floors_at_zero() {
        let r = TimeRange::new(0.1, 1.0).expanded(0.2);
        assert_eq!(r.start, 0.0);
        assert!((r.end - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_engine_kind_round_trip() {
        for kind in [
            EngineKind::Coqui,
            EngineKind::Openai,
            EngineKind::Elevenlabs,
            EngineKind::System,
        ] {
            assert_eq!(kind.to_string().parse::<EngineKind>().unwrap(), kind);
        }
        assert!("festival".parse::<EngineKind>().is_err());
    }

    #[test]
    fn test_fragment_unknown_keys_survive_round_trip() {
        let json = r#"{"text":"hi","start":0.0,"end":1.0,"speaker_index":1,"mood":"upbeat"}"#;
        let fragment: Fragment = serde_json::from_str(json).unwrap();
        assert_eq!(fragment.extra["mood"], "upbeat");

        let back = serde_json::to_value(&fragment).unwrap();
        assert_eq!(back["mood"], "upbeat");
    }
}
