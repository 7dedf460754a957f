//! Speaker diarization via an external helper process
//!
//! The diarization model itself is an external collaborator. The adapter
//! runs a configurable command that receives the audio path plus optional
//! speaker-count hints and prints one JSON array of speaking turns on
//! stdout:
//!
//! ```json
//! [{"start": 0.4, "end": 3.1, "speaker": "SPEAKER_00"}, ...]
//! ```

use crate::traits::{Diarizer, SpeakerCountHints};
use anyhow::{Context, Result};
use async_trait::async_trait;
use revoice_types::{Speaker, SpeakerSegment};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// One speaking turn as reported by the helper
#[derive(Debug, Clone, Deserialize)]
pub struct DiarizedTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

/// Diarizer backed by an external command
pub struct SubprocessDiarizer {
    command: PathBuf,
}

impl SubprocessDiarizer {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl Diarizer for SubprocessDiarizer {
    async fn diarize(&self, audio: &Path, hints: &SpeakerCountHints) -> Result<Vec<Speaker>> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(audio);
        if hints.num_speakers > 0 {
            cmd.arg("--num-speakers").arg(hints.num_speakers.to_string());
        }
        if hints.min_speakers > 0 {
            cmd.arg("--min-speakers").arg(hints.min_speakers.to_string());
        }
        if hints.max_speakers > 0 {
            cmd.arg("--max-speakers").arg(hints.max_speakers.to_string());
        }

        tracing::info!("running diarization on {}", audio.display());

        let output = cmd
            .output()
            .await
            .with_context(|| format!("Failed to run diarizer {}", self.command.display()))?;

        if !output.status.success() {
            anyhow::bail!(
                "diarizer exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let turns: Vec<DiarizedTurn> =
            serde_json::from_slice(&output.stdout).context("Failed to parse diarizer output")?;

        Ok(speakers_from_turns(turns))
    }
}

/// Aggregate raw turns into per-speaker timelines, most-talking first
pub fn speakers_from_turns(turns: Vec<DiarizedTurn>) -> Vec<Speaker> {
    let mut speakers: Vec<Speaker> = Vec::new();

    for turn in turns {
        let segment = SpeakerSegment {
            start: turn.start,
            end: turn.end,
        };
        match speakers.iter_mut().find(|s| s.label == turn.speaker) {
            Some(speaker) => {
                speaker.total_time += segment.duration();
                speaker.segments.push(segment);
            }
            None => speakers.push(Speaker {
                label: turn.speaker,
                total_time: segment.duration(),
                segments: vec![segment],
            }),
        }
    }

    speakers.sort_by(|a, b| {
        b.total_time
            .partial_cmp(&a.total_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    speakers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speaker: &str) -> DiarizedTurn {
        DiarizedTurn {
            start,
            end,
            speaker: speaker.to_string(),
        }
    }

    #[test]
    fn test_turns_aggregate_per_speaker() {
        let speakers = speakers_from_turns(vec![
            turn(0.0, 2.0, "SPEAKER_00"),
            turn(2.0, 7.0, "SPEAKER_01"),
            turn(7.0, 8.0, "SPEAKER_00"),
        ]);

        assert_eq!(speakers.len(), 2);
        // SPEAKER_01 talked 5s, SPEAKER_00 only 3s
        assert_eq!(speakers[0].label, "SPEAKER_01");
        assert!((speakers[0].total_time - 5.0).abs() < 1e-9);
        assert_eq!(speakers[1].segments.len(), 2);
    }

    #[test]
    fn test_empty_turns() {
        assert!(speakers_from_turns(Vec::new()).is_empty());
    }

    #[test]
    fn test_turn_json_shape() {
        let parsed: Vec<DiarizedTurn> =
            serde_json::from_str(r#"[{"start": 0.5, "end": 1.5, "speaker": "SPEAKER_00"}]"#)
                .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].speaker, "SPEAKER_00");
    }
}
