//! Coqui XTTS synthesis via the local `tts` CLI
//!
//! The voice is a cloning-reference WAV; without one the model's default
//! speaker is used.

use crate::traits::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

const DEFAULT_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

pub struct CoquiSpeech {
    model: String,
    language: String,
    speaker_wav: Option<PathBuf>,
}

impl CoquiSpeech {
    pub fn new(language: &str, speaker_wav: Option<&str>) -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            language: normalize_language(language),
            speaker_wav: speaker_wav.map(PathBuf::from),
        }
    }
}

/// XTTS uses "zh-cn" where the rest of the pipeline says "zh"
fn normalize_language(language: &str) -> String {
    match language {
        "" => "en".to_string(),
        "zh" => "zh-cn".to_string(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SpeechSynthesizer for CoquiSpeech {
    fn name(&self) -> &str {
        "coqui"
    }

    async fn synthesize(&self, text: &str, out_wav: &Path) -> Result<()> {
        let mut cmd = Command::new("tts");
        cmd.args(["--text", text])
            .args(["--model_name", self.model.as_str()])
            .args(["--language_idx", self.language.as_str()])
            .arg("--out_path")
            .arg(out_wav);
        if let Some(speaker_wav) = &self.speaker_wav {
            cmd.arg("--speaker_wav").arg(speaker_wav);
        }

        let output = cmd.output().await.context("Failed to run the tts CLI")?;
        if !output.status.success() {
            anyhow::bail!(
                "tts exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        if !out_wav.exists() {
            anyhow::bail!("tts finished but wrote no file to {}", out_wav.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_normalization() {
        assert_eq!(normalize_language("zh"), "zh-cn");
        assert_eq!(normalize_language(""), "en");
        assert_eq!(normalize_language("de"), "de");
    }
}
