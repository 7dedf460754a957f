//! System speech synthesis via espeak-ng
//!
//! The quality floor of the engine set, but it runs everywhere and needs
//! no model downloads or API keys.

use crate::traits::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

pub struct EspeakSpeech {
    voice: String,
}

impl EspeakSpeech {
    pub fn new(language: &str, voice: Option<&str>) -> Self {
        let voice = voice
            .map(str::to_owned)
            .unwrap_or_else(|| if language.is_empty() { "en".to_string() } else { language.to_string() });
        Self { voice }
    }
}

#[async_trait]
impl SpeechSynthesizer for EspeakSpeech {
    fn name(&self) -> &str {
        "system"
    }

    async fn synthesize(&self, text: &str, out_wav: &Path) -> Result<()> {
        let output = Command::new("espeak-ng")
            .args(["-v", self.voice.as_str(), "-w"])
            .arg(out_wav)
            .arg(text)
            .output()
            .await
            .context("Failed to run espeak-ng")?;

        if !output.status.success() {
            anyhow::bail!(
                "espeak-ng exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(())
    }
}
