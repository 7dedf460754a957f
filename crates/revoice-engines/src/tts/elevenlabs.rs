//! ElevenLabs speech synthesis API

use crate::media;
use crate::traits::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
}

impl ElevenLabsSpeech {
    pub fn new(voice_id: Option<&str>) -> Result<Self> {
        let api_key = std::env::var("ELEVENLABS_API_KEY")
            .context("ELEVENLABS_API_KEY must be set for the elevenlabs engine")?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id: voice_id.unwrap_or(DEFAULT_VOICE_ID).to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str, out_wav: &Path) -> Result<()> {
        let url = format!("{ELEVENLABS_API_BASE}/text-to-speech/{}", self.voice_id);
        let body = SpeechRequest {
            text,
            model_id: "eleven_multilingual_v2",
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("ElevenLabs speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("ElevenLabs returned HTTP {status}: {error_text}");
        }

        let bytes = response.bytes().await.context("Failed to read audio body")?;

        // ElevenLabs streams mp3, convert before returning
        let mp3_path = out_wav.with_extension("mp3");
        tokio::fs::write(&mp3_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", mp3_path.display()))?;

        media::convert_to_wav(&mp3_path, out_wav).await
    }
}
