//! OpenAI speech synthesis API
//!
//! The API returns mp3; the adapter converts to WAV before handing the
//! clip back to the pipeline.

use crate::media;
use crate::traits::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_VOICE: &str = "alloy";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiSpeech {
    pub fn new(voice: Option<&str>) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY must be set for the openai engine")?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: "tts-1".to_string(),
            voice: voice.unwrap_or(DEFAULT_VOICE).to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    async fn synthesize(&self, text: &str, out_wav: &Path) -> Result<()> {
        let url = format!("{OPENAI_API_BASE}/audio/speech");
        let body = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };

        tracing::debug!("openai speech request: voice={}", self.voice);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await
            .context("OpenAI speech request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!(match status.as_u16() {
                401 => "OpenAI rejected the API key".to_string(),
                429 => "OpenAI rate limit hit".to_string(),
                _ => format!("OpenAI speech returned HTTP {status}: {error_text}"),
            });
        }

        let bytes = response.bytes().await.context("Failed to read audio body")?;

        let mp3_path = out_wav.with_extension("mp3");
        tokio::fs::write(&mp3_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", mp3_path.display()))?;

        media::convert_to_wav(&mp3_path, out_wav).await
    }
}
