//! Chat-LLM collaborators: style rewriting and translation
//!
//! Both adapters talk to an OpenAI-compatible `/chat/completions`
//! endpoint, so a local server (ollama, llama.cpp) works by pointing
//! `base_url` at it.

use crate::traits::{StyleRewriter, Translator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat endpoint configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model name (e.g. "gpt-4o-mini")
    pub model: String,
    /// API base URL without the trailing endpoint path
    pub base_url: String,
    pub api_key: Option<String>,
    /// Lower temperature keeps rewrites close to the originals
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 2048,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ChatConfig {
    /// Default configuration with key and base URL taken from
    /// `OPENAI_API_KEY` / `OPENAI_BASE_URL`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.api_key = std::env::var("OPENAI_API_KEY").ok();
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        config
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Minimal OpenAI-compatible chat client
pub struct ChatClient {
    config: ChatConfig,
    client: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, client })
    }

    /// Run one completion and return the assistant message content
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("Chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("chat endpoint returned HTTP {status}: {error_text}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .context("Chat response contained no choices")?
            .message
            .content;

        Ok(content.trim().to_string())
    }
}

/// Translator backed by the chat endpoint
pub struct ChatTranslator {
    client: ChatClient,
}

impl ChatTranslator {
    pub fn new(config: ChatConfig) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
        })
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(format!(
                "You are a professional translator. Translate the user's text from \
                 {source} to {target}. Reply with the translation only."
            )),
            ChatMessage::user(text),
        ];
        self.client.complete(&messages).await
    }
}

/// Style rewriter backed by the chat endpoint
///
/// Proposes rewritten fragment texts; the pipeline validates the length
/// contract and calls again with feedback when a proposal is rejected.
pub struct ChatRewriter {
    client: ChatClient,
}

impl ChatRewriter {
    pub fn new(config: ChatConfig) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(config)?,
        })
    }
}

#[async_trait]
impl StyleRewriter for ChatRewriter {
    async fn transform(
        &self,
        fragments: &[String],
        prompt: &str,
        full_sentence: &str,
        feedback: Option<&str>,
    ) -> Result<Vec<String>> {
        let mut messages = vec![
            ChatMessage::system(format!(
                "Change the style or tone of the sentence fragments in this way: {prompt}. \
                 Keep each fragment's text length as close to the original as possible, \
                 since the result must be spoken in the same time. Consider the full \
                 sentence for context. Reply with a JSON array of strings, one rewritten \
                 fragment per input fragment, in the same order."
            )),
            ChatMessage::user(format!("Full sentence: {full_sentence}")),
            ChatMessage::user(format!(
                "Fragments:\n{}",
                serde_json::to_string(fragments)?
            )),
        ];
        if let Some(feedback) = feedback {
            messages.push(ChatMessage::user(format!(
                "{feedback} Try again and reply with a JSON array of strings."
            )));
        }

        let content = self.client.complete(&messages).await?;
        parse_fragment_array(&content)
    }
}

/// Parse a JSON array of strings, tolerating markdown code fences
fn parse_fragment_array(content: &str) -> Result<Vec<String>> {
    let trimmed = strip_code_fences(content);
    serde_json::from_str(trimmed)
        .with_context(|| format!("rewriter did not return a JSON array of strings: {trimmed:?}"))
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    rest.trim_end_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_array() {
        let parsed = parse_fragment_array(r#"["Ahoy there!", "A fine test, matey."]"#).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], "Ahoy there!");
    }

    #[test]
    fn test_parse_fenced_array() {
        let fenced = "```json\n[\"one\", \"two\"]\n```";
        let parsed = parse_fragment_array(fenced).unwrap();
        assert_eq!(parsed, vec!["one", "two"]);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_fragment_array("sure, here you go!").is_err());
    }
}
