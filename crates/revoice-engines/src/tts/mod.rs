//! Text-to-speech engine registry
//!
//! Engines are selected by name and paired positionally with the
//! configured voices: voice `i` is synthesized by engine `i` (missing
//! entries fall back to coqui). Each pairing becomes one
//! [`SpeechSynthesizer`] bound to its voice and language.

pub mod coqui;
pub mod elevenlabs;
pub mod openai;
pub mod system;

use crate::traits::SpeechSynthesizer;
use anyhow::Result;
use revoice_types::EngineKind;
use std::sync::Arc;

pub use coqui::CoquiSpeech;
pub use elevenlabs::ElevenLabsSpeech;
pub use openai::OpenAiSpeech;
pub use system::EspeakSpeech;

/// Build one synthesizer per configured voice
///
/// An empty voice list yields a single engine with its default voice, so
/// single-speaker runs need no configuration.
pub fn build_voices(
    voices: &[String],
    engines: &[EngineKind],
    language: &str,
) -> Result<Vec<Arc<dyn SpeechSynthesizer>>> {
    let voices: Vec<Option<&str>> = if voices.is_empty() {
        vec![None]
    } else {
        voices.iter().map(|v| Some(v.as_str())).collect()
    };

    let mut built: Vec<Arc<dyn SpeechSynthesizer>> = Vec::with_capacity(voices.len());
    for (index, voice) in voices.iter().enumerate() {
        let kind = engines.get(index).copied().unwrap_or_default();
        tracing::info!(
            "voice {index}: engine {kind}, voice {}",
            voice.unwrap_or("<default>")
        );
        let synthesizer: Arc<dyn SpeechSynthesizer> = match kind {
            EngineKind::Coqui => Arc::new(CoquiSpeech::new(language, *voice)),
            EngineKind::Openai => Arc::new(OpenAiSpeech::new(*voice)?),
            EngineKind::Elevenlabs => Arc::new(ElevenLabsSpeech::new(*voice)?),
            EngineKind::System => Arc::new(EspeakSpeech::new(language, *voice)),
        };
        built.push(synthesizer);
    }
    Ok(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_voice_list_builds_one_engine() {
        let built = build_voices(&[], &[], "en").unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].name(), "coqui");
    }

    #[test]
    fn test_engines_pair_positionally_with_default_fill() {
        let voices = vec!["male.wav".to_string(), "female.wav".to_string()];
        let built = build_voices(&voices, &[EngineKind::System], "en").unwrap();
        assert_eq!(built.len(), 2);
        assert_eq!(built[0].name(), "system");
        // second voice falls back to the default engine
        assert_eq!(built[1].name(), "coqui");
    }
}
