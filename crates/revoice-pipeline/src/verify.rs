//! Round-trip synthesis verification
//!
//! A synthesized clip is re-transcribed and compared against the text it
//! was supposed to contain. Three signals catch the usual failure modes:
//! text similarity (Levenshtein and Jaro-Winkler over normalized text)
//! catches dropped or mangled words, and the distance from the last
//! recognized word to the end of the file catches trailing
//! hallucinations.

use anyhow::Result;
use revoice_engines::SpeechRecognizer;
use std::path::Path;

/// Thresholds for accepting a synthesis attempt
#[derive(Debug, Clone, Copy)]
pub struct VerifyThresholds {
    /// Maximum allowed distance from the last word to the file end
    pub last_word: f64,
    /// Minimum normalized Levenshtein similarity
    pub levenshtein: f64,
    /// Minimum Jaro-Winkler similarity
    pub jaro_winkler: f64,
}

/// Measured verification signals for one attempt
#[derive(Debug, Clone, Copy)]
pub struct SynthesisCheck {
    pub last_word_distance: f64,
    pub levenshtein: f64,
    pub jaro_winkler: f64,
}

impl SynthesisCheck {
    pub fn passes(&self, thresholds: &VerifyThresholds) -> bool {
        self.last_word_distance < thresholds.last_word
            && self.levenshtein >= thresholds.levenshtein
            && self.jaro_winkler >= thresholds.jaro_winkler
    }

    /// Mean of the two text similarities, used to pick a fallback attempt
    pub fn average_similarity(&self) -> f64 {
        (self.levenshtein + self.jaro_winkler) / 2.0
    }
}

/// Lowercase, strip punctuation, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Compare the two normalized texts
pub fn text_similarity(expected: &str, detected: &str) -> (f64, f64) {
    let expected = normalize_text(expected);
    let detected = normalize_text(detected);
    (
        strsim::normalized_levenshtein(&detected, &expected),
        strsim::jaro_winkler(&detected, &expected),
    )
}

/// Re-transcribe `clip` and measure it against `expected_text`
///
/// Returns `None` when the recognizer hears no words at all, which a
/// caller should treat as a failed attempt.
pub async fn verify_clip(
    recognizer: &dyn SpeechRecognizer,
    clip: &Path,
    expected_text: &str,
    language: Option<&str>,
) -> Result<Option<SynthesisCheck>> {
    let transcription = recognizer.transcribe(clip, language).await?;
    if transcription.words.is_empty() {
        return Ok(None);
    }

    let detected = transcription
        .words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let (levenshtein, jaro_winkler) = text_similarity(expected_text, &detected);

    let duration = revoice_audio::wav_duration(clip)?;
    let last_word_end = transcription.words.last().map(|w| w.end).unwrap_or(0.0);
    let last_word_distance = duration - last_word_end;

    tracing::debug!(
        "verify {}: lev {levenshtein:.2}, jaro {jaro_winkler:.2}, last word {last_word_distance:.2}s before end",
        clip.display()
    );

    Ok(Some(SynthesisCheck {
        last_word_distance,
        levenshtein,
        jaro_winkler,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(normalize_text("  Hello,   World!  "), "hello world");
        assert_eq!(normalize_text("Mr. O'Brien's test."), "mr obriens test");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_identical_texts_score_one() {
        let (lev, jaro) = text_similarity("Hello world!", "hello, world");
        assert!((lev - 1.0).abs() < 1e-9);
        assert!((jaro - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dissimilar_texts_score_low() {
        let (lev, jaro) = text_similarity("good morning sunshine", "entirely different words");
        assert!(lev < 0.5);
        assert!(jaro < 0.9);
    }

    #[test]
    fn test_passes_is_strict() {
        let thresholds = VerifyThresholds {
            last_word: 0.35,
            levenshtein: 0.9,
            jaro_winkler: 0.9,
        };
        let exact = SynthesisCheck {
            last_word_distance: 0.2,
            levenshtein: 0.9,
            jaro_winkler: 0.95,
        };
        assert!(exact.passes(&thresholds));

        let trailing_audio = SynthesisCheck {
            last_word_distance: 0.35,
            ..exact
        };
        assert!(!trailing_audio.passes(&thresholds));

        let garbled = SynthesisCheck {
            levenshtein: 0.89,
            ..exact
        };
        assert!(!garbled.passes(&thresholds));
    }
}
