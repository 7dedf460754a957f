//! Length-preserving style rewrite
//!
//! Each full sentence is rewritten as a unit so fragments keep their
//! context, but the lengths must stay close to the originals: the
//! synthesized result still has to fit the original speaking time.
//! Violations are fed back to the rewriter; after too many attempts the
//! originals are kept. A failing rewrite never aborts the pipeline.

use revoice_engines::StyleRewriter;
use revoice_types::{Fragment, FullSentence};

/// Maximum rewrite attempts per sentence
pub const MAX_ATTEMPTS: usize = 5;

/// Absolute character-count slack always accepted
const OK_DISTANCE: usize = 7;
/// Relative length bounds accepted beyond the absolute slack
const MAX_FACTOR: f64 = 1.5;

/// Check one sentence's proposed fragments against the length contract
///
/// Accepted iff the fragment count is unchanged and, per fragment,
/// `abs(len_new - len_orig) <= 7` or the length ratio stays within
/// `[1/1.5, 1.5]`. Returns a human-readable rejection reason otherwise,
/// which doubles as the feedback for the next attempt.
pub fn validate_rewrite(originals: &[String], proposed: &[String]) -> Result<(), String> {
    if originals.len() != proposed.len() {
        return Err(format!(
            "The number of fragments must not change (expected {}, got {}).",
            originals.len(),
            proposed.len()
        ));
    }

    for (index, (original, changed)) in originals.iter().zip(proposed).enumerate() {
        let original_len = original.chars().count();
        let changed_len = changed.chars().count();
        let distance = original_len.abs_diff(changed_len);
        if distance <= OK_DISTANCE {
            continue;
        }

        let factor = changed_len as f64 / original_len.max(1) as f64;
        if factor > MAX_FACTOR {
            return Err(format!(
                "Fragment {index} is too long compared to the original {original:?}. \
                 Make the text {changed:?} shorter."
            ));
        }
        if factor < 1.0 / MAX_FACTOR {
            return Err(format!(
                "Fragment {index} is too short compared to the original {original:?}. \
                 Make the text {changed:?} longer."
            ));
        }
    }

    Ok(())
}

/// Apply the style prompt to every sentence's fragments, in place
pub async fn rewrite_sentences(
    rewriter: &dyn StyleRewriter,
    fragments: &mut [Fragment],
    sentences: &[FullSentence],
    prompt: &str,
) {
    tracing::info!("transforming {} sentences, applying {prompt:?}", sentences.len());

    for sentence in sentences {
        if sentence.fragment_indices.is_empty() {
            continue;
        }
        let originals: Vec<String> = sentence
            .fragment_indices
            .iter()
            .map(|&i| fragments[i].text.clone())
            .collect();

        let mut feedback: Option<String> = None;
        let mut accepted = false;

        for attempt in 1..=MAX_ATTEMPTS {
            let proposed = match rewriter
                .transform(&originals, prompt, &sentence.text, feedback.as_deref())
                .await
            {
                Ok(proposed) => proposed,
                Err(error) => {
                    tracing::warn!(
                        "rewrite of {:?} failed on attempt {attempt}: {error:#}",
                        sentence.text
                    );
                    break;
                }
            };

            match validate_rewrite(&originals, &proposed) {
                Ok(()) => {
                    for (&index, text) in sentence.fragment_indices.iter().zip(proposed) {
                        tracing::debug!("rewrote {:?} to {:?}", fragments[index].text, text);
                        fragments[index].text = text;
                    }
                    accepted = true;
                    break;
                }
                Err(reason) => {
                    tracing::debug!(
                        "rewrite of {:?} rejected on attempt {attempt}: {reason}",
                        sentence.text
                    );
                    feedback = Some(reason);
                }
            }
        }

        if !accepted {
            tracing::warn!(
                "keeping original fragments of {:?}, no rewrite satisfied the length contract",
                sentence.text
            );
        }
    }
}
