//! Word-to-fragment tokenization
//!
//! Splits the transcribed word stream twice: once into synthesizable
//! sentence fragments (punctuation or gap bounded) and once into full
//! sentences (full-stop bounded) that serve as rewrite context.

use crate::error::PipelineError;
use revoice_types::{Fragment, FullSentence, TimeRange, Word};

/// Characters that may end a sentence fragment
pub const BREAK_CHARACTERS: &[char] = &['.', '!', '?', ',', '。'];

/// Characters that end a full sentence
pub const FULL_SENTENCE_BREAKS: &[char] = &['.', '!', '?', '。'];

/// Abbreviations and acronyms that never act as sentence breaks
pub const NO_BREAK_WORDS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "St.", "Ave.", "Rd.", "Jan.", "Feb.", "Mar.", "Apr.",
    "Jun.", "Jul.", "Aug.", "Sep.", "Sept.", "Oct.", "Nov.", "Dec.", "vs.", "etc.", "e.g.",
    "i.e.", "U.S.", "U.K.", "U.N.", "N.A.S.A.", "F.B.I.", "C.I.A.", "D.C.", "U.S.A.",
    "U.S.S.R.", "U.S.C.", "U.S.M.C.", "U.S.N.", "U.S.P.S.",
];

/// Default speaking gap that forces a fragment boundary, in seconds
pub const DEFAULT_GAP_DURATION: f64 = 1.0;

/// Defaults for short-sentence merging
pub const DEFAULT_MERGE_GAP: f64 = 0.75;
pub const DEFAULT_MIN_SENTENCE_DURATION: f64 = 1.5;

fn check_words(words: &[Word]) -> Result<(), PipelineError> {
    if words.is_empty() {
        return Err(PipelineError::NoWords);
    }
    if words.windows(2).any(|pair| pair[0].start > pair[1].start) {
        return Err(PipelineError::UnorderedWords);
    }
    Ok(())
}

/// Core splitting loop shared by both passes
///
/// A span ends on a word when the gap to the next word exceeds
/// `gap_duration`, on the last word, or on a punctuation break; with
/// `enforce_min_duration`, a punctuation break alone only counts once the
/// accumulated span is longer than `gap_duration` (this keeps one-word
/// spans from forming after every comma).
fn split_spans(
    words: &[Word],
    gap_duration: f64,
    break_characters: &[char],
    no_break_words: &[&str],
    enforce_min_duration: bool,
) -> Vec<(String, f64, f64)> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut span_start = 0.0;

    for (index, word) in words.iter().enumerate() {
        if current.is_empty() {
            span_start = word.start;
        } else {
            current.push(' ');
        }
        current.push_str(word.text.trim());

        let is_last_word = index + 1 == words.len();
        let big_gap_to_next = !is_last_word && words[index + 1].start - word.end > gap_duration;

        let punctuation_break = word.text.trim().ends_with(break_characters)
            && !no_break_words.contains(&word.text.trim());

        if big_gap_to_next || is_last_word || punctuation_break {
            let span_duration = word.end - span_start;
            let duration_ok =
                !enforce_min_duration || span_duration > gap_duration;

            if is_last_word || big_gap_to_next || duration_ok {
                spans.push((std::mem::take(&mut current), span_start, word.end));
            }
        }
    }

    spans
}

/// Split words into synthesizable sentence fragments
pub fn fragment_words(words: &[Word], gap_duration: f64) -> Result<Vec<Fragment>, PipelineError> {
    check_words(words)?;
    Ok(split_spans(
        words,
        gap_duration,
        BREAK_CHARACTERS,
        NO_BREAK_WORDS,
        true,
    )
    .into_iter()
    .map(|(text, start, end)| Fragment::new(text, start, end))
    .collect())
}

/// Split words into full sentences (full-stop class breaks only)
pub fn full_sentences(words: &[Word], gap_duration: f64) -> Result<Vec<FullSentence>, PipelineError> {
    check_words(words)?;
    Ok(split_spans(
        words,
        gap_duration,
        FULL_SENTENCE_BREAKS,
        NO_BREAK_WORDS,
        false,
    )
    .into_iter()
    .map(|(text, start, end)| FullSentence {
        text,
        start,
        end,
        fragment_indices: Vec::new(),
    })
    .collect())
}

/// Merge adjacent fragments when they are close together and at least one
/// of them is too short to synthesize well on its own
///
/// Short spans are hard to land on their original duration, especially
/// after translation; merging gives the synthesizer more room.
pub fn merge_short_sentences(
    fragments: Vec<Fragment>,
    gap_duration: f64,
    min_sentence_duration: f64,
) -> Vec<Fragment> {
    let mut merged: Vec<Fragment> = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        let merge = match merged.last() {
            Some(previous) => {
                let gap = fragment.start - previous.end;
                gap < gap_duration
                    && (fragment.duration() < min_sentence_duration
                        || previous.duration() < min_sentence_duration)
            }
            None => false,
        };

        if merge {
            let previous = merged.last_mut().unwrap();
            tracing::debug!(
                "merging fragment {:?} into {:?} (gap {:.2}s)",
                fragment.text,
                previous.text,
                fragment.start - previous.end
            );
            previous.text.push(' ');
            previous.text.push_str(&fragment.text);
            previous.end = fragment.end;
        } else {
            merged.push(fragment);
        }
    }

    merged
}

/// Attach every fragment to the unique full sentence containing it
///
/// Sets each fragment's `parent_sentence_text` and fills the sentences'
/// fragment index lists. A fragment that fits no sentence means the two
/// passes disagree, which is an upstream bug worth failing loudly on.
pub fn attach_fragments(
    fragments: &mut [Fragment],
    sentences: &mut [FullSentence],
) -> Result<(), PipelineError> {
    for sentence in sentences.iter_mut() {
        sentence.fragment_indices.clear();
    }

    for (index, fragment) in fragments.iter_mut().enumerate() {
        let range = TimeRange::new(fragment.start, fragment.end);
        let parent = sentences
            .iter_mut()
            .find(|s| TimeRange::new(s.start, s.end).contains(&range));

        match parent {
            Some(sentence) => {
                sentence.fragment_indices.push(index);
                fragment.parent_sentence_text = Some(sentence.text.clone());
            }
            None => {
                return Err(PipelineError::FragmentOutsideSentence {
                    text: fragment.text.clone(),
                    start: fragment.start,
                    end: fragment.end,
                });
            }
        }
    }

    Ok(())
}
