//! Speaker attribution, word filtering and speaker timefiles

use crate::error::PipelineError;
use crate::timestr::{format_seconds, parse_time};
use regex::Regex;
use revoice_types::{Fragment, Speaker, SpeakerSegment, TimeRange, Word};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// How strictly words are matched against the processing windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFilterPolicy {
    /// Word interval fully contained in a window
    Precise,
    /// Any non-empty intersection
    Balanced,
    /// Intersection after expanding each window by the correction
    #[default]
    Forgiving,
}

impl FromStr for TimeFilterPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "precise" => Ok(TimeFilterPolicy::Precise),
            "balanced" => Ok(TimeFilterPolicy::Balanced),
            "forgiving" => Ok(TimeFilterPolicy::Forgiving),
            other => Err(format!(
                "unknown time policy {other:?} (expected precise, balanced or forgiving)"
            )),
        }
    }
}

/// Overlap of two intervals in seconds; negative values are the distance
/// between disjoint intervals
pub fn interval_overlap(start1: f64, end1: f64, start2: f64, end2: f64) -> f64 {
    if start2 > end1 {
        return -(start2 - end1);
    }
    if start1 > end2 {
        return -(start1 - end2);
    }
    end1.min(end2) - start1.max(start2)
}

/// Stamp each fragment with the speaker of greatest temporal overlap
///
/// Ties keep the lowest speaker index (then the earliest segment, by scan
/// order); a fragment overlapping no segment stays at speaker 0.
pub fn assign_speakers(fragments: &mut [Fragment], speakers: &[Speaker]) {
    for fragment in fragments.iter_mut() {
        let mut max_overlap = 0.0;
        let mut assigned = 0;

        for (speaker_index, speaker) in speakers.iter().enumerate() {
            for segment in &speaker.segments {
                let overlap =
                    interval_overlap(fragment.start, fragment.end, segment.start, segment.end);
                if overlap > max_overlap {
                    max_overlap = overlap;
                    assigned = speaker_index;
                }
            }
        }

        fragment.speaker_index = assigned;
        tracing::debug!(
            "assigned {:?} to speaker {assigned} (overlap {max_overlap:.2}s)",
            fragment.text
        );
    }
}

/// Keep only words matching one of the processing windows
pub fn filter_by_time(
    words: Vec<Word>,
    windows: &[TimeRange],
    policy: TimeFilterPolicy,
    correction: f64,
) -> Vec<Word> {
    if windows.is_empty() {
        return words;
    }

    words
        .into_iter()
        .filter(|word| {
            let word_range = TimeRange::new(word.start, word.end);
            windows.iter().any(|window| match policy {
                TimeFilterPolicy::Precise => window.contains(&word_range),
                TimeFilterPolicy::Balanced => window.intersects(&word_range),
                TimeFilterPolicy::Forgiving => {
                    window.expanded(correction).intersects(&word_range)
                }
            })
        })
        .collect()
}

/// Keep only words whose midpoint falls inside one of the speaker's turns
pub fn filter_by_speaker(words: Vec<Word>, speaker: &Speaker) -> Vec<Word> {
    words
        .into_iter()
        .filter(|word| {
            let midpoint = word.midpoint();
            speaker
                .segments
                .iter()
                .any(|seg| seg.start <= midpoint && midpoint <= seg.end)
        })
        .collect()
}

/// Restrict diarized speakers to the global processing window
///
/// Segments outside the window are dropped, speaking totals recomputed,
/// and speakers left with no segments removed.
pub fn filter_speaker_window(speakers: Vec<Speaker>, window: &TimeRange) -> Vec<Speaker> {
    speakers
        .into_iter()
        .filter_map(|speaker| {
            let segments: Vec<SpeakerSegment> = speaker
                .segments
                .into_iter()
                .filter(|seg| seg.start <= window.end && seg.end >= window.start)
                .collect();
            if segments.is_empty() {
                return None;
            }
            let total_time = segments.iter().map(SpeakerSegment::duration).sum();
            Some(Speaker {
                label: speaker.label,
                total_time,
                segments,
            })
        })
        .collect()
}

/// Write one `speaker{N}.txt` timefile per speaker (1-based)
pub fn write_speaker_timefiles(speakers: &[Speaker], directory: &Path) -> anyhow::Result<()> {
    for (number, speaker) in speakers.iter().enumerate().map(|(i, s)| (i + 1, s)) {
        let path = directory.join(format!("speaker{number}.txt"));
        tracing::info!("writing timefile for speaker {number} to {}", path.display());

        let mut contents = format!(
            "Speaker {number} total: {}s\n\n",
            format_seconds(speaker.total_time)
        );
        for segment in &speaker.segments {
            contents.push_str(&format!(
                "[{}-{}]\n",
                format_seconds(segment.start),
                format_seconds(segment.end)
            ));
        }
        std::fs::write(&path, contents)?;
    }
    Ok(())
}

fn bracket_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\[(.*?)\]").unwrap())
}

/// Parse a timefile into processing windows
///
/// Any line may carry one or more `[start-end]` intervals; everything
/// else (like the `Speaker N total:` header) is ignored.
pub fn read_timefile(path: &Path) -> Result<Vec<TimeRange>, PipelineError> {
    let contents = std::fs::read_to_string(path).map_err(|e| PipelineError::TimefileParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut ranges = Vec::new();
    for capture in bracket_regex().captures_iter(&contents) {
        let inner = &capture[1];
        let (start, end) = inner.split_once('-').ok_or_else(|| {
            PipelineError::TimefileParse {
                path: path.to_path_buf(),
                reason: format!("interval {inner:?} has no '-' separator"),
            }
        })?;
        ranges.push(TimeRange::new(parse_time(start)?, parse_time(end)?));
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speaker(label: &str, segments: &[(f64, f64)]) -> Speaker {
        let segments: Vec<SpeakerSegment> = segments
            .iter()
            .map(|&(start, end)| SpeakerSegment { start, end })
            .collect();
        Speaker {
            label: label.to_string(),
            total_time: segments.iter().map(SpeakerSegment::duration).sum(),
            segments,
        }
    }

    #[test]
    fn test_overlap_values() {
        assert_eq!(interval_overlap(0.0, 2.0, 1.0, 3.0), 1.0);
        assert_eq!(interval_overlap(0.0, 1.0, 2.0, 3.0), -1.0);
        assert_eq!(interval_overlap(2.0, 3.0, 0.0, 1.0), -1.0);
    }

    #[test]
    fn test_assignment_picks_greatest_overlap() {
        let speakers = vec![
            speaker("A", &[(0.0, 2.0), (5.0, 7.0)]),
            speaker("B", &[(2.0, 5.0)]),
        ];
        let mut fragments = vec![Fragment::new("x", 1.5, 3.0)];

        assign_speakers(&mut fragments, &speakers);

        // A overlaps by 0.5, B by 1.0
        assert_eq!(fragments[0].speaker_index, 1);
    }

    #[test]
    fn test_assignment_optimality() {
        let speakers = vec![
            speaker("A", &[(0.0, 4.0)]),
            speaker("B", &[(3.0, 6.0)]),
            speaker("C", &[(5.5, 9.0)]),
        ];
        let mut fragments = vec![
            Fragment::new("a", 0.5, 2.0),
            Fragment::new("b", 3.5, 5.8),
            Fragment::new("c", 6.0, 8.0),
        ];

        assign_speakers(&mut fragments, &speakers);

        for fragment in &fragments {
            let chosen_overlap = speakers[fragment.speaker_index]
                .segments
                .iter()
                .map(|s| interval_overlap(fragment.start, fragment.end, s.start, s.end))
                .fold(f64::MIN, f64::max);
            for speaker in &speakers {
                for segment in &speaker.segments {
                    let overlap =
                        interval_overlap(fragment.start, fragment.end, segment.start, segment.end);
                    assert!(chosen_overlap >= overlap);
                }
            }
        }
    }

    #[test]
    fn test_tie_breaks_to_lowest_index_and_no_overlap_to_zero() {
        let speakers = vec![speaker("A", &[(0.0, 1.0)]), speaker("B", &[(2.0, 3.0)])];
        let mut fragments = vec![
            // equal 0.5s overlap with both: A wins
            Fragment::new("tie", 0.5, 2.5),
            // no overlap at all: speaker 0
            Fragment::new("nowhere", 5.0, 6.0),
        ];

        assign_speakers(&mut fragments, &speakers);

        assert_eq!(fragments[0].speaker_index, 0);
        assert_eq!(fragments[1].speaker_index, 0);
    }

    #[test]
    fn test_time_filter_policies() {
        let words = vec![
            Word::new("inside", 1.0, 2.0),
            Word::new("edge", 2.5, 3.5),
            Word::new("near", 3.05, 3.6),
            Word::new("far", 8.0, 9.0),
        ];
        let windows = vec![TimeRange::new(0.5, 3.0)];

        let precise = filter_by_time(words.clone(), &windows, TimeFilterPolicy::Precise, 0.2);
        assert_eq!(precise.len(), 1);

        let balanced = filter_by_time(words.clone(), &windows, TimeFilterPolicy::Balanced, 0.2);
        assert_eq!(balanced.len(), 2);

        let forgiving = filter_by_time(words.clone(), &windows, TimeFilterPolicy::Forgiving, 0.2);
        assert_eq!(forgiving.len(), 3);
    }

    #[test]
    fn test_no_windows_keeps_everything() {
        let words = vec![Word::new("a", 0.0, 1.0)];
        let kept = filter_by_time(words.clone(), &[], TimeFilterPolicy::Forgiving, 0.2);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_speaker_filter_uses_midpoint() {
        let target = speaker("A", &[(0.0, 2.0)]);
        let words = vec![
            Word::new("inside", 0.5, 1.5),
            // midpoint 2.25, outside even though the word starts inside
            Word::new("straddles", 1.8, 2.7),
        ];

        let kept = filter_by_speaker(words, &target);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "inside");
    }

    #[test]
    fn test_speaker_window_filter_recomputes_totals() {
        let speakers = vec![
            speaker("A", &[(0.0, 2.0), (10.0, 12.0)]),
            speaker("B", &[(20.0, 25.0)]),
        ];
        let filtered = filter_speaker_window(speakers, &TimeRange::new(0.0, 5.0));

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].segments.len(), 1);
        assert!((filtered[0].total_time - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_timefile_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let speakers = vec![speaker("A", &[(0.0, 2.5), (5.0, 7.5)])];

        write_speaker_timefiles(&speakers, dir.path()).unwrap();
        let ranges = read_timefile(&dir.path().join("speaker1.txt")).unwrap();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0], TimeRange::new(0.0, 2.5));
        assert_eq!(ranges[1], TimeRange::new(5.0, 7.5));
    }

    #[test]
    fn test_timefile_accepts_any_time_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.txt");
        std::fs::write(&path, "[1:00-2m30s]\n[90-1h0m0s]\n").unwrap();

        let ranges = read_timefile(&path).unwrap();
        assert_eq!(ranges[0], TimeRange::new(60.0, 150.0));
        assert_eq!(ranges[1], TimeRange::new(90.0, 3600.0));
    }

    #[test]
    fn test_bad_timefile_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "[banana-2.0]\n").unwrap();
        assert!(read_timefile(&path).is_err());
    }
}
