//! Time-string parsing
//!
//! Accepts `1h2m3s`, `3m23s`, `34s`, `38.92255`, `38.92255s`, `1:02:03`,
//! `3:00` and plain integer seconds. Anything else is a hard error.

use crate::error::PipelineError;
use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static [(Regex, Shape)] {
    static PATTERNS: OnceLock<Vec<(Regex, Shape)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                Regex::new(r"^(\d+)h(\d+)m(\d+)s$").unwrap(),
                Shape::HoursMinutesSeconds,
            ),
            (Regex::new(r"^(\d+)m(\d+)s$").unwrap(), Shape::MinutesSeconds),
            (Regex::new(r"^(\d+\.\d+)s?$").unwrap(), Shape::DecimalSeconds),
            (Regex::new(r"^(\d+)s$").unwrap(), Shape::WholeSeconds),
            (
                Regex::new(r"^(\d+):(\d+):(\d+)$").unwrap(),
                Shape::HoursMinutesSeconds,
            ),
            (Regex::new(r"^(\d+):(\d+)$").unwrap(), Shape::MinutesSeconds),
            (Regex::new(r"^(\d+)$").unwrap(), Shape::WholeSeconds),
        ]
    })
}

#[derive(Clone, Copy)]
enum Shape {
    HoursMinutesSeconds,
    MinutesSeconds,
    DecimalSeconds,
    WholeSeconds,
}

/// Parse a time string into non-negative seconds
pub fn parse_time(input: &str) -> Result<f64, PipelineError> {
    let trimmed = input.trim();

    for (regex, shape) in patterns() {
        let Some(captures) = regex.captures(trimmed) else {
            continue;
        };
        let number = |i: usize| -> f64 { captures[i].parse().unwrap_or(0.0) };

        let seconds = match shape {
            Shape::HoursMinutesSeconds => number(1) * 3600.0 + number(2) * 60.0 + number(3),
            Shape::MinutesSeconds => number(1) * 60.0 + number(2),
            Shape::DecimalSeconds | Shape::WholeSeconds => number(1),
        };
        return Ok(seconds);
    }

    Err(PipelineError::TimeParse {
        input: input.to_string(),
    })
}

/// Format seconds the way timefiles are written: one decimal, no unit
pub fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.1}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_forms() {
        assert_eq!(parse_time("1h2m3s").unwrap(), 3723.0);
        assert_eq!(parse_time("3m23s").unwrap(), 203.0);
        assert_eq!(parse_time("34s").unwrap(), 34.0);
        assert!((parse_time("38.92255").unwrap() - 38.92255).abs() < 1e-9);
        assert!((parse_time("38.92255s").unwrap() - 38.92255).abs() < 1e-9);
        assert_eq!(parse_time("1:02:03").unwrap(), 3723.0);
        assert_eq!(parse_time("3:00").unwrap(), 180.0);
        assert_eq!(parse_time("45").unwrap(), 45.0);
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        assert_eq!(parse_time(" 45 ").unwrap(), 45.0);
    }

    #[test]
    fn test_garbage_is_a_hard_error() {
        for bad in ["banana", "", "1h2m", "-5", "1:2:3:4", "12.s"] {
            assert!(parse_time(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_parse_format_round_trip() {
        for x in [0.0, 0.5, 12.3, 45.0, 3599.9, 3723.0] {
            let formatted = format_seconds(x);
            assert_eq!(parse_time(&formatted).unwrap(), x, "via {formatted}");
        }
    }
}
