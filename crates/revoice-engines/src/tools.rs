//! External tool discovery
//!
//! The pipeline fails fast, with actionable messages, when a required
//! CLI is not on PATH.

/// A missing tool together with its install hint
#[derive(Debug, Clone)]
pub struct ToolRequirement {
    pub name: &'static str,
    pub hint: &'static str,
}

const INSTALL_HINTS: &[(&str, &str)] = &[
    (
        "ffmpeg",
        "install ffmpeg from https://ffmpeg.org/download.html or your package manager",
    ),
    (
        "ffprobe",
        "ffprobe ships with ffmpeg; install ffmpeg from https://ffmpeg.org/download.html",
    ),
    (
        "yt-dlp",
        "install yt-dlp: pipx install yt-dlp (https://github.com/yt-dlp/yt-dlp)",
    ),
    (
        "spleeter",
        "install the Spleeter CLI: pipx install spleeter --python /path/to/python3.8 \
         (https://github.com/deezer/spleeter); required for audio splitting",
    ),
    (
        "rubberband",
        "install the Rubber Band CLI from https://breakfastquay.com/rubberband/ and put \
         the executable on PATH; required for audio stretching",
    ),
    (
        "tts",
        "install Coqui TTS: pipx install coqui-tts (provides the `tts` CLI)",
    ),
    (
        "espeak-ng",
        "install espeak-ng from your package manager",
    ),
];

fn hint_for(name: &'static str) -> &'static str {
    INSTALL_HINTS
        .iter()
        .find(|(tool, _)| *tool == name)
        .map(|(_, hint)| *hint)
        .unwrap_or("install it and make sure it is on PATH")
}

/// Which of the given tools are not on PATH
pub fn missing_tools(names: &[&'static str]) -> Vec<ToolRequirement> {
    names
        .iter()
        .copied()
        .filter(|name| which::which(name).is_err())
        .map(|name| ToolRequirement {
            name,
            hint: hint_for(name),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonexistent_tool_is_reported() {
        let missing = missing_tools(&["definitely-not-a-real-tool-7f3a"]);
        assert_eq!(missing.len(), 1);
        assert!(!missing[0].hint.is_empty());
    }

    #[test]
    fn test_known_tools_have_specific_hints() {
        assert!(hint_for("rubberband").contains("breakfastquay"));
        assert!(hint_for("spleeter").contains("pipx"));
    }
}
