//! Media acquisition, probing, extraction and muxing
//!
//! Thin wrappers around ffmpeg / ffprobe / yt-dlp. All operations are
//! idempotent: existing outputs are reused so an interrupted run picks up
//! where it stopped.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// How the positional input argument should be interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    LocalFile,
    RemoteUrl,
    /// Bare 11-character video id
    VideoId,
}

/// Audio track and muted video ready for processing
#[derive(Debug, Clone)]
pub struct AcquiredMedia {
    pub audio: PathBuf,
    pub video_muted: PathBuf,
}

/// Classify the positional input: local path, URL, or bare video id
pub fn classify_input(input: &str) -> InputKind {
    if input.starts_with("http://") || input.starts_with("https://") {
        return InputKind::RemoteUrl;
    }
    if input.len() == 11
        && input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && !Path::new(input).exists()
    {
        return InputKind::VideoId;
    }
    InputKind::LocalFile
}

/// Expand a bare video id into a watch URL; URLs pass through unchanged
pub fn ensure_watch_url(input: &str) -> String {
    match classify_input(input) {
        InputKind::VideoId => format!("https://www.youtube.com/watch?v={input}"),
        _ => input.to_string(),
    }
}

/// Fetch or extract the audio track and the muted video for `input`
pub async fn acquire(input: &str, download_dir: &Path, extract: bool) -> Result<AcquiredMedia> {
    tokio::fs::create_dir_all(download_dir).await?;

    match classify_input(input) {
        InputKind::LocalFile => {
            let source = Path::new(input);
            if !source.exists() {
                anyhow::bail!("input file {} does not exist", source.display());
            }
            let stem = source
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Input file has no usable name")?;
            let audio = download_dir.join(format!("{stem}_audio.wav"));
            let video_muted = download_dir.join(format!("{stem}_muted.mp4"));

            extract_audio(source, &audio).await?;
            mute_video(source, &video_muted).await?;

            Ok(AcquiredMedia { audio, video_muted })
        }
        InputKind::RemoteUrl | InputKind::VideoId => {
            let url = ensure_watch_url(input);
            if extract {
                // one full download, then split locally; better quality,
                // larger transfer
                let video = fetch_remote(&url, "best", download_dir, "source_video").await?;
                let audio = download_dir.join("source_audio.wav");
                let video_muted = download_dir.join("source_video_muted.mp4");

                extract_audio(&video, &audio).await?;
                mute_video(&video, &video_muted).await?;

                Ok(AcquiredMedia { audio, video_muted })
            } else {
                let audio =
                    fetch_remote(&url, "bestaudio/best", download_dir, "source_audio").await?;
                let video_muted =
                    fetch_remote(&url, "bestvideo", download_dir, "source_video_muted").await?;

                Ok(AcquiredMedia { audio, video_muted })
            }
        }
    }
}

/// Media duration in seconds via ffprobe
pub async fn probe_duration(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffprobe failed on {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<f64>()
        .with_context(|| format!("ffprobe returned no duration for {}", path.display()))
}

/// Convert any audio file to an mp3 (320k), e.g. for the separator
pub async fn convert_to_mp3(input: &Path, output: &Path) -> Result<()> {
    run_ffmpeg(&mut ffmpeg_base(input, output, &["-codec:a", "libmp3lame", "-b:a", "320k"])).await
}

/// Convert any audio file to a WAV, e.g. the mp3 output of an HTTP TTS
pub async fn convert_to_wav(input: &Path, output: &Path) -> Result<()> {
    run_ffmpeg(&mut ffmpeg_base(input, output, &[])).await
}

/// Combine the muted video with the synthesized speech track and, unless
/// in clean-audio mode, the background track
pub async fn mux(
    video_muted: &Path,
    speech: &Path,
    background: Option<&Path>,
    output: &Path,
    hd: bool,
) -> Result<()> {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y").arg("-i").arg(video_muted).arg("-i").arg(speech);

    if let Some(background) = background {
        cmd.arg("-i").arg(background).args([
            "-filter_complex",
            "[1:a][2:a]amix=inputs=2:duration=longest:normalize=0[mix]",
            "-map",
            "0:v",
            "-map",
            "[mix]",
        ]);
    } else {
        cmd.args(["-map", "0:v", "-map", "1:a"]);
    }

    if hd {
        cmd.args(["-c:v", "libx264", "-crf", "18", "-preset", "slow"]);
    } else {
        // stream copy keeps the picture untouched
        cmd.args(["-c:v", "copy"]);
    }
    cmd.args(["-c:a", "aac", "-b:a", "192k", "-shortest"]).arg(output);

    tracing::info!("muxing final video into {}", output.display());
    run_ffmpeg(&mut cmd).await
}

async fn extract_audio(video: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        tracing::info!("audio track {} already exists", output.display());
        return Ok(());
    }
    tracing::info!("extracting audio from {}", video.display());
    run_ffmpeg(&mut ffmpeg_base(
        video,
        output,
        &["-vn", "-acodec", "pcm_s16le"],
    ))
    .await
}

async fn mute_video(video: &Path, output: &Path) -> Result<()> {
    if output.exists() {
        tracing::info!("muted video {} already exists", output.display());
        return Ok(());
    }
    tracing::info!("writing muted video {}", output.display());
    run_ffmpeg(&mut ffmpeg_base(video, output, &["-an", "-c:v", "copy"])).await
}

fn ffmpeg_base(input: &Path, output: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y").arg("-i").arg(input).args(args).arg(output);
    cmd
}

async fn run_ffmpeg(cmd: &mut Command) -> Result<()> {
    let output = cmd.output().await.context("Failed to run ffmpeg")?;
    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Download one format selection with yt-dlp and return the final path
async fn fetch_remote(url: &str, format: &str, dir: &Path, basename: &str) -> Result<PathBuf> {
    let template = dir.join(format!("{basename}.%(ext)s"));

    let output = Command::new("yt-dlp")
        .args(["-f", format, "--no-playlist", "--no-simulate"])
        .args(["--print", "after_move:filepath"])
        .arg("-o")
        .arg(&template)
        .arg(url)
        .output()
        .await
        .context("Failed to run yt-dlp")?;

    if !output.status.success() {
        anyhow::bail!(
            "yt-dlp exited with {} for {url}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let path = String::from_utf8_lossy(&output.stdout)
        .lines()
        .last()
        .map(|line| PathBuf::from(line.trim()))
        .filter(|p| p.exists())
        .with_context(|| format!("yt-dlp reported no output file for {url}"))?;

    tracing::info!("downloaded {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_urls() {
        assert_eq!(
            classify_input("https://www.youtube.com/watch?v=oeb5LdAyLC8"),
            InputKind::RemoteUrl
        );
        assert_eq!(classify_input("http://example.com/a.mp4"), InputKind::RemoteUrl);
    }

    #[test]
    fn test_classify_video_id() {
        assert_eq!(classify_input("oeb5LdAyLC8"), InputKind::VideoId);
        assert_eq!(classify_input("dQw4w9WgXcQ"), InputKind::VideoId);
        // wrong length means a (possibly missing) local path
        assert_eq!(classify_input("clip.mp4"), InputKind::LocalFile);
        assert_eq!(classify_input("not/an/id!!"), InputKind::LocalFile);
    }

    #[test]
    fn test_ensure_watch_url() {
        assert_eq!(
            ensure_watch_url("oeb5LdAyLC8"),
            "https://www.youtube.com/watch?v=oeb5LdAyLC8"
        );
        let url = "https://www.youtube.com/watch?v=oeb5LdAyLC8";
        assert_eq!(ensure_watch_url(url), url);
    }
}
