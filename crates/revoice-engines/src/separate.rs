//! Vocal / accompaniment separation via the spleeter CLI

use crate::media;
use crate::traits::{SeparatedStems, SourceSeparator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Source separator shelling out to `spleeter separate`
pub struct SpleeterSeparator;

#[async_trait]
impl SourceSeparator for SpleeterSeparator {
    async fn split(&self, audio: &Path, out_dir: &Path) -> Result<SeparatedStems> {
        let stem = audio
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Audio file has no usable name")?;

        let stems = SeparatedStems {
            vocals: out_dir.join(stem).join("vocals.wav"),
            accompaniment: out_dir.join(stem).join("accompaniment.wav"),
        };

        if stems.vocals.exists() && stems.accompaniment.exists() {
            tracing::info!("separated stems already exist, skipping spleeter");
            return Ok(stems);
        }

        tokio::fs::create_dir_all(out_dir).await?;

        // spleeter reads mp3 most reliably; convert other formats first
        let ext = audio
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let input = if ext == "mp3" {
            audio.to_path_buf()
        } else {
            let mp3 = out_dir.join(format!("{stem}.mp3"));
            if !mp3.exists() {
                tracing::info!("converting {} to mp3 for separation", audio.display());
                media::convert_to_mp3(audio, &mp3).await?;
            }
            mp3
        };

        tracing::info!("splitting {} into stems", input.display());

        let output = Command::new("spleeter")
            .args(["separate", "-o"])
            .arg(out_dir)
            .args(["-p", "spleeter:2stems", "-c", "wav"])
            .arg(&input)
            .output()
            .await
            .context("Failed to run spleeter")?;

        if !output.status.success() {
            anyhow::bail!(
                "spleeter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        if !stems.vocals.exists() || !stems.accompaniment.exists() {
            anyhow::bail!(
                "spleeter finished but stems are missing under {}",
                out_dir.join(stem).display()
            );
        }

        Ok(stems)
    }
}
