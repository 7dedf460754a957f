//! Pitch-preserving time stretch via the Rubber Band CLI

use crate::traits::TimeStretcher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Time stretcher shelling out to `rubberband`
///
/// Uses the R3 engine with formant preservation and maximum crispness so
/// stretched speech keeps its timbre.
pub struct RubberbandStretcher;

#[async_trait]
impl TimeStretcher for RubberbandStretcher {
    async fn stretch(&self, input: &Path, output: &Path, factor: f64) -> Result<()> {
        tracing::debug!(
            "time stretch {} -> {} at {:.3}x",
            input.display(),
            output.display(),
            factor
        );

        let status = Command::new("rubberband")
            .args(["--fine", "--formant", "--crisp", "6", "--tempo"])
            .arg(factor.to_string())
            .arg(input)
            .arg(output)
            .status()
            .await
            .context("Failed to run rubberband")?;

        if !status.success() {
            anyhow::bail!("rubberband exited with {status}");
        }
        Ok(())
    }
}
