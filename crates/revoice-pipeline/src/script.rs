//! Render-script checkpoint I/O
//!
//! The script freezes every content decision (timing, final text,
//! speakers, voices, paths) so the render phase is reproducible from
//! disk alone. Keys this version does not know are preserved across
//! read-modify-write.

use anyhow::{Context, Result};
use revoice_types::RenderScript;
use std::path::Path;

/// Write the checkpoint atomically (write then rename)
pub fn write_script(path: &Path, script: &RenderScript) -> Result<()> {
    let json = serde_json::to_string_pretty(script).context("Failed to serialize render script")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write render script to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move render script into {}", path.display()))?;

    tracing::info!("render script written to {}", path.display());
    Ok(())
}

/// Read a checkpoint produced by [`write_script`]
pub fn read_script(path: &Path) -> Result<RenderScript> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read render script {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Render script {} is not valid", path.display()))
}
