//! Path and meta command handlers

use std::process::ExitCode;

use anyhow::{Context, Result};

use winthumb::ThumbnailCache;

/// Print the thumbnail path if a fresh entry exists.
pub fn handle_path(cache: &ThumbnailCache, address: &str, max_age_seconds: u64) -> ExitCode {
    match cache.get_thumbnail_path(address, max_age_seconds) {
        Some(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        None => ExitCode::FAILURE,
    }
}

/// Print the sidecar metadata as pretty JSON, regardless of age.
pub fn handle_meta(cache: &ThumbnailCache, address: &str) -> Result<ExitCode> {
    let Some(metadata) = cache.get_metadata(address) else {
        return Ok(ExitCode::FAILURE);
    };
    let json = serde_json::to_string_pretty(&metadata).context("Failed to serialize metadata")?;
    println!("{}", json);
    Ok(ExitCode::SUCCESS)
}
