//! Cleanup command handler

use std::process::ExitCode;

use winthumb::ThumbnailCache;

/// Run one eviction sweep and print what it did.
pub fn handle(cache: &ThumbnailCache, max_age_seconds: u64, max_size_mb: u64) -> ExitCode {
    let report = cache.cleanup(max_age_seconds, max_size_mb);
    println!("{}", report.summary());
    ExitCode::SUCCESS
}
