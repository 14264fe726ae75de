//! Status command handler

use std::process::ExitCode;

use winthumb::ThumbnailCache;

/// Display entry count, total size and location of the cache.
pub fn handle(cache: &ThumbnailCache) -> ExitCode {
    println!("{}", cache.stats().summary());
    ExitCode::SUCCESS
}
