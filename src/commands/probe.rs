//! Probe command handler

use std::process::ExitCode;

use winthumb::ThumbnailCache;

/// Report whether captures can run and which tools were found.
pub fn handle(cache: &ThumbnailCache) -> ExitCode {
    let state = if cache.is_available() {
        "available"
    } else {
        "unavailable"
    };
    println!("Capture tools: {}", state);
    println!("   {}", cache.probe());

    if cache.is_available() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
