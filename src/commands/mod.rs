//! Command handlers for the winthumb CLI.
//!
//! Each submodule handles one subcommand. Handlers return the process exit
//! code; misses and unavailable tools are reported with status 1.

pub mod capture;
pub mod cleanup;
pub mod lookup;
pub mod probe;
pub mod status;

use std::time::Duration;

use tracing::warn;

use winthumb::ThumbnailCache;

/// How long the binary waits for queued captures before exiting.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Let queued captures finish; the process exit would otherwise kill them.
pub fn drain(cache: &ThumbnailCache) {
    if !cache.wait_for_idle(IDLE_TIMEOUT) {
        warn!(timeout = ?IDLE_TIMEOUT, "captures still running at exit");
    }
}
