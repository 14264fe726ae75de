//! Cache operation errors.
//!
//! These never cross the `ThumbnailCache` boundary: the facade turns every
//! failure into a miss, a `false`, or a dropped request, and logs it.

use std::time::Duration;

/// Maximum stderr length kept in tool failure messages.
const MAX_STDERR_LEN: usize = 200;

/// Errors that can occur inside the thumbnail cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Invalid cache key: {reason}")]
    InvalidKey { reason: &'static str },

    #[error("Invalid capture region {width}x{height}")]
    InvalidRegion { width: i32, height: i32 },

    #[error("Capture tools are not available")]
    ToolsUnavailable,

    #[error("Cache directory is not usable")]
    Unavailable,

    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {code}: {}", truncate_stderr(stderr))]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("Capture produced an empty image")]
    EmptyImage,

    #[error("Capture produced an unreadable image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("Invalid metadata sidecar: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Capture queue is full")]
    QueueFull,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    /// Whether this failure comes from the cache directory rather than
    /// from a single capture.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            CacheError::Io(_) | CacheError::Metadata(_) | CacheError::Unavailable
        )
    }
}

/// Result type for cache internals.
pub type CacheResult<T> = Result<T, CacheError>;

fn truncate_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_STDERR_LEN {
        return trimmed.to_string();
    }
    let mut end = MAX_STDERR_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
