//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Cache directory and eviction limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory; `None` uses the platform cache dir
    #[serde(default)]
    pub directory: Option<String>,
    /// Freshness window for thumbnail lookups
    #[serde(default = "default_max_age_seconds")]
    pub max_age_seconds: u64,
    /// Age ceiling applied by `cleanup`
    #[serde(default = "default_cleanup_max_age_seconds")]
    pub cleanup_max_age_seconds: u64,
    /// Size ceiling applied by `cleanup` (1 MB = 1,000,000 bytes)
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,
}

pub fn default_max_age_seconds() -> u64 {
    300
}

pub fn default_cleanup_max_age_seconds() -> u64 {
    3600
}

pub fn default_max_size_mb() -> u64 {
    100
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_age_seconds: default_max_age_seconds(),
            cleanup_max_age_seconds: default_cleanup_max_age_seconds(),
            max_size_mb: default_max_size_mb(),
        }
    }
}

/// External tools and the capture worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Screenshot executable, invoked as `<tool> -g "X,Y WxH" <out>`
    #[serde(default = "default_capture_tool")]
    pub capture_tool: String,
    /// Resize executables in order of preference
    #[serde(default = "default_resize_tools")]
    pub resize_tools: Vec<String>,
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
    /// Upper bound for each external tool invocation
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    /// Background capture threads
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Pending async captures before new requests are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

pub fn default_capture_tool() -> String {
    "grim".to_string()
}

pub fn default_resize_tools() -> Vec<String> {
    vec!["magick".to_string(), "convert".to_string()]
}

pub fn default_thumbnail_width() -> u32 {
    320
}

pub fn default_thumbnail_height() -> u32 {
    180
}

pub fn default_tool_timeout_secs() -> u64 {
    5
}

pub fn default_workers() -> usize {
    2
}

pub fn default_queue_capacity() -> usize {
    16
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            capture_tool: default_capture_tool(),
            resize_tools: default_resize_tools(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            tool_timeout_secs: default_tool_timeout_secs(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl CaptureConfig {
    /// Check values that would make the capture pipeline unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.capture_tool.trim().is_empty() {
            return Err("capture.capture_tool must not be empty".to_string());
        }
        if self.resize_tools.iter().all(|t| t.trim().is_empty()) {
            return Err("capture.resize_tools must name at least one tool".to_string());
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return Err(format!(
                "capture thumbnail size {}x{} must be > 0",
                self.thumbnail_width, self.thumbnail_height
            ));
        }
        if self.tool_timeout_secs == 0 {
            return Err("capture.tool_timeout_secs must be > 0".to_string());
        }
        if self.workers == 0 {
            return Err("capture.workers must be > 0".to_string());
        }
        if self.workers > 16 {
            return Err(format!(
                "capture.workers {} exceeds maximum (16)",
                self.workers
            ));
        }
        if self.queue_capacity == 0 {
            return Err("capture.queue_capacity must be > 0".to_string());
        }
        Ok(())
    }
}
