//! Configuration management for winthumb

mod io;
mod types;

pub use types::*;

use anyhow::Result;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from file, or return defaults if not found
    pub fn load() -> Result<Self> {
        io::load()
    }

    /// Load configuration from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        io::load_from(path)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        io::save_to(self, path)
    }

    /// Resolve the thumbnail directory, expanding `~` in a configured path.
    ///
    /// Defaults to `<user cache dir>/winthumb/thumbnails`.
    pub fn cache_directory(&self) -> PathBuf {
        if let Some(dir) = &self.cache.directory {
            if let Some(stripped) = dir.strip_prefix("~/") {
                if let Some(home) = dirs::home_dir() {
                    return home.join(stripped);
                }
            }
            return PathBuf::from(dir);
        }

        let base = dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("winthumb").join("thumbnails")
    }
}
