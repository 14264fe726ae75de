//! Reading and writing config.toml

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::Config;

const CONFIG_FILE: &str = "config.toml";

/// ~/.config/winthumb
fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("winthumb"))
}

/// ~/.config/winthumb/config.toml
fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

pub fn load() -> Result<Config> {
    load_from(&config_path()?)
}

/// Parse and validate `path`. A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let config: Config =
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))?;
    config
        .capture
        .validate()
        .map_err(|e| anyhow!("Invalid config {}: {}", path.display(), e))?;
    Ok(config)
}

/// Write the config to `path`, replacing any old file in one rename.
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("Config path has no parent: {}", path.display()))?;
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    temp.write_all(contents.as_bytes())?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
