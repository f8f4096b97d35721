//! Default on-disk locations.

use std::path::{Path, PathBuf};

use super::KeelSettings;

pub const SETTINGS_FILE: &str = "keel.toml";
pub const REPOSITORY_FILE: &str = "repositories.yaml";

pub fn default_config_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("keel"))
}

pub fn default_cache_dir() -> anyhow::Result<PathBuf> {
    Ok(dirs::cache_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine cache directory"))?
        .join("keel"))
}

pub fn settings_path(config_dir: &Path) -> PathBuf {
    config_dir.join(SETTINGS_FILE)
}

/// Repository index file: explicit setting, else `<config_dir>/repositories.yaml`.
pub fn repository_file(settings: &KeelSettings, config_dir: &Path) -> PathBuf {
    settings
        .repositories
        .file
        .clone()
        .unwrap_or_else(|| config_dir.join(REPOSITORY_FILE))
}

/// Repository index cache: explicit setting, else `<cache_dir>/repository`.
pub fn repository_cache(settings: &KeelSettings, cache_dir: &Path) -> PathBuf {
    settings
        .repositories
        .cache_dir
        .clone()
        .unwrap_or_else(|| cache_dir.join("repository"))
}
