//! Settings store for loading and saving keel.toml.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{KeelSettings, parser};

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn with_defaults() -> anyhow::Result<Self> {
        let config_dir = super::paths::default_config_dir()?;
        Ok(Self::new(super::paths::settings_path(&config_dir)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<KeelSettings> {
        if !self.path.exists() {
            return Ok(KeelSettings::new());
        }
        parser::parse_settings_toml(&self.path)
    }

    pub fn save(&self, settings: &KeelSettings) -> anyhow::Result<()> {
        let content = parser::to_toml(settings)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings file: {}", self.path.display()))?;
        Ok(())
    }
}
