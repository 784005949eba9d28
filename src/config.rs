// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Alexander Minges

//! User configuration read from `<config_dir>/lorastack/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::logic::candidates::DirectorySource;
use crate::logic::persistence::FileBackupCache;

const APP_DIR: &str = "lorastack";
const CONFIG_FILE: &str = "config.toml";

pub const ENV_LORA_DIR: &str = "LORASTACK_LORA_DIR";
pub const ENV_CACHE_DIR: &str = "LORASTACK_CACHE_DIR";

/// Where LoRA names and the backup cache live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackerConfig {
    /// Directory scanned for selectable LoRA files.
    pub lora_dir: PathBuf,
    /// Directory holding one backup file per stacker node.
    pub cache_dir: PathBuf,
    /// Accepted file extensions, without the dot.
    pub extensions: Vec<String>,
}

impl Default for StackerConfig {
    fn default() -> Self {
        Self {
            lora_dir: PathBuf::from("./models/loras"),
            cache_dir: dirs::cache_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".lorastack-cache")),
            extensions: ["safetensors", "ckpt", "pt", "bin"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl StackerConfig {
    /// Default location of the config file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Parse from TOML text; missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML in configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse configuration: {}", path.display()))
    }

    /// Read the config file at `path` when it exists, falling back to defaults
    /// (with a warning) when it cannot be used.
    pub fn load_from(path: Option<&Path>) -> Self {
        match path {
            Some(path) if path.exists() => match Self::from_file(path) {
                Ok(config) => {
                    debug!("Loaded configuration from {}", path.display());
                    config
                }
                Err(err) => {
                    warn!("{err:#}; using default configuration");
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Config file plus environment overrides.
    pub fn load() -> Self {
        Self::load_from(Self::default_path().as_deref())
            .with_overrides(|key| std::env::var(key).ok())
    }

    /// Replace directories with non-empty values returned by `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = present(ENV_LORA_DIR) {
            self.lora_dir = PathBuf::from(dir);
        }
        if let Some(dir) = present(ENV_CACHE_DIR) {
            self.cache_dir = PathBuf::from(dir);
        }
        self
    }

    pub fn candidate_source(&self) -> DirectorySource {
        DirectorySource::new(self.lora_dir.clone(), self.extensions.clone())
    }

    pub fn backup_cache(&self) -> FileBackupCache {
        FileBackupCache::new(self.cache_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = StackerConfig::from_toml("lora_dir = \"/srv/loras\"").unwrap();
        assert_eq!(config.lora_dir, PathBuf::from("/srv/loras"));
        assert_eq!(config.extensions, StackerConfig::default().extensions);
        assert_eq!(config.cache_dir, StackerConfig::default().cache_dir);
    }

    #[test]
    fn load_from_reads_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            "cache_dir = \"/tmp/stack-cache\"\nextensions = [\"safetensors\"]\n",
        )
        .unwrap();

        let config = StackerConfig::load_from(Some(&path));

        assert_eq!(config.cache_dir, PathBuf::from("/tmp/stack-cache"));
        assert_eq!(config.extensions, vec!["safetensors".to_string()]);
    }

    #[test]
    fn malformed_or_missing_file_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "lora_dir = [").unwrap();

        assert_eq!(StackerConfig::load_from(Some(&path)), StackerConfig::default());
        assert_eq!(
            StackerConfig::load_from(Some(&tmp.path().join("absent.toml"))),
            StackerConfig::default()
        );
        assert_eq!(StackerConfig::load_from(None), StackerConfig::default());
    }

    #[test]
    fn overrides_replace_directories_unless_blank() {
        let config = StackerConfig::default().with_overrides(|key| match key {
            ENV_LORA_DIR => Some("/data/loras".into()),
            ENV_CACHE_DIR => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.lora_dir, PathBuf::from("/data/loras"));
        assert_eq!(config.cache_dir, StackerConfig::default().cache_dir);
    }

    #[test]
    fn backup_cache_uses_cache_dir() {
        use crate::logic::persistence::BackupCache;

        let tmp = TempDir::new().unwrap();
        let config = StackerConfig {
            cache_dir: tmp.path().join("cache"),
            ..StackerConfig::default()
        };
        let cache = config.backup_cache();
        cache.write("AdvancedLoraStacker_1", "{}").unwrap();
        assert!(tmp.path().join("cache").is_dir());
    }
}
