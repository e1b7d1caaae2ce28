//! Configuration management for docforge

pub mod schema;

pub use schema::Config;

use crate::error::{DocforgeError, DocforgeResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-local configuration file name
pub const LOCAL_CONFIG_FILE: &str = ".docforge.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docforge")
            .join("config.toml")
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docforge")
    }

    /// Get the release-notes cache directory path
    pub fn notes_cache_dir() -> PathBuf {
        Self::state_dir().join("notes-cache")
    }

    /// Get the run log path
    pub fn run_log_path() -> PathBuf {
        Self::state_dir().join("runs.log")
    }

    /// Load configuration, creating default if not exists
    pub async fn load(&self) -> DocforgeResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> DocforgeResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DocforgeError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| DocforgeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config with an optional project-local file merged
    /// over it. Local values win table-by-table, key-by-key.
    pub async fn load_merged(&self, local: Option<&Path>) -> DocforgeResult<Config> {
        let mut merged = if self.config_path.exists() {
            self.parse_value(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        if let Some(path) = local {
            let overlay = self.parse_value(path).await?;
            merge_values(&mut merged, overlay);
        }

        merged
            .try_into()
            .map_err(|e: toml::de::Error| DocforgeError::ConfigInvalid {
                path: local
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.config_path.clone()),
                reason: e.to_string(),
            })
    }

    async fn parse_value(&self, path: &Path) -> DocforgeResult<toml::Value> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| DocforgeError::io(format!("reading config from {}", path.display()), e))?;
        content
            .parse::<toml::Value>()
            .map_err(|e| DocforgeError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Walk up from `start` looking for a project-local config file
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> DocforgeResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            DocforgeError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> DocforgeResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| DocforgeError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure all state directories exist.
    ///
    /// The notes cache directory is durable storage for the fetch cache;
    /// failure to create it is a cache-store error with its own exit
    /// code, not a generic I/O failure.
    pub async fn ensure_state_dirs() -> DocforgeResult<()> {
        fs::create_dir_all(Self::state_dir())
            .await
            .map_err(|e| {
                DocforgeError::io(format!("creating directory {}", Self::state_dir().display()), e)
            })?;

        fs::create_dir_all(Self::notes_cache_dir())
            .await
            .map_err(|e| {
                DocforgeError::cache_store(
                    format!("creating directory {}", Self::notes_cache_dir().display()),
                    e,
                )
            })?;

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursive table merge: overlay wins, non-table values replace.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.notes.timeout_secs, 30);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.notes.url = "https://notes.internal/{revision}".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.notes.url, "https://notes.internal/{revision}");
    }

    #[tokio::test]
    async fn local_config_overrides_global_per_key() {
        let temp = TempDir::new().unwrap();
        let global = temp.path().join("config.toml");
        let local = temp.path().join(LOCAL_CONFIG_FILE);

        std::fs::write(
            &global,
            "[notes]\nurl = \"https://global/{revision}\"\ntimeout_secs = 10\n",
        )
        .unwrap();
        std::fs::write(&local, "[notes]\nurl = \"https://local/{revision}\"\n").unwrap();

        let manager = ConfigManager::with_path(global);
        let merged = manager.load_merged(Some(&local)).await.unwrap();

        assert_eq!(merged.notes.url, "https://local/{revision}");
        // untouched keys keep their global values
        assert_eq!(merged.notes.timeout_secs, 10);
        // unset sections keep defaults
        assert!(merged.archive.self_check);
    }

    #[tokio::test]
    async fn merged_without_any_files_is_default() {
        let temp = TempDir::new().unwrap();
        let manager = ConfigManager::with_path(temp.path().join("absent.toml"));
        let config = manager.load_merged(None).await.unwrap();
        assert_eq!(config.pipeline.run_timeout_secs, 1800);
    }

    #[test]
    fn find_local_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(LOCAL_CONFIG_FILE), "").unwrap();

        let found = ConfigManager::find_local_config(&nested).unwrap();
        assert_eq!(found, temp.path().join(LOCAL_CONFIG_FILE));
    }

    #[test]
    fn find_local_config_none_when_absent() {
        let temp = TempDir::new().unwrap();
        assert!(ConfigManager::find_local_config(temp.path()).is_none());
    }
}
