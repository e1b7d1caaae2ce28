//! Configuration schema for docforge
//!
//! Configuration is stored at `~/.config/docforge/config.toml`, with a
//! project-local `.docforge.toml` merged over it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Release notes fetch settings
    pub notes: NotesConfig,

    /// Documentation generation settings
    pub docs: DocsConfig,

    /// Archive output settings
    pub archive: ArchiveConfig,

    /// Pipeline execution settings
    pub pipeline: PipelineConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append run reports to the state-dir run log
    pub run_log: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            run_log: true,
        }
    }
}

/// Release notes fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesConfig {
    /// Endpoint URL. `{revision}` is replaced with the revision id.
    pub url: String,

    /// Bounded timeout for one fetch attempt, in seconds
    pub timeout_secs: u64,

    /// Cache directory override (defaults to the per-user state dir)
    pub cache_dir: Option<PathBuf>,

    /// Try the endpoint even when a cached snapshot exists
    pub refresh: bool,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            url: "https://example.com/release-notes/{revision}".to_string(),
            timeout_secs: 30,
            cache_dir: None,
            refresh: false,
        }
    }
}

/// Documentation generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Command run in the workspace to generate documentation
    pub command: Vec<String>,

    /// Directory the command writes, relative to the workspace
    pub output_dir: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "cargo".to_string(),
                "doc".to_string(),
                "--no-deps".to_string(),
            ],
            output_dir: PathBuf::from("target/doc"),
        }
    }
}

/// Archive output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Output path, relative to the workspace unless absolute.
    /// Deliberately has no timestamp in it.
    pub output: PathBuf,

    /// Re-derive the archive after writing and require identical bytes
    pub self_check: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("docs.tar.gz"),
            self_check: true,
        }
    }
}

/// Pipeline execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Overall run deadline, in seconds
    pub run_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 1800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[general]"));
        assert!(toml.contains("[notes]"));
        assert!(toml.contains("[archive]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.notes.timeout_secs, 30);
        assert!(config.archive.self_check);
    }

    #[test]
    fn config_deserializes_partial() {
        let toml = r#"
            [notes]
            url = "https://notes.internal/{revision}"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.notes.url, "https://notes.internal/{revision}");
        assert_eq!(config.archive.output, PathBuf::from("docs.tar.gz")); // default preserved
    }
}
