//! Run report logging
//!
//! Appends one JSON line per pipeline run to the state directory, so
//! archive hashes and degradation notes survive for later audit.

use crate::config::{Config, ConfigManager};
use crate::graph::scheduler::RunReport;
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based run logger that appends JSON lines.
pub struct RunLog {
    enabled: bool,
    path: PathBuf,
}

impl RunLog {
    /// Create a new run logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.run_log,
            path: ConfigManager::run_log_path(),
        }
    }

    /// Append a run report as a JSON line.
    ///
    /// Silently drops entries on IO failure; the log must never block or
    /// fail a run that already completed.
    pub async fn record(&self, report: &RunReport) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run": report,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize run report: {e}");
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run log: {e}");
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
