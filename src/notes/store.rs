//! Persistent revision-keyed cache store
//!
//! One JSON file per revision under a durable directory that outlives any
//! single run. Writes go to a temp file first and are renamed into place,
//! so a torn write is never readable as a valid entry. Reads verify the
//! stored digest; anything that fails the check is treated as absent.

use crate::error::{DocforgeError, DocforgeResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// A cached release-notes snapshot for one revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Revision this entry was fetched for.
    pub revision: String,

    /// Notes content as fetched.
    pub content: String,

    /// When the successful fetch happened.
    pub fetched_at: DateTime<Utc>,

    /// SHA-256 of `content`, the integrity check on read.
    pub digest: String,
}

impl CacheEntry {
    pub fn new(revision: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let digest = content_digest(&content);
        Self {
            revision: revision.into(),
            content,
            fetched_at: Utc::now(),
            digest,
        }
    }

    fn integrity_ok(&self) -> bool {
        content_digest(&self.content) == self.digest
    }
}

fn content_digest(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Revision-keyed store on durable storage.
pub struct NotesStore {
    dir: PathBuf,
}

impl NotesStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry file for a revision. Revision strings are commit ids, but
    /// anything outside a conservative character set is mapped to '-' so
    /// a hostile value cannot escape the cache directory.
    fn entry_path(&self, revision: &str) -> PathBuf {
        let safe: String = revision
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Load the entry for a revision, or `None` when it is missing,
    /// unreadable, or fails its integrity check.
    pub async fn load(&self, revision: &str) -> Option<CacheEntry> {
        let path = self.entry_path(revision);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), "cache entry unreadable: {e}");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), "cache entry corrupt, ignoring: {e}");
                return None;
            }
        };

        if entry.revision != revision {
            warn!(path = %path.display(), "cache entry revision mismatch, ignoring");
            return None;
        }

        if !entry.integrity_ok() {
            warn!(path = %path.display(), "cache entry failed integrity check, ignoring");
            return None;
        }

        debug!(revision = %revision, "cache hit");
        Some(entry)
    }

    /// Persist an entry atomically: write a temp file in the same
    /// directory, then rename over the final path.
    pub async fn persist(&self, entry: &CacheEntry) -> DocforgeResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DocforgeError::cache_store("creating cache directory", e))?;

        let path = self.entry_path(&entry.revision);
        let tmp = path.with_extension("json.tmp");

        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&tmp, json)
            .await
            .map_err(|e| DocforgeError::cache_store(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| DocforgeError::cache_store(format!("renaming into {}", path.display()), e))?;

        debug!(revision = %entry.revision, path = %path.display(), "cache entry persisted");
        Ok(())
    }

    /// All readable entries, newest first.
    pub async fn list(&self) -> DocforgeResult<Vec<CacheEntry>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }

        let mut entries = vec![];
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| DocforgeError::cache_store("reading cache directory", e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DocforgeError::cache_store("reading cache directory entry", e))?
        {
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Ok(content) = fs::read_to_string(&path).await {
                    if let Ok(entry) = serde_json::from_str::<CacheEntry>(&content) {
                        if entry.integrity_ok() {
                            entries.push(entry);
                        }
                    }
                }
            }
        }

        entries.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        Ok(entries)
    }

    /// Remove every entry. Eviction policy beyond this is left to the
    /// operator.
    pub async fn clear(&self) -> DocforgeResult<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| DocforgeError::cache_store("reading cache directory", e))?;

        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| DocforgeError::cache_store("reading cache directory entry", e))?
        {
            let path = item.path();
            let is_entry = path
                .extension()
                .is_some_and(|ext| ext == "json" || ext == "tmp");
            if is_entry {
                fs::remove_file(&path)
                    .await
                    .map_err(|e| DocforgeError::cache_store(format!("removing {}", path.display()), e))?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}
