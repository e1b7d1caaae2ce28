//! Revision identity and commit timestamp resolution
//!
//! The archive's embedded timestamps come from the revision's own commit
//! metadata, never from the machine clock. When metadata cannot be read
//! the resolver degrades to a fixed fallback instant so the output stays
//! deterministic.

use crate::error::{DocforgeError, DocforgeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timestamp used when commit metadata is unavailable or malformed.
///
/// 1980-01-01 00:00:00 UTC.
pub const FALLBACK_EPOCH_SECS: i64 = 315_532_800;

/// Opaque source-control revision identifier.
///
/// Supplied by the invoking environment and consumed as-is; it keys the
/// notes cache and drives timestamp resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and display tables.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A commit instant, fixed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTimestamp {
    epoch_secs: i64,
}

impl CommitTimestamp {
    pub fn from_epoch_secs(epoch_secs: i64) -> Self {
        Self { epoch_secs }
    }

    /// The fixed instant used when metadata is unavailable.
    pub fn fallback() -> Self {
        Self {
            epoch_secs: FALLBACK_EPOCH_SECS,
        }
    }

    pub fn epoch_secs(&self) -> i64 {
        self.epoch_secs
    }

    /// Canonical textual form: `YYYY-MM-DD HH:MM:SS`, UTC.
    pub fn formatted(&self) -> String {
        let dt = DateTime::<Utc>::from_timestamp(self.epoch_secs, 0)
            .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(FALLBACK_EPOCH_SECS, 0).unwrap());
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Parse the canonical textual form back into a timestamp.
    pub fn parse(s: &str) -> DocforgeResult<Self> {
        let naive = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| DocforgeError::Internal(format!("malformed timestamp '{s}': {e}")))?;
        Ok(Self {
            epoch_secs: naive.and_utc().timestamp(),
        })
    }
}

impl fmt::Display for CommitTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

/// Commit metadata collaborator.
///
/// `commit_time` returns `Ok(None)` when the revision's metadata cannot
/// be read; the resolver turns that into the fallback instant.
#[async_trait]
pub trait CommitMetadata: Send + Sync {
    async fn commit_time(&self, revision: &Revision) -> DocforgeResult<Option<DateTime<Utc>>>;
}

/// Reads commit metadata from a git checkout via the git CLI.
pub struct GitMetadata {
    repo_dir: PathBuf,
}

impl GitMetadata {
    pub fn new(repo_dir: PathBuf) -> Self {
        Self { repo_dir }
    }

    /// Resolve the checkout's HEAD commit, as a convenience for callers
    /// that were not handed an explicit revision.
    pub async fn head_revision(&self) -> DocforgeResult<Revision> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(["rev-parse", "HEAD"])
            .output()
            .await
            .map_err(|e| DocforgeError::RevisionUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(DocforgeError::RevisionUnavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if sha.is_empty() {
            return Err(DocforgeError::RevisionUnavailable(
                "git rev-parse returned nothing".to_string(),
            ));
        }
        Ok(Revision::new(sha))
    }
}

#[async_trait]
impl CommitMetadata for GitMetadata {
    async fn commit_time(&self, revision: &Revision) -> DocforgeResult<Option<DateTime<Utc>>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_dir)
            .args(["show", "-s", "--format=%ct"])
            .arg(revision.as_str())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) => {
                debug!("git unavailable: {e}");
                return Ok(None);
            }
        };

        if !output.status.success() {
            debug!(
                revision = %revision.short(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git show failed"
            );
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.trim().parse::<i64>() {
            Ok(secs) => Ok(DateTime::<Utc>::from_timestamp(secs, 0)),
            Err(_) => {
                debug!(revision = %revision.short(), "malformed commit time");
                Ok(None)
            }
        }
    }
}

/// Derive the canonical timestamp for a revision.
///
/// Never fails: metadata errors and absent metadata both degrade to the
/// fixed fallback so two runs of the same revision always agree.
pub async fn resolve_timestamp(
    provider: &dyn CommitMetadata,
    revision: &Revision,
) -> CommitTimestamp {
    match provider.commit_time(revision).await {
        Ok(Some(dt)) => CommitTimestamp::from_epoch_secs(dt.timestamp()),
        Ok(None) => {
            warn!(revision = %revision.short(), "commit metadata unavailable, using fallback timestamp");
            CommitTimestamp::fallback()
        }
        Err(e) => {
            warn!(revision = %revision.short(), "commit metadata error ({e}), using fallback timestamp");
            CommitTimestamp::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMetadata(Option<i64>);

    #[async_trait]
    impl CommitMetadata for FixedMetadata {
        async fn commit_time(&self, _revision: &Revision) -> DocforgeResult<Option<DateTime<Utc>>> {
            Ok(self.0.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)))
        }
    }

    struct BrokenMetadata;

    #[async_trait]
    impl CommitMetadata for BrokenMetadata {
        async fn commit_time(&self, _revision: &Revision) -> DocforgeResult<Option<DateTime<Utc>>> {
            Err(DocforgeError::Internal("introspection broke".to_string()))
        }
    }

    #[test]
    fn formats_canonical_utc() {
        // 2024-03-01 10:00:00 UTC
        let ts = CommitTimestamp::from_epoch_secs(1_709_287_200);
        assert_eq!(ts.formatted(), "2024-03-01 10:00:00");
    }

    #[test]
    fn fallback_is_1980() {
        assert_eq!(CommitTimestamp::fallback().formatted(), "1980-01-01 00:00:00");
    }

    #[test]
    fn parse_round_trips() {
        let ts = CommitTimestamp::parse("2024-03-01 10:00:00").unwrap();
        assert_eq!(ts.epoch_secs(), 1_709_287_200);
        assert_eq!(CommitTimestamp::parse(&ts.formatted()).unwrap(), ts);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(CommitTimestamp::parse("not a timestamp").is_err());
    }

    #[tokio::test]
    async fn resolver_is_stable_per_revision() {
        let provider = FixedMetadata(Some(1_709_287_200));
        let rev = Revision::new("abc123");

        let first = resolve_timestamp(&provider, &rev).await;
        let second = resolve_timestamp(&provider, &rev).await;
        assert_eq!(first, second);
        assert_eq!(first.formatted(), "2024-03-01 10:00:00");
    }

    #[tokio::test]
    async fn resolver_falls_back_on_absent_metadata() {
        let provider = FixedMetadata(None);
        let rev = Revision::new("abc123");
        let ts = resolve_timestamp(&provider, &rev).await;
        assert_eq!(ts, CommitTimestamp::fallback());
    }

    #[tokio::test]
    async fn resolver_falls_back_on_metadata_error() {
        let rev = Revision::new("abc123");
        let ts = resolve_timestamp(&BrokenMetadata, &rev).await;
        assert_eq!(ts, CommitTimestamp::fallback());
    }

    #[test]
    fn revision_short_caps_length() {
        assert_eq!(Revision::new("abcdef0123456789").short(), "abcdef012345");
        assert_eq!(Revision::new("abc").short(), "abc");
    }
}
