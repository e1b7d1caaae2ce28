//! Release notes fetch with cache-first degradation
//!
//! `NotesFetcher::fetch` never returns an error. The result always
//! carries content plus a [`SourceStatus`] saying how it was obtained,
//! and the caller decides what to log or surface.

use crate::error::{DocforgeError, DocforgeResult};
use crate::notes::store::{CacheEntry, NotesStore};
use crate::revision::Revision;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the returned notes content was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    /// Live fetch succeeded, or a prior successful fetch for this exact
    /// revision was served from the cache.
    Fresh,
    /// Live fetch failed; content is the last successfully cached value.
    StaleFallback,
    /// Live fetch failed and nothing was cached; content is empty.
    Missing,
}

impl SourceStatus {
    /// Whether the result came from a degraded path.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Self::Fresh)
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::StaleFallback => write!(f, "stale-fallback"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Outcome of a notes fetch. Always valid to package.
#[derive(Debug, Clone)]
pub struct NotesFetch {
    pub content: String,
    pub status: SourceStatus,
}

/// External notes endpoint collaborator.
#[async_trait]
pub trait NotesEndpoint: Send + Sync {
    async fn get(&self, url: &str) -> DocforgeResult<String>;
}

/// HTTP GET against the configured endpoint with a bounded timeout.
pub struct HttpEndpoint {
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl NotesEndpoint for HttpEndpoint {
    async fn get(&self, url: &str) -> DocforgeResult<String> {
        let request_url = url.to_string();
        let timeout = self.timeout;

        // ureq is a blocking client, so the call runs on the blocking
        // pool with a global timeout covering connect and body read.
        let result = tokio::task::spawn_blocking(move || -> Result<String, String> {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();

            let mut response = agent.get(&request_url).call().map_err(|e| e.to_string())?;
            let bytes = response
                .body_mut()
                .read_to_vec()
                .map_err(|e| format!("reading body: {e}"))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        })
        .await;

        match result {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(reason)) => Err(DocforgeError::TransientNetwork {
                url: url.to_string(),
                reason,
            }),
            Err(e) => Err(DocforgeError::TransientNetwork {
                url: url.to_string(),
                reason: format!("fetch task aborted: {e}"),
            }),
        }
    }
}

/// Endpoint that always fails, for `--offline` runs and tests.
pub struct OfflineEndpoint;

#[async_trait]
impl NotesEndpoint for OfflineEndpoint {
    async fn get(&self, url: &str) -> DocforgeResult<String> {
        Err(DocforgeError::TransientNetwork {
            url: url.to_string(),
            reason: "offline mode".to_string(),
        })
    }
}

/// Revision-addressed notes retrieval over a persistent cache.
pub struct NotesFetcher {
    store: NotesStore,
    endpoint: Arc<dyn NotesEndpoint>,
    url_template: String,
}

impl NotesFetcher {
    pub fn new(store: NotesStore, endpoint: Arc<dyn NotesEndpoint>, url_template: String) -> Self {
        Self {
            store,
            endpoint,
            url_template,
        }
    }

    fn url_for(&self, revision: &Revision) -> String {
        self.url_template.replace("{revision}", revision.as_str())
    }

    /// Fetch notes for a revision.
    ///
    /// With `refresh` false, a cached entry for this exact revision is
    /// served without touching the network. With `refresh` true the
    /// endpoint is tried first and the cache only backs the fallback.
    ///
    /// This method cannot fail. Network and cache-read problems degrade
    /// the status; a failed cache write is logged and the fresh content
    /// still returned.
    pub async fn fetch(&self, revision: &Revision, refresh: bool) -> NotesFetch {
        let cached = self.store.load(revision.as_str()).await;

        if !refresh {
            if let Some(entry) = &cached {
                debug!(revision = %revision.short(), "serving release notes from cache");
                return NotesFetch {
                    content: entry.content.clone(),
                    status: SourceStatus::Fresh,
                };
            }
        }

        let url = self.url_for(revision);
        match self.endpoint.get(&url).await {
            Ok(content) => {
                let entry = CacheEntry::new(revision.as_str(), content.clone());
                if let Err(e) = self.store.persist(&entry).await {
                    warn!("failed to persist release notes for {}: {e}", revision.short());
                }
                info!(revision = %revision.short(), "release notes fetched");
                NotesFetch {
                    content,
                    status: SourceStatus::Fresh,
                }
            }
            Err(e) => match cached {
                Some(entry) => {
                    warn!("release notes fetch failed ({e}); using cached snapshot");
                    NotesFetch {
                        content: entry.content,
                        status: SourceStatus::StaleFallback,
                    }
                }
                None => {
                    warn!("release notes fetch failed ({e}); no cached snapshot, using empty notes");
                    NotesFetch {
                        content: String::new(),
                        status: SourceStatus::Missing,
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingEndpoint {
        calls: AtomicUsize,
        response: Result<String, ()>,
    }

    impl CountingEndpoint {
        fn ok(body: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: Ok(body.to_string()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response: Err(()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NotesEndpoint for CountingEndpoint {
        async fn get(&self, url: &str) -> DocforgeResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(body) => Ok(body.clone()),
                Err(()) => Err(DocforgeError::TransientNetwork {
                    url: url.to_string(),
                    reason: "HTTP 500".to_string(),
                }),
            }
        }
    }

    fn fetcher(temp: &TempDir, endpoint: Arc<CountingEndpoint>) -> NotesFetcher {
        NotesFetcher::new(
            NotesStore::new(temp.path().join("cache")),
            endpoint,
            "https://example.com/notes/{revision}".to_string(),
        )
    }

    #[tokio::test]
    async fn successful_fetch_is_fresh_and_persisted() {
        let temp = TempDir::new().unwrap();
        let endpoint = CountingEndpoint::ok("v2.0 notes");
        let fetcher = fetcher(&temp, endpoint.clone());
        let rev = Revision::new("abc123");

        let result = fetcher.fetch(&rev, false).await;
        assert_eq!(result.status, SourceStatus::Fresh);
        assert_eq!(result.content, "v2.0 notes");
        assert_eq!(endpoint.call_count(), 1);
    }

    #[tokio::test]
    async fn second_fetch_makes_zero_network_calls() {
        let temp = TempDir::new().unwrap();
        let endpoint = CountingEndpoint::ok("v2.0 notes");
        let fetcher = fetcher(&temp, endpoint.clone());
        let rev = Revision::new("abc123");

        let first = fetcher.fetch(&rev, false).await;
        let second = fetcher.fetch(&rev, false).await;

        assert_eq!(endpoint.call_count(), 1);
        assert_eq!(first.content, second.content);
        assert_eq!(second.status, SourceStatus::Fresh);
    }

    #[tokio::test]
    async fn failure_without_cache_is_missing_and_empty() {
        let temp = TempDir::new().unwrap();
        let endpoint = CountingEndpoint::failing();
        let fetcher = fetcher(&temp, endpoint);
        let rev = Revision::new("abc123");

        let result = fetcher.fetch(&rev, false).await;
        assert_eq!(result.status, SourceStatus::Missing);
        assert!(result.content.is_empty());
    }

    #[tokio::test]
    async fn refresh_failure_falls_back_to_cached_content() {
        let temp = TempDir::new().unwrap();
        let rev = Revision::new("abc123");

        let ok = CountingEndpoint::ok("cached notes");
        fetcher(&temp, ok).fetch(&rev, false).await;

        let failing = CountingEndpoint::failing();
        let result = fetcher(&temp, failing.clone()).fetch(&rev, true).await;

        assert_eq!(failing.call_count(), 1);
        assert_eq!(result.status, SourceStatus::StaleFallback);
        assert_eq!(result.content, "cached notes");
    }

    #[tokio::test]
    async fn refresh_success_replaces_cached_content() {
        let temp = TempDir::new().unwrap();
        let rev = Revision::new("abc123");

        fetcher(&temp, CountingEndpoint::ok("old")).fetch(&rev, false).await;
        let result = fetcher(&temp, CountingEndpoint::ok("new")).fetch(&rev, true).await;
        assert_eq!(result.status, SourceStatus::Fresh);
        assert_eq!(result.content, "new");

        // The replacement is what later cache hits serve.
        let served = fetcher(&temp, CountingEndpoint::failing()).fetch(&rev, false).await;
        assert_eq!(served.content, "new");
    }

    #[tokio::test]
    async fn url_template_substitutes_revision() {
        let temp = TempDir::new().unwrap();
        let fetcher = fetcher(&temp, CountingEndpoint::ok("x"));
        assert_eq!(
            fetcher.url_for(&Revision::new("abc123")),
            "https://example.com/notes/abc123"
        );
    }

    #[tokio::test]
    async fn degraded_statuses_report_as_degraded() {
        assert!(!SourceStatus::Fresh.is_degraded());
        assert!(SourceStatus::StaleFallback.is_degraded());
        assert!(SourceStatus::Missing.is_degraded());
    }
}
