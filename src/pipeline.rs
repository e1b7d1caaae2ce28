//! The documentation pipeline
//!
//! Four stages: fetch release notes and resolve the commit timestamp as
//! independent leaves, generate documentation, then assemble everything
//! into the reproducible archive. The notes fetch continues on failure,
//! a docs failure skips the archive stage, and an archive failure is
//! fatal.

use crate::archive::{assemble, compare, sha256_hex};
use crate::docs::{collect_tree, DocGenerator};
use crate::error::{DocforgeError, DocforgeResult};
use crate::graph::stage::{
    Artifact, ExecutionKind, FailurePolicy, StageContext, StageDef, StageMeta, StageOutput,
    StageRunner,
};
use crate::notes::{NotesFetcher, RELEASE_NOTES_FILE};
use crate::revision::{resolve_timestamp, CommitMetadata, CommitTimestamp};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Stage names, as they appear in reports and logs.
pub mod stages {
    pub const FETCH_NOTES: &str = "fetch-notes";
    pub const RESOLVE_TIMESTAMP: &str = "resolve-timestamp";
    pub const GENERATE_DOCS: &str = "generate-docs";
    pub const ASSEMBLE_ARCHIVE: &str = "assemble-archive";
}

/// Artifact references connecting the stages.
pub mod refs {
    pub const RELEASE_NOTES: &str = "release-notes";
    pub const COMMIT_TIMESTAMP: &str = "commit-timestamp";
    pub const APIDOCS: &str = "apidocs";
    pub const ARCHIVE: &str = "archive";
}

/// Directory prefix the generated documentation gets inside the archive.
const APIDOCS_PREFIX: &str = "apidocs";

/// External collaborators the pipeline is wired against.
pub struct Collaborators {
    pub fetcher: Arc<NotesFetcher>,
    pub metadata: Arc<dyn CommitMetadata>,
    pub generator: Arc<dyn DocGenerator>,
}

/// Knobs for one pipeline construction.
pub struct PipelineOptions {
    /// Workspace the docs command runs in.
    pub workspace: PathBuf,
    /// Where the archive lands.
    pub archive_path: PathBuf,
    /// Try the notes endpoint even on a cache hit.
    pub refresh_notes: bool,
    /// Re-derive the archive and require identical bytes before
    /// declaring the stage done.
    pub self_check: bool,
}

/// Build the stage definitions for one run.
pub fn build_stages(collaborators: Collaborators, options: PipelineOptions) -> Vec<StageDef> {
    let Collaborators {
        fetcher,
        metadata,
        generator,
    } = collaborators;

    vec![
        StageDef::new(
            StageMeta::new(
                stages::FETCH_NOTES,
                ExecutionKind::NetworkFetch,
                FailurePolicy::ContinueWithFallback,
            )
            .output(refs::RELEASE_NOTES),
            Arc::new(FetchNotesRunner {
                fetcher,
                refresh: options.refresh_notes,
            }),
        ),
        StageDef::new(
            StageMeta::new(
                stages::RESOLVE_TIMESTAMP,
                ExecutionKind::LocalCompute,
                FailurePolicy::ContinueWithFallback,
            )
            .output(refs::COMMIT_TIMESTAMP),
            Arc::new(ResolveTimestampRunner { metadata }),
        ),
        StageDef::new(
            StageMeta::new(
                stages::GENERATE_DOCS,
                ExecutionKind::LocalCompute,
                FailurePolicy::FailToStartDownstream,
            )
            .output(refs::APIDOCS),
            Arc::new(GenerateDocsRunner {
                generator,
                workspace: options.workspace,
            }),
        ),
        StageDef::new(
            StageMeta::new(
                stages::ASSEMBLE_ARCHIVE,
                ExecutionKind::Package,
                FailurePolicy::Fatal,
            )
            .input(refs::RELEASE_NOTES)
            .input(refs::COMMIT_TIMESTAMP)
            .input(refs::APIDOCS)
            .output(refs::ARCHIVE),
            Arc::new(AssembleArchiveRunner {
                archive_path: options.archive_path,
                self_check: options.self_check,
            }),
        ),
    ]
}

struct FetchNotesRunner {
    fetcher: Arc<NotesFetcher>,
    refresh: bool,
}

#[async_trait]
impl StageRunner for FetchNotesRunner {
    async fn run(&self, ctx: &StageContext) -> DocforgeResult<StageOutput> {
        let fetch = self.fetcher.fetch(&ctx.revision, self.refresh).await;
        Ok(StageOutput::default()
            .publish(
                refs::RELEASE_NOTES,
                vec![Artifact::new(RELEASE_NOTES_FILE, fetch.content.into_bytes())],
            )
            .note(format!("notes {}", fetch.status)))
    }
}

struct ResolveTimestampRunner {
    metadata: Arc<dyn CommitMetadata>,
}

#[async_trait]
impl StageRunner for ResolveTimestampRunner {
    async fn run(&self, ctx: &StageContext) -> DocforgeResult<StageOutput> {
        let timestamp = resolve_timestamp(self.metadata.as_ref(), &ctx.revision).await;
        Ok(StageOutput::default()
            .publish(
                refs::COMMIT_TIMESTAMP,
                vec![Artifact::new(
                    refs::COMMIT_TIMESTAMP,
                    timestamp.formatted().into_bytes(),
                )],
            )
            .note(timestamp.formatted()))
    }
}

struct GenerateDocsRunner {
    generator: Arc<dyn DocGenerator>,
    workspace: PathBuf,
}

#[async_trait]
impl StageRunner for GenerateDocsRunner {
    async fn run(&self, _ctx: &StageContext) -> DocforgeResult<StageOutput> {
        let out = self.generator.generate(&self.workspace).await?;
        let files = collect_tree(&out, APIDOCS_PREFIX)?;
        let note = format!("{} files", files.len());
        Ok(StageOutput::default()
            .publish(refs::APIDOCS, files)
            .note(note))
    }
}

struct AssembleArchiveRunner {
    archive_path: PathBuf,
    self_check: bool,
}

impl AssembleArchiveRunner {
    fn timestamp_from(ctx: &StageContext) -> DocforgeResult<CommitTimestamp> {
        let artifacts = ctx
            .input(refs::COMMIT_TIMESTAMP)
            .ok_or_else(|| DocforgeError::Internal("timestamp input not published".to_string()))?;
        let artifact = artifacts
            .first()
            .ok_or_else(|| DocforgeError::Internal("timestamp artifact set is empty".to_string()))?;
        CommitTimestamp::parse(&String::from_utf8_lossy(&artifact.bytes))
    }
}

#[async_trait]
impl StageRunner for AssembleArchiveRunner {
    async fn run(&self, ctx: &StageContext) -> DocforgeResult<StageOutput> {
        let timestamp = Self::timestamp_from(ctx)?;

        let mut artifacts = ctx
            .input(refs::RELEASE_NOTES)
            .ok_or_else(|| DocforgeError::Internal("notes input not published".to_string()))?;
        artifacts.extend(
            ctx.input(refs::APIDOCS)
                .ok_or_else(|| DocforgeError::Internal("docs input not published".to_string()))?,
        );

        let bytes = assemble(&ctx.revision, &timestamp, &artifacts)?;

        if self.self_check {
            // Independent re-derivation; any disagreement means packaging
            // picked up something nondeterministic.
            let rederived = assemble(&ctx.revision, &timestamp, &artifacts)?;
            let report = compare(&bytes, &rederived);
            if !report.matches {
                return Err(DocforgeError::VerifyFailed {
                    detail: report
                        .first_divergence
                        .unwrap_or_else(|| "re-derived archive differs".to_string()),
                });
            }
        }

        if let Some(parent) = self.archive_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    DocforgeError::io(format!("creating {}", parent.display()), e)
                })?;
            }
        }

        // Write through a temp file so a failed run never leaves a
        // partially written archive at the published path.
        let tmp = self.archive_path.with_extension("tmp");
        fs::write(&tmp, &bytes)
            .await
            .map_err(|e| DocforgeError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &self.archive_path)
            .await
            .map_err(|e| {
                DocforgeError::io(format!("renaming into {}", self.archive_path.display()), e)
            })?;

        let hash = sha256_hex(&bytes);
        info!(path = %self.archive_path.display(), sha256 = %hash, "archive written");

        let file_name = self
            .archive_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive.tar.gz".to_string());

        Ok(StageOutput::default()
            .publish(refs::ARCHIVE, vec![Artifact::new(file_name, bytes)])
            .note(format!("sha256 {hash}")))
    }
}
