//! Run command - execute the documentation pipeline

use crate::cli::args::RunArgs;
use crate::config::{Config, ConfigManager};
use crate::docs::CommandDocGenerator;
use crate::error::{DocforgeError, DocforgeResult};
use crate::graph::scheduler::{RunReport, Scheduler};
use crate::graph::stage::{ArtifactStore, StageState};
use crate::notes::{HttpEndpoint, NotesEndpoint, NotesFetcher, NotesStore, OfflineEndpoint};
use crate::pipeline::{build_stages, stages, Collaborators, PipelineOptions};
use crate::revision::{GitMetadata, Revision};
use crate::runlog::RunLog;
use console::style;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> DocforgeResult<()> {
    let workspace = resolve_workspace(&args)?;
    debug!("Workspace: {}", workspace.display());

    let metadata = Arc::new(GitMetadata::new(workspace.clone()));
    let revision = match &args.revision {
        Some(id) => Revision::new(id.clone()),
        None => metadata.head_revision().await?,
    };
    println!(
        "{} Building revision {}",
        style("→").cyan(),
        style(revision.short()).bold()
    );

    let cache_dir = config
        .notes
        .cache_dir
        .clone()
        .unwrap_or_else(ConfigManager::notes_cache_dir);
    let endpoint: Arc<dyn NotesEndpoint> = if args.offline {
        Arc::new(OfflineEndpoint)
    } else {
        Arc::new(HttpEndpoint::new(Duration::from_secs(
            config.notes.timeout_secs,
        )))
    };
    let fetcher = Arc::new(NotesFetcher::new(
        NotesStore::new(cache_dir),
        endpoint,
        config.notes.url.clone(),
    ));

    let generator = Arc::new(CommandDocGenerator::new(
        config.docs.command.clone(),
        config.docs.output_dir.clone(),
    ));

    let archive_path = resolve_archive_path(&args, config, &workspace);

    let stage_defs = build_stages(
        Collaborators {
            fetcher,
            metadata,
            generator,
        },
        PipelineOptions {
            workspace,
            archive_path: archive_path.clone(),
            refresh_notes: args.refresh_notes || config.notes.refresh,
            self_check: config.archive.self_check,
        },
    );

    let scheduler = Scheduler::new(
        stage_defs,
        Duration::from_secs(config.pipeline.run_timeout_secs),
    );
    let report = scheduler
        .execute(revision, Arc::new(ArtifactStore::new()))
        .await?;

    print_report(&report);
    RunLog::new(config).record(&report).await;

    if report.success {
        println!(
            "{} Archive written to {}",
            style("✓").green(),
            style(archive_path.display()).bold()
        );
        Ok(())
    } else {
        let failed = report.first_failure();
        Err(DocforgeError::StageFailed {
            stage: failed.map_or_else(|| "unknown".to_string(), |s| s.name.clone()),
            reason: failed
                .and_then(|s| s.detail.clone())
                .unwrap_or_else(|| "see stage report".to_string()),
        })
    }
}

fn resolve_workspace(args: &RunArgs) -> DocforgeResult<PathBuf> {
    if let Some(ref path) = args.workspace {
        return path.canonicalize().map_err(|e| {
            DocforgeError::io(format!("resolving workspace path {}", path.display()), e)
        });
    }
    env::current_dir().map_err(|e| DocforgeError::io("getting current directory", e))
}

fn resolve_archive_path(args: &RunArgs, config: &Config, workspace: &PathBuf) -> PathBuf {
    let configured = args.output.clone().unwrap_or_else(|| config.archive.output.clone());
    if configured.is_absolute() {
        configured
    } else {
        workspace.join(configured)
    }
}

fn print_report(report: &RunReport) {
    for stage in &report.stages {
        let symbol = match stage.state {
            StageState::Succeeded => style("✓").green(),
            StageState::Failed => style("✗").red(),
            StageState::SkippedUpstreamFailure => style("∅").yellow(),
            _ => style("?").dim(),
        };
        let mut line = format!("{symbol} {:<20} {:>6}ms", stage.name, stage.duration_ms);
        if let Some(detail) = &stage.detail {
            line.push_str(&format!("  {}", style(detail).dim()));
        }
        println!("{line}");

        // Surface notes degradation prominently; it does not fail the
        // run but operators should see it.
        if stage.name == stages::FETCH_NOTES
            && stage
                .detail
                .as_deref()
                .is_some_and(|d| d.contains("stale") || d.contains("missing") || d.contains("degraded"))
        {
            println!(
                "{} release notes degraded; archive uses fallback content",
                style("!").yellow()
            );
        }
    }
}
