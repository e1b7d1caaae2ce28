//! Cache command - inspect and clear the release notes cache

use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::DocforgeResult;
use crate::notes::NotesStore;
use console::style;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> DocforgeResult<()> {
    let dir = config
        .notes
        .cache_dir
        .clone()
        .unwrap_or_else(ConfigManager::notes_cache_dir);
    let store = NotesStore::new(dir);

    match args.action {
        CacheAction::List { format } => list(&store, format).await,
        CacheAction::Clear { yes } => clear(&store, yes).await,
    }
}

async fn list(store: &NotesStore, format: OutputFormat) -> DocforgeResult<()> {
    let entries = store.list().await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = entries
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "revision": e.revision,
                        "fetched_at": e.fetched_at.to_rfc3339(),
                        "digest": e.digest,
                        "size": e.content.len(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No cached release notes.");
                return Ok(());
            }
            println!(
                "{:<16} {:<25} {:<14} {:>8}",
                style("REVISION").bold(),
                style("FETCHED").bold(),
                style("DIGEST").bold(),
                style("SIZE").bold()
            );
            for entry in entries {
                let revision = entry.revision.chars().take(12).collect::<String>();
                let digest = entry.digest.chars().take(12).collect::<String>();
                println!(
                    "{:<16} {:<25} {:<14} {:>8}",
                    revision,
                    entry.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    digest,
                    entry.content.len(),
                );
            }
        }
    }

    Ok(())
}

async fn clear(store: &NotesStore, yes: bool) -> DocforgeResult<()> {
    if !yes {
        println!("This removes every cached release notes snapshot.");
        println!("Re-run with {} to confirm.", style("--yes").bold());
        return Ok(());
    }

    let removed = store.clear().await?;
    println!("{} Removed {removed} cached snapshot(s)", style("✓").green());
    Ok(())
}
