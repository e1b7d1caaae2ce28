//! Docforge - Reproducible Documentation Build Pipeline
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use docforge::cli::{Cli, Commands};
use docforge::config::ConfigManager;
use docforge::error::DocforgeResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> DocforgeResult<()> {
    let cli = Cli::parse();

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("docforge=warn"),
        1 => EnvFilter::new("docforge=info"),
        _ => EnvFilter::new("docforge=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    // Init command doesn't need config loading
    let command = match cli.command {
        Commands::Init(args) => return docforge::cli::commands::init(args).await,
        other => other,
    };

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| docforge::error::DocforgeError::io("getting current directory", e))?;
        let found = ConfigManager::find_local_config(&cwd);
        if let Some(ref path) = found {
            debug!("Found local config: {}", path.display());
        }
        found
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    // Dispatch to command
    match command {
        Commands::Init(_) => unreachable!("Init handled above"),
        Commands::Run(args) => {
            // The notes cache is durable state; make sure it exists
            // before the pipeline starts.
            ConfigManager::ensure_state_dirs().await?;
            docforge::cli::commands::run(args, &config).await
        }
        Commands::Verify(args) => docforge::cli::commands::verify(args).await,
        Commands::Cache(args) => docforge::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            docforge::cli::commands::config(args, &config, config_manager.path()).await
        }
    }
}
