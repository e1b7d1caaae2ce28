//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Docforge - Reproducible Documentation Build Pipeline
///
/// Runs the documentation pipeline for a source revision and packages
/// the result into a byte-for-byte reproducible archive.
#[derive(Parser, Debug)]
#[command(name = "docforge")]
#[command(author, version, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "DOCFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .docforge.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the documentation pipeline for a revision
    Run(RunArgs),

    /// Compare two archives, or an archive against a recorded hash
    Verify(VerifyArgs),

    /// Manage the release notes cache
    Cache(CacheArgs),

    /// Show or locate configuration
    Config(ConfigArgs),

    /// Initialize a project-local .docforge.toml config
    Init(InitArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Revision to build (defaults to the workspace HEAD)
    #[arg(short, long, env = "DOCFORGE_REVISION")]
    pub revision: Option<String>,

    /// Workspace directory (defaults to current directory)
    #[arg(short, long)]
    pub workspace: Option<PathBuf>,

    /// Archive output path (overrides configuration)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Skip the network entirely; notes come from cache or placeholder
    #[arg(long)]
    pub offline: bool,

    /// Re-fetch release notes even when a cached snapshot exists
    #[arg(long, conflicts_with = "offline")]
    pub refresh_notes: bool,
}

/// Arguments for the verify command
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Archive to verify
    pub archive: PathBuf,

    /// Second archive to compare against
    #[arg(required_unless_present = "hash", conflicts_with = "hash")]
    pub other: Option<PathBuf>,

    /// Expected SHA-256 to compare against
    #[arg(long)]
    pub hash: Option<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached release notes snapshots
    List {
        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove all cached snapshots
    Clear {
        /// Skip the confirmation requirement
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format for list commands
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the merged configuration
    Show,

    /// Print the config file path
    Path,
}

/// Arguments for the init command
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Overwrite existing .docforge.toml
    #[arg(short, long)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(short, long)]
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_requires_other_or_hash() {
        assert!(Cli::try_parse_from(["docforge", "verify", "a.tar.gz"]).is_err());
        assert!(Cli::try_parse_from(["docforge", "verify", "a.tar.gz", "b.tar.gz"]).is_ok());
        assert!(
            Cli::try_parse_from(["docforge", "verify", "a.tar.gz", "--hash", "deadbeef"]).is_ok()
        );
        assert!(Cli::try_parse_from([
            "docforge", "verify", "a.tar.gz", "b.tar.gz", "--hash", "deadbeef"
        ])
        .is_err());
    }

    #[test]
    fn offline_conflicts_with_refresh() {
        assert!(
            Cli::try_parse_from(["docforge", "run", "--offline", "--refresh-notes"]).is_err()
        );
        assert!(Cli::try_parse_from(["docforge", "run", "--offline"]).is_ok());
    }

    #[test]
    fn run_accepts_revision_flag() {
        let cli = Cli::try_parse_from(["docforge", "run", "--revision", "abc123"]).unwrap();
        match cli.command {
            Commands::Run(args) => assert_eq!(args.revision.as_deref(), Some("abc123")),
            _ => panic!("expected run command"),
        }
    }
}
