//! Init command - create project-local .docforge.toml

use crate::cli::args::InitArgs;
use crate::config::LOCAL_CONFIG_FILE;
use crate::error::{DocforgeError, DocforgeResult};
use console::style;
use tokio::fs;

/// Template for project-local config
const INIT_TEMPLATE: &str = r#"# Docforge project configuration
# Settings here override your global config (~/.config/docforge/config.toml)

[notes]
# url = "https://example.com/release-notes/{revision}"
# timeout_secs = 30
# refresh = false

[docs]
# command = ["cargo", "doc", "--no-deps"]
# output_dir = "target/doc"

[archive]
# output = "docs.tar.gz"
# self_check = true

[pipeline]
# run_timeout_secs = 1800
"#;

/// Execute the init command
pub async fn execute(args: InitArgs) -> DocforgeResult<()> {
    let target_dir = match args.path {
        Some(ref p) => p.clone(),
        None => std::env::current_dir()
            .map_err(|e| DocforgeError::io("getting current directory", e))?,
    };

    let config_path = target_dir.join(LOCAL_CONFIG_FILE);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("!").yellow(),
            config_path.display()
        );
        return Ok(());
    }

    fs::write(&config_path, INIT_TEMPLATE)
        .await
        .map_err(|e| DocforgeError::io(format!("writing {}", config_path.display()), e))?;

    println!("{} Created {}", style("✓").green(), config_path.display());
    Ok(())
}
