//! Config command - show or locate configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::Config;
use crate::error::DocforgeResult;
use std::path::Path;

/// Execute the config command
pub async fn execute(args: ConfigArgs, config: &Config, config_path: &Path) -> DocforgeResult<()> {
    match args.action {
        ConfigAction::Show => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
            Ok(())
        }
    }
}
