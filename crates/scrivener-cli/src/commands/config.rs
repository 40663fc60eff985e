//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config;
use crate::error::Result;
use crate::output::Formatter;
use scrivener_server::config::ScrivenerConfig;
use std::path::Path;

/// Execute config command.
pub fn execute_config(
    args: ConfigArgs,
    path: &Path,
    current: &ScrivenerConfig,
    formatter: &Formatter,
) -> Result<String> {
    match args.action {
        ConfigAction::Show => {
            let mut rendered = String::new();
            if !path.exists() {
                rendered.push_str(&formatter.info(&format!(
                    "{} not found, showing defaults",
                    path.display()
                )));
                rendered.push('\n');
            }
            rendered.push_str(&current.to_toml()?);
            Ok(rendered)
        }
        ConfigAction::Init { force } => {
            config::init(path, force)?;
            Ok(formatter.success(&format!("Configuration written to {}", path.display())))
        }
    }
}
