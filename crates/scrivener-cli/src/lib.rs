//! Scrivener CLI library.
//!
//! Runs the dataset pipeline over local files with live progress, and
//! manages the shared TOML configuration.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use error::{CliError, Result};
pub use output::Formatter;
