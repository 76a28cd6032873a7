//! Configuration inspection command

use crate::system_config;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;

/// Print the effective configuration as TOML
pub fn run_show(config_path: Option<&Path>) -> Result<()> {
    let (config, source) = system_config::load(config_path)?;
    let rendered = config.to_toml().context("Failed to render configuration")?;

    match source {
        Some(path) => println!("{}", format!("# {}", path.display()).dimmed()),
        None => println!("{}", "# built-in defaults".dimmed()),
    }
    println!("{}", rendered);
    Ok(())
}

/// Print the configuration file in use, if any
pub fn run_path(config_path: Option<&Path>) -> Result<()> {
    match system_config::resolve_path(config_path)? {
        Some(path) => println!("{}", path.display()),
        None => {
            println!("{}", "No configuration file found, using defaults".yellow());
            if let Some(user) = system_config::user_config_path() {
                println!("  {}: ./{}", "searched".dimmed(), system_config::LOCAL_CONFIG_FILE);
                println!("  {}: {}", "searched".dimmed(), user.display());
            }
        }
    }
    Ok(())
}

/// Print an example configuration file
pub fn run_example() -> Result<()> {
    println!("{}", intake_core::example_config());
    Ok(())
}
