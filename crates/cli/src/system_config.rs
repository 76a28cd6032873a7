//! Configuration file discovery
//!
//! Lookup order: an explicit `--config` path, `./intake.toml`, then
//! `<config dir>/intake/config.toml`. With none of them present the built-in
//! defaults apply.

use anyhow::{Context, Result};
use intake_core::IntakeConfig;
use std::path::{Path, PathBuf};

/// Per-directory configuration file name
pub const LOCAL_CONFIG_FILE: &str = "intake.toml";

/// Per-user configuration file, if the platform has a config directory
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("intake").join("config.toml"))
}

/// Configuration file that would be used, `None` meaning defaults
pub fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(resolve_path_in(&cwd, explicit, user_config_path()))
}

fn resolve_path_in(cwd: &Path, explicit: Option<&Path>, user: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        // Reported as missing when loaded rather than silently skipped
        return Some(path.to_path_buf());
    }

    let local = cwd.join(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    user.filter(|path| path.is_file())
}

/// Load the effective configuration and report where it came from
pub fn load(explicit: Option<&Path>) -> Result<(IntakeConfig, Option<PathBuf>)> {
    let Some(path) = resolve_path(explicit)? else {
        return Ok((IntakeConfig::default(), None));
    };

    let config = IntakeConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    Ok((config, Some(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_wins() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(LOCAL_CONFIG_FILE), "").unwrap();
        let explicit = temp_dir.path().join("elsewhere.toml");

        let resolved = resolve_path_in(temp_dir.path(), Some(&explicit), None);
        assert_eq!(resolved, Some(explicit));
    }

    #[test]
    fn test_local_file_before_user_file() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("user.toml");
        fs::write(&user, "").unwrap();

        assert_eq!(
            resolve_path_in(temp_dir.path(), None, Some(user.clone())),
            Some(user.clone())
        );

        let local = temp_dir.path().join(LOCAL_CONFIG_FILE);
        fs::write(&local, "").unwrap();
        assert_eq!(resolve_path_in(temp_dir.path(), None, Some(user)), Some(local));
    }

    #[test]
    fn test_defaults_when_nothing_exists() {
        let temp_dir = TempDir::new().unwrap();
        let user = temp_dir.path().join("missing/config.toml");

        assert_eq!(resolve_path_in(temp_dir.path(), None, Some(user)), None);
        assert_eq!(resolve_path_in(temp_dir.path(), None, None), None);
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");

        let err = load(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }
}
