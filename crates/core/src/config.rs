//! Intake configuration
//!
//! Loaded from TOML (`intake.toml`). Every field has a default so a partial
//! file, or no file at all, yields a usable configuration:
//!
//! ```toml
//! [watch]
//! root = "/data/incoming"
//! recursive = true
//! quiescence_window_ms = 10000
//! settle_check = "event_time"
//! batch = false
//!
//! [classify]
//! ingest_extensions = ["tif", "tiff", "zvi"]
//! noise_extensions = ["txt"]
//!
//! [ignore]
//! use_ignore_file = true
//! patterns = ["scratch/"]
//!
//! [ingest]
//! command = ["importer", "--dataset", "42"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Upper bound accepted for the quiescence window (24 hours)
const MAX_QUIESCENCE_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// The configuration could not be rendered as TOML
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range or inconsistent
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete intake configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub classify: ClassifyConfig,

    #[serde(default)]
    pub ignore: IgnoreConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

/// What is watched and how files settle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory tree to observe
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Watch every subdirectory, including ones created later (default: true)
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// How long a file must stay unmodified before it is settled (default: 10s)
    #[serde(default = "default_quiescence_window_ms")]
    pub quiescence_window_ms: u64,

    /// When the modification time is consulted (default: event_time)
    #[serde(default)]
    pub settle_check: SettleCheck,

    /// Submit every file settled in the same drain as one request (default: false)
    #[serde(default)]
    pub batch: bool,
}

impl WatchConfig {
    /// Quiescence window as a `Duration`
    pub fn quiescence_window(&self) -> Duration {
        Duration::from_millis(self.quiescence_window_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            recursive: true,
            quiescence_window_ms: default_quiescence_window_ms(),
            settle_check: SettleCheck::default(),
            batch: false,
        }
    }
}

/// Source of the modification time used to decide that a file has settled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleCheck {
    /// Expiry is fixed from the mtime read when the event arrived
    #[default]
    EventTime,

    /// The mtime is read again when the expiry elapses; a newer write
    /// pushes the expiry forward instead of dispatching
    Recheck,
}

/// Extension lists driving the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Extensions handed to the ingestion backend
    #[serde(default = "default_ingest_extensions")]
    pub ingest_extensions: Vec<String>,

    /// Extensions that are expected but never ingested (sidecar files)
    #[serde(default = "default_noise_extensions")]
    pub noise_extensions: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            ingest_extensions: default_ingest_extensions(),
            noise_extensions: default_noise_extensions(),
        }
    }
}

/// Ignore rules configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Read `.intakeignore` at the watch root (default: true)
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for IgnoreConfig {
    fn default() -> Self {
        Self {
            use_ignore_file: true,
            patterns: vec![],
        }
    }
}

/// Ingestion backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Program and leading arguments; settled paths are appended.
    /// Empty means dry run.
    #[serde(default)]
    pub command: Vec<String>,
}

impl IntakeConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check ranges and cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let window = self.watch.quiescence_window_ms;
        if window == 0 || window > MAX_QUIESCENCE_WINDOW_MS {
            return Err(ConfigError::Invalid(format!(
                "watch.quiescence_window_ms must be between 1 and {} (got {})",
                MAX_QUIESCENCE_WINDOW_MS, window
            )));
        }

        check_extensions("classify.ingest_extensions", &self.classify.ingest_extensions)?;
        check_extensions("classify.noise_extensions", &self.classify.noise_extensions)?;

        for ext in &self.classify.ingest_extensions {
            let lower = ext.to_ascii_lowercase();
            if self
                .classify
                .noise_extensions
                .iter()
                .any(|noise| noise.to_ascii_lowercase() == lower)
            {
                return Err(ConfigError::Invalid(format!(
                    "extension '{}' is listed as both ingestible and noise",
                    ext
                )));
            }
        }

        if let Some(program) = self.ingest.command.first() {
            if program.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "ingest.command must start with a program name".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn check_extensions(field: &str, extensions: &[String]) -> Result<(), ConfigError> {
    for ext in extensions {
        if ext.is_empty() || ext.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "{} entries must be bare extensions like \"tif\" (got \"{}\")",
                field, ext
            )));
        }
    }
    Ok(())
}

/// Example configuration file contents
pub fn example_config() -> String {
    r#"# intake configuration

[watch]
# Directory tree to observe
root = "/data/incoming"
# Watch subdirectories, including ones created later
recursive = true
# A file must stay unmodified this long before it is ingested
quiescence_window_ms = 10000
# "event_time" or "recheck" (re-read the mtime when the window elapses)
settle_check = "event_time"
# Submit all files that settle together as one request
batch = false

[classify]
ingest_extensions = ["tif", "tiff", "zvi"]
noise_extensions = ["txt"]

[ignore]
# Read .intakeignore (gitignore syntax) at the watch root
use_ignore_file = true
patterns = []

[ingest]
# Program and leading arguments; settled paths are appended.
# Leave empty for a dry run that only logs.
command = []
"#
    .to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_quiescence_window_ms() -> u64 {
    10_000
}

fn default_ingest_extensions() -> Vec<String> {
    vec!["tif".to_string(), "tiff".to_string(), "zvi".to_string()]
}

fn default_noise_extensions() -> Vec<String> {
    vec!["txt".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IntakeConfig::default();
        assert!(config.watch.recursive);
        assert_eq!(config.watch.quiescence_window(), Duration::from_secs(10));
        assert_eq!(config.watch.settle_check, SettleCheck::EventTime);
        assert!(!config.watch.batch);
        assert_eq!(config.classify.ingest_extensions, vec!["tif", "tiff", "zvi"]);
        assert_eq!(config.classify.noise_extensions, vec!["txt"]);
        assert!(config.ingest.command.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = IntakeConfig::from_toml_str(
            r#"
            [watch]
            root = "/srv/drop"
            quiescence_window_ms = 250
            settle_check = "recheck"
            "#,
        )
        .unwrap();

        assert_eq!(config.watch.root, PathBuf::from("/srv/drop"));
        assert_eq!(config.watch.quiescence_window_ms, 250);
        assert_eq!(config.watch.settle_check, SettleCheck::Recheck);
        assert!(config.watch.recursive);
        assert_eq!(config.classify, ClassifyConfig::default());
    }

    #[test]
    fn test_example_config_parses() {
        let config = IntakeConfig::from_toml_str(&example_config()).unwrap();
        assert_eq!(config.watch.root, PathBuf::from("/data/incoming"));
        assert_eq!(config.classify, ClassifyConfig::default());
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = IntakeConfig::default();
        config.watch.batch = true;
        config.ingest.command = vec!["importer".to_string(), "-d".to_string(), "7".to_string()];

        let rendered = config.to_toml().unwrap();
        let parsed = IntakeConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = IntakeConfig::from_toml_str("[watch]\nquiescence_window_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_overlapping_extensions() {
        let err = IntakeConfig::from_toml_str(
            "[classify]\ningest_extensions = [\"tif\"]\nnoise_extensions = [\"TIF\"]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("both ingestible and noise"));
    }

    #[test]
    fn test_rejects_dotted_extension() {
        let err =
            IntakeConfig::from_toml_str("[classify]\ningest_extensions = [\".tif\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_blank_command() {
        let err = IntakeConfig::from_toml_str("[ingest]\ncommand = [\"  \"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_reports_parse_errors_with_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("intake.toml");
        std::fs::write(&path, "[watch\nroot = 1").unwrap();

        let err = IntakeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("intake.toml"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = IntakeConfig::load(&temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
