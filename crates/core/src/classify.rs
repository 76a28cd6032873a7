//! Extension-based file classification
//!
//! Decides what happens to a settled file purely from its name.

use crate::config::ClassifyConfig;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// What to do with a settled file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Hand the file to the ingestion backend
    Ingest,
    /// Unrecognized extension, logged and dropped
    Ignore,
    /// Known noise (sidecar files), noted and dropped
    SkipNotice,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Disposition::Ingest => "ingest",
            Disposition::Ignore => "ignore",
            Disposition::SkipNotice => "skip",
        };
        f.write_str(label)
    }
}

/// Maps file names to a [`Disposition`] by case-insensitive extension
#[derive(Debug, Clone)]
pub struct ExtensionClassifier {
    ingest: HashSet<String>,
    noise: HashSet<String>,
}

impl ExtensionClassifier {
    /// Build from extension lists (matched case-insensitively)
    pub fn new<I, N, S, T>(ingest: I, noise: N) -> Self
    where
        I: IntoIterator<Item = S>,
        N: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self {
            ingest: ingest
                .into_iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
            noise: noise
                .into_iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self::new(&config.ingest_extensions, &config.noise_extensions)
    }

    /// Classify a path by the extension of its final component
    ///
    /// Ingest wins over noise if a caller configured both for one extension.
    pub fn classify(&self, path: &Path) -> Disposition {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Disposition::Ignore;
        };

        match extension_of(name) {
            Some(ext) if self.ingest.contains(&ext) => Disposition::Ingest,
            Some(ext) if self.noise.contains(&ext) => Disposition::SkipNotice,
            _ => Disposition::Ignore,
        }
    }
}

impl Default for ExtensionClassifier {
    fn default() -> Self {
        Self::from_config(&ClassifyConfig::default())
    }
}

/// Lower-cased text after the last `.` of a file name
///
/// `None` when the name has no `.` at all. A trailing dot gives `Some("")`.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.')
        .map(|idx| name[idx + 1..].to_ascii_lowercase())
}
