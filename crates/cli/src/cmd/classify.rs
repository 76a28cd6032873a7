//! Show classifier decisions for file names

use crate::system_config;
use anyhow::Result;
use intake_core::{Disposition, ExtensionClassifier};
use owo_colors::OwoColorize;
use std::path::Path;

pub fn run(config_path: Option<&Path>, names: &[String]) -> Result<()> {
    let (config, _) = system_config::load(config_path)?;
    let classifier = ExtensionClassifier::from_config(&config.classify);

    let width = names.iter().map(|name| name.len()).max().unwrap_or(0);
    for name in names {
        let disposition = classifier.classify(Path::new(name));
        let label = match disposition {
            Disposition::Ingest => disposition.green().to_string(),
            Disposition::SkipNotice => disposition.yellow().to_string(),
            Disposition::Ignore => disposition.dimmed().to_string(),
        };
        println!("{:width$}  {}", name, label, width = width);
    }

    Ok(())
}
