//! Core types for Intake
//!
//! This crate provides:
//! - Configuration model (TOML)
//! - Extension classifier deciding what happens to a settled file
//! - The ingestion backend trait and built-in backends

pub mod classify;
pub mod config;
pub mod ingest;

// Re-exports
pub use classify::{Disposition, ExtensionClassifier};
pub use config::{
    example_config, ClassifyConfig, ConfigError, IgnoreConfig, IngestConfig, IntakeConfig,
    SettleCheck, WatchConfig,
};
pub use ingest::{ingestor_from_config, CommandIngestor, DryRunIngestor, IngestError, Ingestor};
