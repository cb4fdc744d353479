// Initialization utilities for the CLI
//
// Configuration resolution and logging/tracing setup

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use s3dbconv_config::{
    load_from_file_path, load_or_default, LoggingConfig, Platform, RuntimeConfig, StorageBackend,
};

/// Command-line settings that win over every other source
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub storage_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Resolve configuration from an explicit file or the default locations,
/// then apply command-line overrides.
pub fn load_config(path: Option<&Path>, overrides: &CliOverrides) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => load_from_file_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_or_default(Platform::Cli).context("Failed to load configuration")?,
    };

    apply_cli_overrides(&mut config, overrides)?;
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut RuntimeConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(path) = &overrides.storage_path {
        if config.storage.backend != StorageBackend::Fs {
            bail!(
                "--storage-path only works with the filesystem backend, but backend is '{}'",
                config.storage.backend
            );
        }
        config.storage.fs.get_or_insert_with(Default::default).path =
            path.to_string_lossy().to_string();
    }

    if let Some(level) = &overrides.log_level {
        config
            .logging
            .get_or_insert_with(LoggingConfig::default)
            .level = level.clone();
    }

    Ok(())
}

/// Initialize tracing/logging from RuntimeConfig
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing(config: &RuntimeConfig) {
    use s3dbconv_config::LogFormat;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logging = config.logging();
    let env_filter =
        EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}
