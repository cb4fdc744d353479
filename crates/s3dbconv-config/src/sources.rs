// Configuration source loading.
//
// Priority order:
// 1. Environment variables (S3DBCONV_* prefix)
// 2. Config file path from S3DBCONV_CONFIG
// 3. Inline config content from S3DBCONV_CONFIG_CONTENT
// 4. Default config file (./s3dbconv.toml)
// 5. Platform defaults (based on auto-detected Platform)

use std::env;
use std::path::Path;

use anyhow::{Context, Result};

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::platform::Platform;
use crate::RuntimeConfig;

const DEFAULT_CONFIG_FILE: &str = "./s3dbconv.toml";

/// Load configuration for the given platform from files and the environment.
pub fn load_config(platform: Platform) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_platform_defaults(platform);

    if let Some(file_config) = load_from_file()? {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("S3DBCONV_CONFIG") {
        return parse_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var("S3DBCONV_CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from S3DBCONV_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return parse_file(default_path).map(Some);
    }

    Ok(None)
}

fn parse_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let file_config = parse_file(path.as_ref())?;

    let mut config = RuntimeConfig::from_platform_defaults(Platform::detect());
    config.merge(file_config);

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration with graceful fallback to defaults.
/// Unreadable or missing config files are ignored.
pub fn load_or_default(platform: Platform) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_platform_defaults(platform);

    if let Ok(Some(file_config)) = load_from_file() {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageBackend;
    use std::io::Write;

    #[test]
    fn platform_defaults_match_expectations() {
        let cli = RuntimeConfig::from_platform_defaults(Platform::Cli);
        assert_eq!(cli.storage.backend, StorageBackend::Fs);
        assert!(cli.storage.fs.is_some());

        let lambda = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        assert_eq!(lambda.storage.backend, StorageBackend::S3);
        assert_eq!(lambda.storage.s3.unwrap().region, "us-east-1");
    }

    #[test]
    fn parses_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [storage]
            backend = "fs"

            [storage.fs]
            path = "/var/lib/s3dbconv"

            [source]
            prefix = "archive/gz/"
            "#
        )
        .unwrap();

        let config = parse_file(file.path()).unwrap();
        assert_eq!(config.source.prefix, "archive/gz/");
        assert_eq!(config.source.metadata_file, "METADATA.json");
        assert_eq!(config.storage.fs.unwrap().path, "/var/lib/s3dbconv");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(parse_file(Path::new("/nonexistent/s3dbconv.toml")).is_err());
    }
}
