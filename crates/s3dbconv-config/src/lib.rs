// s3dbconv-config - Runtime configuration for the CLI and Lambda entry points
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from S3DBCONV_CONFIG env var
// 3. Config file contents from S3DBCONV_CONFIG_CONTENT env var
// 4. Default config file location (./s3dbconv.toml)
// 5. Platform-specific defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults};
pub use sources::{load_config, load_from_file_path, load_or_default};

pub use s3dbconv_core::DEFAULT_SOURCE_PREFIX;
use s3dbconv_core::encoding::DEFAULT_ROW_GROUP_SIZE;
use s3dbconv_core::{DEFAULT_SPLIT_COLUMN, FALLBACK_NON_NULL_COLUMNS};

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Where source objects and their dataset metadata live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_prefix")]
    pub prefix: String,
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
}

fn default_source_prefix() -> String {
    DEFAULT_SOURCE_PREFIX.to_string()
}

fn default_metadata_file() -> String {
    "METADATA.json".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            prefix: default_source_prefix(),
            metadata_file: default_metadata_file(),
        }
    }
}

/// Conversion pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Concurrent fetch+decode tasks per bucket
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    /// Part size for multi-part uploads
    #[serde(default = "default_upload_chunk_bytes")]
    pub upload_chunk_bytes: usize,
    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,
    /// Column whose hour assigns rows to hourly outputs
    #[serde(default = "default_sub_partition_column")]
    pub sub_partition_column: String,
    /// Non-nullable columns used when a dataset's superkey is unusable
    #[serde(default = "default_fallback_non_null_columns")]
    pub fallback_non_null_columns: Vec<String>,
}

fn default_fetch_concurrency() -> usize {
    10
}

fn default_upload_chunk_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_parquet_row_group_size() -> usize {
    DEFAULT_ROW_GROUP_SIZE
}

fn default_sub_partition_column() -> String {
    DEFAULT_SPLIT_COLUMN.to_string()
}

fn default_fallback_non_null_columns() -> Vec<String> {
    FALLBACK_NON_NULL_COLUMNS.iter().map(|c| c.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_concurrency: default_fetch_concurrency(),
            upload_chunk_bytes: default_upload_chunk_bytes(),
            parquet_row_group_size: default_parquet_row_group_size(),
            sub_partition_column: default_sub_partition_column(),
            fallback_non_null_columns: default_fallback_non_null_columns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        let platform = Platform::detect();
        sources::load_config(platform)
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform)
    }

    pub fn from_platform_defaults(platform: Platform) -> Self {
        let defaults = platform.defaults();
        let storage = match defaults.storage_backend {
            StorageBackend::Fs => StorageConfig {
                backend: StorageBackend::Fs,
                fs: Some(FsConfig::default()),
                s3: None,
            },
            StorageBackend::S3 => StorageConfig {
                backend: StorageBackend::S3,
                fs: None,
                s3: Some(S3Config {
                    bucket: defaults.s3_bucket.to_string(),
                    region: defaults.s3_region.to_string(),
                    endpoint: None,
                }),
            },
        };

        Self {
            storage,
            source: SourceConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: Some(LoggingConfig {
                level: "info".to_string(),
                format: defaults.log_format,
            }),
        }
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.storage = other.storage;
        self.source = other.source;
        self.pipeline = other.pipeline;

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Logging settings, falling back to text at `info`.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert_eq!("aws".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.fetch_concurrency, 10);
        assert_eq!(pipeline.upload_chunk_bytes, 8 * 1024 * 1024);
        assert_eq!(pipeline.sub_partition_column, "target_start");
        assert_eq!(
            pipeline.fallback_non_null_columns,
            ["target_start", "target_end", "release_date", "tag"]
        );
        assert_eq!(
            pipeline.fallback_non_null_columns,
            FALLBACK_NON_NULL_COLUMNS.map(String::from)
        );
        assert_eq!(pipeline.parquet_row_group_size, DEFAULT_ROW_GROUP_SIZE);

        let source = SourceConfig::default();
        assert_eq!(source.prefix, "version5/aurora/gz/");
        assert_eq!(source.metadata_file, "METADATA.json");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: RuntimeConfig = toml::from_str(
            r#"
            [storage]
            backend = "fs"

            [storage.fs]
            path = "/tmp/s3dbconv"

            [pipeline]
            fetch_concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.fetch_concurrency, 4);
        assert_eq!(config.pipeline.upload_chunk_bytes, 8 * 1024 * 1024);
        assert_eq!(config.source.prefix, DEFAULT_SOURCE_PREFIX);
        assert!(config.logging.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_keeps_platform_logging_when_file_has_none() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        let file: RuntimeConfig = toml::from_str(
            r#"
            [storage]
            backend = "s3"

            [storage.s3]
            bucket = "converted-data"
            region = "us-west-2"
            "#,
        )
        .unwrap();
        config.merge(file);

        assert_eq!(config.logging().format, LogFormat::Json);
        assert_eq!(config.storage.s3.as_ref().unwrap().bucket, "converted-data");
    }
}
