use anyhow::{anyhow, Context, Result};

use crate::{FsConfig, LogFormat, LoggingConfig, RuntimeConfig, S3Config, StorageBackend};

pub const ENV_PREFIX: &str = "S3DBCONV_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the S3DBCONV_ prefix
    /// Used for AWS standard variables (AWS_REGION, AWS_ENDPOINT_URL)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid S3DBCONV_STORAGE_BACKEND value")?;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage
    if let Some(bucket) = get_env_string(env, "S3_BUCKET") {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = get_env_string(env, "S3_REGION") {
        ensure_s3(config).region = region;
    } else if let Some(region) = env.get_raw("AWS_REGION") {
        if config.storage.backend == StorageBackend::S3 {
            let s3 = ensure_s3(config);
            if s3.region.is_empty() {
                s3.region = region;
            }
        }
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    } else if let Some(endpoint) = env.get_raw("AWS_ENDPOINT_URL") {
        if config.storage.backend == StorageBackend::S3 {
            ensure_s3(config).endpoint = Some(endpoint);
        }
    }

    // Source layout
    if let Some(prefix) = get_env_string(env, "SOURCE_PREFIX") {
        // Normalize prefix: ensure it ends with "/" if non-empty
        config.source.prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix
        } else {
            format!("{}/", prefix)
        };
    }
    if let Some(file) = get_env_string(env, "METADATA_FILE") {
        config.source.metadata_file = file;
    }

    // Pipeline tuning
    if let Some(val) = get_env_usize(env, "FETCH_CONCURRENCY")? {
        config.pipeline.fetch_concurrency = val;
    }
    if let Some(val) = get_env_usize(env, "UPLOAD_CHUNK_BYTES")? {
        config.pipeline.upload_chunk_bytes = val;
    }
    if let Some(val) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.pipeline.parquet_row_group_size = val;
    }
    if let Some(column) = get_env_string(env, "SUB_PARTITION_COLUMN") {
        config.pipeline.sub_partition_column = column;
    }
    if let Some(columns) = get_env_string(env, "FALLBACK_NON_NULL_COLUMNS") {
        config.pipeline.fallback_non_null_columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL") {
        ensure_logging(config).level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT") {
        let parsed = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        ensure_logging(config).format = parsed;
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(|| S3Config {
        bucket: String::new(),
        region: String::new(),
        endpoint: None,
    })
}

fn ensure_logging(config: &mut RuntimeConfig) -> &mut LoggingConfig {
    config.logging.get_or_insert_with(LoggingConfig::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Option<String> {
    env.get(key)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
