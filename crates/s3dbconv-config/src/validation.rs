// Configuration validation
//
// Validates that required fields are present and values are sensible

use anyhow::{anyhow, bail, Result};
use tracing::warn;

use crate::{PipelineConfig, RuntimeConfig, SourceConfig, StorageBackend, StorageConfig};

// S3 rejects multi-part uploads whose non-final parts are smaller than this.
const MIN_UPLOAD_CHUNK_BYTES: usize = 5 * 1024 * 1024;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.storage)?;
    validate_source_config(&config.source)?;
    validate_pipeline_config(&config.pipeline)?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!("storage.s3.bucket is required for S3 backend");
            }

            if s3.region.is_empty() {
                bail!("storage.s3.region is required for S3 backend");
            }
        }
    }

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if !config.prefix.is_empty() && !config.prefix.ends_with('/') {
        bail!("source.prefix must end with '/' (got '{}')", config.prefix);
    }

    if config.metadata_file.is_empty() || config.metadata_file.contains('/') {
        bail!("source.metadata_file must be a bare file name");
    }

    Ok(())
}

fn validate_pipeline_config(config: &PipelineConfig) -> Result<()> {
    if config.fetch_concurrency == 0 {
        bail!("pipeline.fetch_concurrency must be greater than 0");
    }

    if config.parquet_row_group_size == 0 {
        bail!("pipeline.parquet_row_group_size must be greater than 0");
    }

    if config.upload_chunk_bytes < MIN_UPLOAD_CHUNK_BYTES {
        bail!(
            "pipeline.upload_chunk_bytes must be at least {} bytes",
            MIN_UPLOAD_CHUNK_BYTES
        );
    }

    if config.sub_partition_column.is_empty() {
        bail!("pipeline.sub_partition_column must not be empty");
    }

    if config.fallback_non_null_columns.is_empty() {
        warn!("pipeline.fallback_non_null_columns is empty; all columns stay nullable on fallback");
    }

    // Every in-flight fetch holds a decompressed table in memory
    if config.fetch_concurrency > 64 {
        warn!(
            fetch_concurrency = config.fetch_concurrency,
            "pipeline.fetch_concurrency is very large; may cause memory issues"
        );
    }

    Ok(())
}
