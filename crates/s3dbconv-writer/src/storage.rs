//! Storage operator construction and the per-process storage context
//!
//! The context is built explicitly and passed to every pipeline step, so a
//! test can bind one to an in-memory operator with [`StorageContext::new`].

use opendal::{services, Operator};
use s3dbconv_config::{
    PipelineConfig, RuntimeConfig, SourceConfig, StorageBackend, StorageConfig,
};
use s3dbconv_core::join_key;
use tracing::debug;

use crate::{Result, WriterError};

/// Build an OpenDAL operator for the configured backend.
pub fn build_operator(config: &StorageConfig) -> Result<Operator> {
    let operator = match config.backend {
        StorageBackend::Fs => {
            let fs = config.fs.as_ref().ok_or_else(|| {
                WriterError::invalid_config("fs config required for filesystem backend")
            })?;

            let builder = services::Fs::default().root(&fs.path);
            Operator::new(builder)
                .map_err(|e| {
                    WriterError::invalid_config(format!(
                        "Failed to create filesystem operator: {e}"
                    ))
                })?
                .finish()
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| WriterError::invalid_config("s3 config required for S3 backend"))?;

            // Credentials come from the environment or the execution role
            let mut builder = services::S3::default()
                .bucket(&s3.bucket)
                .region(&s3.region);

            if let Some(endpoint) = &s3.endpoint {
                builder = builder.endpoint(endpoint);
            }

            Operator::new(builder)
                .map_err(|e| WriterError::invalid_config(format!("Failed to create S3 operator: {e}")))?
                .finish()
        }
    };

    debug!(backend = %config.backend, "Storage operator initialized");
    Ok(operator)
}

/// Object-store handle plus the layout and tuning every step needs
#[derive(Debug, Clone)]
pub struct StorageContext {
    operator: Operator,
    source_prefix: String,
    metadata_file: String,
    fetch_concurrency: usize,
    upload_chunk_bytes: usize,
}

impl StorageContext {
    /// Bind a context to an existing operator with default layout and tuning.
    pub fn new(operator: Operator) -> Self {
        let source = SourceConfig::default();
        let pipeline = PipelineConfig::default();
        Self {
            operator,
            source_prefix: source.prefix,
            metadata_file: source.metadata_file,
            fetch_concurrency: pipeline.fetch_concurrency,
            upload_chunk_bytes: pipeline.upload_chunk_bytes,
        }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self> {
        let operator = build_operator(&config.storage)?;
        Ok(Self::new(operator)
            .with_source_prefix(&config.source.prefix)
            .with_metadata_file(&config.source.metadata_file)
            .with_fetch_concurrency(config.pipeline.fetch_concurrency)
            .with_upload_chunk_bytes(config.pipeline.upload_chunk_bytes))
    }

    pub fn with_source_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.source_prefix = prefix.into();
        self
    }

    pub fn with_metadata_file(mut self, file: impl Into<String>) -> Self {
        self.metadata_file = file.into();
        self
    }

    /// Zero is treated as one.
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_upload_chunk_bytes(mut self, bytes: usize) -> Self {
        self.upload_chunk_bytes = bytes;
        self
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn source_prefix(&self) -> &str {
        &self.source_prefix
    }

    pub fn metadata_file(&self) -> &str {
        &self.metadata_file
    }

    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    pub fn upload_chunk_bytes(&self) -> usize {
        self.upload_chunk_bytes
    }

    /// `<source_prefix><collection>/<dataset>/`
    pub fn dataset_prefix(&self, collection: &str, dataset: &str) -> String {
        let mut prefix = join_key(&self.source_prefix, &[collection, dataset]);
        prefix.push('/');
        prefix
    }

    pub fn metadata_key(&self, collection: &str, dataset: &str) -> String {
        join_key(&self.source_prefix, &[collection, dataset, &self.metadata_file])
    }
}
