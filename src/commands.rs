//! Command implementations behind the CLI
//!
//! Each command takes a resolved [`RuntimeConfig`] so tests can drive them
//! against a temporary filesystem root.

use anyhow::{Context, Result};
use s3dbconv_config::RuntimeConfig;
use s3dbconv_core::{ConversionJob, JobTarget};
use s3dbconv_handlers::{decode_job, plan_dataset, process_job, ProcessingResult};
use s3dbconv_writer::{copy_metadata_file, list_collections, list_datasets, StorageContext};
use tracing::info;

/// Decode and validate a payload without touching storage.
pub fn validate_payload(config: &RuntimeConfig, body: &str) -> Result<ConversionJob> {
    Ok(decode_job(body, &config.source.prefix)?)
}

/// Convert the sources named by one job payload.
pub async fn run_payload(config: &RuntimeConfig, body: &str) -> Result<ProcessingResult> {
    let job = validate_payload(config, body)?;
    let ctx = StorageContext::from_config(config).context("Failed to initialize storage")?;
    Ok(process_job(&ctx, &job, &config.pipeline).await?)
}

/// Parameters for planning one dataset's backfill
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub collection: String,
    pub dataset: String,
    pub target: JobTarget,
    /// Also copy the dataset's metadata file next to the outputs
    pub copy_metadata: bool,
}

/// Plan a dataset backfill and return one JSON payload per job.
pub async fn plan_jobs(config: &RuntimeConfig, request: &PlanRequest) -> Result<Vec<String>> {
    let ctx = StorageContext::from_config(config).context("Failed to initialize storage")?;
    let payloads = plan_dataset(&ctx, &request.collection, &request.dataset, &request.target).await?;

    if request.copy_metadata {
        let copied = copy_metadata_file(
            &ctx,
            &request.collection,
            &request.dataset,
            &request.target.dest_prefix,
        )
        .await?;
        if copied.is_none() {
            info!(
                collection = %request.collection,
                dataset = %request.dataset,
                "dataset has no metadata file to copy"
            );
        }
    }

    payloads
        .iter()
        .map(|payload| payload.to_json().context("Failed to serialize job payload"))
        .collect()
}

/// Collections under the source prefix, or datasets within `collection`.
pub async fn list_sources(config: &RuntimeConfig, collection: Option<&str>) -> Result<Vec<String>> {
    let ctx = StorageContext::from_config(config).context("Failed to initialize storage")?;
    let names = match collection {
        Some(collection) => list_datasets(&ctx, collection).await?,
        None => list_collections(&ctx).await?,
    };
    Ok(names)
}
