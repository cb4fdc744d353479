//! Per-job conversion: group, build, normalize, split, encode, upload

use std::collections::HashMap;
use std::sync::Arc;

use s3dbconv_config::PipelineConfig;
use s3dbconv_core::{
    encode_table, group_keys, split_by_hour, AppliedSchema, Blake3Hash, ConversionJob,
    ConvertError, CsvParser, DelimitedParser, Granularity, JobSource, NullabilityPolicy,
    PartitionGroup, SubPartition,
};
use s3dbconv_writer::{
    build_table, load_dataset_metadata, log_memory, upload_object, StorageContext,
};
use tracing::{debug, info, warn};

use crate::error::JobError;

/// One uploaded output object
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenObject {
    pub key: String,
    pub rows: usize,
    pub bytes: usize,
    pub hash: Blake3Hash,
}

/// Result of processing a conversion job
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessingResult {
    pub objects: Vec<WrittenObject>,
    pub sources_processed: usize,
    pub records_processed: usize,
}

impl ProcessingResult {
    pub fn paths_written(&self) -> Vec<&str> {
        self.objects.iter().map(|o| o.key.as_str()).collect()
    }
}

/// Run a job with the default CSV parser.
pub async fn process_job(
    ctx: &StorageContext,
    job: &ConversionJob,
    pipeline: &PipelineConfig,
) -> Result<ProcessingResult, JobError> {
    process_job_with_parser(ctx, job, pipeline, Arc::new(CsvParser::default())).await
}

/// Run a job end to end.
///
/// The first failing step aborts the job. Objects already uploaded for
/// earlier partitions stay in place; rerunning the job overwrites them.
pub async fn process_job_with_parser(
    ctx: &StorageContext,
    job: &ConversionJob,
    pipeline: &PipelineConfig,
    parser: Arc<dyn DelimitedParser>,
) -> Result<ProcessingResult, JobError> {
    let params = &job.params;
    let groups = match &job.source {
        JobSource::Live(key) => {
            debug!(key = %key, "live job");
            group_keys([key], ctx.source_prefix(), params.granularity)?
        }
        JobSource::Backfill(keys) => {
            debug!(sources = keys.len(), "backfill job");
            group_keys(keys, ctx.source_prefix(), params.granularity)?
        }
    };

    info!(
        groups = groups.len(),
        granularity = %params.granularity,
        store = %params.dest_store,
        format = %params.file_format,
        compression = %params.codec,
        "processing job"
    );

    let mut superkeys: HashMap<(String, String), Option<Vec<String>>> = HashMap::new();
    let mut result = ProcessingResult::default();

    for group in &groups {
        let dataset = (group.key.collection.clone(), group.key.dataset.clone());
        let superkey = match superkeys.get(&dataset) {
            Some(superkey) => superkey.clone(),
            None => {
                let superkey = load_dataset_metadata(ctx, &dataset.0, &dataset.1)
                    .await?
                    .map(|meta| meta.superkey);
                superkeys.insert(dataset, superkey.clone());
                superkey
            }
        };

        let written =
            process_group(ctx, job, pipeline, Arc::clone(&parser), group, superkey).await?;
        result.sources_processed += group.members.len();
        result.records_processed += written.iter().map(|o| o.rows).sum::<usize>();
        result.objects.extend(written);
    }

    info!(
        objects = result.objects.len(),
        sources = result.sources_processed,
        rows = result.records_processed,
        "job complete"
    );
    Ok(result)
}

async fn process_group(
    ctx: &StorageContext,
    job: &ConversionJob,
    pipeline: &PipelineConfig,
    parser: Arc<dyn DelimitedParser>,
    group: &PartitionGroup,
    superkey: Option<Vec<String>>,
) -> Result<Vec<WrittenObject>, JobError> {
    let params = &job.params;
    let table = build_table(ctx, &group.keys(), parser).await?;

    let policy = NullabilityPolicy::new(superkey)
        .with_fallback(pipeline.fallback_non_null_columns.clone());
    let (table, applied) = policy.normalize(&table)?;
    if applied == AppliedSchema::Fallback {
        debug!(partition = %group.key, "using fallback non-null columns");
    }

    let parts = if params.granularity == Granularity::Hour {
        split_by_hour(&table, &pipeline.sub_partition_column)?
    } else {
        vec![SubPartition {
            start: group.key.start,
            table,
        }]
    };
    if parts.is_empty() {
        warn!(partition = %group.key, "no rows to write");
    }

    let layout = params.key_layout();
    let options = params.encode_options(pipeline.parquet_row_group_size);
    let mut written = Vec::with_capacity(parts.len());

    for part in parts {
        let key = layout.object_key(&group.key.collection, &group.key.dataset, part.start);
        let table = part.table;
        let encoded = tokio::task::spawn_blocking(move || encode_table(&table, &options))
            .await
            .map_err(|e| ConvertError::encode(format!("encode task failed: {e}")))??;
        log_memory("encoded object");

        let object = WrittenObject {
            key,
            rows: encoded.row_count,
            bytes: encoded.len(),
            hash: encoded.hash,
        };
        upload_object(ctx, &object.key, encoded.bytes).await?;
        info!(
            key = %object.key,
            rows = object.rows,
            bytes = object.bytes,
            hash = %object.hash,
            "object written"
        );
        written.push(object);
    }

    Ok(written)
}
