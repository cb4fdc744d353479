//! Source discovery and the I/O half of the table builder

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use futures::stream::{self, StreamExt, TryStreamExt};
use opendal::{EntryMode, ErrorKind};
use s3dbconv_core::{decode_source, merge_tables, ConvertError, DelimitedParser, SOURCE_SUFFIX};
use tracing::{debug, warn};

use crate::memory::log_memory;
use crate::{Result, StorageContext, WriterError};

/// Fetch and decode `keys` with at most `fetch_concurrency` in flight.
///
/// Tables come back in the order of `keys`. The first failure aborts the rest.
pub async fn fetch_tables(
    ctx: &StorageContext,
    keys: &[String],
    parser: Arc<dyn DelimitedParser>,
) -> Result<Vec<RecordBatch>> {
    let total = keys.len();
    stream::iter(keys.iter().enumerate())
        .map(|(idx, key)| {
            let parser = Arc::clone(&parser);
            async move {
                let bytes = ctx
                    .operator()
                    .read(key)
                    .await
                    .map_err(|e| WriterError::fetch(key, e))?
                    .to_vec();

                let table = tokio::task::spawn_blocking(move || {
                    decode_source(&bytes, parser.as_ref())
                })
                .await
                .map_err(|e| ConvertError::decode(format!("decode task for '{key}' failed: {e}")))?
                .inspect_err(|e| warn!(key = %key, error = %e, "failed to decode source"))?;

                debug!(key = %key, rows = table.num_rows(), "source decoded");
                log_memory(&format!("loaded table {}/{}", idx + 1, total));
                Ok::<_, WriterError>(table)
            }
        })
        .buffered(ctx.fetch_concurrency())
        .try_collect()
        .await
}

/// Fetch every key and merge the results into one table.
pub async fn build_table(
    ctx: &StorageContext,
    keys: &[String],
    parser: Arc<dyn DelimitedParser>,
) -> Result<RecordBatch> {
    let tables = fetch_tables(ctx, keys, parser).await?;
    let merged = tokio::task::spawn_blocking(move || merge_tables(&tables))
        .await
        .map_err(|e| ConvertError::decode(format!("merge task failed: {e}")))??;

    log_memory("loaded all tables");
    Ok(merged)
}

/// Sorted `.csv.gz` keys of one dataset.
pub async fn list_source_keys(
    ctx: &StorageContext,
    collection: &str,
    dataset: &str,
) -> Result<Vec<String>> {
    let prefix = ctx.dataset_prefix(collection, dataset);
    let entries = match ctx.operator().list_with(&prefix).recursive(true).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(WriterError::list(prefix, e)),
    };

    let mut keys: Vec<String> = entries
        .into_iter()
        .filter(|entry| entry.path().ends_with(SOURCE_SUFFIX))
        .map(|entry| entry.path().to_string())
        .collect();
    keys.sort();

    debug!(prefix = %prefix, count = keys.len(), "listed source keys");
    Ok(keys)
}

/// Collection names directly under the source prefix.
pub async fn list_collections(ctx: &StorageContext) -> Result<Vec<String>> {
    list_dir_names(ctx, ctx.source_prefix()).await
}

/// Dataset names within one collection.
pub async fn list_datasets(ctx: &StorageContext, collection: &str) -> Result<Vec<String>> {
    let mut prefix = s3dbconv_core::join_key(ctx.source_prefix(), &[collection]);
    prefix.push('/');
    list_dir_names(ctx, &prefix).await
}

async fn list_dir_names(ctx: &StorageContext, prefix: &str) -> Result<Vec<String>> {
    let entries = match ctx.operator().list(prefix).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(WriterError::list(prefix, e)),
    };

    let mut names: Vec<String> = entries
        .iter()
        .filter(|entry| entry.metadata().mode() == EntryMode::DIR && entry.path() != prefix)
        .filter_map(|entry| entry.path().trim_end_matches('/').rsplit('/').next())
        .map(str::to_string)
        .collect();
    names.sort();
    Ok(names)
}
