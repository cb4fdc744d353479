//! Backfill planning
//!
//! Turns the source listing of one dataset into backfill payloads, one per
//! bucket. Delivering them is left to the caller.

use s3dbconv_core::{
    group_by_partition, JobParams, JobPayload, JobTarget, SourceRef, SOURCE_SUFFIX,
};
use s3dbconv_writer::{list_source_keys, StorageContext};
use tracing::{debug, info, warn};

use crate::error::JobError;

/// Group a dataset's keys into one backfill payload per bucket.
///
/// Keys outside `<source_prefix><collection>/<dataset>/` or without the
/// `.csv.gz` suffix are skipped, as are keys without a timestamp file name
/// (logged at warn). Target fields are validated first and
/// written out in full on every payload.
pub fn plan_backfill(
    keys: &[String],
    collection: &str,
    dataset: &str,
    target: &JobTarget,
    source_prefix: &str,
) -> Result<Vec<JobPayload>, JobError> {
    let params = JobParams::validate(target, source_prefix)?;
    let dataset_prefix = format!(
        "{}/",
        s3dbconv_core::join_key(source_prefix, &[collection, dataset])
    );

    let sources: Vec<SourceRef> = keys
        .iter()
        .filter(|key| key.starts_with(&dataset_prefix) && key.ends_with(SOURCE_SUFFIX))
        .filter_map(|key| match SourceRef::parse(key, source_prefix) {
            Ok(source) => Some(source),
            Err(e) => {
                warn!(key = %key, error = %e, "skipping source with malformed key");
                None
            }
        })
        .collect();
    let groups = group_by_partition(sources, params.granularity);

    let target = params.to_target();
    let payloads: Vec<JobPayload> = groups
        .iter()
        .map(|group| JobPayload::Backfill {
            s3key_prefix: dataset_prefix.clone(),
            s3key_suffixes: group
                .members
                .iter()
                .map(|source| source.key[dataset_prefix.len()..].to_string())
                .collect(),
            target: target.clone(),
        })
        .collect();

    debug!(
        dataset_prefix = %dataset_prefix,
        sources = keys.len(),
        jobs = payloads.len(),
        "planned backfill"
    );
    Ok(payloads)
}

/// List a dataset and plan its backfill.
pub async fn plan_dataset(
    ctx: &StorageContext,
    collection: &str,
    dataset: &str,
    target: &JobTarget,
) -> Result<Vec<JobPayload>, JobError> {
    // Reject bad targets before listing
    JobParams::validate(target, ctx.source_prefix())?;

    let keys = list_source_keys(ctx, collection, dataset).await?;
    let payloads = plan_backfill(&keys, collection, dataset, target, ctx.source_prefix())?;
    info!(
        collection,
        dataset,
        sources = keys.len(),
        jobs = payloads.len(),
        "backfill planned"
    );
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3dbconv_core::DEFAULT_SOURCE_PREFIX;

    fn target(partition_size: &str) -> JobTarget {
        JobTarget {
            dest_prefix: "converted/".to_string(),
            dest_store: None,
            file_format: None,
            compression: "zst".to_string(),
            compression_level: None,
            partition_size: Some(partition_size.to_string()),
        }
    }

    fn hourly_keys(days: i64) -> Vec<String> {
        (0..days * 24)
            .map(|h| {
                format!(
                    "{DEFAULT_SOURCE_PREFIX}pjm/da_lmp/{}.csv.gz",
                    1_577_836_800 + h * 3600
                )
            })
            .collect()
    }

    #[test]
    fn one_job_per_day() {
        let mut keys = hourly_keys(3);
        keys.reverse();
        keys.push(format!("{DEFAULT_SOURCE_PREFIX}pjm/da_lmp/METADATA.json"));
        keys.push(format!("{DEFAULT_SOURCE_PREFIX}pjm/rt_lmp/1577836800.csv.gz"));

        let jobs = plan_backfill(&keys, "pjm", "da_lmp", &target("day"), DEFAULT_SOURCE_PREFIX)
            .unwrap();
        assert_eq!(jobs.len(), 3);

        let JobPayload::Backfill {
            s3key_prefix,
            s3key_suffixes,
            target,
        } = &jobs[0]
        else {
            panic!("expected a backfill payload");
        };
        assert_eq!(s3key_prefix, "version5/aurora/gz/pjm/da_lmp/");
        assert_eq!(s3key_suffixes.len(), 24);
        assert_eq!(s3key_suffixes[0], "1577836800.csv.gz");
        assert_eq!(target.dest_store.as_deref(), Some("dataclient"));
        assert_eq!(target.partition_size.as_deref(), Some("day"));
    }

    #[test]
    fn malformed_keys_are_skipped() {
        let mut keys = hourly_keys(1);
        keys.push(format!("{DEFAULT_SOURCE_PREFIX}pjm/da_lmp/latest.csv.gz"));

        let jobs = plan_backfill(&keys, "pjm", "da_lmp", &target("day"), DEFAULT_SOURCE_PREFIX)
            .unwrap();
        assert_eq!(jobs.len(), 1);
        let JobPayload::Backfill { s3key_suffixes, .. } = &jobs[0] else {
            panic!("expected a backfill payload");
        };
        assert_eq!(s3key_suffixes.len(), 24);
        assert!(!s3key_suffixes.iter().any(|s| s.starts_with("latest")));
    }

    #[test]
    fn payloads_resolve_back_to_their_sources() {
        let keys = hourly_keys(1);
        let jobs =
            plan_backfill(&keys, "pjm", "da_lmp", &target("year"), DEFAULT_SOURCE_PREFIX).unwrap();
        assert_eq!(jobs.len(), 1);

        let json = jobs[0].to_json().unwrap();
        let job = JobPayload::from_json(&json)
            .unwrap()
            .into_job(DEFAULT_SOURCE_PREFIX)
            .unwrap();
        assert_eq!(job.source.keys(), keys);
    }

    #[test]
    fn invalid_target_fails_before_grouping() {
        let err = plan_backfill(
            &hourly_keys(1),
            "pjm",
            "da_lmp",
            &target("week"),
            DEFAULT_SOURCE_PREFIX,
        )
        .unwrap_err();
        assert!(matches!(err, JobError::Invalid(_)));
    }
}
