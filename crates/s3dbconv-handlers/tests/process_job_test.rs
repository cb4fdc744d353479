use std::io::Write;

use arrow::array::{Array, Int64Array};
use arrow::datatypes::DataType;
use flate2::write::GzEncoder;
use flate2::Compression;
use opendal::{services, Operator};
use s3dbconv_config::PipelineConfig;
use s3dbconv_core::{decode_object, Codec, FileFormat};
use s3dbconv_handlers::{decode_job, process_job, JobError};
use s3dbconv_writer::StorageContext;

const PREFIX: &str = "version5/aurora/gz/";
const DATASET: &str = "version5/aurora/gz/pjm/da_lmp/";
const DAY_START: i64 = 1_577_836_800;

fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn memory_context() -> StorageContext {
    StorageContext::new(Operator::new(services::Memory::default()).unwrap().finish())
        .with_fetch_concurrency(4)
}

/// Two rows per hour, one per node.
fn hourly_csv(ts: i64) -> String {
    let mut csv = String::from("target_start,target_end,release_date,tag,node,price\n");
    for (node, price) in [("A", 10.5), ("B", 11.25)] {
        csv.push_str(&format!(
            "{ts},{},{},da,{node},{price}\n",
            ts + 3600,
            ts - 3600
        ));
    }
    csv
}

async fn seed_day(ctx: &StorageContext) -> Vec<String> {
    let mut keys = Vec::new();
    for hour in 0..24 {
        let ts = DAY_START + hour * 3600;
        let key = format!("{DATASET}{ts}.csv.gz");
        ctx.operator().write(&key, gzip(&hourly_csv(ts))).await.unwrap();
        keys.push(key);
    }
    ctx.operator()
        .write(
            &format!("{DATASET}METADATA.json"),
            br#"{"superkey": ["target_start", "node"]}"#.to_vec(),
        )
        .await
        .unwrap();
    keys
}

fn backfill_body(extra: &str) -> String {
    let suffixes: Vec<String> = (0..24)
        .map(|h| format!("\"{}.csv.gz\"", DAY_START + h * 3600))
        .collect();
    format!(
        r#"{{"s3key_prefix": "{DATASET}", "s3key_suffixes": [{}],
            "dest_prefix": "converted/", {extra}}}"#,
        suffixes.join(", ")
    )
}

async fn read(ctx: &StorageContext, key: &str) -> Vec<u8> {
    ctx.operator().read(key).await.unwrap().to_vec()
}

#[tokio::test]
async fn day_of_hourly_files_becomes_one_object() {
    let ctx = memory_context();
    seed_day(&ctx).await;

    let job = decode_job(&backfill_body(r#""compression": "zst""#), PREFIX).unwrap();
    let result = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();

    assert_eq!(result.sources_processed, 24);
    assert_eq!(
        result.paths_written(),
        ["converted/pjm/da_lmp/year=2020/1577836800.arrow.zst"]
    );

    let bytes = read(&ctx, "converted/pjm/da_lmp/year=2020/1577836800.arrow.zst").await;
    let table = decode_object(&bytes, FileFormat::Arrow, Codec::Zstd).unwrap();
    assert_eq!(table.num_rows(), 48);

    let schema = table.schema();
    assert!(!schema.field_with_name("target_start").unwrap().is_nullable());
    assert!(!schema.field_with_name("node").unwrap().is_nullable());
    assert!(schema.field_with_name("price").unwrap().is_nullable());
    assert_eq!(
        schema.field_with_name("price").unwrap().data_type(),
        &DataType::Float64
    );
}

#[tokio::test]
async fn hourly_request_writes_one_object_per_hour() {
    let ctx = memory_context();
    seed_day(&ctx).await;

    let job = decode_job(
        &backfill_body(
            r#""dest_store": "athena", "file_format": "parquet",
               "compression": "sz", "partition_size": "hour""#,
        ),
        PREFIX,
    )
    .unwrap();
    let result = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();
    assert_eq!(result.objects.len(), 24);
    assert_eq!(result.records_processed, 48);

    for hour in 0..24 {
        let ts = DAY_START + hour * 3600;
        let key = format!(
            "converted/pjm/da_lmp/hour_partition=2020-01-01-{hour:02}-00-00/{ts}.parquet"
        );
        let table = decode_object(&read(&ctx, &key).await, FileFormat::Parquet, Codec::Snappy)
            .unwrap();
        assert_eq!(table.num_rows(), 2);

        let starts = table
            .column_by_name("target_start")
            .unwrap()
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert!(starts.iter().all(|v| v == Some(ts)));
    }
}

fn live_body(ts: i64, extra: &str) -> String {
    format!(
        r#"{{"s3_key": "{DATASET}{ts}.csv.gz", "dest_prefix": "converted/",
            "dest_store": "athena", "file_format": "parquet", {extra}}}"#
    )
}

#[tokio::test]
async fn daily_source_is_split_into_hours() {
    let ctx = memory_context();
    let mut csv = String::from("target_start,target_end,release_date,tag,node,price\n");
    for hour in 0..24 {
        let ts = DAY_START + hour * 3600;
        for node in ["A", "B", "C"] {
            csv.push_str(&format!("{ts},{},{},da,{node},{hour}.5\n", ts + 3600, DAY_START));
        }
    }
    ctx.operator()
        .write(&format!("{DATASET}{DAY_START}.csv.gz"), gzip(&csv))
        .await
        .unwrap();

    let job = decode_job(
        &live_body(DAY_START, r#""compression": "zst", "partition_size": "hour""#),
        PREFIX,
    )
    .unwrap();
    let result = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();
    assert_eq!(result.sources_processed, 1);
    assert_eq!(result.objects.len(), 24);
    assert!(result.objects.iter().all(|object| object.rows == 3));

    let last = format!(
        "converted/pjm/da_lmp/hour_partition=2020-01-01-23-00-00/{}.parquet",
        DAY_START + 23 * 3600
    );
    let table =
        decode_object(&read(&ctx, &last).await, FileFormat::Parquet, Codec::Zstd).unwrap();
    assert_eq!(table.num_rows(), 3);
}

#[tokio::test]
async fn header_only_source_at_hour_writes_nothing() {
    let ctx = memory_context();
    ctx.operator()
        .write(
            &format!("{DATASET}{DAY_START}.csv.gz"),
            gzip("target_start,target_end,release_date,tag,price\n"),
        )
        .await
        .unwrap();

    let job = decode_job(
        &live_body(DAY_START, r#""compression": "zst", "partition_size": "hour""#),
        PREFIX,
    )
    .unwrap();
    let result = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();
    assert!(result.objects.is_empty());
    assert_eq!(result.records_processed, 0);
}

#[test]
fn out_of_range_level_fails_before_fetching() {
    // Validation happens while decoding, before a storage context is involved
    let err = decode_job(
        &backfill_body(r#""compression": "zst", "compression_level": 23"#),
        PREFIX,
    )
    .unwrap_err();

    assert!(matches!(err, JobError::Invalid(_)));
    assert_eq!(err.code(), Some("E104"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn rerunning_a_job_rewrites_identical_objects() {
    let ctx = memory_context();
    seed_day(&ctx).await;
    let job = decode_job(
        &backfill_body(r#""compression": "gz", "compression_level": 6"#),
        PREFIX,
    )
    .unwrap();

    let first = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();
    let second = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();

    assert_eq!(first.objects.len(), 1);
    assert_eq!(first.objects[0].key, second.objects[0].key);
    assert_eq!(first.objects[0].hash, second.objects[0].hash);

    let table = decode_object(
        &read(&ctx, &second.objects[0].key).await,
        FileFormat::Arrow,
        Codec::Gzip,
    )
    .unwrap();
    assert_eq!(table.num_rows(), 48);
}

#[tokio::test]
async fn nulls_in_superkey_fall_back_instead_of_failing() {
    let ctx = memory_context();
    let key = format!("{DATASET}{DAY_START}.csv.gz");
    let csv = format!(
        "target_start,target_end,release_date,tag,node,price\n\
         {DAY_START},{end},{rel},da,A,1.5\n\
         {DAY_START},{end},{rel},da,,2.5\n",
        end = DAY_START + 3600,
        rel = DAY_START - 3600,
    );
    ctx.operator().write(&key, gzip(&csv)).await.unwrap();
    ctx.operator()
        .write(
            &format!("{DATASET}METADATA.json"),
            br#"{"superkey": ["target_start", "node"]}"#.to_vec(),
        )
        .await
        .unwrap();

    let job = decode_job(
        &format!(r#"{{"s3_key": "{key}", "dest_prefix": "converted/", "compression": "lz4"}}"#),
        PREFIX,
    )
    .unwrap();
    let result = process_job(&ctx, &job, &PipelineConfig::default()).await.unwrap();

    let table = decode_object(
        &read(&ctx, &result.objects[0].key).await,
        FileFormat::Arrow,
        Codec::Lz4,
    )
    .unwrap();
    let schema = table.schema();
    assert!(schema.field_with_name("node").unwrap().is_nullable());
    assert!(!schema.field_with_name("target_start").unwrap().is_nullable());
    assert!(!schema.field_with_name("tag").unwrap().is_nullable());
    assert_eq!(table.column_by_name("node").unwrap().null_count(), 1);
}

#[tokio::test]
async fn irreconcilable_types_fail_without_retry() {
    let ctx = memory_context();
    let first = format!("{DATASET}{DAY_START}.csv.gz");
    let second = format!("{DATASET}{}.csv.gz", DAY_START + 3600);
    ctx.operator()
        .write(&first, gzip("target_start,price\n1577836800,10\n"))
        .await
        .unwrap();
    ctx.operator()
        .write(&second, gzip("target_start,price\n1577840400,n/a\n"))
        .await
        .unwrap();

    let body = format!(
        r#"{{"s3key_prefix": "{DATASET}",
            "s3key_suffixes": ["{DAY_START}.csv.gz", "{}.csv.gz"],
            "dest_prefix": "converted/", "compression": "zst"}}"#,
        DAY_START + 3600
    );
    let job = decode_job(&body, PREFIX).unwrap();
    let err = process_job(&ctx, &job, &PipelineConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, JobError::Conversion(_)));
    assert_eq!(err.code(), Some("E109"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn missing_source_is_retryable() {
    let ctx = memory_context();
    let job = decode_job(
        &format!(
            r#"{{"s3_key": "{DATASET}{DAY_START}.csv.gz",
                "dest_prefix": "converted/", "compression": "br"}}"#
        ),
        PREFIX,
    )
    .unwrap();

    let err = process_job(&ctx, &job, &PipelineConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::Storage(_)));
    assert!(err.is_retryable());
}
