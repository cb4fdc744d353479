// AWS Lambda runtime adapter
//
// Consumes SQS events carrying one conversion job per record. Storage is
// OpenDAL S3 configured from the environment.
//
// Philosophy: Use lambda_runtime's provided tokio
// We don't add our own tokio - lambda_runtime provides it

use std::sync::Arc;

use aws_lambda_events::event::sqs::{SqsBatchResponse, SqsEvent, SqsMessage};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use s3dbconv_config::{LogFormat, Platform, PipelineConfig, RuntimeConfig};
use s3dbconv_handlers::{decode_job, process_job, JobError};
use s3dbconv_writer::StorageContext;
use tracing::{error, info, warn};

mod response;

use response::report_failure;

/// Built once per cold start and shared by every invocation
pub struct LambdaState {
    pub ctx: StorageContext,
    pub pipeline: PipelineConfig,
}

/// Process every record in the batch.
///
/// Records that can never succeed are logged and dropped. Records that hit
/// a store failure are reported back for redelivery. A retryable record
/// without a message id fails the whole invocation.
pub async fn handle_sqs_event(
    event: SqsEvent,
    state: &LambdaState,
) -> Result<SqsBatchResponse, Error> {
    let mut response = SqsBatchResponse::default();
    let total = event.records.len();

    for record in event.records {
        let message_id = record.message_id.clone();
        match process_record(&record, state).await {
            Ok(()) => {}
            Err(e) if e.is_retryable() => {
                warn!(
                    message_id = message_id.as_deref().unwrap_or("-"),
                    code = e.code().unwrap_or("-"),
                    error = %e,
                    "job failed; returning to queue"
                );
                match message_id {
                    Some(id) => report_failure(&mut response, id),
                    None => return Err(Error::from(format!("retryable job failed: {e}"))),
                }
            }
            Err(e) => {
                error!(
                    message_id = message_id.as_deref().unwrap_or("-"),
                    code = e.code().unwrap_or("-"),
                    error = %e,
                    "job failed permanently; dropping message"
                );
            }
        }
    }

    info!(
        records = total,
        retries = response.batch_item_failures.len(),
        "batch handled"
    );
    Ok(response)
}

async fn process_record(record: &SqsMessage, state: &LambdaState) -> Result<(), JobError> {
    let Some(body) = record.body.as_deref() else {
        warn!("record has no body");
        return Ok(());
    };

    let job = decode_job(body, state.ctx.source_prefix())?;
    let result = process_job(&state.ctx, &job, &state.pipeline).await?;
    info!(
        objects = result.objects.len(),
        rows = result.records_processed,
        "job processed"
    );
    Ok(())
}

/// Install the global subscriber; later calls are no-ops.
pub fn init_tracing(config: &RuntimeConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logging = config.logging();
    let env_filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    // CloudWatch stamps every line and does not render ANSI
    let _ = match logging.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().without_time()),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_ansi(false).without_time()),
        ),
    };
}

/// Lambda runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = RuntimeConfig::load_for_platform(Platform::Lambda)
        .map_err(|e| Error::from(format!("Failed to load configuration: {e:#}")))?;
    init_tracing(&config);

    // Credentials come from the execution role
    let ctx = StorageContext::from_config(&config)
        .map_err(|e| Error::from(format!("Failed to initialize storage: {e}")))?;
    info!(
        backend = %config.storage.backend,
        source_prefix = %ctx.source_prefix(),
        fetch_concurrency = ctx.fetch_concurrency(),
        "s3dbconv lambda ready"
    );

    let state = Arc::new(LambdaState {
        ctx,
        pipeline: config.pipeline,
    });

    lambda_runtime::run(service_fn(move |event: LambdaEvent<SqsEvent>| {
        let state = Arc::clone(&state);
        async move { handle_sqs_event(event.payload, &state).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use opendal::{services, Operator};
    use std::io::Write;

    const DATASET: &str = "version5/aurora/gz/pjm/da_lmp/";

    fn state() -> LambdaState {
        let operator = Operator::new(services::Memory::default()).unwrap().finish();
        LambdaState {
            ctx: StorageContext::new(operator),
            pipeline: PipelineConfig::default(),
        }
    }

    fn event(records: &[(&str, &str)]) -> SqsEvent {
        let records: Vec<serde_json::Value> = records
            .iter()
            .map(|(id, body)| {
                serde_json::json!({
                    "messageId": id,
                    "body": body,
                    "attributes": {},
                    "messageAttributes": {},
                })
            })
            .collect();
        serde_json::from_value(serde_json::json!({ "Records": records })).unwrap()
    }

    fn live_body(ts: i64) -> String {
        format!(
            r#"{{"s3_key": "{DATASET}{ts}.csv.gz", "dest_prefix": "converted/", "compression": "zst"}}"#
        )
    }

    async fn seed(state: &LambdaState, ts: i64) {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        write!(
            encoder,
            "target_start,target_end,release_date,tag,price\n{ts},{},{},da,1.5\n",
            ts + 3600,
            ts - 3600
        )
        .unwrap();
        state
            .ctx
            .operator()
            .write(&format!("{DATASET}{ts}.csv.gz"), encoder.finish().unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn converts_each_record() {
        let state = state();
        seed(&state, 1_577_836_800).await;
        seed(&state, 1_577_923_200).await;

        let response = handle_sqs_event(
            event(&[
                ("m1", live_body(1_577_836_800).as_str()),
                ("m2", live_body(1_577_923_200).as_str()),
            ]),
            &state,
        )
        .await
        .unwrap();

        assert!(response.batch_item_failures.is_empty());
        for key in [
            "converted/pjm/da_lmp/year=2020/1577836800.arrow.zst",
            "converted/pjm/da_lmp/year=2020/1577923200.arrow.zst",
        ] {
            assert!(state.ctx.operator().exists(key).await.unwrap(), "{key}");
        }
    }

    #[tokio::test]
    async fn drops_poison_messages_and_retries_storage_failures() {
        let state = state();
        seed(&state, 1_577_836_800).await;

        let bad_level = r#"{"s3_key": "version5/aurora/gz/pjm/da_lmp/1577836800.csv.gz",
                            "dest_prefix": "converted/", "compression": "zst",
                            "compression_level": 23}"#;
        let response = handle_sqs_event(
            event(&[
                ("garbage", "not json"),
                ("invalid", bad_level),
                ("missing", live_body(1_577_923_200).as_str()),
                ("ok", live_body(1_577_836_800).as_str()),
            ]),
            &state,
        )
        .await
        .unwrap();

        let retried: Vec<&str> = response
            .batch_item_failures
            .iter()
            .map(|failure| failure.item_identifier.as_str())
            .collect();
        assert_eq!(retried, ["missing"]);
    }
}
