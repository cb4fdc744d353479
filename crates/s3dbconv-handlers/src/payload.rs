use s3dbconv_core::{ConversionJob, JobPayload};

use crate::error::JobError;

/// Decode a message body and validate it into a job.
///
/// Nothing is fetched: a payload that fails here never touches storage.
pub fn decode_job(body: &str, source_prefix: &str) -> Result<ConversionJob, JobError> {
    let payload = JobPayload::from_json(body)?;
    Ok(payload.into_job(source_prefix)?)
}
