//! Conversion job handling shared by the CLI and the Lambda entry point
//!
//! Decodes job payloads, drives a job through the conversion pipeline and
//! plans backfills for whole datasets.

pub mod error;
pub mod payload;
pub mod plan;
pub mod processor;

pub use error::JobError;
pub use payload::decode_job;
pub use plan::{plan_backfill, plan_dataset};
pub use processor::{process_job, process_job_with_parser, ProcessingResult, WrittenObject};
