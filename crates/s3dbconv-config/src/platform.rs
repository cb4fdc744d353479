// Platform detection based on environment variables
//
// - AWS Lambda: AWS_LAMBDA_FUNCTION_NAME env var present
// - Cli: anything else (local runs against fs or s3)

use std::env;

use crate::{LogFormat, StorageBackend};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Cli,
    Lambda,
}

impl Platform {
    /// Auto-detect the current platform based on environment variables
    pub fn detect() -> Self {
        if env::var("AWS_LAMBDA_FUNCTION_NAME").is_ok() {
            Platform::Lambda
        } else {
            Platform::Cli
        }
    }

    /// Get platform-specific defaults
    pub fn defaults(&self) -> PlatformDefaults {
        match self {
            Platform::Cli => PlatformDefaults {
                storage_backend: StorageBackend::Fs,
                s3_bucket: "",
                s3_region: "",
                log_format: LogFormat::Text,
            },
            Platform::Lambda => PlatformDefaults {
                storage_backend: StorageBackend::S3,
                s3_bucket: "invenia-datafeeds-output",
                s3_region: "us-east-1",
                log_format: LogFormat::Json,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlatformDefaults {
    pub storage_backend: StorageBackend,
    pub s3_bucket: &'static str,
    pub s3_region: &'static str,
    pub log_format: LogFormat,
}
