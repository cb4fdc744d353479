//! Error types for object-store I/O

use s3dbconv_core::ConvertError;
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E201: Storage configuration missing or invalid
    E201InvalidConfig,
    /// E202: Source object could not be read
    E202FetchFailure,
    /// E203: Output object could not be written
    E203UploadFailure,
    /// E204: Prefix listing failed
    E204ListFailure,
    /// E205: Dataset metadata could not be read or copied
    E205MetadataFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E201InvalidConfig => "E201",
            Self::E202FetchFailure => "E202",
            Self::E203UploadFailure => "E203",
            Self::E204ListFailure => "E204",
            Self::E205MetadataFailure => "E205",
        }
    }
}

/// Errors raised while talking to the object store
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("[{code}] Invalid storage configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    #[error("[{code}] Failed to fetch '{key}': {reason}")]
    Fetch {
        code: &'static str,
        key: String,
        reason: String,
    },

    #[error("[{code}] Failed to upload '{key}': {reason}")]
    Upload {
        code: &'static str,
        key: String,
        reason: String,
    },

    #[error("[{code}] Failed to list '{prefix}': {reason}")]
    List {
        code: &'static str,
        prefix: String,
        reason: String,
    },

    #[error("[{code}] Dataset metadata at '{key}': {reason}")]
    Metadata {
        code: &'static str,
        key: String,
        reason: String,
    },

    /// Decoding or merging fetched sources failed
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

impl WriterError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E201InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    pub fn fetch(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            code: ErrorCode::E202FetchFailure.as_str(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn upload(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Upload {
            code: ErrorCode::E203UploadFailure.as_str(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn list(prefix: impl Into<String>, reason: impl ToString) -> Self {
        Self::List {
            code: ErrorCode::E204ListFailure.as_str(),
            prefix: prefix.into(),
            reason: reason.to_string(),
        }
    }

    pub fn metadata(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Metadata {
            code: ErrorCode::E205MetadataFailure.as_str(),
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { code, .. }
            | Self::Fetch { code, .. }
            | Self::Upload { code, .. }
            | Self::List { code, .. }
            | Self::Metadata { code, .. } => *code,
            Self::Convert(err) => err.code(),
        }
    }

    /// Whether the failure came from store I/O and may succeed on redelivery.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Upload { .. } | Self::List { .. } | Self::Metadata { .. }
        )
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
