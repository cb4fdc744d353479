use s3dbconv_core::ConvertError;
use s3dbconv_writer::WriterError;
use thiserror::Error;

/// Why a job did not complete
#[derive(Debug, Error)]
pub enum JobError {
    /// Body is not a job payload in either shape
    #[error("Invalid job payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Parameters rejected before any I/O
    #[error("Invalid job parameters: {0}")]
    Invalid(ConvertError),

    /// Sources could not be converted
    #[error("Conversion failed: {0}")]
    Conversion(ConvertError),

    #[error("Storage operation failed: {0}")]
    Storage(WriterError),
}

impl From<ConvertError> for JobError {
    fn from(err: ConvertError) -> Self {
        if err.is_validation() {
            Self::Invalid(err)
        } else {
            Self::Conversion(err)
        }
    }
}

impl From<WriterError> for JobError {
    fn from(err: WriterError) -> Self {
        match err {
            WriterError::Convert(inner) => inner.into(),
            other => Self::Storage(other),
        }
    }
}

impl JobError {
    /// Whether redelivering the same payload could succeed.
    ///
    /// Only store I/O failures qualify; everything else fails the same way
    /// every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            Self::Payload(_) | Self::Invalid(_) | Self::Conversion(_) => false,
        }
    }

    /// Stable error code, if the failure carries one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Payload(_) => None,
            Self::Invalid(err) | Self::Conversion(err) => Some(err.code()),
            Self::Storage(err) => Some(err.code()),
        }
    }
}
