//! Error types for the conversion pipeline

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E101: Source key does not carry a parseable timestamp
    E101MalformedKey,
    /// E102: Partition size is not one of hour/day/month/year
    E102InvalidPartitionSize,
    /// E103: Compression codec is not supported
    E103InvalidCompression,
    /// E104: Compression level outside the codec's range
    E104InvalidCompressionLevel,
    /// E105: Destination store is not supported
    E105InvalidDestStore,
    /// E106: File format is not supported
    E106InvalidFileFormat,
    /// E107: Store and format cannot be combined
    E107UnsupportedCombination,
    /// E108: Destination prefix is malformed or overlaps the source tree
    E108InvalidDestPrefix,
    /// E109: Column types or nullability cannot be reconciled
    E109SchemaConflict,
    /// E110: Source object could not be decoded
    E110DecodeFailure,
    /// E111: Table could not be encoded
    E111EncodeFailure,
    /// E112: Sub-partition column missing or unusable
    E112InvalidPartitionColumn,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E101MalformedKey => "E101",
            Self::E102InvalidPartitionSize => "E102",
            Self::E103InvalidCompression => "E103",
            Self::E104InvalidCompressionLevel => "E104",
            Self::E105InvalidDestStore => "E105",
            Self::E106InvalidFileFormat => "E106",
            Self::E107UnsupportedCombination => "E107",
            Self::E108InvalidDestPrefix => "E108",
            Self::E109SchemaConflict => "E109",
            Self::E110DecodeFailure => "E110",
            Self::E111EncodeFailure => "E111",
            Self::E112InvalidPartitionColumn => "E112",
        }
    }
}

/// Errors raised by the pure conversion logic
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("[{code}] Malformed source key '{key}': {reason}")]
    MalformedKey {
        code: &'static str,
        key: String,
        reason: String,
    },

    #[error("[{code}] Invalid partition size '{value}'. Supported: hour, day, month, year")]
    InvalidPartitionSize { code: &'static str, value: String },

    #[error("[{code}] Invalid compression '{value}'. Supported: br, gz, lz4, zst, sz")]
    InvalidCompression { code: &'static str, value: String },

    #[error("[{code}] Invalid compression level {level} for '{codec}': {expected}")]
    InvalidCompressionLevel {
        code: &'static str,
        codec: String,
        level: i32,
        expected: String,
    },

    #[error("[{code}] Invalid destination store '{value}'. Supported: dataclient, athena")]
    InvalidDestStore { code: &'static str, value: String },

    #[error("[{code}] Invalid file format '{value}'. Supported: arrow, parquet")]
    InvalidFileFormat { code: &'static str, value: String },

    #[error("[{code}] Unsupported combination: {message}")]
    UnsupportedCombination { code: &'static str, message: String },

    #[error("[{code}] Invalid destination prefix '{prefix}': {reason}")]
    InvalidDestPrefix {
        code: &'static str,
        prefix: String,
        reason: String,
    },

    #[error("[{code}] Schema conflict on '{column}': {message}")]
    SchemaConflict {
        code: &'static str,
        column: String,
        message: String,
    },

    #[error("[{code}] Decode failed: {message}")]
    Decode { code: &'static str, message: String },

    #[error("[{code}] Encode failed: {message}")]
    Encode { code: &'static str, message: String },

    #[error("[{code}] Invalid partition column '{column}': {message}")]
    InvalidPartitionColumn {
        code: &'static str,
        column: String,
        message: String,
    },
}

impl ConvertError {
    pub fn malformed_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedKey {
            code: ErrorCode::E101MalformedKey.as_str(),
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_partition_size(value: impl Into<String>) -> Self {
        Self::InvalidPartitionSize {
            code: ErrorCode::E102InvalidPartitionSize.as_str(),
            value: value.into(),
        }
    }

    pub fn invalid_compression(value: impl Into<String>) -> Self {
        Self::InvalidCompression {
            code: ErrorCode::E103InvalidCompression.as_str(),
            value: value.into(),
        }
    }

    pub fn invalid_compression_level(
        codec: impl Into<String>,
        level: i32,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidCompressionLevel {
            code: ErrorCode::E104InvalidCompressionLevel.as_str(),
            codec: codec.into(),
            level,
            expected: expected.into(),
        }
    }

    pub fn invalid_dest_store(value: impl Into<String>) -> Self {
        Self::InvalidDestStore {
            code: ErrorCode::E105InvalidDestStore.as_str(),
            value: value.into(),
        }
    }

    pub fn invalid_file_format(value: impl Into<String>) -> Self {
        Self::InvalidFileFormat {
            code: ErrorCode::E106InvalidFileFormat.as_str(),
            value: value.into(),
        }
    }

    pub fn unsupported_combination(message: impl Into<String>) -> Self {
        Self::UnsupportedCombination {
            code: ErrorCode::E107UnsupportedCombination.as_str(),
            message: message.into(),
        }
    }

    pub fn invalid_dest_prefix(prefix: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDestPrefix {
            code: ErrorCode::E108InvalidDestPrefix.as_str(),
            prefix: prefix.into(),
            reason: reason.into(),
        }
    }

    pub fn schema_conflict(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaConflict {
            code: ErrorCode::E109SchemaConflict.as_str(),
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            code: ErrorCode::E110DecodeFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            code: ErrorCode::E111EncodeFailure.as_str(),
            message: message.into(),
        }
    }

    pub fn invalid_partition_column(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPartitionColumn {
            code: ErrorCode::E112InvalidPartitionColumn.as_str(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Returns the stable error code string (e.g. `"E104"`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedKey { code, .. }
            | Self::InvalidPartitionSize { code, .. }
            | Self::InvalidCompression { code, .. }
            | Self::InvalidCompressionLevel { code, .. }
            | Self::InvalidDestStore { code, .. }
            | Self::InvalidFileFormat { code, .. }
            | Self::UnsupportedCombination { code, .. }
            | Self::InvalidDestPrefix { code, .. }
            | Self::SchemaConflict { code, .. }
            | Self::Decode { code, .. }
            | Self::Encode { code, .. }
            | Self::InvalidPartitionColumn { code, .. } => *code,
        }
    }

    /// True for errors raised while checking job parameters, before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPartitionSize { .. }
                | Self::InvalidCompression { .. }
                | Self::InvalidCompressionLevel { .. }
                | Self::InvalidDestStore { .. }
                | Self::InvalidFileFormat { .. }
                | Self::UnsupportedCombination { .. }
                | Self::InvalidDestPrefix { .. }
        )
    }
}

/// Result type alias for ConvertError
pub type Result<T> = std::result::Result<T, ConvertError>;
