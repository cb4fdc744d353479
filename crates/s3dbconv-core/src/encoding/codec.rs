use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

/// Whole-object compression codec, named by its short key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Codec {
    #[serde(rename = "br")]
    Brotli,
    #[serde(rename = "gz")]
    Gzip,
    #[serde(rename = "lz4")]
    Lz4,
    #[serde(rename = "zst")]
    Zstd,
    #[serde(rename = "sz")]
    Snappy,
}

impl Codec {
    pub const ALL: [Codec; 5] = [
        Self::Brotli,
        Self::Gzip,
        Self::Lz4,
        Self::Zstd,
        Self::Snappy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brotli => "br",
            Self::Gzip => "gz",
            Self::Lz4 => "lz4",
            Self::Zstd => "zst",
            Self::Snappy => "sz",
        }
    }

    /// Accepted compression levels, or `None` when the codec takes no level.
    pub fn level_range(&self) -> Option<RangeInclusive<i32>> {
        match self {
            Self::Zstd => Some(-131_072..=22),
            Self::Brotli => Some(0..=11),
            Self::Gzip => Some(1..=9),
            Self::Lz4 | Self::Snappy => None,
        }
    }

    pub fn default_level(&self) -> Option<i32> {
        match self {
            Self::Zstd => Some(1),
            Self::Brotli => Some(8),
            Self::Gzip => Some(9),
            Self::Lz4 | Self::Snappy => None,
        }
    }

    /// Whether the codec can compress while the stream is being serialized.
    pub fn is_streaming(&self) -> bool {
        !matches!(self, Self::Snappy)
    }

    /// Check a requested level against the codec's range.
    pub fn validate_level(&self, level: Option<i32>) -> Result<Option<i32>> {
        let Some(level) = level else {
            return Ok(None);
        };
        match self.level_range() {
            Some(range) if range.contains(&level) => Ok(Some(level)),
            Some(range) => Err(ConvertError::invalid_compression_level(
                self.as_str(),
                level,
                format!("expected {}..={}", range.start(), range.end()),
            )),
            None => Err(ConvertError::invalid_compression_level(
                self.as_str(),
                level,
                "codec does not take a level",
            )),
        }
    }

    /// Requested level, or the codec default when none was given.
    pub fn effective_level(&self, level: Option<i32>) -> Option<i32> {
        level.or_else(|| self.default_level())
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|codec| codec.as_str() == s)
            .ok_or_else(|| ConvertError::invalid_compression(s))
    }
}

/// Container format of an output object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// Arrow IPC stream, compressed as a whole
    Arrow,
    /// Parquet file with per-column-chunk compression
    Parquet,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arrow => "arrow",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "arrow" => Ok(Self::Arrow),
            "parquet" => Ok(Self::Parquet),
            other => Err(ConvertError::invalid_file_format(other)),
        }
    }
}
