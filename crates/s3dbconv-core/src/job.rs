//! Conversion job model
//!
//! Jobs arrive as JSON in one of two shapes. A live job names a single
//! freshly written source object:
//!
//! ```json
//! {"s3_key": "version5/aurora/gz/pjm/da_lmp/1577836800.csv.gz",
//!  "dest_prefix": "converted/", "compression": "zst"}
//! ```
//!
//! A backfill job names many objects under a shared prefix:
//!
//! ```json
//! {"s3key_prefix": "version5/aurora/gz/pjm/da_lmp/",
//!  "s3key_suffixes": ["1577836800.csv.gz", "1577840400.csv.gz"],
//!  "dest_prefix": "converted/", "dest_store": "athena",
//!  "file_format": "parquet", "compression": "sz", "partition_size": "hour"}
//! ```

use serde::{Deserialize, Serialize};

use crate::encoding::{Codec, EncodeOptions, FileFormat};
use crate::error::{ConvertError, Result};
use crate::keys::{DestStore, KeyLayout};
use crate::partition::Granularity;

/// Default prefix under which source objects are written
pub const DEFAULT_SOURCE_PREFIX: &str = "version5/aurora/gz/";

/// Suffix of convertible source objects
pub const SOURCE_SUFFIX: &str = ".csv.gz";

/// Output target fields as they appear on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTarget {
    pub dest_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_store: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_format: Option<String>,
    pub compression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<String>,
}

/// Job payload in either wire shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobPayload {
    Backfill {
        s3key_prefix: String,
        s3key_suffixes: Vec<String>,
        #[serde(flatten)]
        target: JobTarget,
    },
    Live {
        s3_key: String,
        #[serde(flatten)]
        target: JobTarget,
    },
}

impl JobPayload {
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn target(&self) -> &JobTarget {
        match self {
            Self::Backfill { target, .. } | Self::Live { target, .. } => target,
        }
    }

    /// Validate the target and resolve the payload into a job.
    pub fn into_job(self, source_prefix: &str) -> Result<ConversionJob> {
        let params = JobParams::validate(self.target(), source_prefix)?;
        let source = match self {
            Self::Live { s3_key, .. } => JobSource::Live(s3_key),
            Self::Backfill {
                s3key_prefix,
                s3key_suffixes,
                ..
            } => JobSource::Backfill(
                s3key_suffixes
                    .iter()
                    .map(|suffix| format!("{s3key_prefix}{suffix}"))
                    .collect(),
            ),
        };
        Ok(ConversionJob { source, params })
    }
}

/// Validated output parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParams {
    pub dest_prefix: String,
    pub dest_store: DestStore,
    pub file_format: FileFormat,
    pub granularity: Granularity,
    pub codec: Codec,
    pub level: Option<i32>,
}

impl JobParams {
    /// Check wire fields in a fixed order, failing on the first problem.
    ///
    /// Omitted fields default to `dataclient`, `arrow` and `day`.
    pub fn validate(target: &JobTarget, source_prefix: &str) -> Result<Self> {
        let codec: Codec = target.compression.parse()?;
        let level = codec.validate_level(target.compression_level)?;
        let granularity = match &target.partition_size {
            Some(size) => size.parse()?,
            None => Granularity::Day,
        };
        let dest_store = match &target.dest_store {
            Some(store) => store.parse()?,
            None => DestStore::DataClient,
        };
        let file_format = match &target.file_format {
            Some(format) => format.parse()?,
            None => FileFormat::Arrow,
        };

        if !dest_store.accepts(file_format) {
            return Err(ConvertError::unsupported_combination(format!(
                "{dest_store} store does not accept {file_format} files"
            )));
        }

        let prefix = &target.dest_prefix;
        if !prefix.ends_with('/') {
            return Err(ConvertError::invalid_dest_prefix(prefix, "must end with '/'"));
        }
        if !source_prefix.is_empty() && prefix.starts_with(source_prefix) {
            return Err(ConvertError::invalid_dest_prefix(
                prefix,
                format!("must not be inside the source prefix '{source_prefix}'"),
            ));
        }

        Ok(Self {
            dest_prefix: prefix.clone(),
            dest_store,
            file_format,
            granularity,
            codec,
            level,
        })
    }

    pub fn key_layout(&self) -> KeyLayout<'_> {
        KeyLayout {
            dest_prefix: &self.dest_prefix,
            store: self.dest_store,
            format: self.file_format,
            codec: self.codec,
            granularity: self.granularity,
        }
    }

    pub fn encode_options(&self, row_group_size: usize) -> EncodeOptions {
        EncodeOptions::new(self.file_format, self.codec, self.level)
            .with_row_group_size(row_group_size)
    }

    /// Wire form of these parameters, with every field explicit.
    pub fn to_target(&self) -> JobTarget {
        JobTarget {
            dest_prefix: self.dest_prefix.clone(),
            dest_store: Some(self.dest_store.as_str().to_string()),
            file_format: Some(self.file_format.as_str().to_string()),
            compression: self.codec.as_str().to_string(),
            compression_level: self.level,
            partition_size: Some(self.granularity.as_str().to_string()),
        }
    }
}

/// Where a job's sources come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSource {
    /// One object, converted as soon as it is written
    Live(String),
    /// Historical objects, grouped into buckets before conversion
    Backfill(Vec<String>),
}

impl JobSource {
    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Live(key) => vec![key.clone()],
            Self::Backfill(keys) => keys.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: JobSource,
    pub params: JobParams,
}
