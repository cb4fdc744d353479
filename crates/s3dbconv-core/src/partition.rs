//! Time buckets and partition grouping for source objects
//!
//! Every source object carries its observation time as the leading numeric
//! component of the last path segment (`.../1577836800.csv.gz`). Objects are
//! grouped into buckets of a fixed [`Granularity`] per collection and dataset.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};

const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

/// Size of a partition bucket, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [Self::Hour, Self::Day, Self::Month, Self::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Start of the bucket containing `ts`, in UTC.
    pub fn floor(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let sub_second = TimeDelta::nanoseconds(i64::from(ts.timestamp_subsec_nanos()));
        match self {
            Self::Hour => ts - TimeDelta::seconds(secs.rem_euclid(SECONDS_PER_HOUR)) - sub_second,
            Self::Day => ts - TimeDelta::seconds(secs.rem_euclid(SECONDS_PER_DAY)) - sub_second,
            Self::Month => {
                let date = ts.date_naive();
                let first = date - TimeDelta::days(i64::from(date.day0()));
                first.and_time(NaiveTime::MIN).and_utc()
            }
            Self::Year => {
                let date = ts.date_naive();
                let first = date - TimeDelta::days(i64::from(date.ordinal0()));
                first.and_time(NaiveTime::MIN).and_utc()
            }
        }
    }

    /// Start of the bucket following the one containing `ts`.
    ///
    /// Returns `None` only when the result falls outside chrono's range.
    pub fn bucket_end(&self, ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = self.floor(ts);
        match self {
            Self::Hour => start.checked_add_signed(TimeDelta::hours(1)),
            Self::Day => start.checked_add_signed(TimeDelta::days(1)),
            Self::Month => start.checked_add_months(Months::new(1)),
            Self::Year => start.checked_add_months(Months::new(12)),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(ConvertError::invalid_partition_size(other)),
        }
    }
}

/// Parse the embedded timestamp out of a source key.
///
/// The timestamp is the text of the final path segment up to the first `.`,
/// read as whole seconds since the Unix epoch.
pub fn extract_timestamp(key: &str) -> Result<DateTime<Utc>> {
    let filename = key.rsplit('/').next().unwrap_or(key);
    let stem = filename.split('.').next().unwrap_or(filename);
    if stem.is_empty() {
        return Err(ConvertError::malformed_key(key, "empty filename"));
    }

    let secs: i64 = stem
        .parse()
        .map_err(|_| ConvertError::malformed_key(key, format!("'{stem}' is not an integer")))?;

    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ConvertError::malformed_key(key, format!("{secs} is out of range")))
}

/// A source object resolved into its collection, dataset and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub key: String,
    pub collection: String,
    pub dataset: String,
    pub timestamp: DateTime<Utc>,
}

impl SourceRef {
    /// Resolve `key` relative to `source_prefix`.
    ///
    /// Keys look like `{source_prefix}{collection}/{dataset}/{seconds}.csv.gz`.
    pub fn parse(key: &str, source_prefix: &str) -> Result<Self> {
        let relative = key.strip_prefix(source_prefix).ok_or_else(|| {
            ConvertError::malformed_key(key, format!("not under source prefix '{source_prefix}'"))
        })?;

        let segments: Vec<&str> = relative.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 3 {
            return Err(ConvertError::malformed_key(
                key,
                "expected {collection}/{dataset}/{timestamp} below the source prefix",
            ));
        }

        Ok(Self {
            key: key.to_string(),
            collection: segments[0].to_string(),
            dataset: segments[1].to_string(),
            timestamp: extract_timestamp(key)?,
        })
    }
}

/// Identity of one output bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub collection: String,
    pub dataset: String,
    pub start: DateTime<Utc>,
}

impl PartitionKey {
    pub fn for_source(source: &SourceRef, granularity: Granularity) -> Self {
        Self {
            collection: source.collection.clone(),
            dataset: source.dataset.clone(),
            start: granularity.floor(source.timestamp),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.collection,
            self.dataset,
            self.start.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

/// Source objects that land in the same bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionGroup {
    pub key: PartitionKey,
    pub members: Vec<SourceRef>,
}

impl PartitionGroup {
    pub fn keys(&self) -> Vec<String> {
        self.members.iter().map(|m| m.key.clone()).collect()
    }
}

/// Group source objects into buckets of `granularity`.
///
/// Sources are sorted by key first; a single linear pass then starts a new
/// group whenever the bucket key changes, so every source appears in exactly
/// one group and groups come out in key order.
pub fn group_by_partition(
    mut sources: Vec<SourceRef>,
    granularity: Granularity,
) -> Vec<PartitionGroup> {
    sources.sort_by(|a, b| a.key.cmp(&b.key));

    let mut groups: Vec<PartitionGroup> = Vec::new();
    for source in sources {
        let key = PartitionKey::for_source(&source, granularity);
        match groups.last_mut() {
            Some(current) if current.key == key => current.members.push(source),
            _ => groups.push(PartitionGroup {
                key,
                members: vec![source],
            }),
        }
    }
    groups
}

/// Parse raw keys and group them in one step.
pub fn group_keys<I, S>(
    keys: I,
    source_prefix: &str,
    granularity: Granularity,
) -> Result<Vec<PartitionGroup>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let sources = keys
        .into_iter()
        .map(|key| SourceRef::parse(key.as_ref(), source_prefix))
        .collect::<Result<Vec<_>>>()?;
    Ok(group_by_partition(sources, granularity))
}
