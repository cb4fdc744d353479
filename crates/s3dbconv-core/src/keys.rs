//! Destination key layout per store
//!
//! Generic store (`dataclient`):
//! `{prefix}{collection}/{dataset}/year={YYYY}/{ts}.{format}.{compression}`
//!
//! Partition-projected store (`athena`):
//! `{prefix}{collection}/{dataset}/{granularity}_partition={date}/{ts}.parquet`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoding::{Codec, FileFormat};
use crate::error::{ConvertError, Result};
use crate::partition::Granularity;

/// Downstream store the objects are laid out for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestStore {
    DataClient,
    Athena,
}

impl DestStore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataClient => "dataclient",
            Self::Athena => "athena",
        }
    }

    pub fn accepts(&self, format: FileFormat) -> bool {
        match self {
            Self::DataClient => true,
            Self::Athena => format == FileFormat::Parquet,
        }
    }
}

impl fmt::Display for DestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestStore {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dataclient" => Ok(Self::DataClient),
            "athena" => Ok(Self::Athena),
            other => Err(ConvertError::invalid_dest_store(other)),
        }
    }
}

/// Date partition layout a partition-projected reader is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectionSpec {
    pub key: &'static str,
    /// chrono format of the value written into the path
    pub path_format: &'static str,
    /// Java date format the reader parses the value with
    pub projection_format: &'static str,
    pub unit: &'static str,
}

impl ProjectionSpec {
    pub fn for_granularity(granularity: Granularity) -> Self {
        match granularity {
            Granularity::Hour => Self {
                key: "hour_partition",
                path_format: "%Y-%m-%d-%H-%M-%S",
                projection_format: "yyyy-MM-dd-HH-mm-ss",
                unit: "HOURS",
            },
            Granularity::Day => Self {
                key: "day_partition",
                path_format: "%Y-%m-%d",
                projection_format: "yyyy-MM-dd",
                unit: "DAYS",
            },
            Granularity::Month => Self {
                key: "month_partition",
                path_format: "%Y-%m-%d",
                projection_format: "yyyy-MM-dd",
                unit: "MONTHS",
            },
            Granularity::Year => Self {
                key: "year_partition",
                path_format: "%Y-%m-%d",
                projection_format: "yyyy-MM-dd",
                unit: "YEARS",
            },
        }
    }

    pub fn format_value(&self, start: DateTime<Utc>) -> String {
        start.format(self.path_format).to_string()
    }

    /// Parse a path value back into the bucket start it was rendered from.
    pub fn parse_value(&self, value: &str) -> Result<DateTime<Utc>> {
        let parsed = if self.path_format.contains("%H") {
            NaiveDateTime::parse_from_str(value, self.path_format).ok()
        } else {
            NaiveDate::parse_from_str(value, self.path_format)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        };
        parsed.map(|dt| dt.and_utc()).ok_or_else(|| {
            ConvertError::malformed_key(
                value,
                format!("does not match {} partition format", self.key),
            )
        })
    }

    /// Table parameters enabling date projection over this layout.
    pub fn table_properties(&self, range_start: &str) -> BTreeMap<String, String> {
        let key = self.key;
        BTreeMap::from([
            ("projection.enabled".to_string(), "true".to_string()),
            (format!("projection.{key}.type"), "date".to_string()),
            (
                format!("projection.{key}.format"),
                self.projection_format.to_string(),
            ),
            (format!("projection.{key}.interval"), "1".to_string()),
            (format!("projection.{key}.interval.unit"), self.unit.to_string()),
            (
                format!("projection.{key}.range"),
                format!("{range_start},NOW+1WEEKS"),
            ),
        ])
    }
}

/// Everything that determines where an object lands
#[derive(Debug, Clone, Copy)]
pub struct KeyLayout<'a> {
    pub dest_prefix: &'a str,
    pub store: DestStore,
    pub format: FileFormat,
    pub codec: Codec,
    pub granularity: Granularity,
}

impl KeyLayout<'_> {
    /// Destination key of the object for one bucket.
    pub fn object_key(&self, collection: &str, dataset: &str, start: DateTime<Utc>) -> String {
        let ts = start.timestamp();
        let (partition, filename) = match self.store {
            DestStore::DataClient => (
                format!("year={}", start.year()),
                format!("{ts}.{}.{}", self.format, self.codec),
            ),
            DestStore::Athena => {
                let projection = ProjectionSpec::for_granularity(self.granularity);
                (
                    format!("{}={}", projection.key, projection.format_value(start)),
                    format!("{ts}.parquet"),
                )
            }
        };
        join_key(
            self.dest_prefix,
            &[collection, dataset, &partition, &filename],
        )
    }
}

/// Join key segments under `prefix` with single `/` separators.
pub fn join_key(prefix: &str, segments: &[&str]) -> String {
    let mut key = prefix.trim_end_matches('/').to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if segment.is_empty() {
            continue;
        }
        if !key.is_empty() {
            key.push('/');
        }
        key.push_str(segment);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn layout(
        store: DestStore,
        format: FileFormat,
        granularity: Granularity,
    ) -> KeyLayout<'static> {
        KeyLayout {
            dest_prefix: "converted/",
            store,
            format,
            codec: Codec::Zstd,
            granularity,
        }
    }

    #[test]
    fn generic_store_key() {
        let key = layout(DestStore::DataClient, FileFormat::Arrow, Granularity::Day)
            .object_key("pjm", "da_lmp", start());
        assert_eq!(key, "converted/pjm/da_lmp/year=2020/1577836800.arrow.zst");
    }

    #[test]
    fn athena_keys_per_granularity() {
        let day = layout(DestStore::Athena, FileFormat::Parquet, Granularity::Day)
            .object_key("pjm", "da_lmp", start());
        assert_eq!(
            day,
            "converted/pjm/da_lmp/day_partition=2020-01-01/1577836800.parquet"
        );

        let hour_start = Utc.with_ymd_and_hms(2020, 1, 1, 13, 0, 0).unwrap();
        let hour = layout(DestStore::Athena, FileFormat::Parquet, Granularity::Hour)
            .object_key("pjm", "da_lmp", hour_start);
        assert_eq!(
            hour,
            "converted/pjm/da_lmp/hour_partition=2020-01-01-13-00-00/1577883600.parquet"
        );
    }

    #[test]
    fn path_values_parse_back_to_bucket_start() {
        let t = Utc.with_ymd_and_hms(2021, 7, 4, 18, 0, 0).unwrap();
        for granularity in Granularity::ALL {
            let projection = ProjectionSpec::for_granularity(granularity);
            let bucket = granularity.floor(t);
            let value = projection.format_value(bucket);
            assert_eq!(projection.parse_value(&value).unwrap(), bucket, "{granularity}");
        }
    }

    #[test]
    fn projection_properties_match_path_format() {
        let props = ProjectionSpec::for_granularity(Granularity::Hour)
            .table_properties("2020-01-01-00-00-00");
        assert_eq!(props["projection.hour_partition.format"], "yyyy-MM-dd-HH-mm-ss");
        assert_eq!(props["projection.hour_partition.interval.unit"], "HOURS");
        assert_eq!(
            props["projection.hour_partition.range"],
            "2020-01-01-00-00-00,NOW+1WEEKS"
        );
    }

    #[test]
    fn join_key_collapses_separators() {
        assert_eq!(join_key("out/", &["a", "b"]), "out/a/b");
        assert_eq!(join_key("out", &["/a/", "b"]), "out/a/b");
        assert_eq!(join_key("", &["a"]), "a");
    }

    #[test]
    fn athena_only_accepts_parquet() {
        assert!(DestStore::Athena.accepts(FileFormat::Parquet));
        assert!(!DestStore::Athena.accepts(FileFormat::Arrow));
        assert!(DestStore::DataClient.accepts(FileFormat::Arrow));
    }
}
