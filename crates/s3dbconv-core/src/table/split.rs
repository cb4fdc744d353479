use std::collections::BTreeMap;

use arrow::array::{Array, Int64Array, UInt32Array};
use arrow::compute::{cast, take_record_batch};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::error::{ConvertError, Result};

/// Column used to assign rows to hourly sub-partitions
pub const DEFAULT_SPLIT_COLUMN: &str = "target_start";

const SECONDS_PER_HOUR: i64 = 3_600;

/// Rows of a table sharing one hour
#[derive(Debug, Clone)]
pub struct SubPartition {
    pub start: DateTime<Utc>,
    pub table: RecordBatch,
}

/// Split `table` into one table per distinct hour of `column`.
///
/// `column` may be an integer column of Unix seconds or a timestamp of any
/// unit. Output is ordered by hour and keeps the input schema unchanged,
/// including columns that end up all-null within a sub-partition. A table
/// without rows yields no sub-partitions, whatever type was inferred for
/// `column`.
pub fn split_by_hour(table: &RecordBatch, column: &str) -> Result<Vec<SubPartition>> {
    if table.column_by_name(column).is_none() {
        return Err(ConvertError::invalid_partition_column(column, "column not found"));
    }
    if table.num_rows() == 0 {
        return Ok(Vec::new());
    }
    let seconds = seconds_column(table, column)?;

    let mut hours: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
    for row in 0..seconds.len() {
        if seconds.is_null(row) {
            return Err(ConvertError::invalid_partition_column(
                column,
                format!("null value at row {row}"),
            ));
        }
        let ts = seconds.value(row);
        let index = u32::try_from(row).map_err(|_| {
            ConvertError::invalid_partition_column(column, "table exceeds u32::MAX rows")
        })?;
        let hour = ts.checked_sub(ts.rem_euclid(SECONDS_PER_HOUR)).ok_or_else(|| {
            ConvertError::invalid_partition_column(column, format!("{ts} is out of range"))
        })?;
        hours.entry(hour).or_default().push(index);
    }

    hours
        .into_iter()
        .map(|(hour, rows)| {
            let start = DateTime::from_timestamp(hour, 0).ok_or_else(|| {
                ConvertError::invalid_partition_column(column, format!("{hour} is out of range"))
            })?;
            let indices = UInt32Array::from(rows);
            let table = take_record_batch(table, &indices)
                .map_err(|e| ConvertError::invalid_partition_column(column, e.to_string()))?;
            Ok(SubPartition { start, table })
        })
        .collect()
}

fn seconds_column(table: &RecordBatch, column: &str) -> Result<Int64Array> {
    let array = table
        .column_by_name(column)
        .ok_or_else(|| ConvertError::invalid_partition_column(column, "column not found"))?;

    let divisor = match array.data_type() {
        DataType::Timestamp(TimeUnit::Second, _) => 1,
        DataType::Timestamp(TimeUnit::Millisecond, _) => 1_000,
        DataType::Timestamp(TimeUnit::Microsecond, _) => 1_000_000,
        DataType::Timestamp(TimeUnit::Nanosecond, _) => 1_000_000_000,
        dt if dt.is_integer() => 1,
        other => {
            return Err(ConvertError::invalid_partition_column(
                column,
                format!("unsupported type {other}"),
            ))
        }
    };

    let as_int = cast(array, &DataType::Int64)
        .map_err(|e| ConvertError::invalid_partition_column(column, e.to_string()))?;
    let values = as_int
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| ConvertError::invalid_partition_column(column, "cast to int64 failed"))?;

    if divisor == 1 {
        return Ok(values.clone());
    }
    Ok(values.unary(|v: i64| v.div_euclid(divisor)))
}
