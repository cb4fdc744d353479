//! Concatenation of per-file tables with type promotion
//!
//! Source files of one bucket are produced independently, so the same column
//! can be inferred as `Null` in a sparse file and `Int64` in a dense one, or
//! `Int64` in one and `Float64` in another. Merging unifies columns by name in
//! first-appearance order and widens each to a common type before
//! concatenating.

use std::sync::Arc;

use arrow::array::{new_null_array, Array, ArrayRef, Int64Array};
use arrow::compute::{cast_with_options, concat_batches, CastOptions};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::error::{ConvertError, Result};

fn strict_cast() -> CastOptions<'static> {
    CastOptions {
        safe: false,
        ..Default::default()
    }
}

/// Merge tables into one, promoting column types where they disagree.
///
/// Columns missing from a table are filled with nulls. Every column of the
/// result is nullable; nullability is decided later by the normalizer.
pub fn merge_tables(tables: &[RecordBatch]) -> Result<RecordBatch> {
    if tables.is_empty() {
        return Err(ConvertError::decode("no source tables to merge"));
    }

    let schema = unified_schema(tables)?;
    let aligned = tables
        .iter()
        .map(|table| align_to(table, &schema))
        .collect::<Result<Vec<_>>>()?;

    let merged = concat_batches(&schema, &aligned)
        .map_err(|e| ConvertError::schema_conflict("*", format!("concatenation failed: {e}")))?;

    debug!(
        tables = tables.len(),
        rows = merged.num_rows(),
        columns = merged.num_columns(),
        "merged source tables"
    );
    Ok(merged)
}

fn unified_schema(tables: &[RecordBatch]) -> Result<SchemaRef> {
    let mut columns: Vec<(String, DataType)> = Vec::new();

    for table in tables {
        for field in table.schema().fields() {
            match columns.iter_mut().find(|(name, _)| name == field.name()) {
                Some((name, current)) => *current = promote(name, current, field.data_type())?,
                None => columns.push((field.name().clone(), field.data_type().clone())),
            }
        }
    }

    let fields: Vec<Field> = columns
        .into_iter()
        .map(|(name, data_type)| Field::new(name, data_type, true))
        .collect();
    Ok(Arc::new(Schema::new(fields)))
}

fn align_to(table: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let rows = table.num_rows();
    let columns = schema
        .fields()
        .iter()
        .map(|field| match table.column_by_name(field.name()) {
            Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
            Some(column) => {
                ensure_exact_in_float(field.name(), column, field.data_type())?;
                cast_with_options(column, field.data_type(), &strict_cast()).map_err(|e| {
                    ConvertError::schema_conflict(
                        field.name(),
                        format!(
                            "cannot cast {} to {}: {e}",
                            column.data_type(),
                            field.data_type()
                        ),
                    )
                })
            }
            None => Ok(new_null_array(field.data_type(), rows)),
        })
        .collect::<Result<Vec<ArrayRef>>>()?;

    RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| ConvertError::schema_conflict("*", e.to_string()))
}

/// Int64 values widened to Float64 must survive the trip unchanged; a cast
/// that rounds would silently alter the data.
fn ensure_exact_in_float(name: &str, column: &ArrayRef, target: &DataType) -> Result<()> {
    if !(column.data_type() == &DataType::Int64 && target == &DataType::Float64) {
        return Ok(());
    }
    let Some(values) = column.as_any().downcast_ref::<Int64Array>() else {
        return Ok(());
    };

    match values
        .iter()
        .flatten()
        .find(|&v| (v as f64) as i128 != i128::from(v))
    {
        Some(v) => Err(ConvertError::schema_conflict(
            name,
            format!("{v} cannot be represented exactly as Float64"),
        )),
        None => Ok(()),
    }
}

/// The narrowest type both `current` and `incoming` convert to losslessly.
pub fn promote(column: &str, current: &DataType, incoming: &DataType) -> Result<DataType> {
    if current == incoming {
        return Ok(current.clone());
    }

    let widened = match (current, incoming) {
        (DataType::Null, other) | (other, DataType::Null) => Some(other.clone()),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            Some(DataType::Float64)
        }
        (DataType::Date32, DataType::Timestamp(unit, tz))
        | (DataType::Timestamp(unit, tz), DataType::Date32) => {
            Some(DataType::Timestamp(*unit, tz.clone()))
        }
        (DataType::Timestamp(a, tz_a), DataType::Timestamp(b, tz_b)) if tz_a == tz_b => {
            Some(DataType::Timestamp(finer(*a, *b), tz_a.clone()))
        }
        _ => None,
    };

    widened.ok_or_else(|| {
        ConvertError::schema_conflict(
            column,
            format!("no common type for {current} and {incoming}"),
        )
    })
}

fn finer(a: TimeUnit, b: TimeUnit) -> TimeUnit {
    fn rank(unit: TimeUnit) -> u8 {
        match unit {
            TimeUnit::Second => 0,
            TimeUnit::Millisecond => 1,
            TimeUnit::Microsecond => 2,
            TimeUnit::Nanosecond => 3,
        }
    }
    if rank(a) >= rank(b) {
        a
    } else {
        b
    }
}
