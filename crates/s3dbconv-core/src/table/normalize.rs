//! Nullability normalization
//!
//! Superkey columns of a dataset must never contain nulls and are marked
//! non-nullable in the output schema. When the dataset's superkey does not
//! hold for the data, normalization retries once with a fixed fallback set.

use std::sync::Arc;

use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use tracing::warn;

use crate::error::{ConvertError, Result};

/// Columns treated as non-nullable when no usable superkey is available
pub const FALLBACK_NON_NULL_COLUMNS: [&str; 4] =
    ["target_start", "target_end", "release_date", "tag"];

/// Which column set ended up non-nullable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedSchema {
    Superkey,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct NullabilityPolicy {
    superkey: Option<Vec<String>>,
    fallback: Vec<String>,
}

impl NullabilityPolicy {
    pub fn new(superkey: Option<Vec<String>>) -> Self {
        Self {
            superkey,
            fallback: FALLBACK_NON_NULL_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }

    pub fn with_fallback(mut self, fallback: Vec<String>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Rebuild `table` with superkey columns marked non-nullable.
    ///
    /// Columns named by the policy but absent from the table are ignored.
    pub fn normalize(&self, table: &RecordBatch) -> Result<(RecordBatch, AppliedSchema)> {
        let Some(superkey) = &self.superkey else {
            return with_non_null(table, &self.fallback).map(|t| (t, AppliedSchema::Fallback));
        };

        match with_non_null(table, superkey) {
            Ok(normalized) => Ok((normalized, AppliedSchema::Superkey)),
            Err(e) => {
                warn!(
                    error = %e,
                    superkey = ?superkey,
                    fallback = ?self.fallback,
                    "superkey does not hold, retrying with fallback columns"
                );
                with_non_null(table, &self.fallback).map(|t| (t, AppliedSchema::Fallback))
            }
        }
    }
}

fn with_non_null(table: &RecordBatch, non_null: &[String]) -> Result<RecordBatch> {
    let schema = table.schema();

    let violations: Vec<&str> = schema
        .fields()
        .iter()
        .zip(table.columns())
        .filter(|(field, column)| {
            non_null.iter().any(|c| c == field.name()) && column.logical_null_count() > 0
        })
        .map(|(field, _)| field.name().as_str())
        .collect();
    if !violations.is_empty() {
        return Err(ConvertError::schema_conflict(
            violations.join(","),
            "non-nullable column contains nulls",
        ));
    }

    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|field| {
            let nullable = !non_null.iter().any(|c| c == field.name());
            field.as_ref().clone().with_nullable(nullable)
        })
        .collect();
    let normalized = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));

    RecordBatch::try_new(normalized, table.columns().to_vec())
        .map_err(|e| ConvertError::schema_conflict("*", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array, StringArray};

    fn table() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (
                "target_start",
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
            ),
            (
                "node",
                Arc::new(StringArray::from(vec![Some("A"), None])) as ArrayRef,
            ),
            (
                "price",
                Arc::new(Int64Array::from(vec![Some(3), None])) as ArrayRef,
            ),
        ])
        .unwrap()
    }

    fn nullable(batch: &RecordBatch, name: &str) -> bool {
        batch.schema().field_with_name(name).unwrap().is_nullable()
    }

    #[test]
    fn superkey_columns_become_non_nullable() {
        let policy = NullabilityPolicy::new(Some(vec!["target_start".into()]));
        let (normalized, applied) = policy.normalize(&table()).unwrap();

        assert_eq!(applied, AppliedSchema::Superkey);
        assert!(!nullable(&normalized, "target_start"));
        assert!(nullable(&normalized, "node"));
        assert!(nullable(&normalized, "price"));
    }

    #[test]
    fn falls_back_when_superkey_has_nulls() {
        let policy = NullabilityPolicy::new(Some(vec!["target_start".into(), "node".into()]));
        let (normalized, applied) = policy.normalize(&table()).unwrap();

        assert_eq!(applied, AppliedSchema::Fallback);
        assert!(!nullable(&normalized, "target_start"));
        assert!(nullable(&normalized, "node"));
    }

    #[test]
    fn missing_metadata_uses_fallback_directly() {
        let (normalized, applied) = NullabilityPolicy::new(None).normalize(&table()).unwrap();
        assert_eq!(applied, AppliedSchema::Fallback);
        assert!(!nullable(&normalized, "target_start"));
    }

    #[test]
    fn fallback_failure_is_fatal() {
        let policy = NullabilityPolicy::new(Some(vec!["node".into()]))
            .with_fallback(vec!["price".into()]);
        let err = policy.normalize(&table()).unwrap_err();
        assert!(matches!(err, ConvertError::SchemaConflict { ref column, .. } if column == "price"));
    }
}
