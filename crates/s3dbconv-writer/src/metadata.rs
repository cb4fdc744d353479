//! Dataset metadata lookup
//!
//! An upstream system writes `METADATA.json` next to each dataset's sources.
//! Only the superkey matters here; the rest is carried along untouched.

use opendal::ErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{Result, StorageContext, WriterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Columns that together identify a row
    pub superkey: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_map: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_key: Option<Value>,
}

impl DatasetMetadata {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Read a dataset's metadata.
///
/// A missing or unparseable file yields `None` so the caller can fall back to
/// the minimal non-null columns. Store errors propagate.
pub async fn load_dataset_metadata(
    ctx: &StorageContext,
    collection: &str,
    dataset: &str,
) -> Result<Option<DatasetMetadata>> {
    let key = ctx.metadata_key(collection, dataset);
    let bytes = match ctx.operator().read(&key).await {
        Ok(buffer) => buffer.to_vec(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(key = %key, "no dataset metadata");
            return Ok(None);
        }
        Err(e) => return Err(WriterError::metadata(key, e)),
    };

    match DatasetMetadata::from_json(&bytes) {
        Ok(meta) => Ok(Some(meta)),
        Err(e) => {
            warn!(key = %key, error = %e, "ignoring unparseable dataset metadata");
            Ok(None)
        }
    }
}

/// Copy a dataset's metadata file to `<dest_prefix><collection>/<dataset>/`.
///
/// Uses the service's own copy when it has one, otherwise reads and writes.
/// Returns the destination key, or `None` when the dataset has no metadata.
pub async fn copy_metadata_file(
    ctx: &StorageContext,
    collection: &str,
    dataset: &str,
    dest_prefix: &str,
) -> Result<Option<String>> {
    let source = ctx.metadata_key(collection, dataset);
    let dest = s3dbconv_core::join_key(dest_prefix, &[collection, dataset, ctx.metadata_file()]);
    let operator = ctx.operator();

    if operator.info().full_capability().copy {
        match operator.copy(&source, &dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WriterError::metadata(&dest, e)),
        }
    } else {
        let bytes = match operator.read(&source).await {
            Ok(buffer) => buffer.to_vec(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WriterError::metadata(source, e)),
        };
        operator
            .write(&dest, bytes)
            .await
            .map_err(|e| WriterError::metadata(&dest, e))?;
    }

    info!(source = %source, dest = %dest, "copied dataset metadata");
    Ok(Some(dest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_superkey_and_keeps_extra_fields() {
        let meta = DatasetMetadata::from_json(
            br#"{"superkey": ["target_start", "node"],
                 "type_map": {"node": "str"},
                 "value_key": ["price"]}"#,
        )
        .unwrap();
        assert_eq!(meta.superkey, ["target_start", "node"]);
        assert!(meta.type_map.is_some());
    }

    #[test]
    fn superkey_is_required() {
        assert!(DatasetMetadata::from_json(br#"{"type_map": {}}"#).is_err());
    }
}
