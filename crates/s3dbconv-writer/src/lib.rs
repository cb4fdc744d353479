//! Object-store plumbing for s3dbconv
//!
//! Everything that touches storage goes through an explicitly passed
//! [`StorageContext`]: fetching and decoding sources, dataset metadata,
//! listing and uploads.

mod error;
mod memory;
mod metadata;
mod source;
mod storage;
mod upload;

pub use error::{ErrorCode, Result, WriterError};
pub use memory::{log_memory, resident_memory_mb};
pub use metadata::{copy_metadata_file, load_dataset_metadata, DatasetMetadata};
pub use source::{build_table, fetch_tables, list_collections, list_datasets, list_source_keys};
pub use storage::{build_operator, StorageContext};
pub use upload::upload_object;

pub use opendal;
