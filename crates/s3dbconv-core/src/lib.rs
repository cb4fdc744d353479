// s3dbconv-core - Pure conversion logic
//
// Everything between "bytes of gzip CSV objects" and "bytes of an encoded
// output object plus the key it goes to". No I/O, no async, no runtime
// dependencies; storage and scheduling live in the writer and handler crates.

pub mod encoding;
pub mod error;
pub mod job;
pub mod keys;
pub mod partition;
pub mod table;

pub use encoding::{
    decode_object, encode_table, Blake3Hash, Codec, EncodeOptions, EncodeStrategy, EncodedObject,
    FileFormat,
};
pub use error::{ConvertError, ErrorCode, Result};
pub use job::{
    ConversionJob, JobParams, JobPayload, JobSource, JobTarget, DEFAULT_SOURCE_PREFIX,
    SOURCE_SUFFIX,
};
pub use keys::{join_key, DestStore, KeyLayout, ProjectionSpec};
pub use partition::{
    extract_timestamp, group_by_partition, group_keys, Granularity, PartitionGroup, PartitionKey,
    SourceRef,
};
pub use table::{
    decode_source, merge_tables, split_by_hour, AppliedSchema, CsvParser, DelimitedParser,
    NullabilityPolicy, SubPartition, DEFAULT_SPLIT_COLUMN, FALLBACK_NON_NULL_COLUMNS,
};
