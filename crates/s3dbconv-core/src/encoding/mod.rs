//! Table encoding into Arrow stream or Parquet objects
//!
//! Parquet compresses column chunks inside the file. Arrow objects are a
//! complete IPC stream wrapped in a codec frame; streaming codecs compress
//! while the stream is written and snappy compresses the finished buffer.

mod codec;
mod hashing;
mod ipc;
mod parquet_file;

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::debug;

pub use codec::{Codec, FileFormat};
pub use hashing::Blake3Hash;
pub use parquet_file::DEFAULT_ROW_GROUP_SIZE;

use crate::error::{ConvertError, Result};

/// How the object bytes were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStrategy {
    /// Compressed while serializing
    Streaming,
    /// Serialized uncompressed, then compressed whole
    Buffered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub format: FileFormat,
    pub codec: Codec,
    pub level: Option<i32>,
    pub row_group_size: usize,
}

impl EncodeOptions {
    pub fn new(format: FileFormat, codec: Codec, level: Option<i32>) -> Self {
        Self {
            format,
            codec,
            level,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size;
        self
    }

    pub fn strategy(&self) -> EncodeStrategy {
        match self.format {
            FileFormat::Parquet => EncodeStrategy::Streaming,
            FileFormat::Arrow if self.codec.is_streaming() => EncodeStrategy::Streaming,
            FileFormat::Arrow => EncodeStrategy::Buffered,
        }
    }
}

/// Encoded bytes ready for upload
#[derive(Debug, Clone)]
pub struct EncodedObject {
    pub bytes: Vec<u8>,
    pub hash: Blake3Hash,
    pub row_count: usize,
    pub strategy: EncodeStrategy,
}

impl EncodedObject {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encode `table` with the requested format and codec.
///
/// Levels must already be validated; see [`Codec::validate_level`].
pub fn encode_table(table: &RecordBatch, options: &EncodeOptions) -> Result<EncodedObject> {
    let strategy = options.strategy();
    let (bytes, hash) = match (options.format, strategy) {
        (FileFormat::Parquet, _) => parquet_file::write_parquet(
            table,
            options.codec,
            options.level,
            options.row_group_size,
        )?,
        (FileFormat::Arrow, EncodeStrategy::Streaming) => {
            ipc::write_stream_compressed(table, options.codec, options.level)?
        }
        (FileFormat::Arrow, EncodeStrategy::Buffered) => ipc::write_stream_buffered(table)?,
    };

    debug!(
        format = %options.format,
        codec = %options.codec,
        strategy = ?strategy,
        rows = table.num_rows(),
        bytes = bytes.len(),
        hash = %hash,
        "table encoded"
    );

    Ok(EncodedObject {
        bytes,
        hash,
        row_count: table.num_rows(),
        strategy,
    })
}

/// Read an encoded object back into a single table.
pub fn decode_object(bytes: &[u8], format: FileFormat, codec: Codec) -> Result<RecordBatch> {
    match format {
        FileFormat::Arrow => ipc::read_stream(bytes, codec),
        FileFormat::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))
                .map_err(|e| ConvertError::decode(format!("invalid parquet file: {e}")))?;
            let schema = builder.schema().clone();
            let reader = builder
                .build()
                .map_err(|e| ConvertError::decode(format!("failed to open parquet reader: {e}")))?;
            let batches = reader
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| ConvertError::decode(format!("failed to read parquet rows: {e}")))?;
            concat_batches(&schema, &batches)
                .map_err(|e| ConvertError::decode(format!("failed to combine row groups: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn sample() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("target_start", DataType::Int64, false),
            Field::new("node", DataType::Utf8, true),
            Field::new("price", DataType::Float64, true),
        ]));
        let starts: Vec<i64> = (0..500).map(|i| 1_577_836_800 + i * 60).collect();
        let nodes: Vec<Option<&str>> = (0..500)
            .map(|i| if i % 7 == 0 { None } else { Some("PJM-RTO") })
            .collect();
        let prices: Vec<Option<f64>> = (0..500)
            .map(|i| if i % 5 == 0 { None } else { Some(i as f64 * 0.25) })
            .collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(starts)) as ArrayRef,
                Arc::new(StringArray::from(nodes)) as ArrayRef,
                Arc::new(Float64Array::from(prices)) as ArrayRef,
            ],
        )
        .unwrap()
    }

    #[test]
    fn every_arrow_codec_reproduces_the_table() {
        let table = sample();
        for codec in Codec::ALL {
            let options = EncodeOptions::new(FileFormat::Arrow, codec, None);
            let encoded = encode_table(&table, &options).unwrap();
            assert_eq!(encoded.hash, Blake3Hash::of(&encoded.bytes), "{codec}");

            let decoded = decode_object(&encoded.bytes, FileFormat::Arrow, codec).unwrap();
            assert_eq!(decoded, table, "{codec}");
        }
    }

    #[test]
    fn parquet_keeps_nullability_and_values() {
        let table = sample();
        for codec in [Codec::Zstd, Codec::Snappy, Codec::Brotli] {
            let options =
                EncodeOptions::new(FileFormat::Parquet, codec, None).with_row_group_size(128);
            let encoded = encode_table(&table, &options).unwrap();
            assert_eq!(&encoded.bytes[..4], b"PAR1");

            let decoded = decode_object(&encoded.bytes, FileFormat::Parquet, codec).unwrap();
            assert_eq!(decoded.columns(), table.columns(), "{codec}");
            assert!(!decoded.schema().field(0).is_nullable());
            assert!(decoded.schema().field(2).is_nullable());
            assert_eq!(
                decoded.schema().metadata().get("s3dbconv.compression"),
                Some(&codec.as_str().to_string())
            );
        }
    }

    #[test]
    fn snappy_arrow_objects_are_buffered() {
        let options = EncodeOptions::new(FileFormat::Arrow, Codec::Snappy, None);
        assert_eq!(options.strategy(), EncodeStrategy::Buffered);
        let parquet = EncodeOptions::new(FileFormat::Parquet, Codec::Snappy, None);
        assert_eq!(parquet.strategy(), EncodeStrategy::Streaming);
    }

    #[test]
    fn encoding_is_deterministic() {
        let table = sample();
        let options = EncodeOptions::new(FileFormat::Arrow, Codec::Zstd, Some(3));
        let first = encode_table(&table, &options).unwrap();
        let second = encode_table(&table, &options).unwrap();
        assert_eq!(first.hash, second.hash);
    }

    #[test]
    fn negative_zstd_level_streams() {
        let table = sample();
        let options = EncodeOptions::new(FileFormat::Arrow, Codec::Zstd, Some(-5));
        let encoded = encode_table(&table, &options).unwrap();
        let decoded = decode_object(&encoded.bytes, FileFormat::Arrow, Codec::Zstd).unwrap();
        assert_eq!(decoded.num_rows(), 500);
    }
}
