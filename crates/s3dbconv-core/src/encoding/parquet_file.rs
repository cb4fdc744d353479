use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

use super::codec::Codec;
use super::hashing::{Blake3Hash, HashingBuffer};
use crate::error::{ConvertError, Result};

pub const DEFAULT_ROW_GROUP_SIZE: usize = 128 * 1024;

// Parquet's zstd range is narrower than the range accepted for whole objects.
const PARQUET_ZSTD_LEVELS: (i32, i32) = (1, 22);

fn compression_setting(codec: Codec, level: Option<i32>) -> Result<Compression> {
    let level = codec.effective_level(level);
    let invalid = |e: parquet::errors::ParquetError| {
        ConvertError::encode(format!("parquet rejected {codec} level: {e}"))
    };

    Ok(match codec {
        Codec::Snappy => Compression::SNAPPY,
        Codec::Lz4 => Compression::LZ4_RAW,
        Codec::Gzip => {
            let level = match level {
                Some(l) => GzipLevel::try_new(l.unsigned_abs()).map_err(invalid)?,
                None => GzipLevel::default(),
            };
            Compression::GZIP(level)
        }
        Codec::Brotli => {
            let level = match level {
                Some(l) => BrotliLevel::try_new(l.unsigned_abs()).map_err(invalid)?,
                None => BrotliLevel::default(),
            };
            Compression::BROTLI(level)
        }
        Codec::Zstd => {
            let level = match level {
                Some(l) => ZstdLevel::try_new(l.clamp(PARQUET_ZSTD_LEVELS.0, PARQUET_ZSTD_LEVELS.1))
                    .map_err(invalid)?,
                None => ZstdLevel::default(),
            };
            Compression::ZSTD(level)
        }
    })
}

/// Writer properties for one output object
///
/// - Codec-specific column chunk compression
/// - Dictionary encoding enabled
/// - Page-level statistics for predicate pushdown
/// - s3dbconv version and codec embedded in file metadata
pub(crate) fn writer_properties(
    codec: Codec,
    level: Option<i32>,
    row_group_size: usize,
) -> Result<WriterProperties> {
    let metadata = vec![
        KeyValue {
            key: "s3dbconv.version".to_string(),
            value: Some(env!("CARGO_PKG_VERSION").to_string()),
        },
        KeyValue {
            key: "s3dbconv.compression".to_string(),
            value: Some(codec.as_str().to_string()),
        },
    ];

    Ok(WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(compression_setting(codec, level)?)
        .set_data_page_size_limit(1024 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(row_group_size.max(1))
        .set_dictionary_page_size_limit(1024 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build())
}

/// Write `table` as a single Parquet file, hashing bytes as they are produced.
pub(crate) fn write_parquet(
    table: &RecordBatch,
    codec: Codec,
    level: Option<i32>,
    row_group_size: usize,
) -> Result<(Vec<u8>, Blake3Hash)> {
    let properties = writer_properties(codec, level, row_group_size)?;
    let mut sink = HashingBuffer::new();

    {
        let mut writer = ArrowWriter::try_new(&mut sink, table.schema(), Some(properties))
            .map_err(|e| ConvertError::encode(format!("failed to create Arrow writer: {e}")))?;
        writer
            .write(table)
            .map_err(|e| ConvertError::encode(format!("failed to write table: {e}")))?;
        writer
            .close()
            .map_err(|e| ConvertError::encode(format!("failed to close writer: {e}")))?;
    }

    Ok(sink.finish())
}
