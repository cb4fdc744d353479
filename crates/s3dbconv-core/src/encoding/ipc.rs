use std::io::{self, Read, Write};

use arrow::compute::concat_batches;
use arrow::ipc::reader::StreamReader;
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

use super::codec::Codec;
use super::hashing::{Blake3Hash, HashingBuffer};
use crate::error::{ConvertError, Result};

const BROTLI_BUFFER_SIZE: usize = 64 * 1024;
const BROTLI_LG_WINDOW: u32 = 22;

/// Compressing writer for the streaming codecs
enum CompressingWriter<W: Write> {
    Zstd(zstd::stream::write::Encoder<'static, W>),
    Gzip(GzEncoder<W>),
    Brotli(Box<brotli::CompressorWriter<W>>),
    Lz4(lz4_flex::frame::FrameEncoder<W>),
}

impl<W: Write> CompressingWriter<W> {
    fn new(inner: W, codec: Codec, level: Option<i32>) -> Result<Self> {
        let level = codec.effective_level(level);
        match codec {
            Codec::Zstd => zstd::stream::write::Encoder::new(inner, level.unwrap_or(1))
                .map(Self::Zstd)
                .map_err(|e| ConvertError::encode(format!("failed to start zstd stream: {e}"))),
            Codec::Gzip => Ok(Self::Gzip(GzEncoder::new(
                inner,
                flate2::Compression::new(level.unwrap_or(9).unsigned_abs()),
            ))),
            Codec::Brotli => Ok(Self::Brotli(Box::new(brotli::CompressorWriter::new(
                inner,
                BROTLI_BUFFER_SIZE,
                level.unwrap_or(8).unsigned_abs(),
                BROTLI_LG_WINDOW,
            )))),
            Codec::Lz4 => Ok(Self::Lz4(lz4_flex::frame::FrameEncoder::new(inner))),
            Codec::Snappy => Err(ConvertError::encode("snappy has no streaming writer")),
        }
    }

    /// Flush the codec trailer and hand back the inner writer.
    fn finish(self) -> Result<W> {
        let finished = match self {
            Self::Zstd(encoder) => encoder.finish(),
            Self::Gzip(encoder) => encoder.finish(),
            Self::Brotli(encoder) => Ok(encoder.into_inner()),
            Self::Lz4(encoder) => encoder.finish().map_err(io::Error::other),
        };
        finished.map_err(|e| ConvertError::encode(format!("failed to finish compression: {e}")))
    }
}

impl<W: Write> Write for CompressingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Zstd(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Brotli(w) => w.write(buf),
            Self::Lz4(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Zstd(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Brotli(w) => w.flush(),
            Self::Lz4(w) => w.flush(),
        }
    }
}

fn write_stream<W: Write>(sink: W, table: &RecordBatch) -> Result<()> {
    let schema = table.schema();
    let mut writer = StreamWriter::try_new(sink, &schema)
        .map_err(|e| ConvertError::encode(format!("failed to start IPC stream: {e}")))?;
    writer
        .write(table)
        .map_err(|e| ConvertError::encode(format!("failed to write IPC batch: {e}")))?;
    writer
        .finish()
        .map_err(|e| ConvertError::encode(format!("failed to finish IPC stream: {e}")))
}

/// Serialize straight into the compressor; one pass, no uncompressed copy.
pub(crate) fn write_stream_compressed(
    table: &RecordBatch,
    codec: Codec,
    level: Option<i32>,
) -> Result<(Vec<u8>, Blake3Hash)> {
    let mut compressor = CompressingWriter::new(HashingBuffer::new(), codec, level)?;
    write_stream(&mut compressor, table)?;
    Ok(compressor.finish()?.finish())
}

/// Serialize uncompressed, then compress the whole buffer.
pub(crate) fn write_stream_buffered(table: &RecordBatch) -> Result<(Vec<u8>, Blake3Hash)> {
    let mut raw = Vec::new();
    write_stream(&mut raw, table)?;
    debug!(uncompressed_bytes = raw.len(), "IPC stream serialized");

    let compressed = snap::raw::Encoder::new()
        .compress_vec(&raw)
        .map_err(|e| ConvertError::encode(format!("snappy compression failed: {e}")))?;
    drop(raw);

    let hash = Blake3Hash::of(&compressed);
    Ok((compressed, hash))
}

/// Decompress an Arrow object and read its IPC stream back into one table.
pub(crate) fn read_stream(bytes: &[u8], codec: Codec) -> Result<RecordBatch> {
    let raw = decompress(bytes, codec)
        .map_err(|e| ConvertError::decode(format!("{codec} decompression failed: {e}")))?;

    let reader = StreamReader::try_new(raw.as_slice(), None)
        .map_err(|e| ConvertError::decode(format!("invalid IPC stream: {e}")))?;
    let schema = reader.schema();
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ConvertError::decode(format!("failed to read IPC batch: {e}")))?;

    concat_batches(&schema, &batches)
        .map_err(|e| ConvertError::decode(format!("failed to combine IPC batches: {e}")))
}

fn decompress(bytes: &[u8], codec: Codec) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    match codec {
        Codec::Zstd => return zstd::decode_all(bytes),
        Codec::Snappy => {
            return snap::raw::Decoder::new()
                .decompress_vec(bytes)
                .map_err(io::Error::other)
        }
        Codec::Gzip => GzDecoder::new(bytes).read_to_end(&mut out)?,
        Codec::Brotli => brotli::Decompressor::new(bytes, BROTLI_BUFFER_SIZE).read_to_end(&mut out)?,
        Codec::Lz4 => lz4_flex::frame::FrameDecoder::new(bytes).read_to_end(&mut out)?,
    };
    Ok(out)
}
