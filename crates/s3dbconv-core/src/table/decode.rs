use std::io::{Cursor, Read};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use flate2::read::GzDecoder;

use crate::error::{ConvertError, Result};

const DEFAULT_BATCH_SIZE: usize = 64 * 1024;

/// Turns header-first delimited text into a typed table
pub trait DelimitedParser: Send + Sync {
    fn parse(&self, text: &[u8]) -> Result<RecordBatch>;
}

/// CSV parser that infers column types from every record
#[derive(Debug, Clone, Copy)]
pub struct CsvParser {
    delimiter: u8,
    batch_size: usize,
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            delimiter: b',',
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl CsvParser {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn format(&self) -> Format {
        Format::default()
            .with_header(true)
            .with_delimiter(self.delimiter)
    }
}

impl DelimitedParser for CsvParser {
    fn parse(&self, text: &[u8]) -> Result<RecordBatch> {
        let format = self.format();
        let (schema, _) = format
            .infer_schema(Cursor::new(text), None)
            .map_err(|e| ConvertError::decode(format!("schema inference failed: {e}")))?;
        let schema = Arc::new(schema);

        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(self.batch_size)
            .build(Cursor::new(text))
            .map_err(|e| ConvertError::decode(format!("failed to open CSV reader: {e}")))?;

        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConvertError::decode(format!("failed to read CSV rows: {e}")))?;

        concat_batches(&schema, &batches)
            .map_err(|e| ConvertError::decode(format!("failed to combine CSV batches: {e}")))
    }
}

/// Gunzip a source object and parse its delimited text.
pub fn decode_source(bytes: &[u8], parser: &dyn DelimitedParser) -> Result<RecordBatch> {
    let mut decoder = GzDecoder::new(bytes);
    let mut text = Vec::new();
    decoder
        .read_to_end(&mut text)
        .map_err(|e| ConvertError::decode(format!("gzip decompression failed: {e}")))?;

    parser.parse(&text)
}
