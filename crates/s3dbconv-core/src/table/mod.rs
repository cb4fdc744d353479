//! Table building: decode, merge, normalize and sub-partition

mod decode;
mod merge;
mod normalize;
mod split;

pub use decode::{decode_source, CsvParser, DelimitedParser};
pub use merge::{merge_tables, promote};
pub use normalize::{AppliedSchema, NullabilityPolicy, FALLBACK_NON_NULL_COLUMNS};
pub use split::{split_by_hour, SubPartition, DEFAULT_SPLIT_COLUMN};
