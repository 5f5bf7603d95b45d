//! File system storage operations
//!
//! Extractors and sinks backed by NDJSON files on disk.

mod ndjson;

pub use ndjson::{NdjsonExtractor, NdjsonSink, read_records, read_table};
