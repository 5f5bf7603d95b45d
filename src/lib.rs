//! etlkit
//!
//! A templated extract → transform → load framework for business data
//! pipelines, with concurrent multi-source extraction.

pub mod cli;
pub mod containers;
pub mod error;
pub mod etl;
pub mod storage;

// Re-exports for convenience
pub use containers::{Config, ConfigBuilder, Data, Location, Table};
pub use error::EtlError;
pub use etl::{
    DatasetExtractor, ExecutionMode, ExtractTemplate, LoadTemplate, MultiExtractor, TableSink,
    TemplatePipeline, TransformTemplate,
};
pub use storage::{NdjsonExtractor, NdjsonSink};
