//! Core ETL (Extract, Transform, Load) abstractions
//!
//! This module provides the stage contracts pipeline authors implement, the
//! [`MultiExtractor`] used inside extract stages to fan out to several
//! sources, and the [`TemplatePipeline`] that runs the stages in order.

pub mod checks;
mod extract;
mod load;
mod multi;
mod pipeline;
mod transform;

pub use extract::{BlockingExtractor, DatasetExtractor, ExtractTemplate};
pub use load::{LoadTemplate, NoLoad, SinkLoader, TableSink};
pub use multi::{ExecutionMode, ExtractionJob, MultiExtractor, dataset_key};
pub use pipeline::{StageFactory, TemplatePipeline};
pub use transform::TransformTemplate;
