//! Load stage contract and sink capability

use super::checks;
use crate::containers::{Config, Table};
use crate::error::EtlError;

use async_trait::async_trait;
use eyre::Result;
use std::future::Future;

/// Load stage of a [`TemplatePipeline`](super::TemplatePipeline)
///
/// Consumes the transform output `I` and writes it somewhere. Any error
/// aborts the run.
pub trait LoadTemplate<I: Sync>: Send {
    fn run(&mut self, result: &I, config: &Config) -> impl Future<Output = Result<()>> + Send;
}

/// Load stage type of a pipeline with no load bound
///
/// It has no values, so a pipeline typed with it can never call a loader.
#[derive(Debug)]
pub enum NoLoad {}

impl<I: Sync> LoadTemplate<I> for NoLoad {
    async fn run(&mut self, _result: &I, _config: &Config) -> Result<()> {
        match *self {}
    }
}

/// Destination a [`Table`] can be written to
///
/// # Example
/// ```no_run
/// use etlkit::etl::TableSink;
/// use etlkit::{Config, Table};
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// struct Stdout;
///
/// #[async_trait]
/// impl TableSink for Stdout {
///     async fn write(&self, table: &Table, _config: &Config) -> Result<usize> {
///         println!("{table}");
///         Ok(table.num_rows())
///     }
/// }
/// ```
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Write `table` to the target named by `config`
    ///
    /// Returns the number of rows written
    ///
    /// # Errors
    /// Returns an error if the destination rejects the write
    async fn write(&self, table: &Table, config: &Config) -> Result<usize>;
}

/// [`LoadTemplate`] that checks a table and hands it to a [`TableSink`]
///
/// Before writing it requires non-empty table and dataset names and a unique
/// `Unique_ID` column. An empty table is skipped with a warning. A failed
/// write is reported as [`EtlError::Load`] naming `dataset.table`.
pub struct SinkLoader<S> {
    sink: S,
}

impl<S: TableSink> SinkLoader<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: TableSink> LoadTemplate<Table> for SinkLoader<S> {
    async fn run(&mut self, result: &Table, config: &Config) -> Result<()> {
        checks::check_load(result, config)?;

        if result.is_empty() {
            log::warn!("Table is empty, not loading anything");
            return Ok(());
        }

        let target = format!("{}.{}", config.dataset_name(), config.table_name());
        let count = self
            .sink
            .write(result, config)
            .await
            .map_err(|e| EtlError::Load {
                target: target.clone(),
                reason: format!("{e:#}"),
            })?;
        log::info!("Loaded {} rows into {}", count, target);
        Ok(())
    }
}
