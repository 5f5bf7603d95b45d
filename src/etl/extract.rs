//! Extraction capabilities and the extract stage contract

use crate::containers::{Data, Table};

use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;

/// Something that can fetch one tabular dataset for a query
///
/// Implementors wrap a concrete backend:
/// - CRM bulk-query clients
/// - Warehouses
/// - Files on disk
///
/// Authentication, retries and timeouts are the implementor's concern.
///
/// # Example
/// ```no_run
/// use etlkit::etl::DatasetExtractor;
/// use etlkit::Table;
/// use async_trait::async_trait;
/// use eyre::Result;
///
/// struct CsvDirectory;
///
/// #[async_trait]
/// impl DatasetExtractor for CsvDirectory {
///     async fn fetch(&self, query: &str) -> Result<Table> {
///         // Look up `query` and return its rows
///         Ok(Table::new(["Id"]))
///     }
/// }
/// ```
#[async_trait]
pub trait DatasetExtractor: Send + Sync {
    /// Fetch the dataset described by `query`
    ///
    /// # Errors
    /// Returns an error if the backend fails (network, I/O, parsing, etc.)
    async fn fetch(&self, query: &str) -> Result<Table>;
}

/// Adapter for synchronous fetch functions
///
/// The function runs on tokio's blocking pool, so a slow client does not
/// stall the other jobs of a concurrent [`MultiExtractor`](super::MultiExtractor).
pub struct BlockingExtractor<F> {
    fetch: Arc<F>,
}

impl<F> BlockingExtractor<F>
where
    F: Fn(&str) -> Result<Table> + Send + Sync + 'static,
{
    pub fn new(fetch: F) -> Self {
        Self {
            fetch: Arc::new(fetch),
        }
    }
}

#[async_trait]
impl<F> DatasetExtractor for BlockingExtractor<F>
where
    F: Fn(&str) -> Result<Table> + Send + Sync + 'static,
{
    async fn fetch(&self, query: &str) -> Result<Table> {
        let fetch = Arc::clone(&self.fetch);
        let query = query.to_string();
        tokio::task::spawn_blocking(move || fetch(&query))
            .await
            .map_err(|e| eyre::eyre!("Blocking extractor task failed: {}", e))?
    }
}

/// Extract stage of a [`TemplatePipeline`](super::TemplatePipeline)
///
/// The stage is built from the run's [`Config`](crate::Config) by the
/// factory bound to the pipeline, then `run` is called once. It typically
/// registers jobs on a [`MultiExtractor`](super::MultiExtractor) and returns
/// its [`Data`].
pub trait ExtractTemplate: Send {
    /// Produce a fresh [`Data`] for this run
    ///
    /// # Errors
    /// Any extraction or configuration failure aborts the run
    fn run(&mut self) -> impl std::future::Future<Output = Result<Data>> + Send;
}
