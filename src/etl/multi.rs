//! Fan-out extraction of several named datasets

use super::DatasetExtractor;
use crate::containers::{Data, Table};
use crate::error::EtlError;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Key under which a job's dataset is stored in the resulting [`Data`]
///
/// ```
/// assert_eq!(etlkit::etl::dataset_key("opps"), "df_opps");
/// ```
pub fn dataset_key(job_name: &str) -> String {
    format!("df_{}", job_name)
}

/// How a [`MultiExtractor`] schedules its jobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One job at a time, in registration order
    #[default]
    Sequential,
    /// One task per job, all in flight at once
    Concurrent,
}

/// One named fetch against one extractor
#[derive(Clone)]
pub struct ExtractionJob {
    extractor: Arc<dyn DatasetExtractor>,
    name: String,
    query: String,
}

impl ExtractionJob {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Key of this job's dataset in the merged [`Data`]
    pub fn dataset_key(&self) -> String {
        dataset_key(&self.name)
    }

    async fn execute(&self) -> eyre::Result<Table> {
        log::debug!("Running extraction job '{}'", self.name);
        self.extractor.fetch(&self.query).await
    }
}

impl std::fmt::Debug for ExtractionJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionJob")
            .field("name", &self.name)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Runs a set of [`ExtractionJob`]s and merges their tables into one [`Data`]
///
/// Every job must be registered with [`create_job`](Self::create_job) before
/// [`run`](Self::run), which consumes the extractor.
///
/// In concurrent mode a failing job does not cancel its siblings: every job
/// is awaited, then the failure of the earliest-registered failing job is
/// returned. No partial [`Data`] is ever returned.
///
/// # Example
/// ```no_run
/// use etlkit::etl::{BlockingExtractor, ExecutionMode, MultiExtractor};
/// use etlkit::Table;
/// use std::sync::Arc;
///
/// # async fn example() -> eyre::Result<()> {
/// let crm = Arc::new(BlockingExtractor::new(|_query: &str| Ok(Table::new(["Id"]))));
///
/// let mut extractor = MultiExtractor::new(ExecutionMode::Concurrent);
/// extractor.create_job(crm.clone(), "opps", "SELECT Id FROM Opportunity")?;
/// extractor.create_job(crm, "fh", "SELECT Id FROM OpportunityFieldHistory")?;
///
/// let data = extractor.run().await?;
/// assert!(data.contains("df_opps"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MultiExtractor {
    mode: ExecutionMode,
    jobs: Vec<ExtractionJob>,
    names: HashSet<String>,
}

impl MultiExtractor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn sequential() -> Self {
        Self::new(ExecutionMode::Sequential)
    }

    pub fn concurrent() -> Self {
        Self::new(ExecutionMode::Concurrent)
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn jobs(&self) -> &[ExtractionJob] {
        &self.jobs
    }

    /// Register a job
    ///
    /// # Errors
    /// - [`EtlError::InvalidJob`] if `name` is empty
    /// - [`EtlError::DuplicateJob`] if a job with `name` is already registered
    pub fn create_job(
        &mut self,
        extractor: Arc<dyn DatasetExtractor>,
        name: impl Into<String>,
        query: impl Into<String>,
    ) -> Result<&mut Self, EtlError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EtlError::InvalidJob("job name cannot be empty".to_string()));
        }
        if !self.names.insert(name.clone()) {
            return Err(EtlError::DuplicateJob(name));
        }

        self.jobs.push(ExtractionJob {
            extractor,
            name,
            query: query.into(),
        });
        Ok(self)
    }

    /// Run every registered job and merge the results
    ///
    /// Each job's table is stored under [`dataset_key`] of its name.
    ///
    /// # Errors
    /// Returns [`EtlError::Extraction`] naming the failed job
    pub async fn run(self) -> Result<Data, EtlError> {
        log::info!(
            "Running {} extraction job(s) {}",
            self.jobs.len(),
            match self.mode {
                ExecutionMode::Sequential => "sequentially",
                ExecutionMode::Concurrent => "concurrently",
            }
        );

        match self.mode {
            ExecutionMode::Sequential => Self::run_sequential(self.jobs).await,
            ExecutionMode::Concurrent => Self::run_concurrent(self.jobs).await,
        }
    }

    async fn run_sequential(jobs: Vec<ExtractionJob>) -> Result<Data, EtlError> {
        let mut data = Data::new();
        for job in jobs {
            let table = job
                .execute()
                .await
                .map_err(|e| EtlError::extraction(&job.name, e))?;
            log::info!("Extracted {} rows from {}", table.num_rows(), job.name);
            data.set(job.dataset_key(), table);
        }
        Ok(data)
    }

    async fn run_concurrent(jobs: Vec<ExtractionJob>) -> Result<Data, EtlError> {
        let mut set = JoinSet::new();
        let mut task_index = HashMap::new();
        for (index, job) in jobs.iter().cloned().enumerate() {
            let handle = set.spawn(async move { (index, job.execute().await) });
            task_index.insert(handle.id(), index);
        }

        // One slot per job, filled in completion order
        let mut slots: Vec<Option<eyre::Result<Table>>> = jobs.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => {
                    if let Some(&index) = task_index.get(&e.id()) {
                        slots[index] = Some(Err(eyre::eyre!("Extraction task panicked: {}", e)));
                    }
                }
            }
        }

        let mut data = Data::new();
        let mut failure = None;
        for (job, slot) in jobs.into_iter().zip(slots) {
            match slot {
                Some(Ok(table)) => {
                    log::info!("Extracted {} rows from {}", table.num_rows(), job.name);
                    data.set(job.dataset_key(), table);
                }
                Some(Err(e)) if failure.is_none() => {
                    log::error!("Extraction job '{}' failed: {:#}", job.name, e);
                    failure = Some(EtlError::extraction(job.name, e));
                }
                Some(Err(e)) => log::error!("Extraction job '{}' failed: {:#}", job.name, e),
                None if failure.is_none() => {
                    failure = Some(EtlError::extraction(
                        job.name,
                        eyre::eyre!("Extraction task did not complete"),
                    ));
                }
                None => {}
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(data),
        }
    }
}
