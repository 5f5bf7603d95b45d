//! Integration tests for multi-source extraction
//!
//! These tests run several stub extractors with artificial latencies through
//! a MultiExtractor in both execution modes.

use async_trait::async_trait;
use etlkit::etl::{BlockingExtractor, DatasetExtractor, ExecutionMode, MultiExtractor};
use etlkit::{EtlError, Table};
use eyre::Result;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns a fixed table of `rows` rows after `delay`
struct StubExtractor {
    rows: usize,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl StubExtractor {
    fn new(rows: usize, delay_ms: u64) -> Self {
        Self {
            rows,
            delay: Duration::from_millis(delay_ms),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl DatasetExtractor for StubExtractor {
    async fn fetch(&self, query: &str) -> Result<Table> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let rows = (0..self.rows)
            .map(|i| vec![json!(format!("{query}-{i}")), json!(i)])
            .collect();
        Ok(Table::with_rows(["Id", "n"], rows)?)
    }
}

/// Fails after `delay`
struct FailingExtractor {
    delay: Duration,
    message: &'static str,
}

#[async_trait]
impl DatasetExtractor for FailingExtractor {
    async fn fetch(&self, _query: &str) -> Result<Table> {
        tokio::time::sleep(self.delay).await;
        eyre::bail!("{}", self.message)
    }
}

struct PanickingExtractor;

#[async_trait]
impl DatasetExtractor for PanickingExtractor {
    async fn fetch(&self, _query: &str) -> Result<Table> {
        panic!("extractor bug")
    }
}

fn extraction_job(err: &EtlError) -> &str {
    match err {
        EtlError::Extraction { job, .. } => job,
        other => panic!("expected an extraction error, got {other}"),
    }
}

#[tokio::test]
async fn test_two_jobs_produce_named_datasets() -> Result<()> {
    let mut extractor = MultiExtractor::concurrent();
    extractor.create_job(
        Arc::new(StubExtractor::new(3, 5)),
        "opps",
        "SELECT Id FROM Opportunity",
    )?;
    extractor.create_job(
        Arc::new(StubExtractor::new(5, 1)),
        "fh",
        "SELECT Id FROM OpportunityFieldHistory",
    )?;

    let data = extractor.run().await?;

    assert_eq!(data.len(), 2);
    assert_eq!(data.get("df_opps")?.num_rows(), 3);
    assert_eq!(data.get("df_fh")?.num_rows(), 5);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_result_independent_of_completion_order() -> Result<()> {
    async fn run_with_delays(delays: [u64; 3]) -> Result<etlkit::Data> {
        let mut extractor = MultiExtractor::concurrent();
        for (name, delay) in ["accounts", "opps", "fh"].into_iter().zip(delays) {
            extractor.create_job(Arc::new(StubExtractor::new(2, delay)), name, name)?;
        }
        Ok(extractor.run().await?)
    }

    let fast_first = run_with_delays([1, 20, 40]).await?;
    let slow_first = run_with_delays([40, 20, 1]).await?;

    assert_eq!(
        fast_first.names().collect::<Vec<_>>(),
        vec!["df_accounts", "df_fh", "df_opps"]
    );
    assert_eq!(fast_first, slow_first);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_matches_sequential() -> Result<()> {
    let mut results = Vec::new();
    for mode in [ExecutionMode::Sequential, ExecutionMode::Concurrent] {
        let mut extractor = MultiExtractor::new(mode);
        extractor.create_job(Arc::new(StubExtractor::new(4, 10)), "a", "qa")?;
        extractor.create_job(Arc::new(StubExtractor::new(1, 0)), "b", "qb")?;
        results.push(extractor.run().await?);
    }

    assert_eq!(results[0], results[1]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_jobs_run_concurrently() -> Result<()> {
    let mut extractor = MultiExtractor::concurrent();
    for name in ["a", "b", "c", "d"] {
        extractor.create_job(Arc::new(StubExtractor::new(1, 200)), name, name)?;
    }

    let started = std::time::Instant::now();
    let data = extractor.run().await?;

    assert_eq!(data.len(), 4);
    assert!(
        started.elapsed() < Duration::from_millis(700),
        "four 200ms jobs should overlap, took {:?}",
        started.elapsed()
    );
    Ok(())
}

#[tokio::test]
async fn test_single_failure_fails_run_and_names_job() {
    let succeeded = StubExtractor::new(3, 1);
    let calls = Arc::clone(&succeeded.calls);

    let mut extractor = MultiExtractor::concurrent();
    extractor
        .create_job(Arc::new(succeeded), "opps", "q")
        .unwrap();
    extractor
        .create_job(
            Arc::new(FailingExtractor {
                delay: Duration::from_millis(1),
                message: "INVALID_SESSION_ID",
            }),
            "fh",
            "q",
        )
        .unwrap();

    let err = extractor.run().await.unwrap_err();

    assert_eq!(extraction_job(&err), "fh");
    let cause = std::error::Error::source(&err).unwrap().to_string();
    assert!(cause.contains("INVALID_SESSION_ID"));
    // The sibling was awaited, not cancelled
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_earliest_registered_failure_is_reported() {
    let mut extractor = MultiExtractor::concurrent();
    extractor
        .create_job(
            Arc::new(FailingExtractor {
                delay: Duration::from_millis(30),
                message: "slow failure",
            }),
            "first",
            "q",
        )
        .unwrap();
    extractor
        .create_job(
            Arc::new(FailingExtractor {
                delay: Duration::from_millis(1),
                message: "fast failure",
            }),
            "second",
            "q",
        )
        .unwrap();

    let err = extractor.run().await.unwrap_err();
    assert_eq!(extraction_job(&err), "first");
}

#[tokio::test]
async fn test_panicking_job_is_reported_as_failure() {
    let mut extractor = MultiExtractor::concurrent();
    extractor
        .create_job(Arc::new(StubExtractor::new(1, 0)), "ok", "q")
        .unwrap();
    extractor
        .create_job(Arc::new(PanickingExtractor), "buggy", "q")
        .unwrap();

    let err = extractor.run().await.unwrap_err();
    assert_eq!(extraction_job(&err), "buggy");
}

#[tokio::test]
async fn test_shared_blocking_extractor_across_jobs() -> Result<()> {
    let crm = Arc::new(BlockingExtractor::new(|query: &str| {
        let rows = query.len();
        Ok(Table::with_rows(
            ["n"],
            (0..rows).map(|i| vec![json!(i)]).collect(),
        )?)
    }));

    let mut extractor = MultiExtractor::concurrent();
    extractor
        .create_job(crm.clone(), "short", "ab")?
        .create_job(crm, "long", "abcdef")?;

    let data = extractor.run().await?;
    assert_eq!(data.get("df_short")?.num_rows(), 2);
    assert_eq!(data.get("df_long")?.num_rows(), 6);
    Ok(())
}
