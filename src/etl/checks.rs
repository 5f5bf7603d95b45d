//! Pre-flight checks for transform output and load targets
//!
//! Every check in a group runs; the failures are logged and returned together
//! as one [`EtlError::ChecksFailed`].

use crate::containers::{Config, Table};
use crate::error::EtlError;

/// Column every loadable table must carry, with unique values
pub const UNIQUE_ID: &str = "Unique_ID";

/// Require a unique [`UNIQUE_ID`] column
pub fn check_unique_id(table: &Table) -> Result<(), EtlError> {
    report(unique_id_failures(table))
}

/// Require non-empty table and dataset names
pub fn check_load_target(config: &Config) -> Result<(), EtlError> {
    report(target_failures(config))
}

/// Target and [`UNIQUE_ID`] checks run before a table is loaded
pub fn check_load(table: &Table, config: &Config) -> Result<(), EtlError> {
    let mut failures = target_failures(config);
    failures.extend(unique_id_failures(table));
    report(failures)
}

fn unique_id_failures(table: &Table) -> Vec<EtlError> {
    match table.is_unique(UNIQUE_ID) {
        Some(true) => vec![],
        Some(false) => vec![EtlError::InvalidColumn {
            column: UNIQUE_ID.to_string(),
            reason: "values are not unique".to_string(),
        }],
        None => vec![EtlError::InvalidColumn {
            column: UNIQUE_ID.to_string(),
            reason: "column is missing from the output".to_string(),
        }],
    }
}

fn target_failures(config: &Config) -> Vec<EtlError> {
    [config.require_table_name(), config.require_dataset_name()]
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

fn report(failures: Vec<EtlError>) -> Result<(), EtlError> {
    if failures.is_empty() {
        return Ok(());
    }
    for failure in &failures {
        log::error!("{}", failure);
    }
    Err(EtlError::ChecksFailed(failures))
}
