//! Error taxonomy for the ETL framework
//!
//! Stage implementations return [`eyre::Result`]; framework failures are
//! raised as [`EtlError`] and convert into an [`eyre::Report`] with `?`, so
//! callers can still find the structured variant in the error chain.

/// Boxed cause of an extraction failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Structured failures raised by the framework core
#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    #[error("Missing configuration field '{field}'")]
    MissingConfig { field: String },

    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Dataset '{0}' not found")]
    MissingDataset(String),

    #[error("Dataset '{dataset}' failed validation: {reason}")]
    Validation { dataset: String, reason: String },

    #[error("Column '{column}' failed validation: {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("Schema mismatch: expected {expected} columns, found {found}")]
    Schema { expected: usize, found: usize },

    #[error("Record {index} is not an object")]
    NotARecord { index: usize },

    #[error("Extraction job '{0}' is already registered")]
    DuplicateJob(String),

    #[error("Invalid extraction job: {0}")]
    InvalidJob(String),

    #[error("Extraction job '{job}' failed")]
    Extraction {
        job: String,
        #[source]
        source: BoxError,
    },

    #[error("{} check(s) failed: {}", .0.len(), summarize(.0))]
    ChecksFailed(Vec<EtlError>),

    #[error("Load into '{target}' failed: {reason}")]
    Load { target: String, reason: String },
}

impl EtlError {
    /// Build an extraction failure for `job` from any eyre report
    pub fn extraction(job: impl Into<String>, source: eyre::Report) -> Self {
        Self::Extraction {
            job: job.into(),
            source: source.into(),
        }
    }

    /// Name of the field, dataset, job or load target this error is about
    ///
    /// Column failures have no subject; the column is part of the message.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::MissingConfig { field } | Self::InvalidConfig { field, .. } => Some(field),
            Self::MissingDataset(name) | Self::DuplicateJob(name) => Some(name),
            Self::Validation { dataset, .. } => Some(dataset),
            Self::Extraction { job, .. } => Some(job),
            Self::Load { target, .. } => Some(target),
            _ => None,
        }
    }
}

fn summarize(errors: &[EtlError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
