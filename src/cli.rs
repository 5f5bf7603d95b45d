//! CLI helper functions
//!
//! The `etlkit run` command is itself a pipeline built on the framework:
//! NDJSON sources are fanned out through a [`MultiExtractor`], concatenated
//! into `df_final`, checked, and loaded into an [`NdjsonSink`].

use crate::{
    containers::{Config, ConfigBuilder, Data, Table},
    error::EtlError,
    etl::{
        ExecutionMode, ExtractTemplate, MultiExtractor, SinkLoader, TemplatePipeline,
        TransformTemplate, checks, dataset_key,
    },
    storage::{NdjsonExtractor, NdjsonSink, read_table},
};
use eyre::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Dataset holding the concatenated sources
pub const FINAL_DATASET: &str = "df_final";

/// Column recording which source a row came from
pub const SOURCE_COLUMN: &str = "Source";

/// A `NAME=PATH` source argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for SourceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=PATH, got '{}'", s))?;
        let (name, path) = (name.trim(), path.trim());
        if name.is_empty() || path.is_empty() {
            return Err(format!("expected NAME=PATH, got '{}'", s));
        }
        Ok(Self {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Settings for [`run_pipeline`]
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub sources: Vec<SourceSpec>,
    pub output_dir: PathBuf,
    pub config_file: Option<PathBuf>,
    pub table_name: Option<String>,
    pub dataset_name: Option<String>,
    pub update_mode: bool,
    pub sequential: bool,
    pub dry_run: bool,
}

impl RunOptions {
    /// Assemble the run configuration
    ///
    /// Process environment first, then the config file, then flags.
    pub fn config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::from_env();
        if let Some(path) = &self.config_file {
            builder = builder.merge_yaml_file(path)?;
        }
        if let Some(table) = &self.table_name {
            builder = builder.table_name(table);
        }
        if let Some(dataset) = &self.dataset_name {
            builder = builder.dataset_name(dataset);
        }
        if self.update_mode {
            builder = builder.update_mode(true);
        }

        let sources: Vec<Value> = self
            .sources
            .iter()
            .map(|s| Value::String(s.name.clone()))
            .collect();
        Ok(builder.extra("sources", sources).build()?)
    }
}

/// Extract stage reading every source through one [`MultiExtractor`]
pub struct SourcesExtract {
    config: Arc<Config>,
    sources: Vec<SourceSpec>,
    mode: ExecutionMode,
}

impl SourcesExtract {
    pub fn new(config: Arc<Config>, sources: Vec<SourceSpec>, mode: ExecutionMode) -> Self {
        Self {
            config,
            sources,
            mode,
        }
    }
}

impl ExtractTemplate for SourcesExtract {
    async fn run(&mut self) -> Result<Data> {
        log::debug!("Extracting with config:\n{}", self.config);
        let files = Arc::new(NdjsonExtractor::new("."));

        let mut extractor = MultiExtractor::new(self.mode);
        for source in &self.sources {
            extractor.create_job(
                files.clone(),
                source.name.as_str(),
                source.path.to_string_lossy(),
            )?;
        }
        Ok(extractor.run().await?)
    }
}

/// Concatenates every source into [`FINAL_DATASET`], tagging rows with
/// [`SOURCE_COLUMN`]
pub struct ConcatTransform {
    inputs: Vec<(String, String)>,
}

impl ConcatTransform {
    /// Build from the `sources` extra of the run configuration
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let invalid = |reason: String| EtlError::InvalidConfig {
            field: "sources".to_string(),
            reason,
        };
        let sources = config
            .require_extra("sources")?
            .as_array()
            .ok_or_else(|| invalid("expected a list of names".to_string()))?;

        let inputs = sources
            .iter()
            .map(|source| match source.as_str() {
                Some(name) => Ok((name.to_string(), dataset_key(name))),
                None => Err(invalid(format!("expected a name, got {source}"))),
            })
            .collect::<Result<_, EtlError>>()?;
        Ok(Self { inputs })
    }

    fn append_source(&self, data: &mut Data, name: &str, key: &str) -> Result<()> {
        let mut table = data.take(key)?;
        table.add_column(SOURCE_COLUMN, Value::String(name.to_string()));
        data.get_mut(FINAL_DATASET)?.concat(table);
        Ok(())
    }
}

impl TransformTemplate for ConcatTransform {
    type Output = Table;

    fn required_inputs(&self) -> Vec<&str> {
        self.inputs.iter().map(|(_, key)| key.as_str()).collect()
    }

    fn transform(&mut self, data: &mut Data) -> Result<Table> {
        data.set(FINAL_DATASET, Table::default());
        for (name, key) in &self.inputs {
            self.append_source(data, name, key)?;
        }
        Ok(data.take(FINAL_DATASET)?)
    }

    fn check_output(&self, output: &Table) -> Result<()> {
        Ok(checks::check_unique_id(output)?)
    }
}

/// Run the NDJSON concat pipeline
///
/// Pipeline: SourcesExtract → ConcatTransform → SinkLoader<NdjsonSink>
///
/// Returns the number of rows in the final table
pub async fn run_pipeline(options: RunOptions) -> Result<usize> {
    let config = options.config()?;
    let mode = if options.sequential {
        ExecutionMode::Sequential
    } else {
        ExecutionMode::Concurrent
    };

    let sources = options.sources.clone();
    let pipeline = TemplatePipeline::new(
        config,
        move |config| Ok(SourcesExtract::new(config, sources.clone(), mode)),
        ConcatTransform::from_config,
    );

    let table = if options.dry_run {
        log::info!("Dry run, no load stage bound");
        let table = pipeline.run().await?;
        println!("{table}");
        table
    } else {
        let output_dir = options.output_dir.clone();
        pipeline
            .with_load(move |_| Ok(SinkLoader::new(NdjsonSink::new(&output_dir))))
            .run()
            .await?
    };

    Ok(table.num_rows())
}

/// Render an NDJSON file as a table of its first `rows` rows
pub fn inspect(path: impl Into<PathBuf>, rows: usize) -> Result<String> {
    let path = path.into();
    let table = read_table(&path).with_context(|| format!("Failed to inspect {}", path.display()))?;
    Ok(format!(
        "{} rows x {} columns\n{}",
        table.num_rows(),
        table.num_columns(),
        table.head(rows)
    ))
}
