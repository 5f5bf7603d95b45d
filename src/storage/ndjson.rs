//! NDJSON (Newline Delimited JSON) file operations

use crate::containers::{Config, Table};
use crate::etl::{DatasetExtractor, TableSink};

use async_trait::async_trait;
use eyre::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Read all non-blank lines of an NDJSON file as JSON values
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read NDJSON file: {}", path.display()))?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse JSON line: {}", line))
        })
        .collect()
}

/// Read an NDJSON file into a [`Table`]
pub fn read_table(path: impl AsRef<Path>) -> Result<Table> {
    let path = path.as_ref();
    let records = read_records(path)?;
    Table::from_records(records)
        .with_context(|| format!("Invalid record in {}", path.display()))
}

fn encode(table: &Table) -> Result<String> {
    let mut out = String::new();
    for record in table.to_records() {
        out.push_str(&serde_json::to_string(&record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Extractor whose queries are NDJSON file paths under a root directory
pub struct NdjsonExtractor {
    root: PathBuf,
}

impl NdjsonExtractor {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a query to the file it names
    pub fn path_for(&self, query: &str) -> PathBuf {
        self.root.join(query)
    }
}

#[async_trait]
impl DatasetExtractor for NdjsonExtractor {
    async fn fetch(&self, query: &str) -> Result<Table> {
        let path = self.path_for(query);
        log::debug!("Reading {}", path.display());
        read_table(&path)
    }
}

/// Sink writing `<root>/<dataset_name>/<table_name>.ndjson`
///
/// In update mode rows are appended to an existing file; otherwise the file
/// is rewritten from scratch.
pub struct NdjsonSink {
    root: PathBuf,
}

impl NdjsonSink {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File a config's target resolves to
    pub fn path_for(&self, config: &Config) -> PathBuf {
        self.root
            .join(config.dataset_name())
            .join(format!("{}.ndjson", config.table_name()))
    }

    /// Replace the target file with `table`
    pub fn write_from_scratch(&self, table: &Table, path: &Path) -> Result<()> {
        std::fs::write(path, encode(table)?)
            .with_context(|| format!("Failed to write NDJSON file: {}", path.display()))
    }

    /// Append `table` to the target file
    pub fn append(&self, table: &Table, path: &Path) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open NDJSON file: {}", path.display()))?;
        file.write_all(encode(table)?.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl TableSink for NdjsonSink {
    async fn write(&self, table: &Table, config: &Config) -> Result<usize> {
        let path = self.path_for(config);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        if config.update_mode() {
            log::debug!("Appending {} rows to {}", table.num_rows(), path.display());
            self.append(table, &path)?;
        } else {
            log::debug!("Writing {} rows to {}", table.num_rows(), path.display());
            self.write_from_scratch(table, &path)?;
        }
        Ok(table.num_rows())
    }
}
