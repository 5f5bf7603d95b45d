//! Named dataset container shared across the stages of one pipeline run

use super::Table;
use crate::error::EtlError;

use std::collections::BTreeMap;
use std::fmt;

/// Rows of each dataset shown when the container is printed
const DISPLAY_ROWS: usize = 5;

/// Mapping from dataset name to [`Table`]
///
/// A `Data` is created by the extract stage and then handed by value to the
/// transform stage, which mutates it in place through `&mut Data`. Nothing is
/// copied between transform steps: a step that needs the unmodified input
/// must `clone()` the table before replacing it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    datasets: BTreeMap<String, Table>,
}

impl Data {
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a dataset
    ///
    /// # Errors
    /// Returns [`EtlError::MissingDataset`] if no dataset is stored under `name`
    pub fn get(&self, name: &str) -> Result<&Table, EtlError> {
        self.datasets
            .get(name)
            .ok_or_else(|| EtlError::MissingDataset(name.to_string()))
    }

    /// Mutably borrow a dataset
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Table, EtlError> {
        self.datasets
            .get_mut(name)
            .ok_or_else(|| EtlError::MissingDataset(name.to_string()))
    }

    /// Store a dataset, returning the one it replaced
    pub fn set(&mut self, name: impl Into<String>, table: Table) -> Option<Table> {
        self.datasets.insert(name.into(), table)
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.datasets.remove(name)
    }

    /// Remove a dataset, failing if it is absent
    pub fn take(&mut self, name: &str) -> Result<Table, EtlError> {
        self.remove(name)
            .ok_or_else(|| EtlError::MissingDataset(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// Dataset names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.datasets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check that every name in `names` is present
    ///
    /// # Errors
    /// Returns [`EtlError::MissingDataset`] for the first absent name
    pub fn require(&self, names: &[&str]) -> Result<(), EtlError> {
        match names.iter().find(|n| !self.contains(n)) {
            Some(missing) => Err(EtlError::MissingDataset(missing.to_string())),
            None => Ok(()),
        }
    }
}

impl FromIterator<(String, Table)> for Data {
    fn from_iter<I: IntoIterator<Item = (String, Table)>>(iter: I) -> Self {
        Self {
            datasets: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Data {
    type Item = (String, Table);
    type IntoIter = std::collections::btree_map::IntoIter<String, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.datasets.into_iter()
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data object:")?;
        for (name, table) in &self.datasets {
            write!(
                f,
                "\n--- {}: [{} rows x {} columns]\n{}",
                name,
                table.num_rows(),
                table.num_columns(),
                table.head(DISPLAY_ROWS)
            )?;
        }
        Ok(())
    }
}
