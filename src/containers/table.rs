//! Tabular dataset type
//!
//! A [`Table`] is a list of named columns and rows of heterogeneous JSON
//! values. It is the unit every extractor produces and every loader consumes.

use crate::error::EtlError;

use comfy_table::{Table as Grid, presets::UTF8_FULL_CONDENSED};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Rows shown when a table is printed
const DISPLAY_ROWS: usize = 5;

/// Rows × named columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from columns and rows
    ///
    /// # Errors
    /// Returns [`EtlError::Schema`] if any row width differs from the column count
    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self, EtlError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from JSON objects
    ///
    /// Columns are the union of all keys in first-seen order. Cells for keys
    /// a record lacks are `null`.
    pub fn from_records(records: Vec<Value>) -> Result<Self, EtlError> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        let mut objects = Vec::with_capacity(records.len());

        for (index, record) in records.into_iter().enumerate() {
            let Value::Object(obj) = record else {
                return Err(EtlError::NotARecord { index });
            };
            for key in obj.keys() {
                if seen.insert(key.clone()) {
                    columns.push(key.clone());
                }
            }
            objects.push(obj);
        }

        let rows = objects
            .into_iter()
            .map(|mut obj| {
                columns
                    .iter()
                    .map(|c| obj.remove(c).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    /// Convert every row into a JSON object keyed by column name
    pub fn to_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    /// Append a row
    ///
    /// # Errors
    /// Returns [`EtlError::Schema`] if the row width differs from the column count
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), EtlError> {
        if row.len() != self.columns.len() {
            return Err(EtlError::Schema {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the values of one column
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Whether every value in `name` is distinct, or `None` if the column is absent
    pub fn is_unique(&self, name: &str) -> Option<bool> {
        let mut seen = HashSet::new();
        let unique = self.column(name)?.all(|v| seen.insert(v.to_string()));
        Some(unique)
    }

    /// Copy of the first `n` rows
    pub fn head(&self, n: usize) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Add a column, filling every existing row with `fill`
    ///
    /// An existing column of the same name is overwritten.
    pub fn add_column(&mut self, name: impl Into<String>, fill: Value) {
        let name = name.into();
        match self.column_index(&name) {
            Some(index) => self.rows.iter_mut().for_each(|row| row[index] = fill.clone()),
            None => {
                self.columns.push(name);
                self.rows.iter_mut().for_each(|row| row.push(fill.clone()));
            }
        }
    }

    /// Append the rows of `other`, matching columns by name
    ///
    /// Columns only `other` has are added; cells a side lacks become `null`.
    pub fn concat(&mut self, other: Table) {
        for column in &other.columns {
            if !self.has_column(column) {
                self.add_column(column.clone(), Value::Null);
            }
        }

        let mapping: Vec<Option<usize>> = self
            .columns
            .iter()
            .map(|c| other.column_index(c))
            .collect();

        for row in other.rows {
            let aligned = mapping
                .iter()
                .map(|index| index.map_or(Value::Null, |i| row[i].clone()))
                .collect();
            self.rows.push(aligned);
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut grid = Grid::new();
        grid.load_preset(UTF8_FULL_CONDENSED);
        grid.set_header(&self.columns);
        for row in self.rows.iter().take(DISPLAY_ROWS) {
            grid.add_row(row.iter().map(cell_text));
        }
        write!(f, "{grid}")?;
        if self.rows.len() > DISPLAY_ROWS {
            write!(f, "\n... {} more row(s)", self.rows.len() - DISPLAY_ROWS)?;
        }
        Ok(())
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
