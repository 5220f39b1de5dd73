//! In-memory tabular data: ordered, unique column names and rows of
//! nullable scalar cells.
//!
//! Every row holds exactly one cell per column, which [`Table::new`] and
//! [`Table::push_row`] enforce. Operations that change shape return a new
//! table rather than editing one in place.

use itertools::Itertools;

use crate::{
    data::Cell,
    error::{AppendError, Result},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        validate_column_names(&columns)?;
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn with_columns(columns: Vec<String>) -> Result<Self> {
        Self::new(columns, Vec::new())
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(AppendError::schema(format!(
                "Row {} has {} value(s) but the table has {} column(s)",
                self.rows.len() + 1,
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell at `row` for the named column.
    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }
}

/// Rejects blank and repeated column names.
pub fn validate_column_names(columns: &[String]) -> Result<()> {
    if let Some(position) = columns.iter().position(|name| name.trim().is_empty()) {
        return Err(AppendError::schema(format!(
            "Column {} has a blank name",
            position + 1
        )));
    }
    let duplicates = columns.iter().duplicates().collect::<Vec<_>>();
    if !duplicates.is_empty() {
        return Err(AppendError::schema(format!(
            "Duplicate column name(s): {}",
            duplicates.iter().join(", ")
        )));
    }
    Ok(())
}
