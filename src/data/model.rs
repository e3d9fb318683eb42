use std::collections::HashMap;
use std::fmt;

use nalgebra::DMatrix;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Column – one named series of the table
// ---------------------------------------------------------------------------

/// A typed column. Measured data is `Float`; derived keys such as ranks and
/// `input order` are `Index` so joins compare exact integers.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Float(Vec<f64>),
    Index(Vec<usize>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Index(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row` as `f64`, for plotting and dense extraction.
    pub fn value(&self, row: usize) -> f64 {
        match self {
            Column::Float(v) => v[row],
            Column::Index(v) => v[row] as f64,
        }
    }

    /// All values as `f64`.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Column::Float(v) => v.clone(),
            Column::Index(v) => v.iter().map(|&i| i as f64).collect(),
        }
    }

    pub fn as_index(&self) -> Option<&[usize]> {
        match self {
            Column::Index(v) => Some(v),
            Column::Float(_) => None,
        }
    }

    /// Gather rows in the given order.
    fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(v) => Column::Float(rows.iter().map(|&r| v[r]).collect()),
            Column::Index(v) => Column::Index(rows.iter().map(|&r| v[r]).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – ordered named columns of equal length
// ---------------------------------------------------------------------------

/// A column-major table. Row order is the dataset's input order and every
/// operation here preserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table, checking that names are unique and lengths agree.
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} names for {} columns",
                names.len(),
                columns.len()
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
        }
        if let Some(first) = columns.first() {
            let n = first.len();
            if let Some((name, col)) = names
                .iter()
                .zip(&columns)
                .find(|(_, c)| c.len() != n)
            {
                return Err(PipelineError::ShapeMismatch(format!(
                    "column '{name}' has {} rows, expected {n}",
                    col.len()
                )));
            }
        }
        Ok(Table { names, columns })
    }

    /// Convenience constructor for all-float data.
    pub fn from_float_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        Table::new(names, columns.into_iter().map(Column::Float).collect())
    }

    /// Number of rows (N).
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index_of(name).map(|i| &self.columns[i])
    }

    pub fn column_at(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    /// Append a column. Fails on a name clash or a length mismatch.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        if self.index_of(&name).is_some() {
            return Err(PipelineError::DuplicateColumn(name));
        }
        if !self.columns.is_empty() && column.len() != self.n_rows() {
            return Err(PipelineError::ShapeMismatch(format!(
                "column '{name}' has {} rows, table has {}",
                column.len(),
                self.n_rows()
            )));
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(self)
    }

    /// Same data under new column names, one per column in order.
    ///
    /// Names are trimmed; blank or repeated names are rejected.
    pub fn renamed(&self, names: &[String]) -> Result<Table> {
        if names.len() != self.n_columns() {
            return Err(PipelineError::ShapeMismatch(format!(
                "{} names for {} columns",
                names.len(),
                self.n_columns()
            )));
        }
        let names: Vec<String> = names.iter().map(|n| n.trim().to_string()).collect();
        if let Some(pos) = names.iter().position(String::is_empty) {
            return Err(PipelineError::InvalidConfig(format!(
                "column {} needs a name",
                pos + 1
            )));
        }
        Table::new(names, self.columns.clone())
    }

    /// Keep only the named columns, in the given order.
    pub fn project(&self, names: &[&str]) -> Result<Table> {
        let mut out_names = Vec::with_capacity(names.len());
        let mut out_cols = Vec::with_capacity(names.len());
        for &name in names {
            let col = self
                .column(name)
                .ok_or_else(|| PipelineError::unknown_column(name, "projection"))?;
            out_names.push(name.to_string());
            out_cols.push(col.clone());
        }
        Table::new(out_names, out_cols)
    }

    /// Extract the given column positions as a dense N×K matrix.
    pub fn dense(&self, indices: &[usize]) -> DMatrix<f64> {
        let n = self.n_rows();
        DMatrix::from_fn(n, indices.len(), |r, c| self.columns[indices[c]].value(r))
    }

    /// Inner equi-join on an `Index` key column present in both tables.
    ///
    /// Output rows follow `self`'s row order (no sorting), each left row
    /// repeated once per matching right row. Non-key columns of `other` are
    /// appended after `self`'s columns; a name clash is an error.
    pub fn inner_join(&self, other: &Table, key: &str) -> Result<Table> {
        let left_key = self
            .column(key)
            .and_then(Column::as_index)
            .ok_or_else(|| PipelineError::unknown_column(key, "left side of join"))?;
        let right_key = other
            .column(key)
            .and_then(Column::as_index)
            .ok_or_else(|| PipelineError::unknown_column(key, "right side of join"))?;

        let mut lookup: HashMap<usize, Vec<usize>> = HashMap::with_capacity(right_key.len());
        for (row, &k) in right_key.iter().enumerate() {
            lookup.entry(k).or_default().push(row);
        }

        let mut left_rows = Vec::with_capacity(left_key.len());
        let mut right_rows = Vec::with_capacity(left_key.len());
        for (row, k) in left_key.iter().enumerate() {
            if let Some(matches) = lookup.get(k) {
                for &m in matches {
                    left_rows.push(row);
                    right_rows.push(m);
                }
            }
        }

        let mut names = self.names.clone();
        let mut columns: Vec<Column> = self.columns.iter().map(|c| c.take(&left_rows)).collect();
        for (name, col) in other.names.iter().zip(&other.columns) {
            if name == key {
                continue;
            }
            if names.contains(name) {
                return Err(PipelineError::DuplicateColumn(name.clone()));
            }
            names.push(name.clone());
            columns.push(col.take(&right_rows));
        }
        Table::new(names, columns)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} rows × {} columns [{}]", self.n_rows(), self.n_columns(), self.names.join(", "))
    }
}
