//! In-memory tabular data read from spreadsheet sheets.
//!
//! A [`Table`] is a list of named columns plus rows of [`Cell`]s. Every row
//! always has exactly one cell per column; operations that add columns fill
//! existing rows so that shape holds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single spreadsheet value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Null or blank text.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual form of the value, `None` for empty cells.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Int(n) => Some(n.to_string()),
            Cell::Float(f) => Some(format_float(*f)),
            Cell::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        }
    }

    /// Numeric form of the value.
    ///
    /// `Ok(None)` for empty cells.
    pub fn to_number(&self) -> std::result::Result<Option<f64>, NotNumeric> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Int(n) => Ok(Some(*n as f64)),
            Cell::Float(f) => Ok(Some(*f)),
            Cell::Bool(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed.parse::<f64>().map(Some).map_err(|_| NotNumeric)
            }
        }
    }
}

/// A cell value that cannot be read as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotNumeric;

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => write!(f, "{text}"),
            None => write!(f, ""),
        }
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from a header and rows; short rows are padded with
    /// empty cells and long rows truncated to the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    /// Index of `name`, appending it filled with `fill` if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str, fill: Cell) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        self.columns.len() - 1
    }

    /// Set every cell of `name` to `value`, creating the column if needed.
    pub fn set_column(&mut self, name: &str, value: Cell) {
        let idx = self.ensure_column(name, Cell::Empty);
        for row in &mut self.rows {
            row[idx] = value.clone();
        }
    }

    /// Replace the cells of an existing column; no-op when the column is absent.
    pub fn map_column<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = f(&row[idx]);
            }
        }
    }

    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String], &[Cell]) -> bool,
    {
        let columns = &self.columns;
        self.rows.retain(|row| keep(columns, row));
    }

    /// Concatenate tables top to bottom.
    ///
    /// Columns are the union of all inputs in order of first appearance;
    /// cells for columns a source table lacks are empty.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for col in &table.columns {
                if !columns.contains(col) {
                    columns.push(col.clone());
                }
            }
        }

        let mut out = Table::new(columns);
        for table in tables {
            let positions: Vec<usize> = table
                .columns
                .iter()
                .filter_map(|c| out.column_index(c))
                .collect();
            for row in table.rows {
                let mut merged = vec![Cell::Empty; out.columns.len()];
                for (cell, pos) in row.into_iter().zip(&positions) {
                    merged[*pos] = cell;
                }
                out.rows.push(merged);
            }
        }
        out
    }

    /// Keep only `names`, in that order; names the table lacks become empty columns.
    pub fn select(self, names: &[&str]) -> Table {
        let positions: Vec<Option<usize>> = names.iter().map(|n| self.column_index(n)).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| pos.map(|i| row[i].clone()).unwrap_or(Cell::Empty))
                    .collect()
            })
            .collect();
        Table {
            columns: names.iter().map(|n| n.to_string()).collect(),
            rows,
        }
    }

    /// First `n` rows rendered as tab separated text, for debug logging.
    pub fn preview(&self, n: usize) -> String {
        let mut out = self.columns.join("\t");
        for row in self.rows.iter().take(n) {
            out.push('\n');
            let line: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            out.push_str(&line.join("\t"));
        }
        out
    }
}
