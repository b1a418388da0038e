//! Raw tabular input
//!
//! A loosely-typed table as read from CSV or JSON. No column is required at
//! this stage; [`crate::schema::normalize`] decides what is usable.

use crate::error::{DetectorError, Result};
use crate::schema::{Record, CATEGORICAL_FEATURES, LABEL_COLUMN, NUMERIC_FEATURES};
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// A single cell of an input table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

/// Column-named rows of [`Cell`]s
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; its width must match the header
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DetectorError::Table(format!(
                "row {} has {} cells, header has {} columns",
                self.rows.len(),
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

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column, matched case-insensitively after trimming
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.trim().eq_ignore_ascii_case(name))
    }

    /// Build a canonical-schema table from records (label column only if any record has one)
    pub fn from_records(records: &[Record]) -> Self {
        let with_label = records.iter().any(|r| r.label.is_some());

        let mut columns: Vec<String> = NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .map(|c| c.to_string())
            .collect();
        if with_label {
            columns.push(LABEL_COLUMN.to_string());
        }

        let rows = records
            .iter()
            .map(|r| {
                let mut row: Vec<Cell> = r.numeric().iter().map(|&v| Cell::Number(v)).collect();
                row.extend(r.categorical().iter().map(|&s| Cell::from(s)));
                if with_label {
                    row.push(match r.label {
                        Some(true) => Cell::Number(1.0),
                        Some(false) => Cell::Number(0.0),
                        None => Cell::Missing,
                    });
                }
                row
            })
            .collect();

        Self { columns, rows }
    }

    /// Load a `.csv` or `.json` file, dispatching on extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Self::from_csv_path(path),
            Some("json") => Self::from_json_path(path),
            _ => Err(DetectorError::Table(format!(
                "unsupported file format: {}",
                path.display()
            ))),
        }
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Parse CSV with a header row; empty cells become [`Cell::Missing`]
    ///
    /// Invalid UTF-8 is replaced with U+FFFD per cell, leaving coercion to
    /// the normalizer.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect();
        let mut table = Self::new(columns);

        for record in reader.byte_records() {
            let record = record?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Missing
                    } else {
                        Cell::Text(String::from_utf8_lossy(field).into_owned())
                    }
                })
                .collect();
            table.push_row(row)?;
        }

        Ok(table)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Parse a JSON array of flat objects
    ///
    /// Columns are the union of keys in first-seen order; keys absent from an
    /// object become [`Cell::Missing`].
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Array(items) = value else {
            return Err(DetectorError::Table(
                "expected a JSON array of records".to_string(),
            ));
        };

        let mut columns: Vec<String> = Vec::new();
        for item in &items {
            let Value::Object(map) = item else {
                return Err(DetectorError::Table(
                    "every JSON record must be an object".to_string(),
                ));
            };
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Self::new(columns);
        for item in &items {
            if let Value::Object(map) = item {
                let row = table
                    .columns
                    .iter()
                    .map(|c| map.get(c).map_or(Cell::Missing, json_cell))
                    .collect();
                table.rows.push(row);
            }
        }

        Ok(table)
    }
}

fn json_cell(value: &Value) -> Cell {
    match value {
        Value::Null => Cell::Missing,
        Value::Bool(b) => Cell::Number(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().map_or(Cell::Missing, Cell::Number),
        Value::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}
