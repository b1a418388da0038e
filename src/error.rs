//! Error types for the detection pipeline
//!
//! Fatal conditions abort a run and surface here. Recoverable conditions
//! (unseen categories, numeric coercion, undefined metrics) never become
//! errors; they are collected by [`crate::warnings::Warnings`] instead.

use thiserror::Error;

/// Errors produced by the detection pipeline
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Schema error: none of the expected feature columns {expected:?} found in input columns {found:?}")]
    Schema {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Shape error: {model} received a {rows}x{cols} matrix (need at least one row and one column)")]
    Shape {
        model: &'static str,
        rows: usize,
        cols: usize,
    },

    #[error("Dimension mismatch in {model}: expected {expected} columns, got {actual}")]
    DimensionMismatch {
        model: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Numeric failure in {model}: all {count} values are NaN or infinite")]
    NonFinite { model: &'static str, count: usize },

    #[error("Model not fitted: {0}")]
    NotFitted(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unreadable input table: {0}")]
    Table(String),

    #[error("Model persistence failed: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl DetectorError {
    /// Shape error for an empty or degenerate matrix handed to `model`
    pub fn shape(model: &'static str, samples: &[Vec<f64>]) -> Self {
        DetectorError::Shape {
            model,
            rows: samples.len(),
            cols: samples.first().map_or(0, Vec::len),
        }
    }
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Reject empty matrices and ragged rows before they reach a model.
///
/// Returns the column count on success.
pub fn check_matrix(model: &'static str, samples: &[Vec<f64>]) -> Result<usize> {
    let cols = samples.first().map_or(0, Vec::len);
    if samples.is_empty() || cols == 0 {
        return Err(DetectorError::shape(model, samples));
    }
    if let Some(row) = samples.iter().find(|row| row.len() != cols) {
        return Err(DetectorError::DimensionMismatch {
            model,
            expected: cols,
            actual: row.len(),
        });
    }
    Ok(cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_matrix_accepts_rectangular() {
        let m = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(check_matrix("test", &m).unwrap(), 2);
    }

    #[test]
    fn test_check_matrix_rejects_empty() {
        let m: Vec<Vec<f64>> = Vec::new();
        assert!(matches!(
            check_matrix("test", &m),
            Err(DetectorError::Shape { rows: 0, cols: 0, .. })
        ));
    }

    #[test]
    fn test_check_matrix_rejects_zero_columns() {
        let m = vec![Vec::new(), Vec::new()];
        assert!(matches!(
            check_matrix("test", &m),
            Err(DetectorError::Shape { rows: 2, cols: 0, .. })
        ));
    }

    #[test]
    fn test_check_matrix_rejects_ragged() {
        let m = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(matches!(
            check_matrix("test", &m),
            Err(DetectorError::DimensionMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_schema_error_names_columns() {
        let err = DetectorError::Schema {
            expected: vec!["duration".to_string()],
            found: vec!["foo".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("duration"));
        assert!(msg.contains("foo"));
    }
}
