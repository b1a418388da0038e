//! Schema normalization
//!
//! Maps an arbitrary input table onto the canonical traffic record:
//! five numeric features, three categorical features and an optional label.
//! Absent numeric columns are filled with 0, absent categorical columns with
//! [`MISSING_CATEGORY`]. Unparsable and non-finite numeric values are imputed
//! to 0 and reported as warnings. Only a table with none of the eight feature
//! columns is rejected.

use crate::error::{DetectorError, Result};
use crate::table::{Cell, RawTable};
use crate::warnings::Warnings;

/// Numeric feature columns, in matrix order
pub const NUMERIC_FEATURES: [&str; 5] = ["duration", "src_bytes", "dst_bytes", "count", "srv_count"];

/// Categorical feature columns, in matrix order after the numeric ones
pub const CATEGORICAL_FEATURES: [&str; 3] = ["protocol", "service", "flag"];

/// Ground-truth column (0 = normal, 1 = anomaly)
pub const LABEL_COLUMN: &str = "label";

/// Sentinel for absent or empty categorical values
pub const MISSING_CATEGORY: &str = "__missing__";

/// All feature names in matrix column order
pub fn feature_names() -> Vec<String> {
    NUMERIC_FEATURES
        .iter()
        .chain(CATEGORICAL_FEATURES.iter())
        .map(|s| s.to_string())
        .collect()
}

/// One traffic observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub duration: f64,
    pub src_bytes: f64,
    pub dst_bytes: f64,
    pub count: f64,
    pub srv_count: f64,
    pub protocol: String,
    pub service: String,
    pub flag: String,
    /// `Some(true)` = anomaly
    pub label: Option<bool>,
}

impl Record {
    /// Numeric features in [`NUMERIC_FEATURES`] order
    pub fn numeric(&self) -> [f64; 5] {
        [
            self.duration,
            self.src_bytes,
            self.dst_bytes,
            self.count,
            self.srv_count,
        ]
    }

    /// Categorical features in [`CATEGORICAL_FEATURES`] order
    pub fn categorical(&self) -> [&str; 3] {
        [&self.protocol, &self.service, &self.flag]
    }

    fn set_numeric(&mut self, idx: usize, value: f64) {
        match idx {
            0 => self.duration = value,
            1 => self.src_bytes = value,
            2 => self.dst_bytes = value,
            3 => self.count = value,
            _ => self.srv_count = value,
        }
    }

    fn set_categorical(&mut self, idx: usize, value: String) {
        match idx {
            0 => self.protocol = value,
            1 => self.service = value,
            _ => self.flag = value,
        }
    }
}

/// Cleaned records plus what the input actually provided
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTable {
    pub records: Vec<Record>,
    /// Whether the input carried a label column
    pub has_labels: bool,
    /// Feature columns that were absent and filled with defaults
    pub filled_columns: Vec<String>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Labels, if the input had a label column
    pub fn labels(&self) -> Option<Vec<bool>> {
        if !self.has_labels {
            return None;
        }
        Some(
            self.records
                .iter()
                .map(|r| r.label.unwrap_or(false))
                .collect(),
        )
    }
}

/// Select and coerce the canonical columns of `table`
pub fn normalize(table: &RawTable, warnings: &mut Warnings) -> Result<NormalizedTable> {
    let numeric_idx: Vec<Option<usize>> = NUMERIC_FEATURES
        .iter()
        .map(|name| table.column_index(name))
        .collect();
    let categorical_idx: Vec<Option<usize>> = CATEGORICAL_FEATURES
        .iter()
        .map(|name| table.column_index(name))
        .collect();
    let label_idx = table.column_index(LABEL_COLUMN);

    if numeric_idx.iter().chain(categorical_idx.iter()).all(Option::is_none) {
        return Err(DetectorError::Schema {
            expected: feature_names(),
            found: table.columns().to_vec(),
        });
    }

    let filled_columns: Vec<String> = NUMERIC_FEATURES
        .iter()
        .zip(&numeric_idx)
        .chain(CATEGORICAL_FEATURES.iter().zip(&categorical_idx))
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !filled_columns.is_empty() {
        tracing::warn!(columns = ?filled_columns, "feature columns absent, filling with defaults");
    }

    let mut records = Vec::with_capacity(table.len());
    for row in table.rows() {
        let mut record = Record::default();

        for (i, idx) in numeric_idx.iter().enumerate() {
            let value = match idx {
                Some(idx) => coerce_numeric(&row[*idx], NUMERIC_FEATURES[i], warnings),
                None => 0.0,
            };
            record.set_numeric(i, value);
        }

        for (i, idx) in categorical_idx.iter().enumerate() {
            let value = match idx {
                Some(idx) => coerce_category(&row[*idx]),
                None => MISSING_CATEGORY.to_string(),
            };
            record.set_categorical(i, value);
        }

        if let Some(idx) = label_idx {
            record.label = Some(coerce_label(&row[idx], warnings));
        }

        records.push(record);
    }

    tracing::debug!(
        rows = records.len(),
        has_labels = label_idx.is_some(),
        "normalized input table"
    );

    Ok(NormalizedTable {
        records,
        has_labels: label_idx.is_some(),
        filled_columns,
    })
}

/// Best-effort numeric parse; anything unusable becomes 0
fn coerce_numeric(cell: &Cell, column: &str, warnings: &mut Warnings) -> f64 {
    let parsed = match cell {
        Cell::Number(v) => *v,
        Cell::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                warnings.unparsable(column, s);
                return 0.0;
            }
        },
        Cell::Missing => {
            warnings.missing(column);
            return 0.0;
        }
    };

    if parsed.is_finite() {
        parsed
    } else {
        warnings.non_finite(column);
        0.0
    }
}

fn coerce_category(cell: &Cell) -> String {
    match cell {
        Cell::Text(s) if !s.trim().is_empty() => s.trim().to_string(),
        Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", *v as i64),
        Cell::Number(v) => v.to_string(),
        _ => MISSING_CATEGORY.to_string(),
    }
}

fn coerce_label(cell: &Cell, warnings: &mut Warnings) -> bool {
    match cell {
        Cell::Number(v) if v.is_finite() => *v != 0.0,
        Cell::Number(_) => {
            warnings.non_finite(LABEL_COLUMN);
            false
        }
        Cell::Text(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<f64>() {
                if v.is_finite() {
                    return v != 0.0;
                }
            }
            match s.to_ascii_lowercase().as_str() {
                "true" | "anomaly" | "attack" => true,
                "false" | "normal" => false,
                _ => {
                    warnings.unparsable(LABEL_COLUMN, s);
                    false
                }
            }
        }
        Cell::Missing => {
            warnings.missing(LABEL_COLUMN);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::PipelineWarning;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        let mut t = RawTable::new(columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            t.push_row(row).unwrap();
        }
        t
    }

    #[test]
    fn test_full_schema() {
        let t = table(
            &[
                "duration", "src_bytes", "dst_bytes", "count", "srv_count", "protocol", "service",
                "flag", "label",
            ],
            vec![vec![
                1.0.into(),
                200.0.into(),
                300.0.into(),
                4.0.into(),
                5.0.into(),
                "tcp".into(),
                "http".into(),
                "SF".into(),
                1.0.into(),
            ]],
        );
        let mut w = Warnings::new();
        let n = normalize(&t, &mut w).unwrap();

        assert_eq!(n.len(), 1);
        assert!(n.has_labels);
        assert!(n.filled_columns.is_empty());
        let r = &n.records[0];
        assert_eq!(r.numeric(), [1.0, 200.0, 300.0, 4.0, 5.0]);
        assert_eq!(r.categorical(), ["tcp", "http", "SF"]);
        assert_eq!(r.label, Some(true));
        assert!(w.is_empty());
    }

    #[test]
    fn test_no_feature_columns_is_schema_error() {
        let t = table(&["foo", "label"], vec![vec![1.0.into(), 0.0.into()]]);
        let mut w = Warnings::new();
        match normalize(&t, &mut w) {
            Err(DetectorError::Schema { expected, found }) => {
                assert_eq!(expected.len(), 8);
                assert_eq!(found, vec!["foo".to_string(), "label".to_string()]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_absent_columns_filled() {
        let t = table(&["src_bytes", "protocol"], vec![vec![10.0.into(), "udp".into()]]);
        let mut w = Warnings::new();
        let n = normalize(&t, &mut w).unwrap();

        let r = &n.records[0];
        assert_eq!(r.src_bytes, 10.0);
        assert_eq!(r.duration, 0.0);
        assert_eq!(r.protocol, "udp");
        assert_eq!(r.service, MISSING_CATEGORY);
        assert_eq!(r.flag, MISSING_CATEGORY);
        assert!(!n.has_labels);
        assert_eq!(n.labels(), None);
        assert_eq!(n.filled_columns.len(), 6);
    }

    #[test]
    fn test_numeric_coercion_to_zero() {
        let t = table(
            &["duration"],
            vec![
                vec!["12.5".into()],
                vec!["abc".into()],
                vec![Cell::Number(f64::NAN)],
                vec!["inf".into()],
                vec![Cell::Missing],
            ],
        );
        let mut w = Warnings::new();
        let n = normalize(&t, &mut w).unwrap();

        let durations: Vec<f64> = n.records.iter().map(|r| r.duration).collect();
        assert_eq!(durations, vec![12.5, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(
            w.into_vec(),
            vec![PipelineWarning::NumericCoercion {
                column: "duration".to_string(),
                unparsable: 1,
                non_finite: 2,
                missing: 1,
            }]
        );
    }

    #[test]
    fn test_category_coercion() {
        let t = table(
            &["service"],
            vec![vec![" http ".into()], vec![Cell::Number(80.0)], vec!["".into()]],
        );
        let mut w = Warnings::new();
        let n = normalize(&t, &mut w).unwrap();
        let services: Vec<&str> = n.records.iter().map(|r| r.service.as_str()).collect();
        assert_eq!(services, vec!["http", "80", MISSING_CATEGORY]);
    }

    #[test]
    fn test_label_parsing() {
        let t = table(
            &["duration", "label"],
            vec![
                vec![1.0.into(), "1".into()],
                vec![1.0.into(), "normal".into()],
                vec![1.0.into(), "anomaly".into()],
                vec![1.0.into(), Cell::Number(0.0)],
            ],
        );
        let mut w = Warnings::new();
        let n = normalize(&t, &mut w).unwrap();
        assert_eq!(n.labels(), Some(vec![true, false, true, false]));
    }

    #[test]
    fn test_feature_names_order() {
        let names = feature_names();
        assert_eq!(names[0], "duration");
        assert_eq!(names[5], "protocol");
        assert_eq!(names.len(), 8);
    }
}
