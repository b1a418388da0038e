//! Non-fatal pipeline conditions
//!
//! Each condition is logged once through `tracing` when first seen and
//! aggregated so the final report carries one entry per (condition, column)
//! instead of one per record.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A recoverable condition recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// Category value never observed while fitting the vocabulary; encoded as the unknown code
    UnseenCategory {
        column: String,
        value: String,
        occurrences: usize,
    },
    /// Numeric column contained values that were imputed to zero
    NumericCoercion {
        column: String,
        unparsable: usize,
        non_finite: usize,
        missing: usize,
    },
    /// Zero denominator while computing a metric; reported as 0
    MetricUndefined { model: String, metric: String },
}

#[derive(Debug, Default, Clone, Copy)]
struct CoercionCounts {
    unparsable: usize,
    non_finite: usize,
    missing: usize,
}

/// Accumulator for [`PipelineWarning`]s
#[derive(Debug, Default)]
pub struct Warnings {
    unseen: BTreeMap<(String, String), usize>,
    coercions: BTreeMap<String, CoercionCounts>,
    undefined: Vec<(String, String)>,
}

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a category value missing from the fitted vocabulary
    pub fn unseen_category(&mut self, column: &str, value: &str) {
        let count = self
            .unseen
            .entry((column.to_string(), value.to_string()))
            .or_insert(0);
        if *count == 0 {
            tracing::warn!(column, value, "unseen category mapped to unknown code");
        }
        *count += 1;
    }

    /// Record a value in a numeric column that could not be parsed
    pub fn unparsable(&mut self, column: &str, raw: &str) {
        let counts = self.coercion_entry(column);
        if counts.unparsable == 0 {
            tracing::warn!(column, raw, "non-numeric value imputed to 0");
        }
        counts.unparsable += 1;
    }

    /// Record a NaN or infinite value in a numeric column
    pub fn non_finite(&mut self, column: &str) {
        let counts = self.coercion_entry(column);
        if counts.non_finite == 0 {
            tracing::warn!(column, "non-finite value imputed to 0");
        }
        counts.non_finite += 1;
    }

    /// Record an empty cell in a numeric column
    pub fn missing(&mut self, column: &str) {
        self.coercion_entry(column).missing += 1;
    }

    /// Record a metric whose denominator was zero
    pub fn metric_undefined(&mut self, model: &str, metric: &str) {
        let key = (model.to_string(), metric.to_string());
        if !self.undefined.contains(&key) {
            tracing::warn!(model, metric, "metric undefined (zero denominator), reporting 0");
            self.undefined.push(key);
        }
    }

    fn coercion_entry(&mut self, column: &str) -> &mut CoercionCounts {
        self.coercions.entry(column.to_string()).or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.unseen.is_empty() && self.coercions.is_empty() && self.undefined.is_empty()
    }

    /// Number of distinct unseen (column, value) pairs
    pub fn unseen_count(&self) -> usize {
        self.unseen.len()
    }

    /// Flatten into report entries
    pub fn into_vec(self) -> Vec<PipelineWarning> {
        let mut out = Vec::new();

        for (column, c) in self.coercions {
            out.push(PipelineWarning::NumericCoercion {
                column,
                unparsable: c.unparsable,
                non_finite: c.non_finite,
                missing: c.missing,
            });
        }
        for ((column, value), occurrences) in self.unseen {
            out.push(PipelineWarning::UnseenCategory {
                column,
                value,
                occurrences,
            });
        }
        for (model, metric) in self.undefined {
            out.push(PipelineWarning::MetricUndefined { model, metric });
        }

        out
    }
}
