//! Categorical encoding with an unknown-value slot
//!
//! A [`Vocabulary`] maps the distinct values seen at fit time to codes
//! `0..k` in sorted (byte-wise lexicographic) order. Code `k` is reserved for
//! any value that was not seen at fit time, so encoding never fails at
//! inference.

use crate::schema::{Record, CATEGORICAL_FEATURES};
use crate::warnings::Warnings;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Result of looking a value up in a [`Vocabulary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryCode {
    Known(u32),
    Unknown,
}

/// Fitted value-to-code bijection for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    column: String,
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl Vocabulary {
    /// Build from the training values of `column`
    pub fn fit<'a>(column: &str, values: impl IntoIterator<Item = &'a str>) -> Self {
        let distinct: BTreeSet<&str> = values.into_iter().collect();
        let values: Vec<String> = distinct.into_iter().map(str::to_string).collect();
        let index = values
            .iter()
            .enumerate()
            .map(|(code, v)| (v.clone(), code as u32))
            .collect();

        Self {
            column: column.to_string(),
            values,
            index,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Observed values, indexed by code
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Observed cardinality `k`
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The reserved code for unseen values (equal to [`Self::len`])
    pub fn unknown_code(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn lookup(&self, value: &str) -> CategoryCode {
        match self.index.get(value) {
            Some(&code) => CategoryCode::Known(code),
            None => CategoryCode::Unknown,
        }
    }

    /// Integer code in `0..=k`
    pub fn encode(&self, value: &str) -> u32 {
        match self.lookup(value) {
            CategoryCode::Known(code) => code,
            CategoryCode::Unknown => self.unknown_code(),
        }
    }

    /// Encode a column, recording unseen values
    pub fn transform(&self, values: &[&str], warnings: &mut Warnings) -> Vec<u32> {
        values
            .iter()
            .map(|value| match self.lookup(value) {
                CategoryCode::Known(code) => code,
                CategoryCode::Unknown => {
                    warnings.unseen_category(&self.column, value);
                    self.unknown_code()
                }
            })
            .collect()
    }
}

/// One [`Vocabulary`] per categorical feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoder {
    vocabularies: Vec<Vocabulary>,
}

impl CategoricalEncoder {
    /// Fit all categorical columns on the training records
    pub fn fit(records: &[&Record]) -> Self {
        let vocabularies = CATEGORICAL_FEATURES
            .iter()
            .enumerate()
            .map(|(i, column)| Vocabulary::fit(column, records.iter().map(|r| r.categorical()[i])))
            .collect();
        Self { vocabularies }
    }

    pub fn vocabularies(&self) -> &[Vocabulary] {
        &self.vocabularies
    }

    pub fn vocabulary(&self, column: &str) -> Option<&Vocabulary> {
        self.vocabularies.iter().find(|v| v.column == column)
    }

    /// Codes for one record's categorical features, as matrix values
    pub fn encode_record(&self, record: &Record, warnings: &mut Warnings) -> [f64; 3] {
        let mut out = [0.0; 3];
        for ((slot, vocab), value) in out
            .iter_mut()
            .zip(&self.vocabularies)
            .zip(record.categorical())
        {
            *slot = f64::from(vocab.transform(&[value], warnings)[0]);
        }
        out
    }
}
