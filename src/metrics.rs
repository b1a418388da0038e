//! Detection metrics
//!
//! Supervised metrics treat anomaly as the positive class. Ratios with a zero
//! denominator are reported as 0 and recorded as a warning instead of failing.

use crate::error::{DetectorError, Result};
use crate::threshold::percentile_sorted;
use crate::warnings::Warnings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use trueno::Vector;

/// One value per detector stream, keyed by model name in JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTriple<T> {
    pub isolation_forest: T,
    pub autoencoder: T,
    pub ensemble: T,
}

impl<T> ModelTriple<T> {
    pub fn new(isolation_forest: T, autoencoder: T, ensemble: T) -> Self {
        Self {
            isolation_forest,
            autoencoder,
            ensemble,
        }
    }

    /// Apply `f` to each stream
    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> ModelTriple<U> {
        ModelTriple {
            isolation_forest: f(&self.isolation_forest),
            autoencoder: f(&self.autoencoder),
            ensemble: f(&self.ensemble),
        }
    }

    /// `(model name, value)` pairs in report order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &T)> {
        [
            ("isolation_forest", &self.isolation_forest),
            ("autoencoder", &self.autoencoder),
            ("ensemble", &self.ensemble),
        ]
        .into_iter()
    }
}

/// Confusion-matrix derived metrics for one verdict stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub accuracy: f64,
}

impl ClassificationMetrics {
    /// Compare `predicted` against `actual` for the stream named `model`
    pub fn compute(
        model: &str,
        actual: &[bool],
        predicted: &[bool],
        warnings: &mut Warnings,
    ) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(DetectorError::DimensionMismatch {
                model: "metrics",
                expected: actual.len(),
                actual: predicted.len(),
            });
        }

        let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
        for (&a, &p) in actual.iter().zip(predicted) {
            match (a, p) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => tn += 1,
            }
        }

        let precision = if tp + fp == 0 {
            warnings.metric_undefined(model, "precision");
            0.0
        } else {
            tp as f64 / (tp + fp) as f64
        };
        let recall = if tp + fn_ == 0 {
            warnings.metric_undefined(model, "recall");
            0.0
        } else {
            tp as f64 / (tp + fn_) as f64
        };
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        let accuracy = if actual.is_empty() {
            0.0
        } else {
            (tp + tn) as f64 / actual.len() as f64
        };

        Ok(Self {
            precision,
            recall,
            f1_score,
            accuracy,
        })
    }
}

/// Fraction of records flagged anomalous
pub fn detection_rate(verdicts: &[bool]) -> f64 {
    if verdicts.is_empty() {
        return 0.0;
    }
    verdicts.iter().filter(|&&v| v).count() as f64 / verdicts.len() as f64
}

/// Fraction of records on which two detectors agree
pub fn method_agreement(a: &[bool], b: &[bool]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(DetectorError::DimensionMismatch {
            model: "metrics",
            expected: a.len(),
            actual: b.len(),
        });
    }
    if a.is_empty() {
        return Ok(0.0);
    }
    Ok(a.iter().zip(b).filter(|(x, y)| x == y).count() as f64 / a.len() as f64)
}

/// Label-free comparison of the detectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsupervisedMetrics {
    pub detection_rates: ModelTriple<f64>,
    /// Agreement between the isolation forest and the autoencoder
    pub method_agreement: f64,
    pub total_samples: usize,
}

/// `performance_metrics` section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PerformanceMetrics {
    Supervised(ModelTriple<ClassificationMetrics>),
    Unsupervised(UnsupervisedMetrics),
}

impl PerformanceMetrics {
    /// Supervised metrics when `labels` is present, otherwise rates and agreement
    pub fn evaluate(
        labels: Option<&[bool]>,
        verdicts: &ModelTriple<Vec<bool>>,
        warnings: &mut Warnings,
    ) -> Result<Self> {
        match labels {
            Some(labels) => Ok(PerformanceMetrics::Supervised(ModelTriple::new(
                ClassificationMetrics::compute(
                    "isolation_forest",
                    labels,
                    &verdicts.isolation_forest,
                    warnings,
                )?,
                ClassificationMetrics::compute(
                    "autoencoder",
                    labels,
                    &verdicts.autoencoder,
                    warnings,
                )?,
                ClassificationMetrics::compute("ensemble", labels, &verdicts.ensemble, warnings)?,
            ))),
            None => Ok(PerformanceMetrics::Unsupervised(UnsupervisedMetrics {
                detection_rates: verdicts.map(|v| detection_rate(v)),
                method_agreement: method_agreement(
                    &verdicts.isolation_forest,
                    &verdicts.autoencoder,
                )?,
                total_samples: verdicts.ensemble.len(),
            })),
        }
    }

    pub fn is_supervised(&self) -> bool {
        matches!(self, PerformanceMetrics::Supervised(_))
    }
}

/// Seconds spent per model in one phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StageTimings {
    pub isolation_forest_sec: f64,
    pub autoencoder_sec: f64,
}

/// `metadata.timings_sec` of the report
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    pub train: StageTimings,
    pub inference: StageTimings,
}

impl Timings {
    pub fn record_train(&mut self, isolation_forest: Duration, autoencoder: Duration) {
        self.train = StageTimings {
            isolation_forest_sec: isolation_forest.as_secs_f64(),
            autoencoder_sec: autoencoder.as_secs_f64(),
        };
    }

    pub fn record_inference(&mut self, isolation_forest: Duration, autoencoder: Duration) {
        self.inference = StageTimings {
            isolation_forest_sec: isolation_forest.as_secs_f64(),
            autoencoder_sec: autoencoder.as_secs_f64(),
        };
    }
}

/// Distribution summary of one score stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
}

impl ScoreSummary {
    /// Summarize the finite values of `scores`
    ///
    /// trueno works in f32, so mean and std are taken over the scores divided
    /// by their largest magnitude and scaled back in f64. Min, max and p95
    /// are exact.
    pub fn from_scores(scores: &[f64]) -> Self {
        let mut finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
        if finite.is_empty() {
            return Self::default();
        }
        finite.sort_by(f64::total_cmp);

        let magnitude = finite[0].abs().max(finite[finite.len() - 1].abs());
        let (mean, std) = if magnitude > 0.0 {
            let unit: Vec<f32> = finite.iter().map(|&s| (s / magnitude) as f32).collect();
            let v = Vector::from_slice(&unit);
            (
                f64::from(v.mean().unwrap_or(0.0)) * magnitude,
                f64::from(v.stddev().unwrap_or(0.0)) * magnitude,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            mean,
            std,
            min: finite[0],
            max: finite[finite.len() - 1],
            p95: percentile_sorted(&finite, 95.0),
        }
    }
}

/// Summaries keyed by score stream name
pub type ScoreSummaries = BTreeMap<String, ScoreSummary>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warnings::PipelineWarning;

    #[test]
    fn test_perfect_predictions() {
        let labels = [true, false, true, false];
        let mut warnings = Warnings::new();
        let m = ClassificationMetrics::compute("ensemble", &labels, &labels, &mut warnings).unwrap();
        assert_eq!(m.precision, 1.0);
        assert_eq!(m.recall, 1.0);
        assert_eq!(m.f1_score, 1.0);
        assert_eq!(m.accuracy, 1.0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_known_confusion_matrix() {
        // tp=1 fp=1 fn=1 tn=1
        let actual = [true, false, true, false];
        let predicted = [true, true, false, false];
        let mut warnings = Warnings::new();
        let m = ClassificationMetrics::compute("ensemble", &actual, &predicted, &mut warnings)
            .unwrap();
        assert_eq!(m.precision, 0.5);
        assert_eq!(m.recall, 0.5);
        assert_eq!(m.f1_score, 0.5);
        assert_eq!(m.accuracy, 0.5);
    }

    #[test]
    fn test_zero_denominators_report_zero() {
        let actual = [false, false, false];
        let predicted = [false, false, false];
        let mut warnings = Warnings::new();
        let m = ClassificationMetrics::compute("autoencoder", &actual, &predicted, &mut warnings)
            .unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.accuracy, 1.0);

        let warnings = warnings.into_vec();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| matches!(
            w,
            PipelineWarning::MetricUndefined { model, .. } if model == "autoencoder"
        )));
    }

    #[test]
    fn test_length_mismatch() {
        let mut warnings = Warnings::new();
        assert!(ClassificationMetrics::compute("x", &[true], &[], &mut warnings).is_err());
        assert!(method_agreement(&[true], &[true, false]).is_err());
    }

    #[test]
    fn test_detection_rate_and_agreement() {
        let a = [true, false, false, false];
        let b = [true, true, false, false];
        assert_eq!(detection_rate(&a), 0.25);
        assert_eq!(detection_rate(&[]), 0.0);
        assert_eq!(method_agreement(&a, &b).unwrap(), 0.75);
    }

    #[test]
    fn test_evaluate_selects_mode() {
        let verdicts = ModelTriple::new(
            vec![true, false],
            vec![false, false],
            vec![true, false],
        );
        let mut warnings = Warnings::new();

        let unsupervised = PerformanceMetrics::evaluate(None, &verdicts, &mut warnings).unwrap();
        match unsupervised {
            PerformanceMetrics::Unsupervised(m) => {
                assert_eq!(m.detection_rates.isolation_forest, 0.5);
                assert_eq!(m.method_agreement, 0.5);
                assert_eq!(m.total_samples, 2);
            }
            other => panic!("expected unsupervised, got {:?}", other),
        }

        let labels = [true, false];
        let supervised =
            PerformanceMetrics::evaluate(Some(&labels), &verdicts, &mut warnings).unwrap();
        assert!(supervised.is_supervised());
    }

    #[test]
    fn test_performance_metrics_json_shape() {
        let verdicts = ModelTriple::new(vec![true], vec![true], vec![true]);
        let mut warnings = Warnings::new();
        let metrics = PerformanceMetrics::evaluate(Some(&[true]), &verdicts, &mut warnings).unwrap();
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["ensemble"]["f1_score"], 1.0);

        let metrics = PerformanceMetrics::evaluate(None, &verdicts, &mut warnings).unwrap();
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["detection_rates"]["autoencoder"], 1.0);
        assert_eq!(json["method_agreement"], 1.0);
    }

    #[test]
    fn test_timings_json_shape() {
        let mut timings = Timings::default();
        timings.record_train(Duration::from_millis(1500), Duration::from_secs(2));
        let json = serde_json::to_value(timings).unwrap();
        assert_eq!(json["train"]["isolation_forest_sec"], 1.5);
        assert_eq!(json["train"]["autoencoder_sec"], 2.0);
        assert_eq!(json["inference"]["autoencoder_sec"], 0.0);
    }

    #[test]
    fn test_score_summary() {
        let scores: Vec<f64> = (1..=100).map(f64::from).collect();
        let summary = ScoreSummary::from_scores(&scores);
        assert!((summary.mean - 50.5).abs() < 1e-3);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 100.0);
        assert!((summary.p95 - 95.05).abs() < 1e-9);
        assert!(summary.std > 0.0);

        assert_eq!(ScoreSummary::from_scores(&[]), ScoreSummary::default());
    }

    #[test]
    fn test_score_summary_beyond_f32_range() {
        let scores = [1e200, 3e200, f64::INFINITY, f64::NAN];
        let summary = ScoreSummary::from_scores(&scores);
        assert!((summary.mean / 2e200 - 1.0).abs() < 1e-6, "mean {}", summary.mean);
        assert!(summary.std.is_finite() && summary.std > 0.0);
        assert_eq!(summary.min, 1e200);
        assert_eq!(summary.max, 3e200);
        assert!(summary.p95.is_finite());
    }
}
