//! Run report
//!
//! The JSON layout (`summary`, `performance_metrics`, `metadata.timings_sec`,
//! `configuration`) is read by key by downstream consumers, so field names
//! and nesting here are stable.

use crate::autoencoder::TrainingHistory;
use crate::config::DetectorConfig;
use crate::ensemble::EnsembleMethod;
use crate::error::Result;
use crate::metrics::{detection_rate, ModelTriple, PerformanceMetrics, ScoreSummaries, Timings};
use crate::warnings::PipelineWarning;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Headline counts and rates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// RFC 3339 creation time
    pub timestamp: String,
    pub total_samples: usize,
    pub anomalies_detected: ModelTriple<usize>,
    pub detection_rates: ModelTriple<f64>,
}

impl Summary {
    pub fn from_verdicts(verdicts: &ModelTriple<Vec<bool>>) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            total_samples: verdicts.ensemble.len(),
            anomalies_detected: verdicts.map(|v| v.iter().filter(|&&a| a).count()),
            detection_rates: verdicts.map(|v| detection_rate(v)),
        }
    }
}

/// Run details beyond the headline numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub timings_sec: Timings,
    /// Reconstruction-error cutoff
    pub threshold: f64,
    /// Isolation forest decision offset
    pub isolation_offset: f64,
    pub ensemble_method: EnsembleMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_samples: Option<usize>,
    pub test_samples: usize,
    pub features: Vec<String>,
    /// Feature columns absent from the input and filled with defaults
    pub filled_columns: Vec<String>,
    pub score_summaries: ScoreSummaries,
    pub warnings: Vec<PipelineWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_history: Option<TrainingHistory>,
}

/// Immutable result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub summary: Summary,
    pub performance_metrics: PerformanceMetrics,
    pub metadata: Metadata,
    /// Effective configuration of the run that trained the models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<DetectorConfig>,
}

impl Report {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        tracing::info!(path = %path.display(), "report written");
        Ok(())
    }

    /// Human-readable summary
    pub fn format(&self) -> String {
        let mut output = String::new();

        output.push_str("\n=== Network Anomaly Detection Report ===\n");
        output.push_str(&format!("Generated: {}\n", self.summary.timestamp));
        output.push_str(&format!("Samples scored: {}\n", self.summary.total_samples));
        output.push_str(&format!(
            "Ensemble method: {}\n\n",
            self.metadata.ensemble_method
        ));

        output.push_str(&format!(
            "{:<18} {:>10} {:>10}\n",
            "model", "anomalies", "rate"
        ));
        for ((model, count), (_, rate)) in self
            .summary
            .anomalies_detected
            .iter()
            .zip(self.summary.detection_rates.iter())
        {
            output.push_str(&format!(
                "{:<18} {:>10} {:>9.2}%\n",
                model,
                count,
                rate * 100.0
            ));
        }

        match &self.performance_metrics {
            PerformanceMetrics::Supervised(metrics) => {
                output.push_str(&format!(
                    "\n{:<18} {:>9} {:>9} {:>9} {:>9}\n",
                    "model", "precision", "recall", "f1", "accuracy"
                ));
                for (model, m) in metrics.iter() {
                    output.push_str(&format!(
                        "{:<18} {:>9.3} {:>9.3} {:>9.3} {:>9.3}\n",
                        model, m.precision, m.recall, m.f1_score, m.accuracy
                    ));
                }
            }
            PerformanceMetrics::Unsupervised(metrics) => {
                output.push_str(&format!(
                    "\nMethod agreement: {:.2}%\n",
                    metrics.method_agreement * 100.0
                ));
            }
        }

        let t = &self.metadata.timings_sec;
        output.push_str(&format!(
            "\nTimings (s): train if={:.3} ae={:.3}, inference if={:.3} ae={:.3}\n",
            t.train.isolation_forest_sec,
            t.train.autoencoder_sec,
            t.inference.isolation_forest_sec,
            t.inference.autoencoder_sec
        ));

        if !self.metadata.warnings.is_empty() {
            output.push_str(&format!("Warnings: {}\n", self.metadata.warnings.len()));
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::UnsupervisedMetrics;
    use tempfile::TempDir;

    fn sample_report() -> Report {
        let verdicts = ModelTriple::new(
            vec![true, false, false, false],
            vec![false, true, false, false],
            vec![true, true, false, false],
        );
        Report {
            summary: Summary::from_verdicts(&verdicts),
            performance_metrics: PerformanceMetrics::Unsupervised(UnsupervisedMetrics {
                detection_rates: verdicts.map(|v| detection_rate(v)),
                method_agreement: 0.5,
                total_samples: 4,
            }),
            metadata: Metadata {
                timings_sec: Timings::default(),
                threshold: 1.25,
                isolation_offset: -0.5,
                ensemble_method: EnsembleMethod::MajorityVote,
                train_samples: Some(16),
                test_samples: 4,
                features: crate::schema::feature_names(),
                filled_columns: Vec::new(),
                score_summaries: ScoreSummaries::new(),
                warnings: Vec::new(),
                training_history: None,
            },
            configuration: Some(DetectorConfig::default()),
        }
    }

    #[test]
    fn test_summary_counts() {
        let report = sample_report();
        assert_eq!(report.summary.total_samples, 4);
        assert_eq!(report.summary.anomalies_detected.ensemble, 2);
        assert_eq!(report.summary.detection_rates.isolation_forest, 0.25);
    }

    #[test]
    fn test_json_contract_keys() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();

        assert!(json["summary"]["timestamp"].is_string());
        assert_eq!(json["summary"]["total_samples"], 4);
        assert_eq!(json["summary"]["anomalies_detected"]["autoencoder"], 1);
        assert_eq!(json["summary"]["detection_rates"]["ensemble"], 0.5);
        assert_eq!(json["performance_metrics"]["method_agreement"], 0.5);
        assert!(json["metadata"]["timings_sec"]["train"]["isolation_forest_sec"].is_number());
        assert!(json["metadata"]["timings_sec"]["inference"]["autoencoder_sec"].is_number());
        assert_eq!(json["metadata"]["ensemble_method"], "majority_vote");
        assert!(json["configuration"]["isolation_forest"].is_object());
        assert!(json["metadata"].get("training_history").is_none());
    }

    #[test]
    fn test_write_json_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/detection_report.json");
        let report = sample_report();
        report.write_json(&path).unwrap();

        let parsed: Report = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.summary.total_samples, 4);
    }

    #[test]
    fn test_format_lists_models() {
        let text = sample_report().format();
        assert!(text.contains("isolation_forest"));
        assert!(text.contains("autoencoder"));
        assert!(text.contains("Method agreement: 50.00%"));
    }
}
