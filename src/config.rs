//! Detector configuration
//!
//! Loaded from an optional TOML file; every section and field falls back to
//! its default when absent, so a partial file only overrides what it names.
//!
//! ```toml
//! [isolation_forest]
//! contamination = 0.05
//!
//! [detection]
//! ensemble_method = "intersection"
//! threshold_percentile = 99.0
//! ```

use crate::ensemble::EnsembleMethod;
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Train/test partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Fraction of records held out for scoring
    pub test_size: f64,
    /// Seed for the split shuffle
    pub random_state: u64,
    /// Split each label class proportionally when labels are present
    pub stratify: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            stratify: true,
        }
    }
}

/// Isolation Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationForestConfig {
    /// Expected anomaly fraction of the training distribution
    pub contamination: f64,
    /// Number of trees
    pub n_estimators: usize,
    /// Sub-sample size per tree (capped at the number of training rows)
    pub max_samples: usize,
    pub random_state: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            n_estimators: 100,
            max_samples: 256,
            random_state: 42,
        }
    }
}

/// Autoencoder architecture and training schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoencoderConfig {
    /// Bottleneck width
    pub encoding_dim: usize,
    /// Encoder widths between input and bottleneck; the decoder mirrors them
    pub hidden_dims: Vec<usize>,
    pub epochs: usize,
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f64,
    /// Trailing fraction of the training rows used only for monitoring
    pub validation_split: f64,
    pub random_state: u64,
}

impl Default for AutoencoderConfig {
    fn default() -> Self {
        Self {
            encoding_dim: 10,
            hidden_dims: vec![32, 16],
            epochs: 50,
            batch_size: 32,
            learning_rate: 0.001,
            validation_split: 0.1,
            random_state: 42,
        }
    }
}

/// Thresholding and ensemble policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub ensemble_method: EnsembleMethod,
    /// Percentile of training reconstruction error used as the cutoff
    pub threshold_percentile: f64,
    /// Normalized confidence a lone detector needs under `score_weighted`
    pub confidence_margin: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ensemble_method: EnsembleMethod::MajorityVote,
            threshold_percentile: 95.0,
            confidence_margin: 0.1,
        }
    }
}

/// Execution options that never change results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fit the two detectors on separate worker threads
    pub parallel_fit: bool,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub data: DataConfig,
    pub isolation_forest: IsolationForestConfig,
    pub autoencoder: AutoencoderConfig,
    pub detection: DetectionConfig,
    pub runtime: RuntimeConfig,
}

impl DetectorConfig {
    /// Fewer flags: lower contamination, higher error percentile
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.isolation_forest.contamination = 0.05;
        config.detection.threshold_percentile = 99.0;
        config
    }

    /// More flags: higher contamination, lower error percentile
    pub fn permissive() -> Self {
        let mut config = Self::default();
        config.isolation_forest.contamination = 0.2;
        config.detection.threshold_percentile = 90.0;
        config
    }

    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| DetectorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DetectorError::InvalidConfig(msg));

        if !(self.data.test_size > 0.0 && self.data.test_size < 1.0) {
            return invalid(format!(
                "data.test_size must be in (0, 1), got {}",
                self.data.test_size
            ));
        }

        let forest = &self.isolation_forest;
        if !(forest.contamination > 0.0 && forest.contamination <= 0.5) {
            return invalid(format!(
                "isolation_forest.contamination must be in (0, 0.5], got {}",
                forest.contamination
            ));
        }
        if forest.n_estimators == 0 {
            return invalid("isolation_forest.n_estimators must be >= 1".to_string());
        }
        if forest.max_samples < 2 {
            return invalid(format!(
                "isolation_forest.max_samples must be >= 2, got {}",
                forest.max_samples
            ));
        }

        let ae = &self.autoencoder;
        if ae.encoding_dim == 0 || ae.hidden_dims.contains(&0) {
            return invalid("autoencoder layer widths must be >= 1".to_string());
        }
        if ae.epochs == 0 {
            return invalid("autoencoder.epochs must be >= 1".to_string());
        }
        if ae.batch_size == 0 {
            return invalid("autoencoder.batch_size must be >= 1".to_string());
        }
        if !(ae.learning_rate > 0.0 && ae.learning_rate.is_finite()) {
            return invalid(format!(
                "autoencoder.learning_rate must be positive, got {}",
                ae.learning_rate
            ));
        }
        if !(0.0..1.0).contains(&ae.validation_split) {
            return invalid(format!(
                "autoencoder.validation_split must be in [0, 1), got {}",
                ae.validation_split
            ));
        }

        let detection = &self.detection;
        if !(0.0..=100.0).contains(&detection.threshold_percentile) {
            return invalid(format!(
                "detection.threshold_percentile must be in [0, 100], got {}",
                detection.threshold_percentile
            ));
        }
        if !(detection.confidence_margin >= 0.0 && detection.confidence_margin.is_finite()) {
            return invalid(format!(
                "detection.confidence_margin must be >= 0, got {}",
                detection.confidence_margin
            ));
        }

        Ok(())
    }

    /// Flat key/value view of the model hyperparameters, stored with saved pipelines
    pub fn hyperparameters(&self) -> HashMap<String, String> {
        let forest = &self.isolation_forest;
        let ae = &self.autoencoder;
        let detection = &self.detection;

        HashMap::from([
            ("contamination".to_string(), forest.contamination.to_string()),
            ("n_estimators".to_string(), forest.n_estimators.to_string()),
            ("max_samples".to_string(), forest.max_samples.to_string()),
            ("encoding_dim".to_string(), ae.encoding_dim.to_string()),
            ("hidden_dims".to_string(), format!("{:?}", ae.hidden_dims)),
            ("epochs".to_string(), ae.epochs.to_string()),
            ("batch_size".to_string(), ae.batch_size.to_string()),
            ("learning_rate".to_string(), ae.learning_rate.to_string()),
            (
                "ensemble_method".to_string(),
                detection.ensemble_method.as_str().to_string(),
            ),
            (
                "threshold_percentile".to_string(),
                detection.threshold_percentile.to_string(),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_settings() {
        let config = DetectorConfig::default();
        assert_eq!(config.isolation_forest.contamination, 0.1);
        assert_eq!(config.isolation_forest.n_estimators, 100);
        assert_eq!(config.autoencoder.encoding_dim, 10);
        assert_eq!(config.autoencoder.hidden_dims, vec![32, 16]);
        assert_eq!(config.detection.threshold_percentile, 95.0);
        assert_eq!(config.detection.ensemble_method, EnsembleMethod::MajorityVote);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_validate() {
        assert!(DetectorConfig::strict().validate().is_ok());
        assert!(DetectorConfig::permissive().validate().is_ok());
        assert!(
            DetectorConfig::strict().detection.threshold_percentile
                > DetectorConfig::permissive().detection.threshold_percentile
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DetectorConfig::from_toml_str(
            r#"
            [isolation_forest]
            contamination = 0.05

            [detection]
            ensemble_method = "intersection"
            "#,
        )
        .unwrap();

        assert_eq!(config.isolation_forest.contamination, 0.05);
        assert_eq!(config.isolation_forest.n_estimators, 100);
        assert_eq!(config.detection.ensemble_method, EnsembleMethod::Intersection);
        assert_eq!(config.autoencoder.epochs, 50);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = DetectorConfig::from_toml_str("").unwrap();
        assert_eq!(config, DetectorConfig::default());
    }

    #[test]
    fn test_rejects_bad_contamination() {
        let mut config = DetectorConfig::default();
        config.isolation_forest.contamination = 0.0;
        assert!(matches!(
            config.validate(),
            Err(DetectorError::InvalidConfig(_))
        ));
        config.isolation_forest.contamination = 0.7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_percentile() {
        let mut config = DetectorConfig::default();
        config.detection.threshold_percentile = 101.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_test_size() {
        let mut config = DetectorConfig::default();
        config.data.test_size = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_width_layer() {
        let mut config = DetectorConfig::default();
        config.autoencoder.hidden_dims = vec![32, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_ensemble_method() {
        let result = DetectorConfig::from_toml_str(
            r#"
            [detection]
            ensemble_method = "coin_flip"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_hyperparameters_view() {
        let params = DetectorConfig::default().hyperparameters();
        assert_eq!(params["n_estimators"], "100");
        assert_eq!(params["ensemble_method"], "majority_vote");
    }
}
