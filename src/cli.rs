//! CLI argument parsing for netsentry

use crate::config::DetectorConfig;
use crate::ensemble::EnsembleMethod;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Train, score the held-out split, write the report and save the model (default)
    Full,
    /// Train on the training split and save the model
    Train,
    /// Score the data with a previously saved model
    Detect,
}

/// Ensemble policy flag values
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EnsembleArg {
    MajorityVote,
    Union,
    Intersection,
    ScoreWeighted,
}

impl From<EnsembleArg> for EnsembleMethod {
    fn from(arg: EnsembleArg) -> Self {
        match arg {
            EnsembleArg::MajorityVote => EnsembleMethod::MajorityVote,
            EnsembleArg::Union => EnsembleMethod::Union,
            EnsembleArg::Intersection => EnsembleMethod::Intersection,
            EnsembleArg::ScoreWeighted => EnsembleMethod::ScoreWeighted,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "netsentry")]
#[command(version)]
#[command(about = "Ensemble network traffic anomaly detection (isolation forest + autoencoder)", long_about = None)]
pub struct Cli {
    /// Input table (.csv or .json)
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR", default_value = "results")]
    pub output: PathBuf,

    /// Operation mode
    #[arg(long, value_enum, default_value = "full")]
    pub mode: Mode,

    /// Saved model path (written by full/train, read by detect)
    #[arg(long, value_name = "FILE", default_value = "models/netsentry.apr")]
    pub model: PathBuf,

    /// Expected anomaly fraction for the isolation forest
    #[arg(long, value_name = "FRACTION")]
    pub contamination: Option<f64>,

    /// Number of isolation trees
    #[arg(long, value_name = "N")]
    pub trees: Option<usize>,

    /// Autoencoder training epochs
    #[arg(long, value_name = "N")]
    pub epochs: Option<usize>,

    /// How the two detectors' verdicts are combined
    #[arg(long = "ensemble-method", value_enum, value_name = "METHOD")]
    pub ensemble_method: Option<EnsembleArg>,

    /// Percentile of training reconstruction error used as threshold
    #[arg(long, value_name = "P")]
    pub percentile: Option<f64>,

    /// Also write per-record score arrays to DIR/scores.json
    #[arg(long)]
    pub scores: bool,

    /// Enable debug tracing output
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a file or default config
    pub fn apply_overrides(&self, config: &mut DetectorConfig) {
        if let Some(contamination) = self.contamination {
            config.isolation_forest.contamination = contamination;
        }
        if let Some(trees) = self.trees {
            config.isolation_forest.n_estimators = trees;
        }
        if let Some(epochs) = self.epochs {
            config.autoencoder.epochs = epochs;
        }
        if let Some(method) = self.ensemble_method {
            config.detection.ensemble_method = method.into();
        }
        if let Some(percentile) = self.percentile {
            config.detection.threshold_percentile = percentile;
        }
    }
}
