//! Isolation Forest for unsupervised traffic outlier detection
//!
//! Anomalies are easier to isolate by random axis-aligned splits, so they sit
//! at shorter average path lengths across the ensemble.
//!
//! Scores follow the usual convention:
//! - `anomaly_score` in (0, 1], higher = more anomalous
//! - `decision_function` = `-anomaly_score - offset`, negative = anomalous
//!
//! `offset` is the `contamination` percentile of the training scores, so the
//! configured fraction of the training distribution falls below zero.
//!
//! Fitting is deterministic for a given seed: trees are built sequentially
//! from a single seeded generator.
//!
//! # References
//!
//! Liu, F. T., Ting, K. M., & Zhou, Z. H. (2008). Isolation forest.
//! In 2008 Eighth IEEE International Conference on Data Mining (pp. 413-422).

use crate::config::IsolationForestConfig;
use crate::error::{check_matrix, DetectorError, Result};
use crate::threshold::percentile;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default sub-sampling size (following original paper)
const DEFAULT_SUBSAMPLE_SIZE: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A node in an Isolation Tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum IsolationNode {
    /// Internal node with split feature and threshold
    Internal {
        feature_idx: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node with sample count (for path length calculation)
    Leaf { size: usize },
}

impl IsolationNode {
    /// Path length from this node down to the leaf that holds `sample`
    fn path_length(&self, sample: &[f64], current_depth: usize) -> f64 {
        match self {
            IsolationNode::Internal {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if sample[*feature_idx] < *threshold {
                    left.path_length(sample, current_depth + 1)
                } else {
                    right.path_length(sample, current_depth + 1)
                }
            }
            IsolationNode::Leaf { size } => {
                // Add average path length for unresolved instances
                current_depth as f64 + average_path_length(*size)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Uniform draw in `[min_val, max_val]`
///
/// Works on half-widths so opposite extremes near `f64::MAX` do not overflow
/// the span.
fn split_point(min_val: f64, max_val: f64, rng: &mut StdRng) -> f64 {
    let half_span = max_val / 2.0 - min_val / 2.0;
    let step = rng.gen::<f64>() * half_span;
    (min_val + step + step).clamp(min_val, max_val)
}

/// Single Isolation Tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build a tree over the rows of `samples` selected by `indices`
    fn build(samples: &[Vec<f64>], indices: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let root = Self::build_node(samples, indices, 0, max_depth, rng);
        IsolationTree { root }
    }

    fn build_node(
        samples: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> IsolationNode {
        if depth >= max_depth || indices.len() <= 1 {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        let num_features = samples[indices[0]].len();

        // Only split on features that still vary inside this node
        let mut ranges = Vec::with_capacity(num_features);
        for feature_idx in 0..num_features {
            let mut min_val = f64::MAX;
            let mut max_val = f64::MIN;
            for &i in indices {
                let val = samples[i][feature_idx];
                min_val = min_val.min(val);
                max_val = max_val.max(val);
            }
            if max_val - min_val > f64::EPSILON * max_val.abs().max(1.0) {
                ranges.push((feature_idx, min_val, max_val));
            }
        }

        // All samples are identical - create leaf
        let Some(&(feature_idx, min_val, max_val)) = ranges.choose(rng) else {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        };

        let threshold = split_point(min_val, max_val, rng);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| samples[i][feature_idx] < threshold);

        // If partition is empty on one side, create leaf
        if left_idx.is_empty() || right_idx.is_empty() {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        let left = Box::new(Self::build_node(samples, &left_idx, depth + 1, max_depth, rng));
        let right = Box::new(Self::build_node(samples, &right_idx, depth + 1, max_depth, rng));

        IsolationNode::Internal {
            feature_idx,
            threshold,
            left,
            right,
        }
    }

    fn path_length(&self, sample: &[f64]) -> f64 {
        self.root.path_length(sample, 0)
    }
}

/// Per-record output of [`IsolationForest::predict`]
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationResult {
    /// Decision scores (negative = anomalous)
    pub scores: Vec<f64>,
    /// -1 = anomaly, +1 = normal
    pub polarity: Vec<i8>,
    /// `polarity < 0`
    pub verdicts: Vec<bool>,
}

/// Isolation Forest - ensemble of Isolation Trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    num_trees: usize,
    subsample_size: usize,
    contamination: f64,
    seed: u64,
    /// Effective sub-sample size used during fit
    fitted_sample_size: usize,
    n_features: usize,
    offset: f64,
}

impl IsolationForest {
    /// Create an unfitted forest
    pub fn new(num_trees: usize, subsample_size: Option<usize>, contamination: f64, seed: u64) -> Self {
        IsolationForest {
            trees: Vec::new(),
            num_trees,
            subsample_size: subsample_size.unwrap_or(DEFAULT_SUBSAMPLE_SIZE),
            contamination,
            seed,
            fitted_sample_size: 0,
            n_features: 0,
            offset: -0.5,
        }
    }

    pub fn from_config(config: &IsolationForestConfig) -> Self {
        Self::new(
            config.n_estimators,
            Some(config.max_samples),
            config.contamination,
            config.random_state,
        )
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Decision-function offset learned from the training scores
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Fit the model on training data
    pub fn fit(&mut self, samples: &[Vec<f64>]) -> Result<()> {
        let n_features = check_matrix("isolation_forest", samples)?;
        if self.num_trees == 0 {
            return Err(DetectorError::InvalidConfig(
                "isolation forest needs at least one tree".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let sample_size = self.subsample_size.min(samples.len()).max(1);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut trees = Vec::with_capacity(self.num_trees);
        let mut indices: Vec<usize> = (0..samples.len()).collect();
        for _ in 0..self.num_trees {
            // Sub-sample data
            indices.shuffle(&mut rng);
            trees.push(IsolationTree::build(
                samples,
                &indices[..sample_size],
                max_depth,
                &mut rng,
            ));
        }

        self.trees = trees;
        self.fitted_sample_size = sample_size;
        self.n_features = n_features;

        let train_scores: Vec<f64> = samples.iter().map(|s| -self.anomaly_score(s)).collect();
        self.offset = percentile(&train_scores, 100.0 * self.contamination);

        tracing::debug!(
            trees = self.trees.len(),
            sample_size,
            max_depth,
            offset = self.offset,
            "fitted isolation forest"
        );
        Ok(())
    }

    /// Anomaly score in (0, 1], higher = more anomalous
    pub fn anomaly_score(&self, sample: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        // Average path length across all trees
        let avg_path_length: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample))
            .sum::<f64>()
            / self.trees.len() as f64;

        // Normalize by expected path length
        let c = average_path_length(self.fitted_sample_size);
        if c <= 0.0 {
            return 0.5;
        }
        2_f64.powf(-avg_path_length / c)
    }

    /// Shifted score: negative = anomalous
    pub fn decision_function(&self, sample: &[f64]) -> f64 {
        -self.anomaly_score(sample) - self.offset
    }

    /// Score and label every row of `samples`
    pub fn predict(&self, samples: &[Vec<f64>]) -> Result<IsolationResult> {
        if !self.is_fitted() {
            return Err(DetectorError::NotFitted("isolation_forest"));
        }
        let cols = check_matrix("isolation_forest", samples)?;
        if cols != self.n_features {
            return Err(DetectorError::DimensionMismatch {
                model: "isolation_forest",
                expected: self.n_features,
                actual: cols,
            });
        }

        let scores: Vec<f64> = samples.iter().map(|s| self.decision_function(s)).collect();
        let polarity: Vec<i8> = scores
            .iter()
            .map(|&s| if s < 0.0 { -1 } else { 1 })
            .collect();
        let verdicts = polarity.iter().map(|&p| p < 0).collect();

        Ok(IsolationResult {
            scores,
            polarity,
            verdicts,
        })
    }
}
