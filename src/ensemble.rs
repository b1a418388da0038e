//! Combining the two detectors' verdicts
//!
//! With two voters a "majority" is tied whenever exactly one flags a record,
//! so the tie-break is an explicit policy. `MajorityVote` breaks ties toward
//! anomaly, which makes it the union of both flag sets.

use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tie-break policy for two binary detectors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsembleMethod {
    /// Two-voter majority with ties going to anomaly (same flags as `Union`)
    #[default]
    MajorityVote,
    /// Either detector flags
    Union,
    /// Both detectors flag
    Intersection,
    /// Agreement passes; a lone flag needs confidence above the margin
    ScoreWeighted,
}

impl EnsembleMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnsembleMethod::MajorityVote => "majority_vote",
            EnsembleMethod::Union => "union",
            EnsembleMethod::Intersection => "intersection",
            EnsembleMethod::ScoreWeighted => "score_weighted",
        }
    }
}

impl fmt::Display for EnsembleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-record detector outputs fed to the combiner
#[derive(Debug, Clone, Copy)]
pub struct DetectorSignals<'a> {
    pub isolation_verdicts: &'a [bool],
    /// Decision scores, negative = anomalous
    pub isolation_scores: &'a [f64],
    pub isolation_offset: f64,
    pub reconstruction_errors: &'a [f64],
    pub threshold: f64,
}

impl DetectorSignals<'_> {
    fn len(&self) -> usize {
        self.isolation_verdicts.len()
    }

    fn check_lengths(&self) -> Result<()> {
        for actual in [self.isolation_scores.len(), self.reconstruction_errors.len()] {
            if actual != self.len() {
                return Err(DetectorError::DimensionMismatch {
                    model: "ensemble",
                    expected: self.len(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// How far past its own cutoff the isolation score is, in units of |offset|
    pub fn isolation_confidence(&self, i: usize) -> f64 {
        let scale = self.isolation_offset.abs();
        if scale > 0.0 {
            -self.isolation_scores[i] / scale
        } else {
            -self.isolation_scores[i]
        }
    }

    /// Relative excess of the reconstruction error over the threshold
    pub fn reconstruction_confidence(&self, i: usize) -> f64 {
        let excess = self.reconstruction_errors[i] - self.threshold;
        if self.threshold > 0.0 {
            excess / self.threshold
        } else {
            excess
        }
    }
}

/// Applies an [`EnsembleMethod`] to detector outputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnsembleCombiner {
    method: EnsembleMethod,
    confidence_margin: f64,
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self::new(EnsembleMethod::default(), 0.1)
    }
}

impl EnsembleCombiner {
    pub fn new(method: EnsembleMethod, confidence_margin: f64) -> Self {
        Self {
            method,
            confidence_margin,
        }
    }

    pub fn method(&self) -> EnsembleMethod {
        self.method
    }

    pub fn confidence_margin(&self) -> f64 {
        self.confidence_margin
    }

    /// Combined verdict per record
    pub fn combine(&self, signals: &DetectorSignals<'_>) -> Result<Vec<bool>> {
        signals.check_lengths()?;

        let verdicts = (0..signals.len())
            .map(|i| {
                let iso = signals.isolation_verdicts[i];
                let recon = signals.reconstruction_errors[i] > signals.threshold;
                match self.method {
                    EnsembleMethod::MajorityVote | EnsembleMethod::Union => iso || recon,
                    EnsembleMethod::Intersection => iso && recon,
                    EnsembleMethod::ScoreWeighted => match (iso, recon) {
                        (true, true) => true,
                        (false, false) => false,
                        (true, false) => signals.isolation_confidence(i) > self.confidence_margin,
                        (false, true) => {
                            signals.reconstruction_confidence(i) > self.confidence_margin
                        }
                    },
                }
            })
            .collect();

        Ok(verdicts)
    }
}
