//! Reconstruction-error threshold calibration
//!
//! The cutoff is a percentile of the training-split reconstruction errors
//! (95th by default), so roughly 5% of normal training traffic exceeds it.

use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};

/// Default calibration percentile
pub const DEFAULT_PERCENTILE: f64 = 95.0;

/// Percentile with linear interpolation between closest ranks
///
/// `pct` is clamped to [0, 100]. NaNs sort last. Returns 0.0 for empty input.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    percentile_sorted(&sorted, pct)
}

/// [`percentile`] on data already sorted ascending
pub fn percentile_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let pct = pct.clamp(0.0, 100.0);
    let index = (pct / 100.0) * (sorted.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper || sorted[lower] == sorted[upper] {
        sorted[lower]
    } else {
        let weight = index - lower as f64;
        let value = sorted[lower] + (sorted[upper] - sorted[lower]) * weight;
        value.max(sorted[lower]).min(sorted[upper])
    }
}

/// Derives the anomaly cutoff from training reconstruction errors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdCalibrator {
    percentile: f64,
}

impl Default for ThresholdCalibrator {
    fn default() -> Self {
        Self::new(DEFAULT_PERCENTILE)
    }
}

impl ThresholdCalibrator {
    pub fn new(percentile: f64) -> Self {
        Self { percentile }
    }

    pub fn percentile(&self) -> f64 {
        self.percentile
    }

    /// Threshold = configured percentile of the finite `train_errors`
    ///
    /// NaN and infinite errors are dropped with a warning; if nothing finite
    /// remains the calibration fails with [`DetectorError::NonFinite`].
    pub fn calibrate(&self, train_errors: &[f64]) -> Result<f64> {
        if train_errors.is_empty() {
            return Err(DetectorError::Shape {
                model: "threshold_calibrator",
                rows: 0,
                cols: 1,
            });
        }

        let finite: Vec<f64> = train_errors.iter().copied().filter(|e| e.is_finite()).collect();
        let dropped = train_errors.len() - finite.len();
        if finite.is_empty() {
            return Err(DetectorError::NonFinite {
                model: "threshold_calibrator",
                count: dropped,
            });
        }
        if dropped > 0 {
            tracing::warn!(dropped, "non-finite training errors excluded from threshold");
        }

        let threshold = percentile(&finite, self.percentile);
        tracing::debug!(percentile = self.percentile, threshold, "calibrated threshold");
        Ok(threshold)
    }
}

/// Anomaly iff error strictly exceeds `threshold`
pub fn classify(errors: &[f64], threshold: f64) -> Vec<bool> {
    errors.iter().map(|&e| e > threshold).collect()
}
