//! Standard scaling fit on the training partition
//!
//! Statistics are accumulated in f64 with a two-pass mean/variance over the
//! column divided by its largest magnitude. Byte counters routinely reach
//! 1e6..1e9 and lose their low digits in f32, which shows up as a non-zero
//! mean in the scaled training columns, and squaring raw values above 1e154
//! overflows f64.

use crate::error::{check_matrix, DetectorError, Result};
use serde::{Deserialize, Serialize};

/// Standard deviations at or below this fraction of the column's largest
/// magnitude are treated as zero
const MIN_RELATIVE_STD: f64 = 1e-12;

/// Per-column (mean, std) computed once on the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerStats {
    means: Vec<f64>,
    /// Population standard deviations, with 0 replaced by 1
    stds: Vec<f64>,
}

impl ScalerStats {
    /// Compute column statistics of `train`
    ///
    /// Each column is divided by its largest magnitude before the moments are
    /// taken, so values up to `f64::MAX` produce a finite mean and std.
    pub fn fit(train: &[Vec<f64>]) -> Result<Self> {
        let n_features = check_matrix("scaler", train)?;
        let n = train.len() as f64;

        let mut magnitudes = vec![0.0_f64; n_features];
        for row in train {
            for (a, &x) in magnitudes.iter_mut().zip(row) {
                if x.is_finite() {
                    *a = a.max(x.abs());
                }
            }
        }

        let mut means = vec![0.0; n_features];
        let mut stds = vec![1.0; n_features];
        for (j, &magnitude) in magnitudes.iter().enumerate() {
            if magnitude == 0.0 {
                continue;
            }
            let unit = |row: &Vec<f64>| {
                let x = row[j];
                if x.is_finite() {
                    x / magnitude
                } else {
                    0.0
                }
            };

            let unit_mean = train.iter().map(unit).sum::<f64>() / n;
            let unit_var = train
                .iter()
                .map(|row| (unit(row) - unit_mean).powi(2))
                .sum::<f64>()
                / n;
            let unit_std = unit_var.sqrt();

            means[j] = unit_mean * magnitude;
            if unit_std.is_finite() && unit_std > MIN_RELATIVE_STD {
                stds[j] = unit_std * magnitude;
            }
        }

        Ok(Self { means, stds })
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    /// Standardize one row
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.means.len() {
            return Err(DetectorError::DimensionMismatch {
                model: "scaler",
                expected: self.means.len(),
                actual: row.len(),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&x, (&m, &s))| x / s - m / s)
            .collect())
    }

    /// Standardize every row of `matrix`
    pub fn transform(&self, matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        matrix.iter().map(|row| self.transform_row(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(m: &[Vec<f64>], j: usize) -> Vec<f64> {
        m.iter().map(|r| r[j]).collect()
    }

    fn mean_std(xs: &[f64]) -> (f64, f64) {
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_scaled_training_columns_are_standard() {
        let train = vec![
            vec![1.0, 1_000_000.0],
            vec![2.0, 1_000_500.0],
            vec![3.0, 2_000_000.0],
            vec![4.0, 999_000.0],
        ];
        let stats = ScalerStats::fit(&train).unwrap();
        let scaled = stats.transform(&train).unwrap();

        for j in 0..2 {
            let (mean, std) = mean_std(&column(&scaled, j));
            assert!(mean.abs() < 1e-9, "column {} mean {}", j, mean);
            assert!((std - 1.0).abs() < 1e-9, "column {} std {}", j, std);
        }
    }

    #[test]
    fn test_huge_magnitudes_keep_finite_stats() {
        let train = vec![vec![0.0], vec![1e200], vec![0.0], vec![1e200]];
        let stats = ScalerStats::fit(&train).unwrap();
        assert_eq!(stats.means()[0], 5e199);
        assert_eq!(stats.stds()[0], 5e199);

        let scaled = stats.transform(&train).unwrap();
        let (mean, std) = mean_std(&column(&scaled, 0));
        assert!(mean.abs() < 1e-12, "mean {}", mean);
        assert!((std - 1.0).abs() < 1e-12, "std {}", std);
    }

    #[test]
    fn test_opposite_extremes_scale_finite() {
        let train = vec![vec![1.5e308], vec![-1.5e308], vec![0.0], vec![1.0]];
        let stats = ScalerStats::fit(&train).unwrap();
        assert!(stats.means()[0].is_finite());
        assert!(stats.stds()[0].is_finite());

        let scaled = stats.transform(&train).unwrap();
        assert!(scaled.iter().all(|r| r[0].is_finite()));
        let (mean, std) = mean_std(&column(&scaled, 0));
        assert!(mean.abs() < 1e-9, "mean {}", mean);
        assert!((std - 1.0).abs() < 1e-9, "std {}", std);
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let train = vec![vec![5.0, 1.0], vec![5.0, 2.0], vec![5.0, 3.0]];
        let stats = ScalerStats::fit(&train).unwrap();
        assert_eq!(stats.stds()[0], 1.0);

        let scaled = stats.transform(&train).unwrap();
        assert!(column(&scaled, 0).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_reuses_training_stats() {
        let train = vec![vec![0.0], vec![10.0]];
        let stats = ScalerStats::fit(&train).unwrap();
        let scaled = stats.transform(&[vec![20.0]]).unwrap();
        // mean 5, std 5
        assert!((scaled[0][0] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_is_shape_error() {
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(matches!(
            ScalerStats::fit(&empty),
            Err(DetectorError::Shape { .. })
        ));
    }

    #[test]
    fn test_width_mismatch() {
        let stats = ScalerStats::fit(&[vec![1.0, 2.0]]).unwrap();
        assert!(matches!(
            stats.transform_row(&[1.0]),
            Err(DetectorError::DimensionMismatch { .. })
        ));
    }
}
