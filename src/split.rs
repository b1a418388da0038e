//! Seeded train/test partitioning

use crate::error::{DetectorError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Index partition of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `0..n` into train and test indices
///
/// With `labels` and `stratify`, each class contributes
/// `round(test_size * class_size)` records to the test side. Both sides are
/// guaranteed at least one record.
pub fn split_indices(
    n: usize,
    labels: Option<&[bool]>,
    test_size: f64,
    seed: u64,
    stratify: bool,
) -> Result<Split> {
    if n < 2 {
        return Err(DetectorError::Shape {
            model: "train_test_split",
            rows: n,
            cols: 0,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    match labels {
        Some(labels) if stratify && labels.len() == n => {
            for class in [false, true] {
                let mut members: Vec<usize> = (0..n).filter(|&i| labels[i] == class).collect();
                members.shuffle(&mut rng);
                let n_test = (test_size * members.len() as f64).round() as usize;
                test.extend_from_slice(&members[..n_test]);
                train.extend_from_slice(&members[n_test..]);
            }
        }
        _ => {
            let mut all: Vec<usize> = (0..n).collect();
            all.shuffle(&mut rng);
            let n_test = (test_size * n as f64).ceil() as usize;
            let n_test = n_test.min(n);
            test.extend_from_slice(&all[..n_test]);
            train.extend_from_slice(&all[n_test..]);
        }
    }

    if test.is_empty() {
        if let Some(i) = train.pop() {
            test.push(i);
        }
    }
    if train.is_empty() {
        if let Some(i) = test.pop() {
            train.push(i);
        }
    }

    tracing::debug!(train = train.len(), test = test.len(), "split dataset");
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let split = split_indices(100, None, 0.2, 42, false).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);

        let all: HashSet<usize> = split.train.iter().chain(&split.test).copied().collect();
        assert_eq!(all.len(), 100);
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let a = split_indices(50, None, 0.3, 7, false).unwrap();
        let b = split_indices(50, None, 0.3, 7, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stratified_keeps_class_ratio() {
        let labels: Vec<bool> = (0..100).map(|i| i < 10).collect();
        let split = split_indices(100, Some(&labels), 0.2, 42, true).unwrap();

        let test_anomalies = split.test.iter().filter(|&&i| labels[i]).count();
        assert_eq!(test_anomalies, 2);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn test_tiny_inputs_keep_both_sides() {
        let split = split_indices(2, None, 0.01, 1, false).unwrap();
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.test.len(), 1);

        let split = split_indices(3, None, 0.99, 1, false).unwrap();
        assert!(!split.train.is_empty());
        assert!(!split.test.is_empty());
    }

    #[test]
    fn test_single_row_is_shape_error() {
        assert!(matches!(
            split_indices(1, None, 0.2, 1, false),
            Err(DetectorError::Shape { .. })
        ));
    }
}
