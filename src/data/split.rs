//! Grouped train/test splitting
//!
//! Rows that share a group value (the same observed star) must land on the
//! same side of the split, otherwise test metrics are inflated by group
//! leakage. The split therefore partitions the distinct group values, not
//! the rows, and only approximately hits the requested test proportion.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{ExoClassError, Result};

/// A single train/test split over row indices.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Randomized group-level splitter.
///
/// Identical seed and identical group set produce an identical group
/// assignment: the distinct groups are collected in sorted order before the
/// seeded shuffle, so row order cannot perturb the outcome.
#[derive(Debug, Clone)]
pub struct GroupShuffleSplit {
    test_size: f64,
    seed: u64,
}

impl GroupShuffleSplit {
    pub fn new(test_size: f64, seed: u64) -> Self {
        Self { test_size, seed }
    }

    /// Partition row indices by group membership.
    pub fn split(&self, groups: &[String]) -> Result<Split> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ExoClassError::InvalidParameter {
                name: "test_size".to_string(),
                value: self.test_size.to_string(),
                reason: "must be in (0, 1)".to_string(),
            });
        }

        // BTreeMap keeps the distinct groups sorted, independent of row order
        let mut rows_by_group: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, group) in groups.iter().enumerate() {
            rows_by_group.entry(group.as_str()).or_default().push(idx);
        }

        if rows_by_group.len() < 2 {
            return Err(ExoClassError::InsufficientData(format!(
                "need at least 2 distinct groups to split, got {}",
                rows_by_group.len()
            )));
        }

        let mut group_keys: Vec<&str> = rows_by_group.keys().copied().collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        group_keys.shuffle(&mut rng);

        let n_rows = groups.len();
        let target_test_rows = ((n_rows as f64) * self.test_size).round() as usize;

        let mut test_groups: Vec<&str> = Vec::new();
        let mut test_rows = 0usize;
        for &key in &group_keys {
            if test_rows >= target_test_rows {
                break;
            }
            test_rows += rows_by_group[key].len();
            test_groups.push(key);
        }

        // Both sides must be populated; with >= 2 groups there is always a
        // group to move
        if test_groups.is_empty() {
            test_groups.push(group_keys[0]);
        }
        if test_groups.len() == group_keys.len() {
            test_groups.pop();
        }

        let mut split = Split {
            train: Vec::new(),
            test: Vec::new(),
        };
        for (key, rows) in &rows_by_group {
            if test_groups.contains(key) {
                split.test.extend(rows.iter().copied());
            } else {
                split.train.extend(rows.iter().copied());
            }
        }

        tracing::info!(
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            test_groups = test_groups.len(),
            total_groups = group_keys.len(),
            "grouped split computed"
        );

        Ok(split)
    }
}
