//! Leaf-limited regression tree
//!
//! Base learner for the boosted ensemble. The tree is grown best-first:
//! among all expandable leaves, the one whose best split reduces squared
//! error the most is expanded, until the leaf budget is exhausted. This is
//! what makes `max_leaf_nodes` the capacity knob rather than a depth bound.

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ExoClassError, Result};

/// Tree node stored in a flat arena; `left`/`right` are arena indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A candidate expansion of one leaf, scored by squared-error reduction.
struct Candidate {
    node_idx: usize,
    rows: Vec<usize>,
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Regression tree with a leaf budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    max_leaf_nodes: usize,
    min_samples_leaf: usize,
}

impl RegressionTree {
    pub fn new(max_leaf_nodes: usize, min_samples_leaf: usize) -> Self {
        Self {
            nodes: Vec::new(),
            max_leaf_nodes: max_leaf_nodes.max(2),
            min_samples_leaf: min_samples_leaf.max(1),
        }
    }

    /// Fit the tree to training data.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ExoClassError::Training(
                "cannot fit a tree on an empty matrix".to_string(),
            ));
        }

        let rows: Vec<usize> = (0..n_samples).collect();
        self.nodes = vec![TreeNode::Leaf {
            value: mean(y, &rows),
        }];

        let mut candidates: Vec<Candidate> = Vec::new();
        if let Some(c) = self.best_split(x, y, 0, rows) {
            candidates.push(c);
        }

        let mut n_leaves = 1;
        while n_leaves < self.max_leaf_nodes && !candidates.is_empty() {
            let best_idx = candidates
                .iter()
                .enumerate()
                .max_by(|a, b| {
                    a.1.gain
                        .partial_cmp(&b.1.gain)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);
            let candidate = candidates.swap_remove(best_idx);

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = candidate
                .rows
                .iter()
                .partition(|&&i| x[[i, candidate.feature_idx]] <= candidate.threshold);

            let left_idx = self.nodes.len();
            let right_idx = left_idx + 1;
            self.nodes.push(TreeNode::Leaf {
                value: mean(y, &left_rows),
            });
            self.nodes.push(TreeNode::Leaf {
                value: mean(y, &right_rows),
            });
            self.nodes[candidate.node_idx] = TreeNode::Split {
                feature_idx: candidate.feature_idx,
                threshold: candidate.threshold,
                left: left_idx,
                right: right_idx,
            };
            n_leaves += 1;

            if let Some(c) = self.best_split(x, y, left_idx, left_rows) {
                candidates.push(c);
            }
            if let Some(c) = self.best_split(x, y, right_idx, right_rows) {
                candidates.push(c);
            }
        }

        Ok(self)
    }

    /// Best squared-error split for the rows at one leaf, scanning features
    /// in parallel.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        node_idx: usize,
        rows: Vec<usize>,
    ) -> Option<Candidate> {
        if rows.len() < 2 * self.min_samples_leaf {
            return None;
        }

        let n = rows.len() as f64;
        let total_sum: f64 = rows.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();
        let parent_sse = total_sq - total_sum * total_sum / n;

        let min_leaf = self.min_samples_leaf;
        let best = (0..x.ncols())
            .into_par_iter()
            .filter_map(|feature_idx| {
                let mut pairs: Vec<(f64, f64)> =
                    rows.iter().map(|&i| (x[[i, feature_idx]], y[i])).collect();
                pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

                let mut left_sum = 0.0;
                let mut left_sq = 0.0;
                let mut best_gain = 0.0f64;
                let mut best_threshold = 0.0f64;

                for i in 0..pairs.len() - 1 {
                    left_sum += pairs[i].1;
                    left_sq += pairs[i].1 * pairs[i].1;

                    // No decision boundary between equal feature values
                    if pairs[i].0 == pairs[i + 1].0 {
                        continue;
                    }

                    let left_n = i + 1;
                    let right_n = pairs.len() - left_n;
                    if left_n < min_leaf || right_n < min_leaf {
                        continue;
                    }

                    let right_sum = total_sum - left_sum;
                    let right_sq = total_sq - left_sq;
                    let sse = (left_sq - left_sum * left_sum / left_n as f64)
                        + (right_sq - right_sum * right_sum / right_n as f64);
                    let gain = parent_sse - sse;

                    if gain > best_gain {
                        best_gain = gain;
                        best_threshold = (pairs[i].0 + pairs[i + 1].0) / 2.0;
                    }
                }

                if best_gain > 1e-12 {
                    Some((feature_idx, best_threshold, best_gain))
                } else {
                    None
                }
            })
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

        best.map(|(feature_idx, threshold, gain)| Candidate {
            node_idx,
            rows,
            feature_idx,
            threshold,
            gain,
        })
    }

    /// Predict one value per row.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(ExoClassError::NotFitted);
        }
        let predictions: Vec<f64> = (0..x.nrows())
            .map(|i| self.predict_row(&x.row(i).to_vec()))
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    fn predict_row(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if sample[*feature_idx] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of leaves in the fitted tree.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }
}

fn mean(y: &Array1<f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64
}
