//! Multiclass gradient-boosted trees
//!
//! Softmax boosting: each round fits one leaf-limited regression tree per
//! class on the log-loss gradient and shrinks its contribution by the
//! learning rate. With early stopping enabled a seeded fraction of the
//! training rows is held out and boosting stops once validation log-loss
//! stops improving.

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use super::Classifier;
use crate::config::Hyperparameters;
use crate::error::{ExoClassError, Result};

const PROB_EPS: f64 = 1e-12;

/// Boosting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Maximum number of boosting rounds
    pub n_rounds: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Leaf budget per tree
    pub max_leaf_nodes: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    /// Stop early on a held-out validation fraction
    pub early_stopping: bool,
    /// Fraction of training rows held out when early stopping is on
    pub validation_fraction: f64,
    /// Rounds without improvement tolerated before stopping
    pub patience: usize,
    /// Minimum log-loss improvement that counts as progress
    pub tol: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.05,
            max_leaf_nodes: 31,
            min_samples_leaf: 20,
            early_stopping: true,
            validation_fraction: 0.1,
            patience: 10,
            tol: 1e-7,
            seed: 42,
        }
    }
}

impl BoostingConfig {
    /// Build a config from the pipeline hyperparameter set.
    pub fn from_hyperparameters(hp: &Hyperparameters, seed: u64) -> Self {
        Self {
            learning_rate: hp.learning_rate,
            max_leaf_nodes: hp.max_leaf_nodes,
            min_samples_leaf: hp.min_samples_leaf,
            early_stopping: hp.early_stopping,
            seed,
            ..Default::default()
        }
    }
}

/// Multiclass gradient-boosted tree classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedTreesClassifier {
    config: BoostingConfig,
    /// One tree per class per kept round
    trees: Vec<Vec<RegressionTree>>,
    /// Per-class initial log prior
    base_scores: Vec<f64>,
    n_classes: usize,
}

impl BoostedTreesClassifier {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_scores: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    /// Number of boosting rounds actually kept after early stopping.
    pub fn n_rounds_fitted(&self) -> usize {
        self.trees.len()
    }

    /// Raw additive scores for a matrix, one column per class.
    fn decision_scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.n_classes == 0 {
            return Err(ExoClassError::NotFitted);
        }
        let n = x.nrows();
        let mut scores = Array2::zeros((n, self.n_classes));
        for c in 0..self.n_classes {
            scores.column_mut(c).fill(self.base_scores[c]);
        }
        for round in &self.trees {
            for (c, tree) in round.iter().enumerate() {
                let preds = tree.predict(x)?;
                for i in 0..n {
                    scores[[i, c]] += self.config.learning_rate * preds[i];
                }
            }
        }
        Ok(scores)
    }

    /// Split off a seeded validation fraction for early stopping. Returns
    /// `None` when the dataset is too small to give both sides at least one
    /// row, in which case boosting runs all rounds.
    fn holdout_indices(&self, n_samples: usize) -> Option<(Vec<usize>, Vec<usize>)> {
        let n_val = ((n_samples as f64) * self.config.validation_fraction).round() as usize;
        let n_val = n_val.max(1);
        if n_samples < n_val + 2 {
            return None;
        }
        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        indices.shuffle(&mut rng);
        let val = indices[..n_val].to_vec();
        let train = indices[n_val..].to_vec();
        Some((train, val))
    }
}

impl Classifier for BoostedTreesClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(ExoClassError::Training("training set is empty".to_string()));
        }
        if n_classes < 2 {
            return Err(ExoClassError::Training(format!(
                "need at least 2 classes, got {}",
                n_classes
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(ExoClassError::Training(format!(
                "class index {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let holdout = if self.config.early_stopping {
            self.holdout_indices(n_samples)
        } else {
            None
        };
        let (train_idx, val_idx) = match holdout {
            Some((train, val)) => (train, Some(val)),
            None => ((0..n_samples).collect(), None),
        };

        let x_train = x.select(ndarray::Axis(0), &train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let n_train = y_train.len();

        // Smoothed log priors as the additive starting point
        let mut counts = vec![0usize; n_classes];
        for &c in &y_train {
            counts[c] += 1;
        }
        self.base_scores = counts
            .iter()
            .map(|&c| ((c as f64 + 1.0) / (n_train as f64 + n_classes as f64)).ln())
            .collect();
        self.n_classes = n_classes;
        self.trees = Vec::new();

        let val = val_idx.map(|idx| {
            let x_val = x.select(ndarray::Axis(0), &idx);
            let y_val: Vec<usize> = idx.iter().map(|&i| y[i]).collect();
            (x_val, y_val)
        });

        let mut train_scores = Array2::zeros((n_train, n_classes));
        for c in 0..n_classes {
            train_scores.column_mut(c).fill(self.base_scores[c]);
        }
        let mut val_scores = val.as_ref().map(|(x_val, _)| {
            let mut s = Array2::zeros((x_val.nrows(), n_classes));
            for c in 0..n_classes {
                s.column_mut(c).fill(self.base_scores[c]);
            }
            s
        });

        let mut best_loss = f64::INFINITY;
        let mut best_rounds = 0usize;
        let mut rounds_since_improvement = 0usize;

        for _ in 0..self.config.n_rounds {
            let probs = softmax_rows(&train_scores);
            let mut round_trees = Vec::with_capacity(n_classes);

            for c in 0..n_classes {
                let residuals: Array1<f64> = (0..n_train)
                    .map(|i| {
                        let target = if y_train[i] == c { 1.0 } else { 0.0 };
                        target - probs[[i, c]]
                    })
                    .collect();

                let mut tree =
                    RegressionTree::new(self.config.max_leaf_nodes, self.config.min_samples_leaf);
                tree.fit(&x_train, &residuals)?;

                let preds = tree.predict(&x_train)?;
                for i in 0..n_train {
                    train_scores[[i, c]] += self.config.learning_rate * preds[i];
                }

                if let (Some((x_val, _)), Some(scores)) = (val.as_ref(), val_scores.as_mut()) {
                    let val_preds = tree.predict(x_val)?;
                    for i in 0..x_val.nrows() {
                        scores[[i, c]] += self.config.learning_rate * val_preds[i];
                    }
                }

                round_trees.push(tree);
            }
            self.trees.push(round_trees);

            if let (Some((_, y_val)), Some(scores)) = (val.as_ref(), val_scores.as_ref()) {
                let val_probs = softmax_rows(scores);
                let loss = log_loss(&val_probs, y_val);
                if best_loss - loss > self.config.tol {
                    best_loss = loss;
                    best_rounds = self.trees.len();
                    rounds_since_improvement = 0;
                } else {
                    rounds_since_improvement += 1;
                    if rounds_since_improvement >= self.config.patience {
                        break;
                    }
                }
            }
        }

        if val.is_some() && best_rounds > 0 {
            self.trees.truncate(best_rounds);
        }

        tracing::info!(
            rounds = self.trees.len(),
            classes = n_classes,
            samples = n_samples,
            "classifier fitted"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.predict_proba(x)?;
        Ok((0..probs.nrows())
            .map(|i| {
                let row = probs.row(i);
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(c, _)| c)
                    .unwrap_or(0)
            })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.decision_scores(x)?;
        Ok(softmax_rows(&scores))
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}

fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut out = scores.clone();
    for mut row in out.rows_mut() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
    out
}

fn log_loss(probs: &Array2<f64>, y: &[usize]) -> f64 {
    let n = y.len().max(1);
    -y.iter()
        .enumerate()
        .map(|(i, &c)| (probs[[i, c]] + PROB_EPS).ln())
        .sum::<f64>()
        / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three well-separated clusters in two features, several rows each.
    fn three_class_data() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..12 {
            let jitter = (i % 4) as f64 * 0.1;
            rows.extend_from_slice(&[0.0 + jitter, 0.0 + jitter]);
            y.push(0);
            rows.extend_from_slice(&[5.0 + jitter, 5.0 + jitter]);
            y.push(1);
            rows.extend_from_slice(&[10.0 + jitter, 0.0 + jitter]);
            y.push(2);
        }
        let x = Array2::from_shape_vec((36, 2), rows).unwrap();
        (x, y)
    }

    fn small_config() -> BoostingConfig {
        BoostingConfig {
            n_rounds: 30,
            learning_rate: 0.3,
            max_leaf_nodes: 4,
            min_samples_leaf: 1,
            early_stopping: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_learns_separable_classes() {
        let (x, y) = three_class_data();
        let mut model = BoostedTreesClassifier::new(small_config());
        model.fit(&x, &y, 3).unwrap();

        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 33, "only {}/36 correct", correct);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = three_class_data();
        let mut model = BoostedTreesClassifier::new(small_config());
        model.fit(&x, &y, 3).unwrap();

        let probs = model.predict_proba(&x).unwrap();
        assert_eq!(probs.dim(), (36, 3));
        for row in probs.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9, "row sums to {}", sum);
        }
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let (x, y) = three_class_data();
        let mut a = BoostedTreesClassifier::new(small_config());
        let mut b = BoostedTreesClassifier::new(small_config());
        a.fit(&x, &y, 3).unwrap();
        b.fit(&x, &y, 3).unwrap();

        let pa = a.predict_proba(&x).unwrap();
        let pb = b.predict_proba(&x).unwrap();
        assert_eq!(pa, pb);
    }

    #[test]
    fn test_early_stopping_limits_rounds() {
        let (x, y) = three_class_data();
        let config = BoostingConfig {
            early_stopping: true,
            validation_fraction: 0.2,
            patience: 3,
            n_rounds: 200,
            learning_rate: 0.3,
            max_leaf_nodes: 4,
            min_samples_leaf: 1,
            ..Default::default()
        };
        let mut model = BoostedTreesClassifier::new(config);
        model.fit(&x, &y, 3).unwrap();
        // A trivially separable problem converges long before 200 rounds
        assert!(model.n_rounds_fitted() < 200);
    }

    #[test]
    fn test_empty_training_set() {
        let x = Array2::<f64>::zeros((0, 2));
        let mut model = BoostedTreesClassifier::new(small_config());
        assert!(matches!(
            model.fit(&x, &[], 2).unwrap_err(),
            ExoClassError::Training(_)
        ));
    }

    #[test]
    fn test_single_class_rejected() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut model = BoostedTreesClassifier::new(small_config());
        assert!(matches!(
            model.fit(&x, &[0, 0, 0, 0], 1).unwrap_err(),
            ExoClassError::Training(_)
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = BoostedTreesClassifier::new(small_config());
        let x = Array2::<f64>::zeros((1, 2));
        assert!(matches!(
            model.predict(&x).unwrap_err(),
            ExoClassError::NotFitted
        ));
    }
}
