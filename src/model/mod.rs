//! Classifier models
//!
//! The training pipeline treats "fit a classifier on (features, labels)" as
//! a pluggable capability behind the [`Classifier`] trait. The shipped
//! implementation is [`BoostedTreesClassifier`], a leaf-limited multiclass
//! gradient-boosted tree ensemble.

pub mod boosting;
pub mod tree;

pub use boosting::{BoostedTreesClassifier, BoostingConfig};
pub use tree::RegressionTree;

use ndarray::Array2;

use crate::error::Result;

/// Trait for classification models.
///
/// Classes are dense indices `0..n_classes`; mapping between indices and
/// label strings is owned by the pipeline, which carries the fixed label
/// ordering.
pub trait Classifier: Send + Sync {
    /// Fit the classifier on a numeric matrix and class indices.
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Predict a class index per row.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict per-class probabilities, one row per sample, one column per
    /// class in index order.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Number of classes the model was fitted with.
    fn n_classes(&self) -> usize;
}
