//! Missing value imputation

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ExoClassError, Result};

/// Check if a value is missing (NaN)
#[inline]
pub fn is_missing(v: f64) -> bool {
    v.is_nan()
}

/// Trait for imputers
pub trait Imputer: Send + Sync {
    /// Fit the imputer on data with missing values
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Transform data by imputing missing values
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Per-column median imputer.
///
/// Medians are computed from the data passed to `fit` (the training
/// partition only) and frozen; test evaluation and inference reuse the same
/// statistics so the test partition never influences them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedianImputer {
    medians: Option<Vec<f64>>,
}

impl Default for MedianImputer {
    fn default() -> Self {
        Self::new()
    }
}

impl MedianImputer {
    pub fn new() -> Self {
        Self { medians: None }
    }

    /// Frozen per-column medians, if fitted.
    pub fn medians(&self) -> Option<&[f64]> {
        self.medians.as_deref()
    }

    fn column_median(values: &mut Vec<f64>) -> f64 {
        if values.is_empty() {
            // Column was entirely missing in the training partition
            return 0.0;
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.0
        } else {
            values[mid]
        }
    }
}

impl Imputer for MedianImputer {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let medians = (0..x.ncols())
            .map(|j| {
                let mut observed: Vec<f64> = x
                    .column(j)
                    .iter()
                    .copied()
                    .filter(|v| !is_missing(*v))
                    .collect();
                Self::column_median(&mut observed)
            })
            .collect();
        self.medians = Some(medians);
        Ok(())
    }

    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let medians = self.medians.as_ref().ok_or(ExoClassError::NotFitted)?;
        if x.ncols() != medians.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("{} columns", medians.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.clone();
        for (j, &median) in medians.iter().enumerate() {
            for v in out.column_mut(j).iter_mut() {
                if is_missing(*v) {
                    *v = median;
                }
            }
        }
        Ok(out)
    }
}
