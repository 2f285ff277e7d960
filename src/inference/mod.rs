//! Inference against stored artifacts
//!
//! Callers supply arbitrary rows as column-to-value maps. Each row is
//! reconciled against the artifact's frozen feature schema before
//! prediction: schema columns absent from the row are filled with the
//! schema sentinel, columns unknown to the schema are dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use ndarray::Array2;

use crate::data::FeatureSchema;
use crate::error::{ExoClassError, Result};
use crate::pipeline::TrainedArtifact;

/// How strictly inference input must match the training-time schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconcilePolicy {
    /// Fill missing schema columns with the sentinel value; callers are
    /// never rejected solely for partial schemas.
    #[default]
    Lenient,
    /// Reject rows that omit any schema column, naming the columns.
    Strict,
}

/// Reconcile rows against a feature schema into a matrix in schema order.
pub fn reconcile(
    schema: &FeatureSchema,
    rows: &[HashMap<String, f64>],
    policy: ReconcilePolicy,
) -> Result<Array2<f64>> {
    if rows.is_empty() {
        return Err(ExoClassError::SchemaMismatch(
            "input contains no rows".to_string(),
        ));
    }

    if policy == ReconcilePolicy::Strict {
        for (i, row) in rows.iter().enumerate() {
            let missing: Vec<&str> = schema
                .columns()
                .iter()
                .filter(|c| !row.contains_key(c.as_str()))
                .map(|c| c.as_str())
                .collect();
            if !missing.is_empty() {
                return Err(ExoClassError::SchemaMismatch(format!(
                    "row {} is missing schema columns: {}",
                    i,
                    missing.join(", ")
                )));
            }
        }
    }

    let mut matrix = Array2::from_elem((rows.len(), schema.len()), FeatureSchema::FILL_VALUE);
    for (i, row) in rows.iter().enumerate() {
        for (j, column) in schema.columns().iter().enumerate() {
            if let Some(&value) = row.get(column) {
                matrix[[i, j]] = value;
            }
        }
    }
    Ok(matrix)
}

/// Prediction handle over one resolved artifact.
pub struct Predictor {
    artifact: Arc<TrainedArtifact>,
    policy: ReconcilePolicy,
}

impl Predictor {
    pub fn new(artifact: TrainedArtifact) -> Self {
        Self {
            artifact: Arc::new(artifact),
            policy: ReconcilePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn artifact(&self) -> &TrainedArtifact {
        &self.artifact
    }

    /// Predict a class label per row.
    pub fn predict(&self, rows: &[HashMap<String, f64>]) -> Result<Vec<String>> {
        let matrix = reconcile(self.artifact.schema(), rows, self.policy)?;
        self.artifact.predict(&matrix)
    }

    /// Predict per-class probabilities, keyed by the artifact's class set.
    pub fn predict_proba(
        &self,
        rows: &[HashMap<String, f64>],
    ) -> Result<Vec<BTreeMap<String, f64>>> {
        let matrix = reconcile(self.artifact.schema(), rows, self.policy)?;
        let probs = self.artifact.predict_proba(&matrix)?;

        Ok((0..probs.nrows())
            .map(|i| {
                self.artifact
                    .class_labels()
                    .iter()
                    .enumerate()
                    .map(|(c, label)| (label.clone(), probs[[i, c]]))
                    .collect()
            })
            .collect())
    }
}
