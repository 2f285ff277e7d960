//! Training pipeline
//!
//! Composes imputation and classification into a single fit-once unit and
//! orchestrates the full training lifecycle: feature selection → grouped
//! split → fit → evaluation → registry save.

pub mod imputer;

pub use imputer::{is_missing, Imputer, MedianImputer};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

use crate::config::{Hyperparameters, Settings};
use crate::data::{FeatureSchema, GroupShuffleSplit};
use crate::error::{ExoClassError, Result};
use crate::evaluation::{ClassificationReport, ConfusionMatrix, Evaluator};
use crate::model::{BoostedTreesClassifier, BoostingConfig, Classifier};
use crate::registry::{ModelRegistry, ModelVersion};

/// A trained, immutable model artifact.
///
/// Bundles the frozen imputer, the fitted classifier, the feature schema
/// and the hyperparameters of one training run. Never mutated after
/// creation; a retrain produces a new artifact under a new version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedArtifact {
    schema: FeatureSchema,
    imputer: MedianImputer,
    classifier: BoostedTreesClassifier,
    hyperparameters: Hyperparameters,
    class_labels: Vec<String>,
    trained_at: DateTime<Utc>,
}

impl TrainedArtifact {
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Fixed class-label ordering the classifier was trained against.
    pub fn class_labels(&self) -> &[String] {
        &self.class_labels
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Predict class labels for a matrix already laid out in schema order.
    /// Missing values are filled with the frozen training medians.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        let imputed = self.imputer.transform(x)?;
        let indices = self.classifier.predict(&imputed)?;
        Ok(indices
            .into_iter()
            .map(|c| self.class_labels[c].clone())
            .collect())
    }

    /// Per-class probabilities, one column per label in the fixed ordering.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let imputed = self.imputer.transform(x)?;
        self.classifier.predict_proba(&imputed)
    }
}

/// Impute-then-classify training pipeline.
pub struct TrainingPipeline {
    hyperparameters: Hyperparameters,
    seed: u64,
}

impl TrainingPipeline {
    pub fn new(hyperparameters: Hyperparameters, seed: u64) -> Self {
        Self {
            hyperparameters,
            seed,
        }
    }

    /// Fit the pipeline on the training partition.
    ///
    /// Imputation statistics come from `x_train` only, so the test
    /// partition never leaks into them.
    pub fn fit(
        &self,
        x_train: &Array2<f64>,
        y_train: &[String],
        schema: FeatureSchema,
        class_labels: &[String],
    ) -> Result<TrainedArtifact> {
        if x_train.nrows() == 0 || y_train.is_empty() {
            return Err(ExoClassError::Training("training set is empty".to_string()));
        }
        if x_train.nrows() != y_train.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("{} labels", x_train.nrows()),
                actual: format!("{} labels", y_train.len()),
            });
        }

        let y_indices: Vec<usize> = y_train
            .iter()
            .map(|label| {
                class_labels
                    .iter()
                    .position(|l| l == label)
                    .ok_or_else(|| {
                        ExoClassError::Training(format!(
                            "label `{}` is not in the fixed class ordering",
                            label
                        ))
                    })
            })
            .collect::<Result<Vec<usize>>>()?;

        let mut seen = vec![false; class_labels.len()];
        for &c in &y_indices {
            seen[c] = true;
        }
        if seen.iter().filter(|&&s| s).count() < 2 {
            return Err(ExoClassError::Training(
                "training set contains a single class".to_string(),
            ));
        }

        let mut imputer = MedianImputer::new();
        let x_imputed = imputer.fit_transform(x_train)?;

        let config = BoostingConfig::from_hyperparameters(&self.hyperparameters, self.seed);
        let mut classifier = BoostedTreesClassifier::new(config);
        classifier.fit(&x_imputed, &y_indices, class_labels.len())?;

        Ok(TrainedArtifact {
            schema,
            imputer,
            classifier,
            hyperparameters: self.hyperparameters.clone(),
            class_labels: class_labels.to_vec(),
            trained_at: Utc::now(),
        })
    }
}

/// Outcome of one full training run.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub version: ModelVersion,
    pub report: ClassificationReport,
    pub matrix: ConfusionMatrix,
    pub n_train_rows: usize,
    pub n_test_rows: usize,
}

/// Orchestrates the write path of the lifecycle: feature selection, grouped
/// split, pipeline fit, evaluation, registry save.
///
/// The session is an explicit handle; there is no shared mutable "current
/// model" state. Callers that need a model for inference resolve it from
/// the registry.
pub struct TrainingSession {
    settings: Settings,
}

impl TrainingSession {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Train on a dataset and persist the outcome under a new version.
    pub fn run(
        &self,
        df: &DataFrame,
        registry: &ModelRegistry,
        model_name: &str,
    ) -> Result<TrainingOutcome> {
        let (artifact, report, matrix, n_train, n_test) = self.train_and_evaluate(df)?;
        let version = registry.save(model_name, &artifact, &report, &matrix)?;

        tracing::info!(
            model = model_name,
            version = %version,
            accuracy = report.accuracy(),
            "training run registered"
        );

        Ok(TrainingOutcome {
            version,
            report,
            matrix,
            n_train_rows: n_train,
            n_test_rows: n_test,
        })
    }

    /// Train and evaluate without touching the registry.
    pub fn train_and_evaluate(
        &self,
        df: &DataFrame,
    ) -> Result<(
        TrainedArtifact,
        ClassificationReport,
        ConfusionMatrix,
        usize,
        usize,
    )> {
        let selected = self.settings.feature_selector().select(df)?;

        let splitter = GroupShuffleSplit::new(self.settings.test_size, self.settings.seed);
        let split = splitter.split(&selected.groups)?;

        let x_train = selected.matrix.select(ndarray::Axis(0), &split.train);
        let x_test = selected.matrix.select(ndarray::Axis(0), &split.test);
        let y_train: Vec<String> = split.train.iter().map(|&i| selected.labels[i].clone()).collect();
        let y_test: Vec<String> = split.test.iter().map(|&i| selected.labels[i].clone()).collect();

        let pipeline = TrainingPipeline::new(
            self.settings.hyperparameters.clone(),
            self.settings.seed,
        );
        let artifact = pipeline.fit(
            &x_train,
            &y_train,
            selected.schema.clone(),
            &self.settings.class_labels,
        )?;

        let evaluator = Evaluator::new(self.settings.class_labels.clone());
        let (report, matrix) = evaluator.evaluate(&artifact, &x_test, &y_test)?;

        Ok((artifact, report, matrix, split.train.len(), split.test.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec!["a".to_string(), "b".to_string()])
    }

    fn labels() -> Vec<String> {
        vec!["LOW".to_string(), "HIGH".to_string()]
    }

    fn pipeline() -> TrainingPipeline {
        let hp = Hyperparameters::default()
            .with_min_samples_leaf(1)
            .with_early_stopping(false);
        TrainingPipeline::new(hp, 42)
    }

    fn train_matrix() -> Array2<f64> {
        let mut rows = Vec::new();
        for i in 0..20 {
            let v = i as f64;
            rows.extend_from_slice(&[v, v * 2.0]);
        }
        Array2::from_shape_vec((20, 2), rows).unwrap()
    }

    fn train_labels() -> Vec<String> {
        (0..20)
            .map(|i| if i < 10 { "LOW".to_string() } else { "HIGH".to_string() })
            .collect()
    }

    #[test]
    fn test_fit_produces_working_artifact() {
        let artifact = pipeline()
            .fit(&train_matrix(), &train_labels(), schema(), &labels())
            .unwrap();

        let predictions = artifact.predict(&array![[1.0, 2.0], [18.0, 36.0]]).unwrap();
        assert_eq!(predictions, vec!["LOW", "HIGH"]);
    }

    #[test]
    fn test_missing_values_filled_at_inference() {
        let artifact = pipeline()
            .fit(&train_matrix(), &train_labels(), schema(), &labels())
            .unwrap();

        // NaN is filled from frozen medians rather than rejected
        let result = artifact.predict(&array![[f64::NAN, 2.0]]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_empty_training_set() {
        let x = Array2::<f64>::zeros((0, 2));
        let err = pipeline().fit(&x, &[], schema(), &labels()).unwrap_err();
        assert!(matches!(err, ExoClassError::Training(_)));
    }

    #[test]
    fn test_single_class_rejected() {
        let x = train_matrix();
        let y: Vec<String> = vec!["LOW".to_string(); 20];
        let err = pipeline().fit(&x, &y, schema(), &labels()).unwrap_err();
        assert!(matches!(err, ExoClassError::Training(_)));
    }

    #[test]
    fn test_unknown_label_rejected() {
        let x = train_matrix();
        let mut y = train_labels();
        y[0] = "UNKNOWN".to_string();
        let err = pipeline().fit(&x, &y, schema(), &labels()).unwrap_err();
        assert!(matches!(err, ExoClassError::Training(_)));
    }
}
