//! Integration test: registry versioning and lookup with real artifacts

use exoclass::config::Hyperparameters;
use exoclass::data::FeatureSchema;
use exoclass::evaluation::{ClassificationReport, ConfusionMatrix, Evaluator};
use exoclass::pipeline::{TrainedArtifact, TrainingPipeline};
use exoclass::registry::{ModelRegistry, ModelVersion};
use ndarray::Array2;

fn labels() -> Vec<String> {
    vec!["LOW".to_string(), "HIGH".to_string()]
}

fn trained_outcome() -> (TrainedArtifact, ClassificationReport, ConfusionMatrix) {
    let x = Array2::from_shape_vec(
        (12, 1),
        (0..12).map(|i| i as f64).collect(),
    )
    .unwrap();
    let y: Vec<String> = (0..12)
        .map(|i| if i < 6 { "LOW".to_string() } else { "HIGH".to_string() })
        .collect();

    let hp = Hyperparameters::default()
        .with_min_samples_leaf(1)
        .with_early_stopping(false)
        .with_learning_rate(0.3);
    let pipeline = TrainingPipeline::new(hp, 7);
    let schema = FeatureSchema::new(vec!["x".to_string()]);
    let artifact = pipeline.fit(&x, &y, schema, &labels()).unwrap();

    let predictions = artifact.predict(&x).unwrap();
    let (report, matrix) = Evaluator::new(labels())
        .from_predictions(&y, &predictions)
        .unwrap();
    (artifact, report, matrix)
}

#[test]
fn test_first_save_is_v1_0_0() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let (artifact, report, matrix) = trained_outcome();

    let version = registry.save("m", &artifact, &report, &matrix).unwrap();
    assert_eq!(version, ModelVersion::new(1, 0, 0));
}

#[test]
fn test_version_succession_skips_to_greatest() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let (artifact, report, matrix) = trained_outcome();

    // Pre-existing version directories from earlier runs
    for v in ["v1.0.0", "v1.0.1", "v1.2.0"] {
        std::fs::create_dir_all(tmp.path().join("m").join(v)).unwrap();
    }

    let version = registry.save("m", &artifact, &report, &matrix).unwrap();
    assert_eq!(version, ModelVersion::new(1, 2, 1));
}

#[test]
fn test_numeric_version_ordering_in_listing() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    for v in ["v1.10.0", "v1.2.0", "v1.9.9"] {
        std::fs::create_dir_all(tmp.path().join("m").join(v)).unwrap();
    }

    let versions = registry.list_versions("m").unwrap();
    assert_eq!(
        versions,
        vec![
            ModelVersion::new(1, 2, 0),
            ModelVersion::new(1, 9, 9),
            ModelVersion::new(1, 10, 0),
        ]
    );
}

#[test]
fn test_loaded_artifact_keeps_schema_and_labels() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let (artifact, report, matrix) = trained_outcome();

    let version = registry.save("m", &artifact, &report, &matrix).unwrap();
    let loaded = registry.load("m", &version).unwrap();

    assert_eq!(loaded.schema(), artifact.schema());
    assert_eq!(loaded.class_labels(), artifact.class_labels());
    assert_eq!(loaded.hyperparameters(), artifact.hyperparameters());
}

#[test]
fn test_list_models_after_saves() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let (artifact, report, matrix) = trained_outcome();

    registry.save("beta", &artifact, &report, &matrix).unwrap();
    registry.save("alpha", &artifact, &report, &matrix).unwrap();

    assert_eq!(registry.list_models().unwrap(), vec!["alpha", "beta"]);
}

#[test]
fn test_load_unknown_model() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let result = registry.load("ghost", &ModelVersion::new(1, 0, 0));
    assert!(result.is_err());
}

#[test]
fn test_stored_matrix_round_trips() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    let (artifact, report, matrix) = trained_outcome();

    let version = registry.save("m", &artifact, &report, &matrix).unwrap();
    let path = tmp
        .path()
        .join("m")
        .join(version.to_string())
        .join("matrix")
        .join("confusion_matrix.bin");
    let bytes = std::fs::read(path).unwrap();
    let restored: ConfusionMatrix = bincode::deserialize(&bytes).unwrap();
    assert_eq!(restored, matrix);
}
