//! Centralized configuration
//!
//! Settings are read from environment variables with defaults matching the
//! reference Kepler Object-of-Interest workflow. Every knob also has a
//! builder-style setter so tests and embedding code can configure an engine
//! without touching the environment.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::FeatureSelector;

/// Training hyperparameters for the classifier pipeline.
///
/// These four knobs are persisted inside every trained artifact so a stored
/// model always knows what it was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    /// Shrinkage applied to each boosting round
    pub learning_rate: f64,
    /// Maximum number of leaves per tree
    pub max_leaf_nodes: usize,
    /// Minimum samples required in a leaf
    pub min_samples_leaf: usize,
    /// Hold out part of the training data and stop when validation loss
    /// stops improving
    pub early_stopping: bool,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            max_leaf_nodes: 31,
            min_samples_leaf: 20,
            early_stopping: true,
        }
    }
}

impl Hyperparameters {
    /// Read hyperparameters from `LEARNING_RATE`, `MAX_LEAF_NODES`,
    /// `MIN_SAMPLES_LEAF` and `EARLY_STOPPING`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            learning_rate: env_parse("LEARNING_RATE", defaults.learning_rate),
            max_leaf_nodes: env_parse("MAX_LEAF_NODES", defaults.max_leaf_nodes),
            min_samples_leaf: env_parse("MIN_SAMPLES_LEAF", defaults.min_samples_leaf),
            early_stopping: env::var("EARLY_STOPPING")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.early_stopping),
        }
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_max_leaf_nodes(mut self, n: usize) -> Self {
        self.max_leaf_nodes = n;
        self
    }

    pub fn with_min_samples_leaf(mut self, n: usize) -> Self {
        self.min_samples_leaf = n;
        self
    }

    pub fn with_early_stopping(mut self, enabled: bool) -> Self {
        self.early_stopping = enabled;
        self
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory of the model registry
    pub models_dir: PathBuf,
    /// Default dataset location
    pub dataset_path: PathBuf,
    /// Target column holding the class label
    pub target_column: String,
    /// Column identifying the observed star, used for leak-safe splitting
    pub group_column: String,
    /// Fixed class-label ordering used for metrics and the confusion matrix
    pub class_labels: Vec<String>,
    /// Columns that encode or leak the label and must never be features
    pub exclude_columns: Vec<String>,
    /// Numeric columns that are positional rather than predictive
    pub coordinate_columns: Vec<String>,
    /// Label spellings normalized before training
    pub label_renames: Vec<(String, String)>,
    /// Test-set row proportion for the grouped split
    pub test_size: f64,
    /// Seed shared by the splitter and the classifier
    pub seed: u64,
    /// Classifier hyperparameters
    pub hyperparameters: Hyperparameters,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            dataset_path: PathBuf::from("datasets/kepler.csv"),
            target_column: "koi_disposition".to_string(),
            group_column: "kepid".to_string(),
            class_labels: vec![
                "CANDIDATE".to_string(),
                "CONFIRMED".to_string(),
                "FALSE_POSITIVE".to_string(),
            ],
            exclude_columns: vec![
                "koi_pdisposition".to_string(),
                "koi_score".to_string(),
                "koi_tce_delivname".to_string(),
                "kepler_name".to_string(),
                "kepoi_name".to_string(),
            ],
            coordinate_columns: vec!["ra".to_string(), "dec".to_string()],
            label_renames: vec![("FALSE POSITIVE".to_string(), "FALSE_POSITIVE".to_string())],
            test_size: 0.3,
            seed: 42,
            hyperparameters: Hyperparameters::default(),
        }
    }
}

impl Settings {
    /// Build settings from the environment (`MODELS_DIR`, `DATASET_PATH`,
    /// hyperparameter variables), with defaults for everything else.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            models_dir: env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            dataset_path: env::var("DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),
            hyperparameters: Hyperparameters::from_env(),
            ..defaults
        }
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = column.into();
        self
    }

    pub fn with_group_column(mut self, column: impl Into<String>) -> Self {
        self.group_column = column.into();
        self
    }

    pub fn with_class_labels(mut self, labels: Vec<String>) -> Self {
        self.class_labels = labels;
        self
    }

    pub fn with_exclude_columns(mut self, columns: Vec<String>) -> Self {
        self.exclude_columns = columns;
        self
    }

    pub fn with_coordinate_columns(mut self, columns: Vec<String>) -> Self {
        self.coordinate_columns = columns;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_hyperparameters(mut self, hp: Hyperparameters) -> Self {
        self.hyperparameters = hp;
        self
    }

    /// Assemble the feature selector these settings describe.
    pub fn feature_selector(&self) -> FeatureSelector {
        FeatureSelector::new(&self.target_column, &self.group_column)
            .with_exclude_columns(self.exclude_columns.clone())
            .with_coordinate_columns(self.coordinate_columns.clone())
            .with_label_renames(self.label_renames.clone())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
