//! Command-line interface
//!
//! Thin adapter over the library: argument parsing and output formatting
//! only, no lifecycle logic of its own.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::data::DatasetLoader;
use crate::error::Result;
use crate::inference::{Predictor, ReconcilePolicy};
use crate::pipeline::TrainingSession;
use crate::registry::ModelRegistry;

#[derive(Parser)]
#[command(name = "exoclass", about = "Exoplanet disposition model lifecycle engine", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a labeled dataset and register a new version
    Train {
        /// Dataset CSV (defaults to the configured dataset path)
        #[arg(long)]
        data: Option<PathBuf>,
        /// Model name in the registry
        #[arg(long, default_value = "koi_classifier")]
        model: String,
    },
    /// Predict dispositions for rows in a JSON file
    Predict {
        /// Model name in the registry
        #[arg(long)]
        model: String,
        /// Version to use, e.g. v1.0.2
        #[arg(long, default_value = "latest")]
        version: String,
        /// JSON file containing an array of column-to-value objects
        #[arg(long)]
        input: PathBuf,
        /// Output per-class probabilities instead of labels
        #[arg(long)]
        proba: bool,
        /// Reject rows that omit schema columns instead of defaulting them
        #[arg(long)]
        strict: bool,
    },
    /// List registered model names
    Models,
    /// List versions of a model
    Versions {
        #[arg(long)]
        model: String,
    },
}

pub fn cmd_train(settings: &Settings, data: Option<&PathBuf>, model: &str) -> Result<()> {
    let path = data.unwrap_or(&settings.dataset_path);
    let df = DatasetLoader::new().load_csv(path)?;

    let registry = ModelRegistry::open(&settings.models_dir)?;
    let session = TrainingSession::new(settings.clone());
    let outcome = session.run(&df, &registry, model)?;

    println!("model:    {}", model);
    println!("version:  {}", outcome.version);
    println!(
        "split:    {} train rows / {} test rows",
        outcome.n_train_rows, outcome.n_test_rows
    );
    println!("accuracy: {:.3}", outcome.report.accuracy());
    println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    Ok(())
}

pub fn cmd_predict(
    settings: &Settings,
    model: &str,
    version: &str,
    input: &PathBuf,
    proba: bool,
    strict: bool,
) -> Result<()> {
    let registry = ModelRegistry::open(&settings.models_dir)?;
    let resolved = registry.resolve(model, version)?;
    let artifact = registry.load(model, &resolved)?;

    let policy = if strict {
        ReconcilePolicy::Strict
    } else {
        ReconcilePolicy::Lenient
    };
    let predictor = Predictor::new(artifact).with_policy(policy);

    let rows: Vec<HashMap<String, f64>> = serde_json::from_str(&fs::read_to_string(input)?)?;

    if proba {
        let probabilities = predictor.predict_proba(&rows)?;
        println!("{}", serde_json::to_string_pretty(&probabilities)?);
    } else {
        let predictions = predictor.predict(&rows)?;
        println!("{}", serde_json::to_string_pretty(&predictions)?);
    }
    Ok(())
}

pub fn cmd_models(settings: &Settings) -> Result<()> {
    let registry = ModelRegistry::open(&settings.models_dir)?;
    for model in registry.list_models()? {
        println!("{}", model);
    }
    Ok(())
}

pub fn cmd_versions(settings: &Settings, model: &str) -> Result<()> {
    let registry = ModelRegistry::open(&settings.models_dir)?;
    for version in registry.list_versions(model)? {
        println!("{}", version);
    }
    Ok(())
}
