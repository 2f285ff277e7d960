//! On-disk model registry
//!
//! Layout, which downstream tooling depends on:
//!
//! ```text
//! models/<model_name>/<version>/model.bin
//! models/<model_name>/<version>/metrics/classification_report.json
//! models/<model_name>/<version>/matrix/confusion_matrix.bin
//! models/<model_name>/latest        (marker file naming the version)
//! ```
//!
//! A save writes all version-scoped files first and repoints `latest` last,
//! so a crash mid-save leaves the previous pointer valid and the incomplete
//! version merely orphaned.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ExoClassError, Result};
use crate::evaluation::{ClassificationReport, ConfusionMatrix};
use crate::pipeline::TrainedArtifact;

use super::version::{next_version, scan_versions, ModelVersion};

const MODEL_FILE: &str = "model.bin";
const METRICS_DIR: &str = "metrics";
const METRICS_FILE: &str = "classification_report.json";
const MATRIX_DIR: &str = "matrix";
const MATRIX_FILE: &str = "confusion_matrix.bin";
const LATEST_MARKER: &str = "latest";

/// File-system backed registry of versioned trained artifacts.
///
/// Reads may run concurrently; a `save` for one model name must be
/// serialized against other saves for the same name (single-writer
/// discipline).
pub struct ModelRegistry {
    root: PathBuf,
}

impl ModelRegistry {
    /// Create or open a registry rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, model_name: &str) -> PathBuf {
        self.root.join(model_name)
    }

    fn version_dir(&self, model_name: &str, version: &ModelVersion) -> PathBuf {
        self.model_dir(model_name).join(version.to_string())
    }

    /// Persist one training outcome under a freshly allocated version and
    /// repoint `latest` to it.
    pub fn save(
        &self,
        model_name: &str,
        artifact: &TrainedArtifact,
        report: &ClassificationReport,
        matrix: &ConfusionMatrix,
    ) -> Result<ModelVersion> {
        let model_dir = self.model_dir(model_name);
        fs::create_dir_all(&model_dir)?;

        let version = next_version(&model_dir)?;
        let version_dir = self.version_dir(model_name, &version);
        if version_dir.exists() {
            return Err(ExoClassError::VersionConflict {
                model: model_name.to_string(),
                version: version.to_string(),
            });
        }

        let metrics_dir = version_dir.join(METRICS_DIR);
        let matrix_dir = version_dir.join(MATRIX_DIR);
        fs::create_dir_all(&metrics_dir)?;
        fs::create_dir_all(&matrix_dir)?;

        fs::write(version_dir.join(MODEL_FILE), bincode::serialize(artifact)?)?;
        fs::write(
            metrics_dir.join(METRICS_FILE),
            serde_json::to_vec_pretty(report)?,
        )?;
        fs::write(matrix_dir.join(MATRIX_FILE), bincode::serialize(matrix)?)?;

        // Version files are complete; only now move the pointer
        self.write_latest(&model_dir, &version)?;

        tracing::info!(model = model_name, version = %version, "artifact saved");
        Ok(version)
    }

    /// Resolve a version specifier to a concrete version.
    ///
    /// `"latest"` goes through the marker file when it is present and
    /// points at an existing version; otherwise the greatest existing
    /// version is used. Explicit specifiers must name an existing version
    /// directory.
    pub fn resolve(&self, model_name: &str, version_spec: &str) -> Result<ModelVersion> {
        let model_dir = self.model_dir(model_name);

        if version_spec == LATEST_MARKER {
            if let Some(version) = self.read_latest(&model_dir) {
                if self.version_dir(model_name, &version).is_dir() {
                    return Ok(version);
                }
                tracing::warn!(
                    model = model_name,
                    version = %version,
                    "latest marker points at a missing version, falling back to scan"
                );
            }
            return scan_versions(&model_dir)?.last().copied().ok_or_else(|| {
                ExoClassError::NotFound(format!("model `{}` has no versions", model_name))
            });
        }

        let version = ModelVersion::parse(version_spec)?;
        if self.version_dir(model_name, &version).is_dir() {
            Ok(version)
        } else {
            Err(ExoClassError::NotFound(format!(
                "model `{}` has no version {}",
                model_name, version
            )))
        }
    }

    /// Load the trained artifact (with its bound feature schema) for a
    /// concrete version.
    pub fn load(&self, model_name: &str, version: &ModelVersion) -> Result<TrainedArtifact> {
        let path = self.version_dir(model_name, version).join(MODEL_FILE);
        if !path.exists() {
            return Err(ExoClassError::NotFound(format!(
                "artifact for `{}` {} is missing at {}",
                model_name,
                version,
                path.display()
            )));
        }
        let bytes = fs::read(&path)?;
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Model names that have at least one version.
    pub fn list_models(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut models: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                let has_versions = scan_versions(&entry.path())
                    .map(|v| !v.is_empty())
                    .unwrap_or(false);
                has_versions.then_some(name)
            })
            .collect();
        models.sort();
        Ok(models)
    }

    /// Versions of a model, ascending. Empty when the model is unknown.
    pub fn list_versions(&self, model_name: &str) -> Result<Vec<ModelVersion>> {
        scan_versions(&self.model_dir(model_name))
    }

    fn read_latest(&self, model_dir: &Path) -> Option<ModelVersion> {
        let content = fs::read_to_string(model_dir.join(LATEST_MARKER)).ok()?;
        ModelVersion::parse(content.trim()).ok()
    }

    /// Write the marker through a temp file and rename so readers never see
    /// a partially written pointer.
    fn write_latest(&self, model_dir: &Path, version: &ModelVersion) -> Result<()> {
        let tmp = model_dir.join(".latest.tmp");
        fs::write(&tmp, version.to_string())?;
        fs::rename(&tmp, model_dir.join(LATEST_MARKER))?;
        Ok(())
    }
}
