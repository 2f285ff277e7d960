//! Semantic versioning of trained artifacts
//!
//! Versions are directories named `v<major>.<minor>.<patch>`. Ordering is
//! always by the parsed integer tuple; directory names are never compared
//! as strings, so `v1.10.0` orders after `v1.2.0`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ExoClassError, Result};

/// Semantic version of one trained artifact.
///
/// Field order gives the derived `Ord` the (major, minor, patch) tuple
/// comparison the registry relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from `v1.2.3` (the directory form) or bare `1.2.3`.
    pub fn parse(s: &str) -> Result<Self> {
        let digits = s.strip_prefix('v').unwrap_or(s);
        let parts: Vec<&str> = digits.split('.').collect();
        if parts.len() != 3 {
            return Err(ExoClassError::InvalidVersion(s.to_string()));
        }

        let component = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| ExoClassError::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }

    /// Bump patch: each successful training run gets one.
    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch + 1)
    }

    /// Bump minor: reserved for manual promotion.
    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Bump major: reserved for manual promotion.
    pub fn bump_major(&self) -> Self {
        Self::new(self.major + 1, 0, 0)
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Default for ModelVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

/// All version directories under a model directory, ascending.
///
/// Entries that are not directories or do not parse as versions (the
/// `latest` marker file among them) are ignored.
pub fn scan_versions(model_dir: &Path) -> Result<Vec<ModelVersion>> {
    if !model_dir.exists() {
        return Ok(Vec::new());
    }

    let mut versions: Vec<ModelVersion> = fs::read_dir(model_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with('v')
                .then(|| ModelVersion::parse(&name).ok())
                .flatten()
        })
        .collect();
    versions.sort();
    Ok(versions)
}

/// The version the next save should use: `v1.0.0` when the model has no
/// versions yet, otherwise the numerically greatest with the patch bumped.
pub fn next_version(model_dir: &Path) -> Result<ModelVersion> {
    let versions = scan_versions(model_dir)?;
    Ok(match versions.last() {
        Some(latest) => latest.bump_patch(),
        None => ModelVersion::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        assert_eq!(ModelVersion::parse("v1.2.3").unwrap(), ModelVersion::new(1, 2, 3));
        assert_eq!(ModelVersion::parse("1.2.3").unwrap(), ModelVersion::new(1, 2, 3));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ModelVersion::parse("v1.2").is_err());
        assert!(ModelVersion::parse("v1.2.x").is_err());
        assert!(ModelVersion::parse("latest").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let v = ModelVersion::new(2, 0, 7);
        assert_eq!(v.to_string(), "v2.0.7");
        assert_eq!(ModelVersion::parse(&v.to_string()).unwrap(), v);
    }

    #[test]
    fn test_numeric_not_lexicographic_ordering() {
        let v_1_10_0 = ModelVersion::parse("v1.10.0").unwrap();
        let v_1_2_0 = ModelVersion::parse("v1.2.0").unwrap();
        assert!(v_1_10_0 > v_1_2_0);
    }

    #[test]
    fn test_bumping() {
        let v = ModelVersion::new(1, 2, 3);
        assert_eq!(v.bump_patch().to_string(), "v1.2.4");
        assert_eq!(v.bump_minor().to_string(), "v1.3.0");
        assert_eq!(v.bump_major().to_string(), "v2.0.0");
    }

    #[test]
    fn test_next_version_from_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join("koi_classifier");

        assert_eq!(next_version(&model_dir).unwrap(), ModelVersion::new(1, 0, 0));

        for v in ["v1.0.0", "v1.0.1", "v1.2.0"] {
            std::fs::create_dir_all(model_dir.join(v)).unwrap();
        }
        assert_eq!(next_version(&model_dir).unwrap(), ModelVersion::new(1, 2, 1));
    }

    #[test]
    fn test_scan_ignores_marker_and_noise() {
        let tmp = tempfile::tempdir().unwrap();
        let model_dir = tmp.path().join("m");
        std::fs::create_dir_all(model_dir.join("v1.0.0")).unwrap();
        std::fs::create_dir_all(model_dir.join("not-a-version")).unwrap();
        std::fs::write(model_dir.join("latest"), "v1.0.0").unwrap();

        let versions = scan_versions(&model_dir).unwrap();
        assert_eq!(versions, vec![ModelVersion::new(1, 0, 0)]);
    }
}
