//! Versioned model registry
//!
//! Durable storage and lookup of trained artifacts, metrics and confusion
//! matrices keyed by (model name, version), plus the mutable "latest"
//! pointer.

mod store;
mod version;

pub use store::ModelRegistry;
pub use version::{next_version, scan_versions, ModelVersion};
