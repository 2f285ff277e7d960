//! Dataset loading

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{ExoClassError, Result};

/// Loads labeled tabular datasets into a `DataFrame`.
///
/// The NASA exoplanet archive ships CSV files with `#`-prefixed comment
/// headers, so comment skipping is on by default.
pub struct DatasetLoader {
    comment_prefix: Option<String>,
    infer_schema_length: Option<usize>,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            comment_prefix: Some("#".to_string()),
            infer_schema_length: Some(1000),
        }
    }

    /// Override the comment prefix (`None` disables comment skipping).
    pub fn with_comment_prefix(mut self, prefix: Option<String>) -> Self {
        self.comment_prefix = prefix;
        self
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ExoClassError::Data(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mut parse_opts = CsvParseOptions::default();
        if let Some(prefix) = &self.comment_prefix {
            parse_opts = parse_opts.with_comment_prefix(Some(prefix.as_str()));
        }

        let reader = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file);

        let df = reader.finish()?;
        tracing::info!(rows = df.height(), columns = df.width(), "dataset loaded");
        Ok(df)
    }
}
