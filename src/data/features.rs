//! Feature selection
//!
//! Derives a numeric, leakage-free feature schema from a raw labeled
//! dataset: the target column and known leak/metadata columns are dropped,
//! only numeric columns are kept, entirely-null columns are removed, and
//! positional columns (sky coordinates, the grouping id) are excluded even
//! though they are numeric.

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ExoClassError, Result};

/// Ordered list of feature columns bound to a trained artifact.
///
/// The schema is frozen at training time. Inference input is reconciled
/// against exactly this column list, with missing columns filled by
/// [`FeatureSchema::FILL_VALUE`] and unknown columns dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    /// Sentinel used for schema columns absent from an inference row.
    pub const FILL_VALUE: f64 = 0.0;

    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column in the schema, if present.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

/// Output of feature selection: the schema plus the series aligned
/// row-for-row with the dataset.
#[derive(Debug, Clone)]
pub struct SelectedFeatures {
    /// Ordered feature columns
    pub schema: FeatureSchema,
    /// Numeric feature matrix; nulls are carried through as NaN so the
    /// imputer can see them
    pub matrix: Array2<f64>,
    /// Normalized class label per row
    pub labels: Vec<String>,
    /// Group identifier per row
    pub groups: Vec<String>,
}

/// Derives the feature schema and aligned label/group series from a raw
/// dataset.
#[derive(Debug, Clone)]
pub struct FeatureSelector {
    target: String,
    group: String,
    exclude_columns: Vec<String>,
    coordinate_columns: Vec<String>,
    label_renames: Vec<(String, String)>,
}

impl FeatureSelector {
    pub fn new(target: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            group: group.into(),
            exclude_columns: Vec::new(),
            coordinate_columns: Vec::new(),
            label_renames: Vec::new(),
        }
    }

    /// Columns that directly encode or leak the label.
    pub fn with_exclude_columns(mut self, columns: Vec<String>) -> Self {
        self.exclude_columns = columns;
        self
    }

    /// Numeric columns that are positional rather than predictive.
    pub fn with_coordinate_columns(mut self, columns: Vec<String>) -> Self {
        self.coordinate_columns = columns;
        self
    }

    /// Label spellings to normalize so class names are stable identifiers.
    pub fn with_label_renames(mut self, renames: Vec<(String, String)>) -> Self {
        self.label_renames = renames;
        self
    }

    /// Select features from a dataset.
    ///
    /// Fails with a schema error when the target or group column is absent.
    pub fn select(&self, df: &DataFrame) -> Result<SelectedFeatures> {
        if df.column(&self.target).is_err() {
            return Err(ExoClassError::Schema {
                column: self.target.clone(),
            });
        }
        if df.column(&self.group).is_err() {
            return Err(ExoClassError::Schema {
                column: self.group.clone(),
            });
        }

        let feature_columns = self.feature_columns(df);
        let matrix = columns_to_matrix(df, &feature_columns)?;
        let labels = self.extract_labels(df)?;
        let groups = column_as_strings(df, &self.group)?;

        tracing::info!(
            features = feature_columns.len(),
            rows = df.height(),
            "feature schema derived"
        );

        Ok(SelectedFeatures {
            schema: FeatureSchema::new(feature_columns),
            matrix,
            labels,
            groups,
        })
    }

    fn feature_columns(&self, df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|col| {
                let name = col.name().as_str();
                if name == self.target
                    || name == self.group
                    || self.exclude_columns.iter().any(|c| c == name)
                    || self.coordinate_columns.iter().any(|c| c == name)
                {
                    return false;
                }
                if !is_numeric_dtype(col.dtype()) {
                    return false;
                }
                // A column with no observed values carries no signal
                col.null_count() < col.len()
            })
            .map(|col| col.name().to_string())
            .collect()
    }

    fn extract_labels(&self, df: &DataFrame) -> Result<Vec<String>> {
        let raw = column_as_strings(df, &self.target)?;
        Ok(raw
            .into_iter()
            .map(|label| {
                self.label_renames
                    .iter()
                    .find(|(from, _)| *from == label)
                    .map(|(_, to)| to.clone())
                    .unwrap_or(label)
            })
            .collect())
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Extract named columns into a row-major matrix, carrying nulls through as
/// NaN so the imputer decides how to fill them.
fn columns_to_matrix(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| ExoClassError::Schema {
                    column: col_name.clone(),
                })?;
            let series_f64 = series
                .cast(&DataType::Float64)
                .map_err(|e| ExoClassError::Data(e.to_string()))?;
            let values: Vec<f64> = series_f64
                .f64()
                .map_err(|e| ExoClassError::Data(e.to_string()))?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_refs[c][r]
    }))
}

fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = df.column(name).map_err(|_| ExoClassError::Schema {
        column: name.to_string(),
    })?;
    let as_str = column
        .cast(&DataType::String)
        .map_err(|e| ExoClassError::Data(e.to_string()))?;
    let ca = as_str
        .str()
        .map_err(|e| ExoClassError::Data(e.to_string()))?;
    Ok(ca
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn koi_selector() -> FeatureSelector {
        FeatureSelector::new("koi_disposition", "kepid")
            .with_exclude_columns(vec!["koi_score".to_string()])
            .with_coordinate_columns(vec!["ra".to_string(), "dec".to_string()])
            .with_label_renames(vec![(
                "FALSE POSITIVE".to_string(),
                "FALSE_POSITIVE".to_string(),
            )])
    }

    fn sample_df() -> DataFrame {
        df!(
            "kepid" => &[100i64, 100, 200, 300],
            "koi_period" => &[Some(3.5), None, Some(12.2), Some(7.7)],
            "koi_depth" => &[120.0, 80.0, 310.0, 95.0],
            "koi_score" => &[0.9, 0.1, 0.5, 0.7],
            "ra" => &[291.1, 291.1, 120.5, 88.2],
            "dec" => &[48.1, 48.1, -12.0, 30.3],
            "kepler_name" => &["Kepler-1b", "", "Kepler-2b", ""],
            "all_null" => &[None::<f64>, None, None, None],
            "koi_disposition" => &["CONFIRMED", "FALSE POSITIVE", "CANDIDATE", "CONFIRMED"]
        )
        .unwrap()
    }

    #[test]
    fn test_select_drops_leak_and_positional_columns() {
        let selected = koi_selector().select(&sample_df()).unwrap();
        let columns = selected.schema.columns();

        assert_eq!(columns, &["koi_period".to_string(), "koi_depth".to_string()]);
        assert_eq!(selected.matrix.nrows(), 4);
        assert_eq!(selected.matrix.ncols(), 2);
    }

    #[test]
    fn test_select_keeps_nulls_as_nan() {
        let selected = koi_selector().select(&sample_df()).unwrap();
        assert!(selected.matrix[[1, 0]].is_nan());
        assert_eq!(selected.matrix[[0, 0]], 3.5);
    }

    #[test]
    fn test_label_normalization() {
        let selected = koi_selector().select(&sample_df()).unwrap();
        assert_eq!(selected.labels[1], "FALSE_POSITIVE");
        assert_eq!(selected.labels[0], "CONFIRMED");
    }

    #[test]
    fn test_groups_aligned_with_rows() {
        let selected = koi_selector().select(&sample_df()).unwrap();
        assert_eq!(selected.groups, vec!["100", "100", "200", "300"]);
    }

    #[test]
    fn test_missing_target_column() {
        let df = df!("kepid" => &[1i64, 2], "x" => &[1.0, 2.0]).unwrap();
        let err = koi_selector().select(&df).unwrap_err();
        assert!(matches!(err, ExoClassError::Schema { column } if column == "koi_disposition"));
    }

    #[test]
    fn test_missing_group_column() {
        let df = df!("koi_disposition" => &["CONFIRMED"], "x" => &[1.0]).unwrap();
        let err = koi_selector().select(&df).unwrap_err();
        assert!(matches!(err, ExoClassError::Schema { column } if column == "kepid"));
    }

    #[test]
    fn test_schema_position() {
        let schema = FeatureSchema::new(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(schema.position("b"), Some(1));
        assert_eq!(schema.position("z"), None);
    }
}
