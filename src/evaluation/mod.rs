//! Model evaluation
//!
//! Computes per-class precision/recall/F1/support, overall accuracy and a
//! confusion matrix against a fixed, explicit label ordering. The ordering
//! is independent of what appears in the test partition, so matrix shape
//! and axis meaning stay stable across retrainings.

use std::collections::HashMap;

use ndarray::Array2;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{ExoClassError, Result};
use crate::pipeline::TrainedArtifact;

/// Precision/recall/F1/support for one class (or one averaging row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: u64,
}

/// Classification report over a fixed label ordering.
///
/// Serializes to the same JSON shape as a scikit-learn
/// `classification_report(output_dict=True)`: one entry per class label,
/// then `"accuracy"`, `"macro avg"` and `"weighted avg"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    classes: Vec<(String, ClassMetrics)>,
    accuracy: f64,
    macro_avg: ClassMetrics,
    weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, m)| m)
    }

    pub fn macro_avg(&self) -> &ClassMetrics {
        &self.macro_avg
    }

    pub fn weighted_avg(&self) -> &ClassMetrics {
        &self.weighted_avg
    }

    /// Labels in report order.
    pub fn labels(&self) -> Vec<&str> {
        self.classes.iter().map(|(l, _)| l.as_str()).collect()
    }
}

impl Serialize for ClassificationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.classes.len() + 3))?;
        for (label, metrics) in &self.classes {
            map.serialize_entry(label, metrics)?;
        }
        map.serialize_entry("accuracy", &self.accuracy)?;
        map.serialize_entry("macro avg", &self.macro_avg)?;
        map.serialize_entry("weighted avg", &self.weighted_avg)?;
        map.end()
    }
}

/// Square confusion matrix indexed by the fixed label ordering.
/// Rows are true labels, columns are predicted labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Array2<u64>,
}

impl ConfusionMatrix {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    /// (rows, cols); always (k, k) for k fixed labels.
    pub fn shape(&self) -> (usize, usize) {
        self.counts.dim()
    }

    /// Count of rows with the given true label predicted as the given
    /// label, if both labels are in the fixed ordering.
    pub fn count(&self, true_label: &str, predicted_label: &str) -> Option<u64> {
        let t = self.labels.iter().position(|l| l == true_label)?;
        let p = self.labels.iter().position(|l| l == predicted_label)?;
        Some(self.counts[[t, p]])
    }
}

/// Evaluator bound to a fixed label ordering.
pub struct Evaluator {
    labels: Vec<String>,
}

impl Evaluator {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Predict on the test partition with the frozen pipeline and compute
    /// metrics plus the confusion matrix.
    pub fn evaluate(
        &self,
        artifact: &TrainedArtifact,
        x_test: &Array2<f64>,
        y_test: &[String],
    ) -> Result<(ClassificationReport, ConfusionMatrix)> {
        if x_test.nrows() != y_test.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("{} labels", x_test.nrows()),
                actual: format!("{} labels", y_test.len()),
            });
        }
        let y_pred = artifact.predict(x_test)?;
        self.from_predictions(y_test, &y_pred)
    }

    /// Compute the report and matrix from already-materialized predictions.
    pub fn from_predictions(
        &self,
        y_true: &[String],
        y_pred: &[String],
    ) -> Result<(ClassificationReport, ConfusionMatrix)> {
        if y_true.is_empty() {
            return Err(ExoClassError::InsufficientData(
                "test partition is empty".to_string(),
            ));
        }
        if y_true.len() != y_pred.len() {
            return Err(ExoClassError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }

        let k = self.labels.len();
        let index: HashMap<&str, usize> = self
            .labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let mut counts = Array2::<u64>::zeros((k, k));
        let mut correct = 0usize;
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            if t == p {
                correct += 1;
            }
            if let (Some(&ti), Some(&pi)) = (index.get(t.as_str()), index.get(p.as_str())) {
                counts[[ti, pi]] += 1;
            }
        }
        let accuracy = correct as f64 / y_true.len() as f64;

        let mut classes = Vec::with_capacity(k);
        for (i, label) in self.labels.iter().enumerate() {
            let tp = counts[[i, i]] as f64;
            let row_sum: u64 = counts.row(i).sum();
            let col_sum: u64 = counts.column(i).sum();

            let precision = if col_sum > 0 { tp / col_sum as f64 } else { 0.0 };
            let recall = if row_sum > 0 { tp / row_sum as f64 } else { 0.0 };
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            classes.push((
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support: row_sum,
                },
            ));
        }

        let total_support: u64 = classes.iter().map(|(_, m)| m.support).sum();
        let macro_avg = ClassMetrics {
            precision: classes.iter().map(|(_, m)| m.precision).sum::<f64>() / k as f64,
            recall: classes.iter().map(|(_, m)| m.recall).sum::<f64>() / k as f64,
            f1_score: classes.iter().map(|(_, m)| m.f1_score).sum::<f64>() / k as f64,
            support: total_support,
        };
        let weighted_avg = if total_support > 0 {
            let w = |f: fn(&ClassMetrics) -> f64| {
                classes
                    .iter()
                    .map(|(_, m)| f(m) * m.support as f64)
                    .sum::<f64>()
                    / total_support as f64
            };
            ClassMetrics {
                precision: w(|m| m.precision),
                recall: w(|m| m.recall),
                f1_score: w(|m| m.f1_score),
                support: total_support,
            }
        } else {
            macro_avg.clone()
        };

        let report = ClassificationReport {
            classes,
            accuracy,
            macro_avg,
            weighted_avg,
        };
        let matrix = ConfusionMatrix {
            labels: self.labels.clone(),
            counts,
        };
        Ok((report, matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec![
            "CANDIDATE".to_string(),
            "CONFIRMED".to_string(),
            "FALSE_POSITIVE".to_string(),
        ]
    }

    fn to_strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_perfect_predictions() {
        let evaluator = Evaluator::new(labels());
        let y = to_strings(&["CANDIDATE", "CONFIRMED", "FALSE_POSITIVE", "CONFIRMED"]);
        let (report, matrix) = evaluator.from_predictions(&y, &y).unwrap();

        assert_eq!(report.accuracy(), 1.0);
        assert_eq!(report.class("CONFIRMED").unwrap().support, 2);
        assert_eq!(matrix.count("CONFIRMED", "CONFIRMED"), Some(2));
        assert_eq!(matrix.count("CANDIDATE", "CONFIRMED"), Some(0));
    }

    #[test]
    fn test_matrix_shape_stable_with_absent_class() {
        let evaluator = Evaluator::new(labels());
        // FALSE_POSITIVE never appears, shape must still be 3x3
        let y_true = to_strings(&["CANDIDATE", "CONFIRMED"]);
        let y_pred = to_strings(&["CANDIDATE", "CANDIDATE"]);
        let (report, matrix) = evaluator.from_predictions(&y_true, &y_pred).unwrap();

        assert_eq!(matrix.shape(), (3, 3));
        assert_eq!(report.class("FALSE_POSITIVE").unwrap().support, 0);
        assert_eq!(report.class("FALSE_POSITIVE").unwrap().recall, 0.0);
    }

    #[test]
    fn test_precision_recall_known_case() {
        let evaluator = Evaluator::new(labels());
        let y_true = to_strings(&["CANDIDATE", "CANDIDATE", "CONFIRMED", "CONFIRMED"]);
        let y_pred = to_strings(&["CANDIDATE", "CONFIRMED", "CONFIRMED", "CONFIRMED"]);
        let (report, matrix) = evaluator.from_predictions(&y_true, &y_pred).unwrap();

        assert_eq!(report.accuracy(), 0.75);
        let candidate = report.class("CANDIDATE").unwrap();
        assert!((candidate.precision - 1.0).abs() < 1e-12);
        assert!((candidate.recall - 0.5).abs() < 1e-12);
        let confirmed = report.class("CONFIRMED").unwrap();
        assert!((confirmed.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(matrix.count("CANDIDATE", "CONFIRMED"), Some(1));
    }

    #[test]
    fn test_report_json_shape() {
        let evaluator = Evaluator::new(labels());
        let y = to_strings(&["CANDIDATE", "CONFIRMED", "FALSE_POSITIVE"]);
        let (report, _) = evaluator.from_predictions(&y, &y).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("accuracy").unwrap().is_number());
        assert!(json.get("macro avg").is_some());
        assert!(json.get("weighted avg").is_some());
        let confirmed = json.get("CONFIRMED").unwrap();
        assert!(confirmed.get("precision").is_some());
        assert!(confirmed.get("f1-score").is_some());
        assert!(confirmed.get("support").is_some());
    }

    #[test]
    fn test_empty_test_partition() {
        let evaluator = Evaluator::new(labels());
        let err = evaluator.from_predictions(&[], &[]).unwrap_err();
        assert!(matches!(err, ExoClassError::InsufficientData(_)));
    }

    #[test]
    fn test_matrix_bincode_round_trip() {
        let evaluator = Evaluator::new(labels());
        let y_true = to_strings(&["CANDIDATE", "CONFIRMED", "CONFIRMED"]);
        let y_pred = to_strings(&["CONFIRMED", "CONFIRMED", "CANDIDATE"]);
        let (_, matrix) = evaluator.from_predictions(&y_true, &y_pred).unwrap();

        let bytes = bincode::serialize(&matrix).unwrap();
        let restored: ConfusionMatrix = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, matrix);
    }
}
