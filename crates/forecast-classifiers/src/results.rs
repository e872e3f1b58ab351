//! Persistence of experiment results and feature tables.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierType, DatasetType, FsMethod, Sampling, SamplingTiming};
use crate::metrics::{self, ClassReport, RocCurve};
use crate::model_selection::CvResults;

/// Performance of one configuration on its held-out test set.
///
/// Class 0 is reported as "positive" and class 1 as "negative"; `fpr`/`tpr`
/// is the ROC of class 0 and `fnr`/`tnr` the ROC of class 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResults {
    pub fs: FsMethod,
    pub classifier: ClassifierType,
    pub sampling: Sampling,
    pub sampling_timing: SamplingTiming,
    pub dataset_type: DatasetType,
    pub sub_type: Option<String>,
    pub timestamp: String,
    pub cv_results: Option<CvResults>,
    pub best_param: f64,
    pub cv_score: f64,
    pub train_score: f64,
    pub y_prob: Vec<[f64; 2]>,
    pub accuracy: f64,
    pub confusion_matrix: [[usize; 2]; 2],
    pub pos_precision: f64,
    pub neg_precision: f64,
    pub pos_recall: f64,
    pub neg_recall: f64,
    pub pos_f1: f64,
    pub neg_f1: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub pos_auc: f64,
    pub fnr: Vec<f64>,
    pub tnr: Vec<f64>,
    pub neg_auc: f64,
}

/// Configuration keys of an experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentKey {
    pub fs: FsMethod,
    pub classifier: ClassifierType,
    pub sampling: Sampling,
    pub sampling_timing: SamplingTiming,
    pub dataset_type: DatasetType,
    pub sub_type: Option<String>,
}

/// Test-set scores computed from labels, predictions and probabilities.
#[derive(Debug, Clone)]
pub struct TestMetrics {
    pub accuracy: f64,
    pub confusion_matrix: [[usize; 2]; 2],
    pub report: ClassReport,
    pub pos_roc: RocCurve,
    pub pos_auc: f64,
    pub neg_roc: RocCurve,
    pub neg_auc: f64,
}

impl TestMetrics {
    pub fn compute(y_true: &[usize], y_pred: &[usize], y_prob: &Array2<f64>) -> crate::error::Result<Self> {
        let accuracy = metrics::accuracy(y_true, y_pred)?;
        let confusion_matrix = metrics::confusion_matrix(y_true, y_pred)?;
        let report = metrics::precision_recall_fscore_support(y_true, y_pred)?;
        let p0: Vec<f64> = y_prob.column(0).to_vec();
        let p1: Vec<f64> = y_prob.column(1).to_vec();
        let pos_roc = metrics::roc_curve(y_true, &p0, 0)?;
        let pos_auc = metrics::auc(&pos_roc.fpr, &pos_roc.tpr)?;
        let neg_roc = metrics::roc_curve(y_true, &p1, 1)?;
        let neg_auc = metrics::auc(&neg_roc.fpr, &neg_roc.tpr)?;
        Ok(TestMetrics {
            accuracy,
            confusion_matrix,
            report,
            pos_roc,
            pos_auc,
            neg_roc,
            neg_auc,
        })
    }
}

impl ExperimentResults {
    pub fn new(
        key: ExperimentKey,
        cv_results: Option<CvResults>,
        best_param: f64,
        cv_score: f64,
        train_score: f64,
        y_prob: &Array2<f64>,
        test: TestMetrics,
    ) -> Self {
        let (precision, recall, f1) = test.report.weighted();
        ExperimentResults {
            fs: key.fs,
            classifier: key.classifier,
            sampling: key.sampling,
            sampling_timing: key.sampling_timing,
            dataset_type: key.dataset_type,
            sub_type: key.sub_type,
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            cv_results,
            best_param,
            cv_score,
            train_score,
            y_prob: y_prob.rows().into_iter().map(|r| [r[0], r[1]]).collect(),
            accuracy: test.accuracy,
            confusion_matrix: test.confusion_matrix,
            pos_precision: test.report.precision[0],
            neg_precision: test.report.precision[1],
            pos_recall: test.report.recall[0],
            neg_recall: test.report.recall[1],
            pos_f1: test.report.f1[0],
            neg_f1: test.report.f1[1],
            precision,
            recall,
            f1,
            // +inf thresholds are not kept, JSON has no infinity
            fpr: test.pos_roc.fpr,
            tpr: test.pos_roc.tpr,
            pos_auc: test.pos_auc,
            fnr: test.neg_roc.fpr,
            tnr: test.neg_roc.tpr,
            neg_auc: test.neg_auc,
        }
    }

    pub fn file_name(classifier: ClassifierType) -> String {
        format!("{}_results.json", classifier.as_str())
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_json(self, path)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_json(path)
    }

    /// Row of `resumed_results.csv`.
    pub fn resumed_row(&self, data: &str) -> Vec<String> {
        let fmt = |v: f64| format!("{}", v);
        vec![
            self.sampling.as_str().to_string(),
            format!("{}: {}", self.fs.family(), self.fs),
            self.classifier.as_str().to_string(),
            data.to_string(),
            fmt(self.f1),
            fmt(self.neg_auc),
            fmt(self.precision),
            fmt(self.recall),
            fmt(self.accuracy),
            fmt(self.cv_score),
            fmt(self.neg_precision),
            fmt(self.neg_recall),
            fmt(self.neg_f1),
            fmt(self.pos_precision),
            fmt(self.pos_recall),
            fmt(self.pos_f1),
        ]
    }
}

pub const RESUMED_HEADER: [&str; 16] = [
    "sampling",
    "fs",
    "classifier",
    "data",
    "f1",
    "auc",
    "precision",
    "recall",
    "accuracy",
    "cv f1",
    "precision (1)",
    "recall (1)",
    "f1 (1)",
    "precision (0)",
    "recall (0)",
    "f1 (0)",
];

pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let file = File::create(&path).with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))
}

pub fn load_json<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> Result<T> {
    let file = File::open(&path).with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse JSON in {}", path.as_ref().display()))
}

/// Write a `names, <columns...>` table, one row per feature.
pub fn write_feature_table<P: AsRef<Path>>(
    path: P,
    names: &[String],
    columns: &[(&str, Vec<f64>)],
) -> Result<()> {
    for (header, values) in columns {
        if values.len() != names.len() {
            bail!(
                "column '{}' has {} values for {} features",
                header,
                values.len(),
                names.len()
            );
        }
    }
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
    let mut header = vec!["names".to_string()];
    header.extend(columns.iter().map(|(h, _)| h.to_string()));
    writer.write_record(&header)?;
    for (i, name) in names.iter().enumerate() {
        let mut record = vec![name.clone()];
        record.extend(columns.iter().map(|(_, values)| format!("{}", values[i])));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-feature statistics over stability experiments.
///
/// `selected` and `weights` hold one column per experiment. The scaled
/// column min-max scales every weight by the global min and max of the
/// matrix before averaging; a constant matrix scales to 0.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSummary {
    pub stability: Vec<f64>,
    pub mean: Option<Vec<f64>>,
    pub abs_mean: Option<Vec<f64>>,
    pub scaled: Option<Vec<f64>>,
}

impl FeatureSummary {
    pub fn compute(selected: &Array2<f64>, weights: Option<&Array2<f64>>) -> Self {
        let stability = selected.rows().into_iter().map(|r| r.sum()).collect();
        let (mean, abs_mean, scaled) = match weights {
            Some(w) if w.ncols() > 0 => {
                let min = w.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = w.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                let n = w.ncols() as f64;
                let mean = w.rows().into_iter().map(|r| r.sum() / n).collect();
                let abs_mean = w.rows().into_iter().map(|r| r.iter().map(|v| v.abs()).sum::<f64>() / n).collect();
                let scaled = w
                    .rows()
                    .into_iter()
                    .map(|r| {
                        if range > 0.0 {
                            r.iter().map(|v| (v - min) / range).sum::<f64>() / n
                        } else {
                            0.0
                        }
                    })
                    .collect();
                (Some(mean), Some(abs_mean), Some(scaled))
            }
            _ => (None, None, None),
        };
        FeatureSummary {
            stability,
            mean,
            abs_mean,
            scaled,
        }
    }

    /// Write `general_features_info.csv`; `kind` names the weight columns
    /// (`coefficients` or `importances`).
    pub fn write_csv<P: AsRef<Path>>(&self, path: P, names: &[String], kind: &str) -> Result<()> {
        let mut columns = vec![("stability", self.stability.clone())];
        let mean_name = format!("{}_mean", kind);
        let abs_name = format!("abs_{}_mean", kind);
        let scaled_name = format!("scaled_{}", kind);
        if let (Some(mean), Some(abs_mean), Some(scaled)) = (&self.mean, &self.abs_mean, &self.scaled) {
            columns.push((mean_name.as_str(), mean.clone()));
            columns.push((abs_name.as_str(), abs_mean.clone()));
            columns.push((scaled_name.as_str(), scaled.clone()));
        }
        write_feature_table(path, names, &columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn feature_table_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coefficients_features_info.csv");
        let names = vec!["rs1".to_string(), "rs2".to_string()];
        write_feature_table(&path, &names, &[("linear SVM coefficients", vec![0.5, 0.0])]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "names,linear SVM coefficients\nrs1,0.5\nrs2,0\n");
    }

    #[test]
    fn feature_table_rejects_short_columns() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        assert!(write_feature_table(dir.path().join("t.csv"), &names, &[("x", vec![1.0])]).is_err());
    }

    #[test]
    fn summary_statistics() {
        let selected = array![[1.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let weights = array![[2.0, -2.0, 0.0], [0.0, 0.0, 4.0]];
        let s = FeatureSummary::compute(&selected, Some(&weights));
        assert_eq!(s.stability, vec![2.0, 0.0]);
        assert_eq!(s.mean.as_ref().unwrap(), &vec![0.0, 4.0 / 3.0]);
        assert_eq!(s.abs_mean.as_ref().unwrap(), &vec![4.0 / 3.0, 4.0 / 3.0]);
        // min -2, max 4
        let scaled = s.scaled.unwrap();
        assert!((scaled[0] - (4.0 / 6.0 + 0.0 + 2.0 / 6.0) / 3.0).abs() < 1e-12);

        let knn = FeatureSummary::compute(&selected, None);
        assert!(knn.mean.is_none());
    }

    #[test]
    fn results_round_trip_and_resumed_row() {
        let y = vec![0, 0, 1, 1];
        let y_pred = vec![0, 1, 1, 1];
        let y_prob = array![[0.9, 0.1], [0.4, 0.6], [0.2, 0.8], [0.3, 0.7]];
        let test = TestMetrics::compute(&y, &y_pred, &y_prob).unwrap();
        let key = ExperimentKey {
            fs: FsMethod::Relieff,
            classifier: ClassifierType::Knn,
            sampling: Sampling::Raw,
            sampling_timing: SamplingTiming::BeforeFs,
            dataset_type: DatasetType::Genomic,
            sub_type: None,
        };
        let results = ExperimentResults::new(key, None, 5.0, 0.8, 0.9, &y_prob, test);
        assert_eq!(results.confusion_matrix, [[1, 1], [0, 2]]);
        assert!((results.pos_auc - 1.0).abs() < 1e-12);
        assert!((results.neg_auc - 1.0).abs() < 1e-12);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ExperimentResults::file_name(ClassifierType::Knn));
        results.save_json(&path).unwrap();
        let loaded = ExperimentResults::load_json(&path).unwrap();
        assert_eq!(loaded.confusion_matrix, results.confusion_matrix);
        assert_eq!(loaded.fs, FsMethod::Relieff);

        let row = loaded.resumed_row("genomic");
        assert_eq!(row.len(), RESUMED_HEADER.len());
        assert_eq!(&row[..4], &["raw", "wrapper: relieff", "knn", "genomic"]);
        assert_eq!(row[9], "0.8");
    }
}
