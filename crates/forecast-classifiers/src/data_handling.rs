//! Loading of the experiment CSV files.
//!
//! Every dataset file has a header row followed by one row per subject. The
//! first column holds the binary class label (0 = positive, 1 = negative as
//! produced by the cohort export), the remaining columns are features.
//! Missing cells are read as NaN and left for the imputer.
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{Array2, Axis};

use crate::config::{DatasetType, Sampling};

const MISSING_TOKENS: [&str; 6] = ["", "na", "nan", "?", "null", "none"];

/// Feature matrix, labels and feature names of one CSV file.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Vec<usize>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn new(x: Array2<f64>, y: Vec<usize>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            bail!("{} feature rows but {} labels", x.nrows(), y.len());
        }
        if x.ncols() != feature_names.len() {
            bail!("{} feature columns but {} feature names", x.ncols(), feature_names.len());
        }
        Ok(Dataset { x, y, feature_names })
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Number of samples in class 0 and class 1.
    pub fn class_counts(&self) -> [usize; 2] {
        class_counts(&self.y)
    }

    pub fn select_rows(&self, indices: &[usize]) -> Dataset {
        Dataset {
            x: self.x.select(Axis(0), indices),
            y: indices.iter().map(|&i| self.y[i]).collect(),
            feature_names: self.feature_names.clone(),
        }
    }

    pub fn log_summary(&self, what: &str) {
        let [pos, neg] = self.class_counts();
        let missing = self.x.iter().filter(|v| v.is_nan()).count();
        log::info!(
            "{}: {} samples x {} features ({} class 0 / {} class 1, {} missing cells)",
            what,
            self.n_samples(),
            self.n_features(),
            pos,
            neg,
            missing
        );
    }
}

pub fn class_counts(y: &[usize]) -> [usize; 2] {
    let ones = y.iter().filter(|&&l| l == 1).count();
    [y.len() - ones, ones]
}

fn parse_cell(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if MISSING_TOKENS.contains(&trimmed.to_lowercase().as_str()) {
        return Some(f64::NAN);
    }
    trimmed.parse::<f64>().ok()
}

fn parse_label(value: &str) -> Option<usize> {
    let v = value.trim().parse::<f64>().ok()?;
    if v == 0.0 {
        Some(0)
    } else if v == 1.0 {
        Some(1)
    } else {
        None
    }
}

/// Read the feature names (header without the label column).
pub fn read_feature_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open dataset: {}", path.as_ref().display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.as_ref().display()))?;
    if headers.len() < 2 {
        bail!(
            "Dataset {} needs a label column and at least one feature column",
            path.as_ref().display()
        );
    }
    Ok(headers.iter().skip(1).map(|h| h.trim().to_string()).collect())
}

/// Load a dataset CSV: label in column 0, features in the remaining columns.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let feature_names = read_feature_names(&path)?;
    let n_features = feature_names.len();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(&path)
        .with_context(|| format!("Failed to open dataset: {}", path.as_ref().display()))?;

    let mut values = Vec::new();
    let mut labels = Vec::new();

    for (row_idx, record) in reader.records().enumerate() {
        // 1-based, header is line 1
        let line = row_idx + 2;
        let record = record.with_context(|| format!("Failed to read line {}", line))?;
        if record.len() != n_features + 1 {
            bail!(
                "{}: line {} has {} cells, expected {}",
                path.as_ref().display(),
                line,
                record.len(),
                n_features + 1
            );
        }

        let raw_label = record.get(0).unwrap_or_default();
        let label = parse_label(raw_label).ok_or_else(|| {
            anyhow!(
                "{}: invalid label '{}' at line {} (expected 0 or 1)",
                path.as_ref().display(),
                raw_label,
                line
            )
        })?;
        labels.push(label);

        for (col, cell) in record.iter().skip(1).enumerate() {
            let value = parse_cell(cell).ok_or_else(|| {
                anyhow!(
                    "{}: invalid value '{}' for feature '{}' at line {}",
                    path.as_ref().display(),
                    cell,
                    feature_names[col],
                    line
                )
            })?;
            values.push(value);
        }
    }

    if labels.is_empty() {
        bail!("Dataset {} has no rows", path.as_ref().display());
    }

    let x = Array2::from_shape_vec((labels.len(), n_features), values)
        .context("Failed to assemble feature matrix")?;

    Dataset::new(x, labels, feature_names)
}

/// Locations of the input CSV files for one dataset configuration.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    dir: PathBuf,
}

impl DatasetPaths {
    /// `<data_root>/<dataset_type>/<sub_type or sampling>/`
    pub fn new<P: AsRef<Path>>(
        data_root: P,
        dataset_type: DatasetType,
        sampling: Sampling,
        sub_type: Option<&str>,
    ) -> Self {
        let leaf = sub_type.unwrap_or_else(|| sampling.as_str());
        DatasetPaths {
            dir: data_root.as_ref().join(dataset_type.as_str()).join(leaf),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn raw_train(&self) -> PathBuf {
        self.dir.join("raw_train.csv")
    }

    pub fn raw_test(&self) -> PathBuf {
        self.dir.join("raw_test.csv")
    }

    pub fn experiment_train(&self, i: usize) -> PathBuf {
        self.dir.join(format!("experiment_{}_train.csv", i))
    }

    pub fn experiment_test(&self, i: usize) -> PathBuf {
        self.dir.join(format!("experiment_{}_test.csv", i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_label_and_features() {
        let file = write_csv("label,rs1,rs2\n0,1.5,2\n1,NA,3\n1.0,0,\n");
        let ds = load_dataset(file.path()).unwrap();
        assert_eq!(ds.feature_names, vec!["rs1", "rs2"]);
        assert_eq!(ds.y, vec![0, 1, 1]);
        assert_eq!(ds.x.dim(), (3, 2));
        assert_eq!(ds.x[(0, 0)], 1.5);
        assert!(ds.x[(1, 0)].is_nan());
        assert!(ds.x[(2, 1)].is_nan());
        assert_eq!(ds.class_counts(), [1, 2]);
    }

    #[test]
    fn rejects_non_binary_label() {
        let file = write_csv("label,a\n2,1.0\n");
        let err = load_dataset(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid label"));
    }

    #[test]
    fn rejects_ragged_rows() {
        let file = write_csv("label,a,b\n0,1.0\n");
        let err = load_dataset(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn rejects_garbage_cell() {
        let file = write_csv("label,a\n0,abc\n");
        assert!(load_dataset(file.path()).is_err());
    }

    #[test]
    fn dataset_paths_prefer_sub_type() {
        let p = DatasetPaths::new("/data", DatasetType::Genomic, Sampling::Raw, Some("D2_vs_H"));
        assert_eq!(p.raw_train(), PathBuf::from("/data/genomic/D2_vs_H/raw_train.csv"));
        let p = DatasetPaths::new("/data", DatasetType::Genomic, Sampling::UpSample, None);
        assert_eq!(p.experiment_test(3), PathBuf::from("/data/genomic/up_sample/experiment_3_test.csv"));
    }
}
