use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use forecast_classifiers::config::{ClassifierType, DatasetType, FsMethod, Sampling, SamplingTiming};

pub fn validate_csv_file<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    if ext.as_deref() != Some("csv") {
        anyhow::bail!("File must have a .csv extension: {}", path.display());
    }
    if !path.exists() {
        anyhow::bail!("File does not exist: {}", path.display());
    }
    Ok(())
}

/// Output directory of one configuration:
/// `<output_root>/<fs>/classifiers/<classifier>/<timing>/<sampling>/<dataset_type>[/<sub_type>]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPaths {
    dir: PathBuf,
    classifier: ClassifierType,
}

impl ResultPaths {
    pub fn new<P: AsRef<Path>>(
        output_root: P,
        fs: FsMethod,
        classifier: ClassifierType,
        timing: SamplingTiming,
        sampling: Sampling,
        dataset_type: DatasetType,
        sub_type: Option<&str>,
    ) -> Self {
        let mut dir = output_root
            .as_ref()
            .join(fs.as_str())
            .join("classifiers")
            .join(classifier.as_str())
            .join(timing.as_str())
            .join(sampling.as_str())
            .join(dataset_type.as_str());
        if let Some(sub) = sub_type {
            dir.push(sub);
        }
        ResultPaths { dir, classifier }
    }

    pub fn create(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create result directory {}", self.dir.display()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_json(&self) -> PathBuf {
        self.dir.join(format!("{}_results.json", self.classifier.as_str()))
    }

    pub fn best_estimator(&self) -> PathBuf {
        self.dir.join("best_estimator.json")
    }

    /// Per-feature table written after the test evaluation; `None` for
    /// classifiers without feature weights.
    pub fn features_table(&self) -> Option<PathBuf> {
        match self.classifier {
            ClassifierType::LinearSvm => Some(self.dir.join("coefficients_features_info.csv")),
            ClassifierType::Rf => Some(self.dir.join("importances_features_info.csv")),
            ClassifierType::Knn => None,
        }
    }

    pub fn feature_ranking(&self) -> PathBuf {
        self.dir.join("feature_ranking.json")
    }

    pub fn stability_table(&self) -> PathBuf {
        self.dir.join("stability_features_info.csv")
    }

    pub fn feature_stability(&self) -> PathBuf {
        self.dir.join("feature_stability.json")
    }

    pub fn feature_weights(&self) -> PathBuf {
        match self.classifier {
            ClassifierType::Rf => self.dir.join("feature_importances.json"),
            _ => self.dir.join("feature_coefficients.json"),
        }
    }

    pub fn general_table(&self) -> PathBuf {
        self.dir.join("general_features_info.csv")
    }
}
