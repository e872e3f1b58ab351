use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use itertools_num::linspace;

/// Which slice of the cohort a dataset covers.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DatasetType {
    Genomic,
    GenomicEpidemiological,
}

/// Class-balancing strategy applied while fitting.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    Raw,
    DownSample,
    UpSample,
    SmoteSample,
}

/// Whether resampling happens before or after the feature-selection step.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingTiming {
    #[serde(rename = "sampling_before_fs")]
    BeforeFs,
    #[serde(rename = "sampling_after_fs")]
    AfterFs,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FsMethod {
    Anova,
    Relieff,
    Lasso,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierType {
    LinearSvm,
    Rf,
    Knn,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Genomic => "genomic",
            DatasetType::GenomicEpidemiological => "genomic_epidemiological",
        }
    }
}

impl Sampling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sampling::Raw => "raw",
            Sampling::DownSample => "down_sample",
            Sampling::UpSample => "up_sample",
            Sampling::SmoteSample => "smote_sample",
        }
    }
}

impl SamplingTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            SamplingTiming::BeforeFs => "sampling_before_fs",
            SamplingTiming::AfterFs => "sampling_after_fs",
        }
    }
}

impl FsMethod {
    /// Step name used in pipelines and in the results directory tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            FsMethod::Anova => "anova",
            FsMethod::Relieff => "relieff",
            FsMethod::Lasso => "lasso",
        }
    }

    /// Family of the method, as reported in the resumed results table.
    pub fn family(&self) -> &'static str {
        match self {
            FsMethod::Anova => "filter",
            FsMethod::Relieff => "wrapper",
            FsMethod::Lasso => "embedded",
        }
    }
}

impl ClassifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassifierType::LinearSvm => "linear_svm",
            ClassifierType::Rf => "rf",
            ClassifierType::Knn => "knn",
        }
    }

    /// Name of the tuned hyper-parameter.
    pub fn param_name(&self) -> &'static str {
        match self {
            ClassifierType::LinearSvm => "C",
            ClassifierType::Rf => "n_estimators",
            ClassifierType::Knn => "n_neighbors",
        }
    }

    /// Value of the tuned hyper-parameter when no search is run.
    pub fn default_param(&self) -> f64 {
        match self {
            ClassifierType::LinearSvm => 1.0,
            ClassifierType::Rf => 100.0,
            ClassifierType::Knn => 5.0,
        }
    }

    /// Default search grid for the tuned hyper-parameter.
    pub fn default_grid(&self) -> Vec<f64> {
        match self {
            ClassifierType::LinearSvm => vec![0.001, 0.01, 0.1, 1.0, 10.0, 100.0, 1000.0],
            // floor(3 * 10^p) for p = 1.0, 1.2, ..., 3.0
            ClassifierType::Rf => linspace(1.0f64, 3.0, 11)
                .map(|p| (3.0 * 10f64.powf(p) + 1e-6).floor())
                .collect(),
            ClassifierType::Knn => (5..60).step_by(15).map(|k| k as f64).collect(),
        }
    }
}

macro_rules! impl_name_traits {
    ($ty:ty, $label:expr, [$($variant:expr),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|v: &$ty| v.as_str() == wanted)
                    .ok_or_else(|| format!("Unknown {}: {}", $label, s))
            }
        }
    };
}

impl_name_traits!(DatasetType, "dataset type", [DatasetType::Genomic, DatasetType::GenomicEpidemiological]);
impl_name_traits!(
    Sampling,
    "sampling strategy",
    [Sampling::Raw, Sampling::DownSample, Sampling::UpSample, Sampling::SmoteSample]
);
impl_name_traits!(SamplingTiming, "sampling timing", [SamplingTiming::BeforeFs, SamplingTiming::AfterFs]);
impl_name_traits!(FsMethod, "feature selection method", [FsMethod::Anova, FsMethod::Relieff, FsMethod::Lasso]);
impl_name_traits!(
    ClassifierType,
    "classifier",
    [ClassifierType::LinearSvm, ClassifierType::Rf, ClassifierType::Knn]
);

/// Hyper-parameters of the feature-selection steps.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct FsConfig {
    pub anova_percentile: f64,
    pub relieff_neighbors: usize,
    pub relieff_features_to_keep: usize,
    pub lasso_alpha: f64,
    pub lasso_threshold: f64,
    pub lasso_resampling: usize,
    pub lasso_sample_fraction: f64,
    pub lasso_scaling: f64,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            anova_percentile: 10.0,
            relieff_neighbors: 50,
            relieff_features_to_keep: 2000,
            lasso_alpha: 0.01,
            lasso_threshold: 0.1,
            lasso_resampling: 50,
            lasso_sample_fraction: 0.75,
            lasso_scaling: 0.5,
        }
    }
}

/// Seeds for every random component of a pipeline.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SeedConfig {
    /// Seed shared by the classifiers and the grid-search folds.
    pub model: u64,
    /// Seeds for down-sampling, up-sampling and SMOTE, in that order.
    pub sampling: [u64; 3],
    /// Seed of the randomized lasso resamples.
    pub lasso: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            model: 123456,
            sampling: [123, 456, 789],
            lasso: 123456,
        }
    }
}

impl SeedConfig {
    pub fn for_sampling(&self, sampling: Sampling) -> u64 {
        match sampling {
            Sampling::Raw | Sampling::DownSample => self.sampling[0],
            Sampling::UpSample => self.sampling[1],
            Sampling::SmoteSample => self.sampling[2],
        }
    }
}
