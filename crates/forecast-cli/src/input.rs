use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use forecast_classifiers::config::{
    ClassifierType, DatasetType, FsConfig, FsMethod, Sampling, SamplingTiming, SeedConfig,
};
use forecast_classifiers::model_selection::StratifiedKFold;
use forecast_classifiers::pipeline::PipelineSpec;

/// Everything a `forecast` run needs; every field has a default.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExperimentConfig {
    pub version: String,
    pub data_root: String,
    pub output_root: String,
    pub fs_methods: Vec<FsMethod>,
    pub classifiers: Vec<ClassifierType>,
    pub sampling_timings: Vec<SamplingTiming>,
    pub samplings: Vec<Sampling>,
    pub dataset_types: Vec<DatasetType>,
    /// Sub-directories under each dataset type; when empty the sampling name
    /// is used as the data directory.
    pub dataset_sub_types: Vec<String>,
    pub cv_folds: usize,
    pub cv_seed: u64,
    pub cv_shuffle: bool,
    /// Folds and seed of the cross-validated score of the best estimator.
    pub score_folds: usize,
    pub score_seed: u64,
    pub fs: FsConfig,
    pub seeds: SeedConfig,
    pub num_experiments: usize,
    /// Replaces the default search grid of a classifier.
    pub grids: HashMap<ClassifierType, Vec<f64>>,
    pub num_threads: Option<usize>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            version: clap::crate_version!().to_string(),
            data_root: String::from("datasets"),
            output_root: String::from("results"),
            fs_methods: vec![FsMethod::Anova, FsMethod::Relieff, FsMethod::Lasso],
            classifiers: vec![ClassifierType::LinearSvm, ClassifierType::Rf, ClassifierType::Knn],
            sampling_timings: vec![SamplingTiming::BeforeFs, SamplingTiming::AfterFs],
            samplings: vec![Sampling::Raw, Sampling::DownSample, Sampling::UpSample, Sampling::SmoteSample],
            dataset_types: vec![DatasetType::Genomic, DatasetType::GenomicEpidemiological],
            dataset_sub_types: Vec::new(),
            cv_folds: 10,
            cv_seed: 123456,
            cv_shuffle: false,
            score_folds: 5,
            score_seed: 789012,
            fs: FsConfig::default(),
            seeds: SeedConfig::default(),
            num_experiments: 10,
            grids: HashMap::new(),
            num_threads: None,
        }
    }
}

impl ExperimentConfig {
    /// Read a JSON config; missing or invalid fields fall back to defaults.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_json = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.as_ref().display()))?;
        let partial: serde_json::Value = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file: {}", config_path.as_ref().display()))?;
        let mut config = ExperimentConfig::default();

        macro_rules! load_or_default {
            ($field:ident) => {
                if let Some(val) = partial.get(stringify!($field)) {
                    if let Ok(parsed) = serde_json::from_value(val.clone()) {
                        config.$field = parsed;
                    } else {
                        log::warn!(
                            "Config Invalid value for '{}', using default: {:?}",
                            stringify!($field),
                            config.$field
                        );
                    }
                } else {
                    log::debug!(
                        "Config Missing field '{}', using default: {:?}",
                        stringify!($field),
                        config.$field
                    );
                }
            };
        }

        load_or_default!(version);
        load_or_default!(data_root);
        load_or_default!(output_root);
        load_or_default!(fs_methods);
        load_or_default!(classifiers);
        load_or_default!(sampling_timings);
        load_or_default!(samplings);
        load_or_default!(dataset_types);
        load_or_default!(dataset_sub_types);
        load_or_default!(cv_folds);
        load_or_default!(cv_seed);
        load_or_default!(cv_shuffle);
        load_or_default!(score_folds);
        load_or_default!(score_seed);
        load_or_default!(fs);
        load_or_default!(seeds);
        load_or_default!(num_experiments);
        load_or_default!(grids);
        load_or_default!(num_threads);

        Ok(config)
    }

    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config = ExperimentConfig::load(config_path)?;
        config.apply_overrides(matches);
        Ok(config)
    }

    /// Apply `--data-root` / `--output-root` from the command line.
    pub fn apply_overrides(&mut self, matches: &ArgMatches) {
        if let Some(data_root) = matches.get_one::<String>("data_root") {
            self.data_root = data_root.clone();
        }
        if let Some(output_root) = matches.get_one::<String>("output_root") {
            self.output_root = output_root.clone();
        }
    }

    pub fn grid_for(&self, classifier: ClassifierType) -> Vec<f64> {
        self.grids
            .get(&classifier)
            .cloned()
            .unwrap_or_else(|| classifier.default_grid())
    }

    pub fn pipeline_spec(
        &self,
        fs: FsMethod,
        classifier: ClassifierType,
        sampling: Sampling,
        timing: SamplingTiming,
    ) -> PipelineSpec {
        PipelineSpec {
            fs_config: self.fs.clone(),
            seeds: self.seeds.clone(),
            ..PipelineSpec::new(fs, classifier, sampling, timing)
        }
    }

    /// Folds of the hyper-parameter search.
    pub fn search_cv(&self) -> StratifiedKFold {
        StratifiedKFold::new(self.cv_folds, self.cv_shuffle, self.cv_seed)
    }

    /// Folds of the final cross-validated score.
    pub fn score_cv(&self) -> StratifiedKFold {
        StratifiedKFold::new(self.score_folds, self.cv_shuffle, self.score_seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"classifiers": ["knn"], "cv_folds": 3, "grids": {"knn": [3, 7]}, "num_experiments": "many"}"#,
        )
        .unwrap();
        let config = ExperimentConfig::load(&path).unwrap();
        assert_eq!(config.classifiers, vec![ClassifierType::Knn]);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.num_experiments, 10);
        assert_eq!(config.grid_for(ClassifierType::Knn), vec![3.0, 7.0]);
        assert_eq!(config.grid_for(ClassifierType::LinearSvm).len(), 7);
        assert_eq!(config.fs_methods.len(), 3);
        assert_eq!(config.version, ExperimentConfig::default().version);
    }

    #[test]
    fn version_is_read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"version": "0.0.9", "cv_folds": 4}"#).unwrap();
        let config = ExperimentConfig::load(&path).unwrap();
        assert_eq!(config.version, "0.0.9");
        assert_eq!(config.cv_folds, 4);
    }

    #[test]
    fn pipeline_spec_carries_fs_and_seeds() {
        let mut config = ExperimentConfig::default();
        config.fs.anova_percentile = 30.0;
        config.seeds.model = 7;
        let spec = config.pipeline_spec(FsMethod::Anova, ClassifierType::Rf, Sampling::Raw, SamplingTiming::AfterFs);
        assert_eq!(spec.fs_config.anova_percentile, 30.0);
        assert_eq!(spec.seeds.model, 7);
        assert_eq!(spec.param, None);
    }
}
