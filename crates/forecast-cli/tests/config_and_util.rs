//! Integration tests for config parsing and path helpers.

use forecast_classifiers::config::{ClassifierType, DatasetType, FsMethod, Sampling, SamplingTiming};
use forecast_cli::input::ExperimentConfig;
use forecast_cli::util::{validate_csv_file, ResultPaths};

#[test]
fn validate_csv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw_train.csv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_csv_file(&path).is_ok());
}

#[test]
fn validate_wrong_extension_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raw_train.tsv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_csv_file(&path).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_csv_file("/nonexistent/path/raw_train.csv").is_err());
}

#[test]
fn config_default_values() {
    let cfg = ExperimentConfig::default();
    assert_eq!(cfg.cv_folds, 10);
    assert_eq!(cfg.cv_seed, 123456);
    assert_eq!(cfg.score_folds, 5);
    assert_eq!(cfg.score_seed, 789012);
    assert_eq!(cfg.seeds.sampling, [123, 456, 789]);
    assert_eq!(cfg.fs.anova_percentile, 10.0);
    assert_eq!(cfg.num_experiments, 10);
    assert!(!cfg.cv_shuffle);
}

#[test]
fn config_round_trips_json() {
    let mut cfg = ExperimentConfig::default();
    cfg.grids.insert(ClassifierType::LinearSvm, vec![0.1, 1.0]);
    let json = serde_json::to_string_pretty(&cfg).unwrap();
    assert!(json.contains("\"linear_svm\""));
    assert!(json.contains("\"sampling_before_fs\""));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();
    let loaded = ExperimentConfig::load(&path).unwrap();
    assert_eq!(loaded, cfg);
}

#[test]
fn invalid_json_config_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(ExperimentConfig::load(&path).is_err());
}

#[test]
fn result_paths_without_sub_type() {
    let paths = ResultPaths::new(
        "results",
        FsMethod::Anova,
        ClassifierType::Knn,
        SamplingTiming::BeforeFs,
        Sampling::Raw,
        DatasetType::Genomic,
        None,
    );
    assert!(paths.dir().ends_with("anova/classifiers/knn/sampling_before_fs/raw/genomic"));
    assert!(paths.features_table().is_none());
    assert!(paths.results_json().ends_with("knn_results.json"));
}
