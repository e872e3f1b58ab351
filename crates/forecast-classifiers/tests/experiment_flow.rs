use std::fmt::Write as _;

use forecast_classifiers::config::{ClassifierType, DatasetType, FsMethod, Sampling, SamplingTiming};
use forecast_classifiers::data_handling::{load_dataset, DatasetPaths};
use forecast_classifiers::model_selection::{cross_val_score, GridSearchCv, StratifiedKFold};
use forecast_classifiers::pipeline::{Pipeline, PipelineSpec};
use forecast_classifiers::report::report::write_experiment_report;
use forecast_classifiers::results::{ExperimentKey, ExperimentResults, TestMetrics};

/// Label in column 0, feature `rs0` carries the class, the rest is noise.
fn write_split(path: &std::path::Path, n: usize, offset: usize) {
    let mut text = String::from("label,rs0,rs1,rs2,rs3\n");
    for i in 0..n {
        let label = (i + offset) % 2;
        let noise = |k: usize| ((i * 31 + k * 17 + offset) % 13) as f64 / 13.0;
        writeln!(
            text,
            "{},{},{},{},{}",
            label,
            label as f64 * 4.0 + noise(0),
            noise(1),
            noise(2),
            if i % 7 == 0 { String::from("NA") } else { noise(3).to_string() }
        )
        .unwrap();
    }
    std::fs::write(path, text).unwrap();
}

#[test]
fn grid_search_evaluate_and_persist() {
    let root = tempfile::tempdir().unwrap();
    let paths = DatasetPaths::new(root.path(), DatasetType::Genomic, Sampling::Raw, None);
    std::fs::create_dir_all(paths.dir()).unwrap();
    write_split(&paths.raw_train(), 40, 0);
    write_split(&paths.raw_test(), 12, 1);

    let train = load_dataset(paths.raw_train()).unwrap();
    assert_eq!(train.feature_names, vec!["rs0", "rs1", "rs2", "rs3"]);
    assert_eq!(train.class_counts(), [20, 20]);

    let mut spec = PipelineSpec::new(FsMethod::Anova, ClassifierType::Knn, Sampling::Raw, SamplingTiming::BeforeFs);
    spec.fs_config.anova_percentile = 25.0;
    let base = Pipeline::new(&spec);
    let search = GridSearchCv::new("n_neighbors", vec![5.0, 20.0], StratifiedKFold::new(3, false, 123456));
    let found = search.fit(&base, &train.x, &train.y).unwrap();
    assert_eq!(found.best_param, 5.0);
    assert!((found.best_score - 1.0).abs() < 1e-12);
    assert_eq!(found.best_estimator.support().unwrap(), &[true, false, false, false]);

    let cv_scores = cross_val_score(&found.best_estimator, &train.x, &train.y, &StratifiedKFold::new(5, false, 789012)).unwrap();
    assert_eq!(cv_scores.len(), 5);

    let test = load_dataset(paths.raw_test()).unwrap();
    let y_pred = found.best_estimator.predict(&test.x).unwrap();
    let y_prob = found.best_estimator.predict_proba(&test.x).unwrap();
    let metrics = TestMetrics::compute(&test.y, &y_pred, &y_prob).unwrap();
    assert_eq!(metrics.accuracy, 1.0);

    let key = ExperimentKey {
        fs: FsMethod::Anova,
        classifier: ClassifierType::Knn,
        sampling: Sampling::Raw,
        sampling_timing: SamplingTiming::BeforeFs,
        dataset_type: DatasetType::Genomic,
        sub_type: None,
    };
    let results = ExperimentResults::new(key, Some(found.cv_results.clone()), found.best_param, 1.0, 1.0, &y_prob, metrics);

    let out = tempfile::tempdir().unwrap();
    results.save_json(out.path().join("knn_results.json")).unwrap();
    write_experiment_report(&results, out.path()).unwrap();
    for file in ["knn_results.json", "confusion_matrix.html", "pos_roc.html", "neg_roc.html", "report.html"] {
        assert!(out.path().join(file).exists(), "{} missing", file);
    }

    found.best_estimator.save_json(out.path().join("best_estimator.json")).unwrap();
    let reloaded = Pipeline::load_json(out.path().join("best_estimator.json")).unwrap();
    assert_eq!(reloaded.predict(&test.x).unwrap(), y_pred);
}
