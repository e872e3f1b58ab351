//! End-to-end run of the experiment routines over a small generated data tree.

use std::fmt::Write as _;
use std::path::Path;

use forecast_classifiers::config::{ClassifierType, DatasetType, FsMethod, Sampling, SamplingTiming};
use forecast_classifiers::results::ExperimentResults;
use forecast_cli::experiments::features::feature_metrics;
use forecast_cli::experiments::performance::general_performance;
use forecast_cli::experiments::resume::resume;
use forecast_cli::experiments::stability::stability;
use forecast_cli::experiments::{experiments, run_all};
use forecast_cli::input::ExperimentConfig;

/// Column `rs0` carries the label; the other columns are noise.
fn write_split(path: &Path, n: usize, offset: usize) {
    let mut text = String::from("label,rs0,rs1,rs2,rs3,rs4\n");
    for i in 0..n {
        let label = (i + offset) % 2;
        let noise = |k: usize| ((i * 37 + k * 11 + offset * 5) % 17) as f64 / 17.0;
        writeln!(
            text,
            "{},{},{},{},{},{}",
            label,
            label as f64 * 5.0 + noise(0),
            noise(1),
            noise(2),
            noise(3),
            noise(4)
        )
        .unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn setup(root: &Path) -> ExperimentConfig {
    let data = root.join("data/genomic/raw");
    std::fs::create_dir_all(&data).unwrap();
    write_split(&data.join("raw_train.csv"), 30, 0);
    write_split(&data.join("raw_test.csv"), 10, 1);
    for i in 0..2 {
        write_split(&data.join(format!("experiment_{}_train.csv", i)), 24, i);
    }

    let mut config = ExperimentConfig {
        data_root: root.join("data").to_string_lossy().into_owned(),
        output_root: root.join("out").to_string_lossy().into_owned(),
        fs_methods: vec![FsMethod::Anova],
        classifiers: vec![ClassifierType::LinearSvm, ClassifierType::Knn],
        sampling_timings: vec![SamplingTiming::BeforeFs],
        samplings: vec![Sampling::Raw],
        dataset_types: vec![DatasetType::Genomic],
        cv_folds: 3,
        score_folds: 3,
        num_experiments: 2,
        ..ExperimentConfig::default()
    };
    config.fs.anova_percentile = 20.0;
    config.grids.insert(ClassifierType::LinearSvm, vec![0.1, 1.0]);
    config.grids.insert(ClassifierType::Knn, vec![3.0, 5.0]);
    config
}

#[test]
fn run_stability_features_and_resume() {
    let root = tempfile::tempdir().unwrap();
    let config = setup(root.path());
    let all = experiments(&config);
    assert_eq!(all.len(), 2);

    let summary = run_all(&config, "run", |c, e| general_performance(c, e).map(|_| ()));
    assert!(summary.is_success(), "{:?}", summary.failed);

    let svm = &all[0];
    let results = ExperimentResults::load_json(svm.results.results_json()).unwrap();
    assert_eq!(results.accuracy, 1.0);
    assert_eq!(results.confusion_matrix, [[5, 0], [0, 5]]);
    for file in ["best_estimator.json", "coefficients_features_info.csv", "report.html", "pos_roc.html"] {
        assert!(svm.results.dir().join(file).exists(), "{} missing", file);
    }
    let table = std::fs::read_to_string(svm.results.dir().join("coefficients_features_info.csv")).unwrap();
    assert!(table.starts_with("names,linear SVM coefficients\nrs0,"));

    let summary = run_all(&config, "stability", stability);
    assert!(summary.is_success(), "{:?}", summary.failed);
    let stab = std::fs::read_to_string(svm.results.stability_table()).unwrap();
    assert!(stab.contains("rs0,2\n"));

    let svm_summary = feature_metrics(&config, svm).unwrap();
    assert_eq!(svm_summary.stability[0], 2.0);
    assert_eq!(svm_summary.stability[1..].iter().sum::<f64>(), 0.0);
    assert!(svm_summary.abs_mean.unwrap()[0] > 0.0);
    let general = std::fs::read_to_string(svm.results.general_table()).unwrap();
    assert!(general.starts_with("names,stability,coefficients_mean,abs_coefficients_mean,scaled_coefficients\n"));

    let knn_summary = feature_metrics(&config, &all[1]).unwrap();
    assert!(knn_summary.mean.is_none());

    let out = root.path().join("resumed_results.csv");
    assert_eq!(resume(&config, &out).unwrap(), 2);
    let resumed = std::fs::read_to_string(&out).unwrap();
    let mut lines = resumed.lines();
    assert!(lines.next().unwrap().starts_with("sampling,fs,classifier,data,f1,auc"));
    assert!(lines.next().unwrap().starts_with("raw,filter: anova,linear_svm,genomic,1"));
}
