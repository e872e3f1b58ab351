use anyhow::{Context, Result};

use forecast_classifiers::config::ClassifierType;
use forecast_classifiers::data_handling::{load_dataset, Dataset};
use forecast_classifiers::metrics;
use forecast_classifiers::model_selection::{cross_val_score, CvResults, GridSearchCv};
use forecast_classifiers::pipeline::Pipeline;
use forecast_classifiers::report::report::write_experiment_report;
use forecast_classifiers::results::{write_feature_table, ExperimentResults, TestMetrics};

use crate::experiments::Experiment;
use crate::input::ExperimentConfig;
use crate::util::validate_csv_file;

/// Grid-search the classifier on `raw_train.csv`, evaluate the best pipeline
/// on `raw_test.csv` and persist everything under the result directory.
pub fn general_performance(config: &ExperimentConfig, exp: &Experiment) -> Result<ExperimentResults> {
    exp.results.create()?;

    let train_path = exp.data.raw_train();
    validate_csv_file(&train_path)?;
    let train = load_dataset(&train_path)?;
    train.log_summary("Training data");

    let classifier = exp.key.classifier;
    let base = Pipeline::new(&exp.spec(config));
    log::debug!("Pipeline steps: {:?}", base.step_names());

    let search = GridSearchCv::new(classifier.param_name(), config.grid_for(classifier), config.search_cv());
    let found = search
        .fit(&base, &train.x, &train.y)
        .with_context(|| format!("Grid search failed on {}", train_path.display()))?;
    log::info!(
        "Best parameters set found on development set: {}={} (mean weighted F1 {:.4})",
        search.param_name,
        found.best_param,
        found.best_score
    );

    let test_path = exp.data.raw_test();
    validate_csv_file(&test_path)?;
    let test = load_dataset(&test_path)?;
    test.log_summary("Test data");
    if test.feature_names != train.feature_names {
        anyhow::bail!(
            "{} and {} have different feature columns",
            train_path.display(),
            test_path.display()
        );
    }

    performance_metrics(config, exp, Some(found.cv_results), &found.best_estimator, &train, &test)
}

/// Score a fitted pipeline and write results, plots, the pipeline itself and
/// the per-feature weight table.
pub fn performance_metrics(
    config: &ExperimentConfig,
    exp: &Experiment,
    cv_results: Option<CvResults>,
    best: &Pipeline,
    train: &Dataset,
    test: &Dataset,
) -> Result<ExperimentResults> {
    let cv_scores = cross_val_score(best, &train.x, &train.y, &config.score_cv())?;
    let cv_score = metrics::mean(&cv_scores);
    log::info!("CV score: {:.4}", cv_score);

    let train_pred = best.predict(&train.x)?;
    let train_score = metrics::f1_weighted(&train.y, &train_pred)?;
    log::info!("Train score: {:.4}", train_score);

    let y_pred = best.predict(&test.x)?;
    let y_prob = best.predict_proba(&test.x)?;
    let test_metrics = TestMetrics::compute(&test.y, &y_pred, &y_prob)?;

    let results = ExperimentResults::new(
        exp.key.clone(),
        cv_results,
        best.param(),
        cv_score,
        train_score,
        &y_prob,
        test_metrics,
    );
    log::info!("Accuracy: {:.4}", results.accuracy);
    log::info!("Confusion matrix: {:?}", results.confusion_matrix);
    log::info!(
        "Positive precision/recall/F1: {:.4} / {:.4} / {:.4}",
        results.pos_precision,
        results.pos_recall,
        results.pos_f1
    );
    log::info!(
        "Negative precision/recall/F1: {:.4} / {:.4} / {:.4}",
        results.neg_precision,
        results.neg_recall,
        results.neg_f1
    );
    log::info!(
        "Weighted precision/recall/F1: {:.4} / {:.4} / {:.4}",
        results.precision,
        results.recall,
        results.f1
    );
    log::info!("Positive AUC: {:.4}, negative AUC: {:.4}", results.pos_auc, results.neg_auc);

    let dir = exp.results.dir();
    results.save_json(exp.results.results_json())?;
    best.save_json(exp.results.best_estimator())?;
    write_experiment_report(&results, dir)?;

    if let Some(table) = exp.results.features_table() {
        let weights = best
            .full_feature_weights()
            .context("Fitted pipeline has no feature weights")?;
        let header = match exp.key.classifier {
            ClassifierType::LinearSvm => "linear SVM coefficients",
            _ => "RF importances",
        };
        let values = weights.iter().map(|w| w.abs()).collect();
        write_feature_table(&table, &train.feature_names, &[(header, values)])?;
    }

    log::info!("Results written to {}", dir.display());
    Ok(results)
}
