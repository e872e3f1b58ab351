use anyhow::{Context, Result};
use ndarray::Array2;

use forecast_classifiers::config::ClassifierType;
use forecast_classifiers::data_handling::{load_dataset, read_feature_names};
use forecast_classifiers::pipeline::Pipeline;
use forecast_classifiers::results::{save_json, FeatureSummary};

use crate::experiments::stability::rows;
use crate::experiments::Experiment;
use crate::input::ExperimentConfig;
use crate::util::validate_csv_file;

/// Refit the saved best pipeline on every experiment split and summarise
/// feature stability and classifier weights.
pub fn feature_metrics(config: &ExperimentConfig, exp: &Experiment) -> Result<FeatureSummary> {
    let saved_path = exp.results.best_estimator();
    let saved = Pipeline::load_json(&saved_path)
        .with_context(|| format!("Run `forecast run` first; no pipeline at {}", saved_path.display()))?;
    let names = read_feature_names(exp.data.raw_train())?;
    let n_features = names.len();
    let with_weights = exp.key.classifier != ClassifierType::Knn;

    let mut selected = Array2::zeros((n_features, config.num_experiments));
    let mut weights = Array2::zeros((n_features, config.num_experiments));
    for i in 0..config.num_experiments {
        let path = exp.data.experiment_train(i);
        validate_csv_file(&path)?;
        let data = load_dataset(&path)?;
        if data.n_features() != n_features {
            anyhow::bail!(
                "{} has {} features, expected {}",
                path.display(),
                data.n_features(),
                n_features
            );
        }

        let mut pipeline = saved.fresh();
        pipeline
            .fit(&data.x, &data.y)
            .with_context(|| format!("Refit failed on {}", path.display()))?;

        let support = pipeline.support().context("Selector kept no support mask")?;
        for (j, &kept) in support.iter().enumerate() {
            if kept {
                selected[(j, i)] = 1.0;
            }
        }
        if with_weights {
            let w = pipeline
                .full_feature_weights()
                .context("Fitted pipeline has no feature weights")?;
            for (j, v) in w.into_iter().enumerate() {
                weights[(j, i)] = v;
            }
        }
        log::debug!("Experiment {} refitted", i);
    }

    let summary = FeatureSummary::compute(&selected, with_weights.then_some(&weights));
    let kind = match exp.key.classifier {
        ClassifierType::Rf => "importances",
        _ => "coefficients",
    };

    exp.results.create()?;
    save_json(&rows(&selected), exp.results.feature_stability())?;
    if with_weights {
        save_json(&rows(&weights), exp.results.feature_weights())?;
    }
    summary.write_csv(exp.results.general_table(), &names, kind)?;
    log::info!("Feature metrics written to {}", exp.results.general_table().display());
    Ok(summary)
}
