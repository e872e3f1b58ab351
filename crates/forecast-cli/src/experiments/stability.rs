use anyhow::{Context, Result};
use ndarray::Array2;

use forecast_classifiers::data_handling::{load_dataset, read_feature_names};
use forecast_classifiers::pipeline::Pipeline;
use forecast_classifiers::results::{save_json, write_feature_table};

use crate::experiments::Experiment;
use crate::input::ExperimentConfig;
use crate::util::validate_csv_file;

/// 0/1 selection matrix, features x experiments.
pub fn selection_matrix(config: &ExperimentConfig, exp: &Experiment, n_features: usize) -> Result<Array2<f64>> {
    let mut selected = Array2::zeros((n_features, config.num_experiments));
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

        let mut pipeline = Pipeline::new(&exp.spec(config));
        pipeline
            .fit_selection(&data.x, &data.y)
            .with_context(|| format!("Feature selection failed on {}", path.display()))?;
        let support = pipeline.support().context("Selector kept no support mask")?;
        for (j, &kept) in support.iter().enumerate() {
            if kept {
                selected[(j, i)] = 1.0;
            }
        }
        log::info!(
            "Experiment {}: {} features selected",
            i,
            support.iter().filter(|&&s| s).count()
        );
    }
    Ok(selected)
}

pub fn rows(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}

/// How often each feature is selected across the experiment splits.
pub fn stability(config: &ExperimentConfig, exp: &Experiment) -> Result<()> {
    exp.results.create()?;
    let names = read_feature_names(exp.data.raw_train())?;
    let selected = selection_matrix(config, exp, names.len())?;

    save_json(&rows(&selected), exp.results.feature_ranking())?;
    let counts: Vec<f64> = selected.rows().into_iter().map(|r| r.sum()).collect();
    write_feature_table(exp.results.stability_table(), &names, &[("stability", counts)])?;
    log::info!("Stability table written to {}", exp.results.stability_table().display());
    Ok(())
}
