//! The experiment grid and the routines run over it.
pub mod features;
pub mod performance;
pub mod resume;
pub mod stability;

use anyhow::Result;

use forecast_classifiers::data_handling::DatasetPaths;
use forecast_classifiers::pipeline::PipelineSpec;
use forecast_classifiers::results::ExperimentKey;

use crate::input::ExperimentConfig;
use crate::util::ResultPaths;

/// One configuration of the experiment grid with its input and output
/// locations.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub key: ExperimentKey,
    pub data: DatasetPaths,
    pub results: ResultPaths,
}

impl Experiment {
    /// `<dataset_type>` or `<dataset_type>/<sub_type>`.
    pub fn data_name(&self) -> String {
        match &self.key.sub_type {
            Some(sub) => format!("{}/{}", self.key.dataset_type, sub),
            None => self.key.dataset_type.to_string(),
        }
    }

    pub fn label(&self) -> String {
        format!(
            "{} + {} | {} | {} | {}",
            self.key.fs,
            self.key.classifier,
            self.key.sampling_timing,
            self.key.sampling,
            self.data_name()
        )
    }

    pub fn spec(&self, config: &ExperimentConfig) -> PipelineSpec {
        config.pipeline_spec(
            self.key.fs,
            self.key.classifier,
            self.key.sampling,
            self.key.sampling_timing,
        )
    }
}

/// Expand the configured lists into experiments, outermost loop first:
/// FS method, classifier, sampling timing, sampling, dataset type, sub-type.
pub fn experiments(config: &ExperimentConfig) -> Vec<Experiment> {
    let sub_types: Vec<Option<&str>> = if config.dataset_sub_types.is_empty() {
        vec![None]
    } else {
        config.dataset_sub_types.iter().map(|s| Some(s.as_str())).collect()
    };

    let mut out = Vec::new();
    for &fs in &config.fs_methods {
        for &classifier in &config.classifiers {
            for &timing in &config.sampling_timings {
                for &sampling in &config.samplings {
                    for &dataset_type in &config.dataset_types {
                        for &sub_type in &sub_types {
                            out.push(Experiment {
                                key: ExperimentKey {
                                    fs,
                                    classifier,
                                    sampling,
                                    sampling_timing: timing,
                                    dataset_type,
                                    sub_type: sub_type.map(str::to_string),
                                },
                                data: DatasetPaths::new(&config.data_root, dataset_type, sampling, sub_type),
                                results: ResultPaths::new(
                                    &config.output_root,
                                    fs,
                                    classifier,
                                    timing,
                                    sampling,
                                    dataset_type,
                                    sub_type,
                                ),
                            });
                        }
                    }
                }
            }
        }
    }
    out
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Run `routine` on every experiment. A failing experiment is logged and
/// counted; the remaining ones still run.
pub fn run_all<F>(config: &ExperimentConfig, task: &str, routine: F) -> RunSummary
where
    F: Fn(&ExperimentConfig, &Experiment) -> Result<()>,
{
    let all = experiments(config);
    log::info!("[forecast::{}] {} configurations", task, all.len());

    let mut summary = RunSummary::default();
    for (i, exp) in all.iter().enumerate() {
        log::info!("[forecast::{}] ({}/{}) {}", task, i + 1, all.len(), exp.label());
        match routine(config, exp) {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                log::error!("[forecast::{}] {} failed: {:#}", task, exp.label(), e);
                summary.failed.push(exp.label());
            }
        }
    }

    log::info!(
        "[forecast::{}] {} succeeded, {} failed",
        task,
        summary.succeeded,
        summary.failed.len()
    );
    summary
}
