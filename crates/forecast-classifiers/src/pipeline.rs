//! Ordered fit/transform stages ending in a classifier.
//!
//! A pipeline always starts with mean imputation and standard scaling, then
//! runs the feature selector and the classifier. The optional sampler runs
//! either right before or right after the selector and only while fitting.
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::Context;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::{ClassifierType, FsConfig, FsMethod, Sampling, SamplingTiming, SeedConfig};
use crate::error::{check_xy, ForecastError, Result};
use crate::feature_selection::{support_indices, FeatureSelector, Selector};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::factory::build_model;
use crate::models::Classifier;
use crate::preprocessing::{MeanImputer, Scaler};
use crate::sampling::Sampler;

/// Everything needed to build an unfitted pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub fs: FsMethod,
    pub classifier: ClassifierType,
    pub sampling: Sampling,
    pub timing: SamplingTiming,
    pub fs_config: FsConfig,
    pub seeds: SeedConfig,
    /// Tuned hyper-parameter; the classifier default when `None`.
    pub param: Option<f64>,
}

impl PipelineSpec {
    pub fn new(fs: FsMethod, classifier: ClassifierType, sampling: Sampling, timing: SamplingTiming) -> Self {
        PipelineSpec {
            fs,
            classifier,
            sampling,
            timing,
            fs_config: FsConfig::default(),
            seeds: SeedConfig::default(),
            param: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub spec: PipelineSpec,
    pub imputer: Option<MeanImputer>,
    pub scaler: Option<Scaler>,
    pub sampler: Option<Sampler>,
    pub selector: Selector,
    pub classifier: Classifier,
}

impl Pipeline {
    pub fn new(spec: &PipelineSpec) -> Self {
        let param = spec.param.unwrap_or_else(|| spec.classifier.default_param());
        Pipeline {
            spec: spec.clone(),
            imputer: None,
            scaler: None,
            sampler: Sampler::from_strategy(spec.sampling, spec.seeds.for_sampling(spec.sampling)),
            selector: Selector::from_config(spec.fs, &spec.fs_config, spec.seeds.lasso),
            classifier: build_model(spec.classifier, param, spec.seeds.model),
        }
    }

    /// Unfitted copy with the classifier hyper-parameter replaced.
    pub fn with_param(&self, value: f64) -> Pipeline {
        Pipeline::new(&PipelineSpec {
            param: Some(value),
            ..self.spec.clone()
        })
    }

    /// Unfitted copy with the same hyper-parameter.
    pub fn fresh(&self) -> Pipeline {
        self.with_param(self.classifier.param())
    }

    pub fn param(&self) -> f64 {
        self.classifier.param()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        let mut names = vec!["imputer", "scaler"];
        let sampler = self.sampler.as_ref().map(|s| s.name());
        if self.spec.timing == SamplingTiming::BeforeFs {
            names.extend(sampler);
        }
        names.push(self.selector.name());
        if self.spec.timing == SamplingTiming::AfterFs {
            names.extend(sampler);
        }
        names.push(self.classifier.name());
        names
    }

    fn preprocess(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let imputer = self.imputer.as_ref().ok_or(ForecastError::NotFitted("imputer"))?;
        let scaler = self.scaler.as_ref().ok_or(ForecastError::NotFitted("scaler"))?;
        scaler.transform(&imputer.transform(x)?)
    }

    fn resample(&self, x: Array2<f64>, y: Vec<usize>) -> Result<(Array2<f64>, Vec<usize>)> {
        match &self.sampler {
            Some(sampler) => sampler.fit_resample(&x, &y),
            None => Ok((x, y)),
        }
    }

    /// Fit imputer, scaler, the sampler when it precedes selection, and the
    /// selector. Returns the selected training matrix and its labels.
    pub fn fit_selection(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<(Array2<f64>, Vec<usize>)> {
        check_xy(x.nrows(), y)?;
        let imputer = MeanImputer::fit(x)?;
        let imputed = imputer.transform(x)?;
        let (scaler, scaled) = Scaler::fit_transform(&imputed)?;
        self.imputer = Some(imputer);
        self.scaler = Some(scaler);

        let (xs, ys) = if self.spec.timing == SamplingTiming::BeforeFs {
            self.resample(scaled, y.to_vec())?
        } else {
            (scaled, y.to_vec())
        };

        self.selector.fit(&xs, &ys)?;
        Ok((self.selector.transform(&xs)?, ys))
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let (selected, ys) = self.fit_selection(x, y)?;
        let (xs, ys) = if self.spec.timing == SamplingTiming::AfterFs {
            self.resample(selected, ys)?
        } else {
            (selected, ys)
        };
        self.classifier.fit(&xs, &ys)
    }

    /// Impute, scale and select the columns of `x` with the fitted stages.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.selector.transform(&self.preprocess(x)?)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        self.classifier.predict(&self.transform(x)?)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.classifier.predict_proba(&self.transform(x)?)
    }

    /// Mask of the input features kept by the selector.
    pub fn support(&self) -> Option<&[bool]> {
        self.selector.support()
    }

    /// Classifier weights mapped back to the input features; features the
    /// selector dropped get 0.
    pub fn full_feature_weights(&self) -> Option<Vec<f64>> {
        let support = self.support()?;
        let weights = self.classifier.feature_weights()?;
        let kept = support_indices(support);
        if kept.len() != weights.len() {
            return None;
        }
        let mut full = vec![0.0; support.len()];
        for (i, w) in kept.into_iter().zip(weights) {
            full[i] = w;
        }
        Some(full)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write pipeline to {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let file = File::open(&path)
            .with_context(|| format!("Failed to open pipeline {}", path.as_ref().display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse pipeline {}", path.as_ref().display()))
    }
}
