//! Feature selection steps.
//!
//! Three families are available: a univariate ANOVA filter
//! ([`univariate_selection`]), the ReliefF wrapper ([`relieff`]) and an
//! L1-penalised embedded selector ([`lasso`]). All of them implement
//! [`FeatureSelector`] and are wrapped by [`Selector`] so pipelines can be
//! serialized.
pub mod lasso;
pub mod relieff;
pub mod univariate_selection;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{FsConfig, FsMethod};
use crate::error::{ForecastError, Result};

use lasso::LassoSelector;
use relieff::ReliefF;
use univariate_selection::{ScoreFunc, SelectPercentile};

pub trait FeatureSelector {
    fn name(&self) -> &'static str;

    /// Learn scores and the support mask from training data.
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Per-feature scores of the last fit, higher is better.
    fn scores(&self) -> Option<&[f64]>;

    /// Mask of the selected input features.
    fn support(&self) -> Option<&[bool]>;

    /// Keep the selected columns of `x`.
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let support = self.support().ok_or(ForecastError::NotFitted(self.name()))?;
        if x.ncols() != support.len() {
            return Err(ForecastError::ShapeMismatch("selector columns", support.len(), x.ncols()));
        }
        Ok(x.select(Axis(1), &support_indices(support)))
    }
}

/// Indices of the `true` entries of a support mask.
pub fn support_indices(support: &[bool]) -> Vec<usize> {
    support
        .iter()
        .enumerate()
        .filter_map(|(i, &keep)| if keep { Some(i) } else { None })
        .collect()
}

/// Indices of the `k` largest scores, best first, ties to the lower index.
pub fn top_k_indices(scores: &[f64], k: usize) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&i, &j| {
        scores[j]
            .partial_cmp(&scores[i])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(i.cmp(&j))
    });
    indices.truncate(k);
    indices
}

/// The feature-selection stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    Anova(SelectPercentile),
    Relieff(ReliefF),
    Lasso(LassoSelector),
}

impl Selector {
    pub fn from_config(method: FsMethod, config: &FsConfig, lasso_seed: u64) -> Self {
        match method {
            FsMethod::Anova => Selector::Anova(SelectPercentile::new(config.anova_percentile, ScoreFunc::FClassif)),
            FsMethod::Relieff => Selector::Relieff(ReliefF::new(config.relieff_neighbors, config.relieff_features_to_keep)),
            FsMethod::Lasso => Selector::Lasso(LassoSelector {
                alpha: config.lasso_alpha,
                threshold: config.lasso_threshold,
                n_resampling: config.lasso_resampling,
                sample_fraction: config.lasso_sample_fraction,
                scaling: config.lasso_scaling,
                seed: lasso_seed,
                fitted: None,
            }),
        }
    }

    pub fn method(&self) -> FsMethod {
        match self {
            Selector::Anova(_) => FsMethod::Anova,
            Selector::Relieff(_) => FsMethod::Relieff,
            Selector::Lasso(_) => FsMethod::Lasso,
        }
    }

    fn inner(&self) -> &dyn FeatureSelector {
        match self {
            Selector::Anova(s) => s,
            Selector::Relieff(s) => s,
            Selector::Lasso(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn FeatureSelector {
        match self {
            Selector::Anova(s) => s,
            Selector::Relieff(s) => s,
            Selector::Lasso(s) => s,
        }
    }
}

impl FeatureSelector for Selector {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        self.inner_mut().fit(x, y)?;
        if let Some(support) = self.support() {
            log::debug!(
                "{}: selected {} of {} features",
                self.name(),
                support.iter().filter(|&&s| s).count(),
                support.len()
            );
        }
        Ok(())
    }

    fn scores(&self) -> Option<&[f64]> {
        self.inner().scores()
    }

    fn support(&self) -> Option<&[bool]> {
        self.inner().support()
    }
}
