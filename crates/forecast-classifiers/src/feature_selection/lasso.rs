//! L1-penalised linear models used as an embedded feature selector.
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::feature_selection::{top_k_indices, FeatureSelector};

/// Least squares with an L1 penalty, fitted by cyclic coordinate descent.
///
/// Minimises `1/(2n) ||y - Xw - b||^2 + alpha ||w||_1`; the intercept is
/// recovered from the column means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lasso {
    pub alpha: f64,
    pub tol: f64,
    pub max_iter: usize,
    pub coef: Vec<f64>,
    pub intercept: f64,
    pub n_iter: usize,
}

impl Lasso {
    pub fn new(alpha: f64) -> Self {
        Lasso {
            alpha,
            tol: 1e-4,
            max_iter: 1000,
            coef: Vec::new(),
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(ForecastError::EmptyData("lasso requires a non-empty matrix"));
        }
        if y.len() != n_samples {
            return Err(ForecastError::ShapeMismatch("lasso targets", n_samples, y.len()));
        }
        if self.alpha < 0.0 {
            return Err(ForecastError::InvalidParameter(format!("alpha must be >= 0, got {}", self.alpha)));
        }

        let n = n_samples as f64;
        let x_mean = x.mean_axis(Axis(0)).ok_or(ForecastError::EmptyData("lasso mean"))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let col_sq: Vec<f64> = xc.axis_iter(Axis(1)).map(|c| c.dot(&c) / n).collect();
        let mut w = Array1::<f64>::zeros(n_features);
        let mut residual = yc.clone();

        self.n_iter = self.max_iter;
        for iter in 0..self.max_iter {
            let mut max_delta = 0.0f64;
            let mut max_w = 0.0f64;
            for j in 0..n_features {
                if col_sq[j] == 0.0 {
                    continue;
                }
                let col = xc.column(j);
                let w_old = w[j];
                let rho = col.dot(&residual) / n + col_sq[j] * w_old;
                let w_new = soft_threshold(rho, self.alpha) / col_sq[j];
                if w_new != w_old {
                    residual.scaled_add(w_old - w_new, &col);
                    w[j] = w_new;
                }
                max_delta = max_delta.max((w_new - w_old).abs());
                max_w = max_w.max(w_new.abs());
            }
            if max_w == 0.0 || max_delta / max_w < self.tol {
                self.n_iter = iter + 1;
                break;
            }
        }
        if self.n_iter == self.max_iter {
            log::debug!("lasso did not converge in {} iterations (alpha={})", self.max_iter, self.alpha);
        }

        self.intercept = y_mean - x_mean.dot(&w);
        self.coef = w.to_vec();
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.coef.is_empty() {
            return Err(ForecastError::NotFitted("lasso"));
        }
        if x.ncols() != self.coef.len() {
            return Err(ForecastError::ShapeMismatch("lasso columns", self.coef.len(), x.ncols()));
        }
        Ok(x.dot(&Array1::from_vec(self.coef.clone())) + self.intercept)
    }
}

fn soft_threshold(v: f64, alpha: f64) -> f64 {
    if v > alpha {
        v - alpha
    } else if v < -alpha {
        v + alpha
    } else {
        0.0
    }
}

/// Fitted scores and mask of a [`LassoSelector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LassoFit {
    pub scores: Vec<f64>,
    pub support: Vec<bool>,
}

/// Embedded selection with the lasso.
///
/// With `n_resampling == 0` a single lasso is fitted on the labels and the
/// features with `|w| > threshold` are kept. Otherwise stability selection
/// is run: every resample fits a lasso on a random `sample_fraction` of the
/// rows with each feature rescaled by a random weight in `[scaling, 1]`, a
/// feature scores the fraction of resamples in which it had a non-zero
/// coefficient, and features scoring at least `threshold` are kept. The
/// best-scoring feature is always kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LassoSelector {
    pub alpha: f64,
    pub threshold: f64,
    pub n_resampling: usize,
    pub sample_fraction: f64,
    pub scaling: f64,
    pub seed: u64,
    pub fitted: Option<LassoFit>,
}

impl LassoSelector {
    fn validate(&self) -> Result<()> {
        if !(self.sample_fraction > 0.0 && self.sample_fraction <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "sample_fraction must be in (0, 1], got {}",
                self.sample_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.scaling) {
            return Err(ForecastError::InvalidParameter(format!(
                "scaling must be in [0, 1], got {}",
                self.scaling
            )));
        }
        Ok(())
    }

    fn stability_scores(&self, x: &Array2<f64>, target: &Array1<f64>) -> Result<Vec<f64>> {
        let (n_samples, n_features) = x.dim();
        let n_draw = ((n_samples as f64 * self.sample_fraction).round() as usize).clamp(2.min(n_samples), n_samples);

        let selected: Vec<Vec<bool>> = (0..self.n_resampling)
            .into_par_iter()
            .map(|r| -> Result<Vec<bool>> {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(r as u64));
                let mut rows = sample(&mut rng, n_samples, n_draw).into_vec();
                rows.sort_unstable();
                let weights: Vec<f64> = (0..n_features).map(|_| rng.gen_range(self.scaling..=1.0)).collect();

                let mut xs = x.select(Axis(0), &rows);
                for (mut col, w) in xs.axis_iter_mut(Axis(1)).zip(&weights) {
                    col *= *w;
                }
                let ys = target.select(Axis(0), &rows);

                let mut lasso = Lasso::new(self.alpha);
                lasso.fit(&xs, &ys)?;
                Ok(lasso.coef.iter().map(|c| *c != 0.0).collect())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut scores = vec![0.0f64; n_features];
        for run in &selected {
            for (s, &hit) in scores.iter_mut().zip(run) {
                if hit {
                    *s += 1.0;
                }
            }
        }
        let runs = self.n_resampling as f64;
        Ok(scores.into_iter().map(|s| s / runs).collect())
    }
}

impl FeatureSelector for LassoSelector {
    fn name(&self) -> &'static str {
        "lasso"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_xy(x.nrows(), y)?;
        self.validate()?;
        let target = Array1::from_iter(y.iter().map(|&l| l as f64));

        let (scores, support): (Vec<f64>, Vec<bool>) = if self.n_resampling == 0 {
            let mut lasso = Lasso::new(self.alpha);
            lasso.fit(x, &target)?;
            let scores: Vec<f64> = lasso.coef.iter().map(|c| c.abs()).collect();
            let support = scores.iter().map(|&s| s > self.threshold).collect();
            (scores, support)
        } else {
            let scores = self.stability_scores(x, &target)?;
            let support = scores.iter().map(|&s| s >= self.threshold && s > 0.0).collect();
            (scores, support)
        };

        let mut support = support;
        if !support.iter().any(|&s| s) {
            let best = top_k_indices(&scores, 1)[0];
            log::warn!(
                "lasso: no feature passed the threshold {}, keeping only feature {}",
                self.threshold,
                best
            );
            support[best] = true;
        }

        self.fitted = Some(LassoFit { scores, support });
        Ok(())
    }

    fn scores(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.scores.as_slice())
    }

    fn support(&self) -> Option<&[bool]> {
        self.fitted.as_ref().map(|f| f.support.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn regression_toy() -> (Array2<f64>, Array1<f64>) {
        // y = 3 * x0, x1 is unrelated
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [3.0, 0.4],
            [4.0, -0.2],
            [5.0, 0.1],
            [6.0, -0.4],
        ];
        let y = x.column(0).mapv(|v| 3.0 * v);
        (x, y)
    }

    #[test]
    fn zero_penalty_recovers_least_squares() {
        let (x, y) = regression_toy();
        let mut lasso = Lasso::new(0.0);
        lasso.max_iter = 10_000;
        lasso.tol = 1e-10;
        lasso.fit(&x, &y).unwrap();
        assert!((lasso.coef[0] - 3.0).abs() < 1e-4);
        assert!(lasso.coef[1].abs() < 1e-3);
        let pred = lasso.predict(&x).unwrap();
        assert!((pred[2] - 9.0).abs() < 1e-3);
    }

    #[test]
    fn large_penalty_zeroes_irrelevant_coefficients() {
        let (x, y) = regression_toy();
        let mut lasso = Lasso::new(1.0);
        lasso.fit(&x, &y).unwrap();
        assert!(lasso.coef[0] > 0.0);
        assert_eq!(lasso.coef[1], 0.0);

        let mut lasso = Lasso::new(1e6);
        lasso.fit(&x, &y).unwrap();
        assert!(lasso.coef.iter().all(|&c| c == 0.0));
        assert!((lasso.intercept - y.mean().unwrap()).abs() < 1e-9);
    }

    fn classification_toy() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.5, 1.0],
            [0.1, -0.5, 0.0],
            [0.2, 0.4, 1.0],
            [0.1, -0.3, 0.0],
            [1.0, 0.2, 1.0],
            [0.9, -0.2, 0.0],
            [1.1, 0.5, 1.0],
            [1.0, -0.4, 0.0],
        ];
        (x, vec![0, 0, 0, 0, 1, 1, 1, 1])
    }

    fn selector(n_resampling: usize) -> LassoSelector {
        LassoSelector {
            alpha: 0.05,
            threshold: 0.1,
            n_resampling,
            sample_fraction: 0.75,
            scaling: 0.5,
            seed: 123456,
            fitted: None,
        }
    }

    #[test]
    fn single_fit_keeps_informative_feature() {
        let (x, y) = classification_toy();
        let mut sel = selector(0);
        sel.fit(&x, &y).unwrap();
        let support = sel.support().unwrap();
        assert!(support[0]);
        assert!(!support[1]);
        assert!(!support[2]);
    }

    #[test]
    fn stability_scores_are_fractions_and_deterministic() {
        let (x, y) = classification_toy();
        let mut a = selector(20);
        let mut b = selector(20);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.fitted, b.fitted);
        let scores = a.scores().unwrap();
        assert!(scores.iter().all(|&s| (0.0..=1.0).contains(&s)));
        assert_eq!(scores[0], 1.0);
        assert!(a.support().unwrap()[0]);
    }

    #[test]
    fn falls_back_to_best_feature() {
        let (x, y) = classification_toy();
        let mut sel = selector(0);
        sel.alpha = 1e6;
        sel.fit(&x, &y).unwrap();
        assert_eq!(sel.support().unwrap().iter().filter(|&&s| s).count(), 1);
    }
}
