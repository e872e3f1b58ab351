//! Univariate feature selection methods following scikit-learn's API.
//!
//! See: https://scikit-learn.org/stable/modules/feature_selection.html#univariate-feature-selection

use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::{check_xy, ForecastError, Result};
use crate::feature_selection::{top_k_indices, FeatureSelector};

/// Compute row-wise (squared) Euclidean norms of a 2D array.
///
/// # Examples
///
/// ```rust
/// use forecast_classifiers::feature_selection::univariate_selection::row_norms;
/// use ndarray::array;
///
/// let norms = row_norms(&array![[3.0, 4.0], [1.0, 0.0]], false);
/// assert_eq!(norms.to_vec(), vec![5.0, 1.0]);
/// ```
pub fn row_norms<S>(x: &ArrayBase<S, Ix2>, squared: bool) -> Array1<f64>
where
    S: Data<Elem = f64>,
{
    let mut norms = Array1::zeros(x.nrows());

    for (i, row) in x.axis_iter(Axis(0)).enumerate() {
        let sum_of_squares: f64 = row.iter().map(|&val| val.powi(2)).sum();
        norms[i] = if squared {
            sum_of_squares
        } else {
            sum_of_squares.sqrt()
        };
    }

    norms
}

/// Compute Pearson's r between each feature and the target.
///
/// # Parameters
///
/// * `x` - (n_samples, n_features) data matrix.
/// * `y` - (n_samples,) target vector.
/// * `center` - subtract the means of `x` and `y` first.
/// * `force_finite` - replace non-finite coefficients (constant features) with 0.
pub fn r_regression(x: &Array2<f64>, y: &Array1<f64>, center: bool, force_finite: bool) -> Array1<f64> {
    let n_samples = x.nrows() as f64;
    let n_features = x.ncols();

    let mut y_centered = y.to_owned();
    let mut x_means = Array1::zeros(n_features);

    let x_norms = if center {
        let y_mean = y.mean().unwrap_or(0.0);
        y_centered -= y_mean;

        for (i, col) in x.columns().into_iter().enumerate() {
            x_means[i] = col.mean().unwrap_or(0.0);
        }

        // scaled standard deviations via moments
        let x_squared_norms = row_norms(&x.t(), true);
        (&x_squared_norms - &(n_samples * &x_means.mapv(|m: f64| m.powi(2))))
            .mapv(|v: f64| v.max(0.0).sqrt())
    } else {
        row_norms(&x.t(), false)
    };

    let mut correlation_coefficient = Array1::zeros(n_features);
    for (i, col) in x.columns().into_iter().enumerate() {
        let centered_col = col.mapv(|v| v - x_means[i]);
        correlation_coefficient[i] = centered_col.dot(&y_centered);
    }

    let y_norm = y_centered.dot(&y_centered).sqrt();

    correlation_coefficient /= &x_norms;
    correlation_coefficient /= y_norm;

    if force_finite {
        correlation_coefficient.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
    }

    correlation_coefficient
}

/// Replace infinite statistics by `f64::MAX` (p = 0) and NaN by 0 (p = 1).
fn force_finite_stats(f_statistic: &mut Array1<f64>, p_values: &mut Array1<f64>) {
    for i in 0..f_statistic.len() {
        if f_statistic[i].is_infinite() {
            f_statistic[i] = f64::MAX;
            p_values[i] = 0.0;
        } else if f_statistic[i].is_nan() {
            f_statistic[i] = 0.0;
            p_values[i] = 1.0;
        }
    }
}

fn f_survival(f_statistic: &Array1<f64>, df_num: f64, df_den: f64) -> Result<Array1<f64>> {
    let f_dist = FisherSnedecor::new(df_num, df_den).map_err(|e| {
        ForecastError::InvalidParameter(format!(
            "F distribution with ({}, {}) degrees of freedom: {}",
            df_num, df_den, e
        ))
    })?;
    Ok(f_statistic.mapv(|f| if f.is_finite() { 1.0 - f_dist.cdf(f) } else { f64::NAN }))
}

/// Univariate linear regression tests returning F-statistic and p-values.
pub fn f_regression(
    x: &Array2<f64>,
    y: &Array1<f64>,
    center: bool,
    force_finite: bool,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let correlation_coefficient = r_regression(x, y, center, force_finite);
    let deg_of_freedom = y.len() as f64 - if center { 2.0 } else { 1.0 };
    if deg_of_freedom <= 0.0 {
        return Err(ForecastError::EmptyData("f_regression needs more samples than parameters"));
    }

    let corr_coef_squared = correlation_coefficient.mapv(|x| x.powi(2));
    let mut f_statistic = &corr_coef_squared / &(1.0 - &corr_coef_squared) * deg_of_freedom;
    let mut p_values = f_survival(&f_statistic, 1.0, deg_of_freedom)?;

    if force_finite {
        force_finite_stats(&mut f_statistic, &mut p_values);
    }

    Ok((f_statistic, p_values))
}

/// One-way ANOVA F-test between the two classes, per feature.
///
/// Constant features get F = 0 and p = 1; features that separate the classes
/// with zero within-class variance get `f64::MAX` and p = 0.
pub fn f_classif(x: &Array2<f64>, y: &[usize]) -> Result<(Array1<f64>, Array1<f64>)> {
    check_xy(x.nrows(), y)?;
    let n = y.len() as f64;
    let n_classes = 2.0;
    let df_between = n_classes - 1.0;
    let df_within = n - n_classes;
    if df_within <= 0.0 {
        return Err(ForecastError::EmptyData("f_classif needs at least 3 samples"));
    }

    let counts = crate::data_handling::class_counts(y);
    let mut f_statistic = Array1::zeros(x.ncols());

    for (j, col) in x.axis_iter(Axis(1)).enumerate() {
        let mut sums = [0.0f64; 2];
        for (&v, &l) in col.iter().zip(y) {
            sums[l] += v;
        }
        let grand_mean = (sums[0] + sums[1]) / n;
        let class_means = [sums[0] / counts[0] as f64, sums[1] / counts[1] as f64];

        let ss_between: f64 = (0..2)
            .map(|k| counts[k] as f64 * (class_means[k] - grand_mean).powi(2))
            .sum();
        let ss_within: f64 = col
            .iter()
            .zip(y)
            .map(|(&v, &l)| (v - class_means[l]).powi(2))
            .sum();

        f_statistic[j] = (ss_between / df_between) / (ss_within / df_within);
    }

    let mut p_values = f_survival(&f_statistic, df_between, df_within)?;
    force_finite_stats(&mut f_statistic, &mut p_values);
    Ok((f_statistic, p_values))
}

/// Scoring function of the univariate selectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoreFunc {
    /// ANOVA F-value between label and feature.
    FClassif,
    /// F-value of a univariate linear regression against the label.
    FRegression,
}

impl ScoreFunc {
    pub fn score(&self, x: &Array2<f64>, y: &[usize]) -> Result<(Array1<f64>, Array1<f64>)> {
        match self {
            ScoreFunc::FClassif => f_classif(x, y),
            ScoreFunc::FRegression => {
                check_xy(x.nrows(), y)?;
                let target = Array1::from_iter(y.iter().map(|&l| l as f64));
                f_regression(x, &target, true, true)
            }
        }
    }
}

/// Fitted state shared by the univariate selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnivariateFit {
    pub scores: Vec<f64>,
    pub pvalues: Vec<f64>,
    pub support: Vec<bool>,
}

impl UnivariateFit {
    fn from_scores(scores: Array1<f64>, pvalues: Array1<f64>, k: usize) -> Self {
        let scores = scores.to_vec();
        let mut support = vec![false; scores.len()];
        for i in top_k_indices(&scores, k) {
            support[i] = true;
        }
        UnivariateFit {
            scores,
            pvalues: pvalues.to_vec(),
            support,
        }
    }
}

/// Selects the k features with the highest scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectKBest {
    /// The number of top features to select.
    pub k: usize,
    pub score_func: ScoreFunc,
    pub fitted: Option<UnivariateFit>,
}

impl SelectKBest {
    pub fn new(k: usize, score_func: ScoreFunc) -> Self {
        SelectKBest {
            k,
            score_func,
            fitted: None,
        }
    }

    /// Indices of the selected features, best first.
    pub fn selected_indices(&self) -> Option<Vec<usize>> {
        self.fitted.as_ref().map(|f| top_k_indices(&f.scores, self.k))
    }
}

impl FeatureSelector for SelectKBest {
    fn name(&self) -> &'static str {
        "select_k_best"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        if self.k == 0 {
            return Err(ForecastError::InvalidParameter("k must be at least 1".to_string()));
        }
        let (scores, pvalues) = self.score_func.score(x, y)?;
        self.fitted = Some(UnivariateFit::from_scores(scores, pvalues, self.k));
        Ok(())
    }

    fn scores(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|f| f.scores.as_slice())
    }

    fn support(&self) -> Option<&[bool]> {
        self.fitted.as_ref().map(|f| f.support.as_slice())
    }
}

/// Selects the highest scoring `percentile` percent of the features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPercentile {
    pub percentile: f64,
    pub score_func: ScoreFunc,
    pub fitted: Option<UnivariateFit>,
}

impl SelectPercentile {
    pub fn new(percentile: f64, score_func: ScoreFunc) -> Self {
        SelectPercentile {
            percentile,
            score_func,
            fitted: None,
        }
    }

    /// Number of features kept out of `n_features`; never fewer than one.
    pub fn n_to_keep(&self, n_features: usize) -> usize {
        let k = (n_features as f64 * self.percentile / 100.0).floor() as usize;
        k.clamp(1, n_features.max(1))
    }
}

impl FeatureSelector for SelectPercentile {
    fn name(&self) -> &'static str {
        "anova"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "percentile must be in (0, 100], got {}",
                self.percentile
            )));
        }
        let (scores, pvalues) = self.score_func.score(x, y)?;
        let k = self.n_to_keep(x.ncols());
        log::debug!("anova: keeping {} of {} features", k, x.ncols());
        self.fitted = Some(UnivariateFit::from_scores(scores, pvalues, k));
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
    use ndarray::{array, Array1, Array2};

    fn toy() -> (Array2<f64>, Vec<usize>) {
        // Features: [trend, collinear with target, constant, collinear with feature 0, noise]
        let x = Array2::from_shape_vec((10, 5), vec![
            0.1,  1.0, 5.0,  0.2, -0.3,
            0.4, -1.0, 5.0,  0.8,  0.1,
            0.6,  1.0, 5.0,  1.2,  0.2,
            0.9, -1.0, 5.0,  1.8, -0.1,
            1.2,  1.0, 5.0,  2.4,  0.3,
            1.5, -1.0, 5.0,  3.0,  0.0,
            1.8,  1.0, 5.0,  3.6, -0.2,
            2.1, -1.0, 5.0,  4.2,  0.4,
            2.4,  1.0, 5.0,  4.8, -0.1,
            2.7, -1.0, 5.0,  5.4,  0.2,
        ]).unwrap();
        let y = vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1];
        (x, y)
    }

    #[test]
    fn test_select_k_best() {
        let (x, y) = toy();
        let mut selector = SelectKBest::new(3, ScoreFunc::FRegression);
        selector.fit(&x, &y).unwrap();
        let selected_indices = selector.selected_indices().unwrap();

        assert_eq!(selected_indices.len(), 3);
        assert!(selected_indices.iter().all(|&idx| idx < 5));
        assert!(selected_indices.iter().collect::<std::collections::HashSet<_>>().len() == 3);

        // perfectly correlated with the target
        assert_eq!(selected_indices[0], 1);
        // constant
        assert!(!selected_indices.contains(&2));
    }

    #[test]
    fn r_regression_of_collinear_feature_is_one() {
        let x = array![[1.0, 3.0], [2.0, 3.0], [3.0, 3.0]];
        let y = Array1::from_vec(vec![2.0, 4.0, 6.0]);
        let r = r_regression(&x, &y, true, true);
        assert!((r[0] - 1.0).abs() < 1e-12);
        assert_eq!(r[1], 0.0);
    }

    #[test]
    fn f_classif_prefers_informative_feature() {
        let x = array![
            [0.0, 0.3],
            [0.2, 0.9],
            [0.1, 0.1],
            [1.0, 0.2],
            [1.1, 0.8],
            [0.9, 0.4],
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let (f, p) = f_classif(&x, &y).unwrap();
        assert!(f[0] > f[1]);
        assert!(p[0] < 0.01);
        assert!(p[1] > 0.5);
    }

    #[test]
    fn f_classif_constant_feature_scores_zero() {
        let (x, y) = toy();
        let (f, p) = f_classif(&x, &y).unwrap();
        assert_eq!(f[2], 0.0);
        assert_eq!(p[2], 1.0);
        // perfect separation with no within-class variance
        assert_eq!(f[1], f64::MAX);
        assert_eq!(p[1], 0.0);
    }

    #[test]
    fn select_percentile_keeps_at_least_one() {
        let (x, y) = toy();
        let mut sel = SelectPercentile::new(10.0, ScoreFunc::FClassif);
        assert_eq!(sel.n_to_keep(5), 1);
        assert_eq!(sel.n_to_keep(2000), 200);
        sel.fit(&x, &y).unwrap();
        assert_eq!(sel.support().unwrap(), &[false, true, false, false, false]);
        let reduced = sel.transform(&x).unwrap();
        assert_eq!(reduced.ncols(), 1);
        assert_eq!(reduced.column(0), x.column(1));
    }

    #[test]
    fn unfitted_selector_refuses_to_transform() {
        let (x, _) = toy();
        let sel = SelectPercentile::new(10.0, ScoreFunc::FClassif);
        assert_eq!(sel.transform(&x), Err(ForecastError::NotFitted("anova")));
    }
}
