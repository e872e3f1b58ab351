//! Imputation and standardization steps that open every pipeline.
//!
//! Both steps learn per-column statistics from the training matrix only and
//! apply them unchanged to validation and test matrices.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Replaces missing (NaN) cells with the training mean of their column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    pub means: Vec<f64>,
}

impl MeanImputer {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ForecastError::EmptyData("imputer requires a non-empty matrix"));
        }
        let means = x
            .axis_iter(Axis(1))
            .map(|col| {
                let (sum, n) = col
                    .iter()
                    .filter(|v| !v.is_nan())
                    .fold((0.0, 0usize), |(s, n), &v| (s + v, n + 1));
                // a column without a single observation imputes to zero
                if n == 0 {
                    0.0
                } else {
                    sum / n as f64
                }
            })
            .collect();
        Ok(MeanImputer { means })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.means.len() {
            return Err(ForecastError::ShapeMismatch("imputer columns", self.means.len(), x.ncols()));
        }
        let mut out = x.to_owned();
        for (mut col, &mean) in out.axis_iter_mut(Axis(1)).zip(self.means.iter()) {
            col.mapv_inplace(|v| if v.is_nan() { mean } else { v });
        }
        Ok(out)
    }
}

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-12;

    /// Fit a `Scaler` where rows are samples and columns are features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let (nrows, ncols) = x.dim();
        if nrows == 0 || ncols == 0 {
            return Err(ForecastError::EmptyData("scaler requires a non-empty matrix"));
        }

        let nrows_f = nrows as f64;
        let mut mean = vec![0.0f64; ncols];
        let mut std = vec![0.0f64; ncols];
        for (c, col) in x.axis_iter(Axis(1)).enumerate() {
            let m = col.sum() / nrows_f;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / nrows_f;
            mean[c] = m;
            // constant columns are only centered
            std[c] = if var.sqrt() < Self::MIN_STD { 1.0 } else { var.sqrt() };
        }

        Ok(Scaler { mean, std })
    }

    /// Transform all rows and return a new matrix.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(ForecastError::ShapeMismatch("scaler columns", self.mean.len(), x.ncols()));
        }
        let mut out = x.to_owned();
        for (c, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.mean[c], self.std[c]);
            col.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }

    pub fn fit_transform(x: &Array2<f64>) -> Result<(Self, Array2<f64>)> {
        let sc = Self::fit(x)?;
        let out = sc.transform(x)?;
        Ok((sc, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn imputer_uses_observed_mean() {
        let x = array![[1.0, f64::NAN], [3.0, f64::NAN], [f64::NAN, f64::NAN]];
        let imp = MeanImputer::fit(&x).unwrap();
        assert_eq!(imp.means, vec![2.0, 0.0]);
        let t = imp.transform(&x).unwrap();
        assert_eq!(t, array![[1.0, 0.0], [3.0, 0.0], [2.0, 0.0]]);
    }

    #[test]
    fn scaler_standardizes_and_keeps_constant_columns_finite() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0], [4.0, 5.0]];
        let (sc, t) = Scaler::fit_transform(&x).unwrap();
        assert!((sc.mean[0] - 2.5).abs() < 1e-12);
        let col0 = t.column(0);
        assert!(col0.sum().abs() < 1e-12);
        let var = col0.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((var - 1.0).abs() < 1e-12);
        assert!(t.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn transform_rejects_wrong_width() {
        let sc = Scaler::fit(&array![[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert!(sc.transform(&array![[1.0]]).is_err());
    }
}
