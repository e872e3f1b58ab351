use linfa::dataset::Pr;
use linfa::traits::Predict;
use linfa::Dataset;
use linfa_svm::{Svm, SvmParams};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// A trained linfa model plus the primal hyperplane read back from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmFit {
    pub model: Svm<f64, Pr>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

/// Linear support vector machine trained with linfa-svm.
///
/// With `balanced` the penalty of each class is scaled by
/// `n_samples / (2 * n_class)`. Positive decision values predict class 1;
/// probabilities are linfa's Platt outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    pub c: f64,
    pub balanced: bool,
    pub eps: f64,
    pub fitted: Option<SvmFit>,
}

impl LinearSvm {
    pub fn new(c: f64) -> Self {
        LinearSvm {
            c,
            balanced: true,
            eps: 1e-7,
            fitted: None,
        }
    }

    fn fit_ref(&self) -> Result<&SvmFit> {
        self.fitted.as_ref().ok_or(ForecastError::NotFitted("linear_svm"))
    }

    fn check_columns(&self, x: &Array2<f64>) -> Result<&SvmFit> {
        let fit = self.fit_ref()?;
        if x.ncols() != fit.coef.len() {
            return Err(ForecastError::ShapeMismatch("linear_svm columns", fit.coef.len(), x.ncols()));
        }
        Ok(fit)
    }

    /// `(c_pos, c_neg)` handed to linfa's `pos_neg_weights`.
    fn class_weights(&self, y: &[usize]) -> (f64, f64) {
        if !self.balanced {
            return (self.c, self.c);
        }
        let counts = crate::data_handling::class_counts(y);
        let n = y.len() as f64;
        (
            self.c * n / (2.0 * counts[1] as f64),
            self.c * n / (2.0 * counts[0] as f64),
        )
    }

    /// Signed distance to the separating hyperplane (up to scale).
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let fit = self.check_columns(x)?;
        let w = ArrayView1::from(fit.coef.as_slice());
        Ok(x.dot(&w) + fit.intercept)
    }
}

impl ClassifierModel for LinearSvm {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_xy(x.nrows(), y)?;
        if !(self.c > 0.0) {
            return Err(ForecastError::InvalidParameter(format!("C must be positive, got {}", self.c)));
        }
        let n_features = x.ncols();

        let (c_pos, c_neg) = self.class_weights(y);
        let targets = Array1::from_iter(y.iter().map(|&l| l == 1));
        let dataset = Dataset::new(x.to_owned(), targets);

        let params: SvmParams<f64, Pr> = Svm::<f64, Pr>::params()
            .eps(self.eps)
            .pos_neg_weights(c_pos, c_neg)
            .linear_kernel();
        let model = <SvmParams<f64, Pr> as linfa::traits::Fit<_, _, _>>::fit(&params, &dataset)
            .map_err(|e| ForecastError::InvalidParameter(format!("linear_svm (C={}): {}", self.c, e)))?;

        // the linear hyperplane evaluated on unit vectors gives the primal weights
        let mut unit = Array1::<f64>::zeros(n_features);
        let coef = (0..n_features)
            .map(|j| {
                unit[j] = 1.0;
                let w = model.weighted_sum(&unit);
                unit[j] = 0.0;
                w
            })
            .collect();
        log::debug!(
            "linear_svm (C={}) fitted with {} support vectors",
            self.c,
            model.nsupport()
        );

        self.fitted = Some(SvmFit {
            intercept: -model.rho,
            coef,
            model,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fit = self.check_columns(x)?;
        let predictions = fit.model.predict(x.to_owned());
        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, p) in predictions.targets().iter().enumerate() {
            let p1 = **p as f64;
            proba[(i, 0)] = 1.0 - p1;
            proba[(i, 1)] = p1;
        }
        Ok(proba)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(self
            .decision_function(x)?
            .iter()
            .map(|&f| if f > 0.0 { 1 } else { 0 })
            .collect())
    }

    fn feature_weights(&self) -> Option<Vec<f64>> {
        self.fitted.as_ref().map(|f| f.coef.clone())
    }

    fn name(&self) -> &'static str {
        "linear_svm"
    }
}
