use ndarray::Array2;

use crate::error::Result;

/// Contract shared by the binary classifiers of the experiment pipelines.
///
/// Labels are class ids 0 and 1. Probabilities come back as an
/// `n_samples x 2` matrix whose column `k` is the probability of class `k`.
pub trait ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predicted class ids; ties in probability go to class 0.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .rows()
            .into_iter()
            .map(|p| if p[1] > p[0] { 1 } else { 0 })
            .collect())
    }

    /// Per-feature weights of the fitted model: signed coefficients for
    /// linear models, impurity importances for forests, `None` otherwise.
    fn feature_weights(&self) -> Option<Vec<f64>> {
        None
    }

    /// Human readable name, also the pipeline step name.
    fn name(&self) -> &'static str;
}
