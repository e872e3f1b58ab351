pub mod classifier_trait;
pub mod factory;
pub mod knn;
pub mod random_forest;
pub mod svm;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ClassifierType;
use crate::error::Result;
use classifier_trait::ClassifierModel;
use knn::Knn;
use random_forest::RandomForest;
use svm::LinearSvm;

/// The classifier stage of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Classifier {
    LinearSvm(LinearSvm),
    Rf(RandomForest),
    Knn(Knn),
}

impl Classifier {
    pub fn classifier_type(&self) -> ClassifierType {
        match self {
            Classifier::LinearSvm(_) => ClassifierType::LinearSvm,
            Classifier::Rf(_) => ClassifierType::Rf,
            Classifier::Knn(_) => ClassifierType::Knn,
        }
    }

    /// Current value of the tuned hyper-parameter.
    pub fn param(&self) -> f64 {
        match self {
            Classifier::LinearSvm(m) => m.c,
            Classifier::Rf(m) => m.n_estimators as f64,
            Classifier::Knn(m) => m.n_neighbors as f64,
        }
    }

    /// Unfitted copy with the tuned hyper-parameter replaced.
    pub fn with_param(&self, value: f64) -> Classifier {
        match self {
            Classifier::LinearSvm(m) => Classifier::LinearSvm(LinearSvm {
                c: value,
                fitted: None,
                ..m.clone()
            }),
            Classifier::Rf(m) => Classifier::Rf(RandomForest {
                n_estimators: value as usize,
                fitted: None,
                ..m.clone()
            }),
            Classifier::Knn(_) => Classifier::Knn(Knn::new(value as usize)),
        }
    }

    fn inner(&self) -> &dyn ClassifierModel {
        match self {
            Classifier::LinearSvm(m) => m,
            Classifier::Rf(m) => m,
            Classifier::Knn(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ClassifierModel {
        match self {
            Classifier::LinearSvm(m) => m,
            Classifier::Rf(m) => m,
            Classifier::Knn(m) => m,
        }
    }
}

impl ClassifierModel for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        self.inner().predict(x)
    }

    fn feature_weights(&self) -> Option<Vec<f64>> {
        self.inner().feature_weights()
    }

    fn name(&self) -> &'static str {
        self.inner().name()
    }
}
