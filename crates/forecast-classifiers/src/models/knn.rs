use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// k-nearest-neighbours classifier with a brute-force Euclidean search and a
/// uniform vote. Equally distant neighbours are taken in training order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knn {
    pub n_neighbors: usize,
    pub train_x: Option<Vec<Vec<f64>>>,
    pub train_y: Vec<usize>,
}

impl Knn {
    pub fn new(n_neighbors: usize) -> Self {
        Knn {
            n_neighbors,
            train_x: None,
            train_y: Vec::new(),
        }
    }

    /// Indices of the `n_neighbors` training rows closest to `query`.
    pub fn kneighbors(&self, query: &ArrayView1<f64>) -> Result<Vec<usize>> {
        let train = self.train_x.as_ref().ok_or(ForecastError::NotFitted("knn"))?;
        let mut dists: Vec<(f64, usize)> = train
            .iter()
            .enumerate()
            .map(|(j, row)| {
                let d: f64 = row.iter().zip(query.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                (d, j)
            })
            .collect();
        dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
        Ok(dists.into_iter().take(self.n_neighbors).map(|(_, j)| j).collect())
    }
}

impl ClassifierModel for Knn {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_xy(x.nrows(), y)?;
        if self.n_neighbors == 0 {
            return Err(ForecastError::InvalidParameter("n_neighbors must be at least 1".to_string()));
        }
        if self.n_neighbors > x.nrows() {
            return Err(ForecastError::InvalidParameter(format!(
                "n_neighbors={} exceeds the {} training samples",
                self.n_neighbors,
                x.nrows()
            )));
        }
        self.train_x = Some(x.rows().into_iter().map(|r| r.to_vec()).collect());
        self.train_y = y.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let train = self.train_x.as_ref().ok_or(ForecastError::NotFitted("knn"))?;
        let width = train.first().map_or(0, |r| r.len());
        if x.ncols() != width {
            return Err(ForecastError::ShapeMismatch("knn columns", width, x.ncols()));
        }

        let fractions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| -> Result<f64> {
                let neighbours = self.kneighbors(&x.row(i))?;
                let ones = neighbours.iter().filter(|&&j| self.train_y[j] == 1).count();
                Ok(ones as f64 / neighbours.len() as f64)
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, p1) in fractions.into_iter().enumerate() {
            proba[(i, 0)] = 1.0 - p1;
            proba[(i, 1)] = p1;
        }
        Ok(proba)
    }

    fn name(&self) -> &'static str {
        "knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn one_neighbour_memorises_training_set() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [5.0, 5.0], [5.0, 6.0]];
        let y = vec![0, 0, 1, 1];
        let mut knn = Knn::new(1);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&x).unwrap(), y);
    }

    #[test]
    fn probabilities_are_neighbour_fractions() {
        let x = array![[0.0], [1.0], [2.0], [10.0]];
        let y = vec![0, 1, 1, 1];
        let mut knn = Knn::new(3);
        knn.fit(&x, &y).unwrap();
        let proba = knn.predict_proba(&array![[0.4]]).unwrap();
        assert!((proba[(0, 1)] - 2.0 / 3.0).abs() < 1e-12);
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn vote_ties_go_to_class_zero() {
        let x = array![[0.0], [2.0]];
        let y = vec![0, 1];
        let mut knn = Knn::new(2);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.predict(&array![[1.9]]).unwrap(), vec![0]);
    }

    #[test]
    fn too_many_neighbours_is_an_error() {
        let mut knn = Knn::new(5);
        assert!(knn.fit(&array![[0.0], [1.0]], &[0, 1]).is_err());
    }
}
