use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::feature_selection::{top_k_indices, FeatureSelector};

/// ReliefF feature weighting.
///
/// For every sample the `n_neighbors` nearest hits (same class) and misses
/// (other class) are found by Manhattan distance over range-normalised
/// features. A feature gains weight when it differs on misses and loses
/// weight when it differs on hits. The `n_features_to_keep` highest weighted
/// features form the support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliefF {
    pub n_neighbors: usize,
    pub n_features_to_keep: usize,
    pub feature_scores: Option<Vec<f64>>,
    /// Feature indices by decreasing score.
    pub top_features: Option<Vec<usize>>,
    support: Option<Vec<bool>>,
}

impl ReliefF {
    pub fn new(n_neighbors: usize, n_features_to_keep: usize) -> Self {
        ReliefF {
            n_neighbors,
            n_features_to_keep,
            feature_scores: None,
            top_features: None,
            support: None,
        }
    }
}

/// Columns rescaled by their range; constant columns become zero.
fn range_normalise(x: &Array2<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut col in out.axis_iter_mut(Axis(1)) {
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if range > 0.0 {
            col.mapv_inplace(|v| (v - min) / range);
        } else {
            col.fill(0.0);
        }
    }
    out
}

fn nearest(candidates: &mut Vec<(f64, usize)>, k: usize) -> Vec<usize> {
    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
    candidates.iter().take(k).map(|&(_, j)| j).collect()
}

impl FeatureSelector for ReliefF {
    fn name(&self) -> &'static str {
        "relieff"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_xy(x.nrows(), y)?;
        if self.n_neighbors == 0 || self.n_features_to_keep == 0 {
            return Err(ForecastError::InvalidParameter(
                "ReliefF needs at least one neighbour and one feature to keep".to_string(),
            ));
        }
        let xn = range_normalise(x);
        let (n_samples, n_features) = xn.dim();
        let k = self.n_neighbors;

        let contributions: Vec<Vec<f64>> = (0..n_samples)
            .into_par_iter()
            .map(|i| {
                let row = xn.row(i);
                let mut hits = Vec::new();
                let mut misses = Vec::new();
                for j in (0..n_samples).filter(|&j| j != i) {
                    let d: f64 = row.iter().zip(xn.row(j).iter()).map(|(a, b)| (a - b).abs()).sum();
                    if y[j] == y[i] {
                        hits.push((d, j));
                    } else {
                        misses.push((d, j));
                    }
                }

                let mut delta = vec![0.0f64; n_features];
                for (group, sign) in [(nearest(&mut hits, k), -1.0), (nearest(&mut misses, k), 1.0)] {
                    if group.is_empty() {
                        continue;
                    }
                    let w = sign / group.len() as f64;
                    for j in group {
                        for (f, (a, b)) in row.iter().zip(xn.row(j).iter()).enumerate() {
                            delta[f] += w * (a - b).abs();
                        }
                    }
                }
                delta
            })
            .collect();

        // summed in sample order so the result does not depend on the pool size
        let mut scores = vec![0.0f64; n_features];
        for delta in &contributions {
            for (s, d) in scores.iter_mut().zip(delta) {
                *s += d;
            }
        }
        for s in scores.iter_mut() {
            *s /= n_samples as f64;
        }

        let top = top_k_indices(&scores, n_features);
        let mut support = vec![false; n_features];
        for &i in top.iter().take(self.n_features_to_keep.min(n_features)) {
            support[i] = true;
        }

        self.feature_scores = Some(scores);
        self.top_features = Some(top);
        self.support = Some(support);
        Ok(())
    }

    fn scores(&self) -> Option<&[f64]> {
        self.feature_scores.as_deref()
    }

    fn support(&self) -> Option<&[bool]> {
        self.support.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn informative_plus_noise(n: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let label = i % 2;
            // feature 1 carries the label, 0 and 2 are noise
            data.push(rng.gen::<f64>());
            data.push(label as f64 * 2.0 + rng.gen::<f64>() * 0.5);
            data.push(rng.gen::<f64>());
            y.push(label);
        }
        (Array2::from_shape_vec((n, 3), data).unwrap(), y)
    }

    #[test]
    fn informative_feature_ranks_first() {
        let (x, y) = informative_plus_noise(40);
        let mut r = ReliefF::new(5, 1);
        r.fit(&x, &y).unwrap();
        assert_eq!(r.top_features.as_ref().unwrap()[0], 1);
        assert_eq!(r.support().unwrap(), &[false, true, false]);
        assert_eq!(r.transform(&x).unwrap().ncols(), 1);
    }

    #[test]
    fn keeps_all_features_when_asked_for_more() {
        let (x, y) = informative_plus_noise(10);
        let mut r = ReliefF::new(50, 2000);
        r.fit(&x, &y).unwrap();
        assert!(r.support().unwrap().iter().all(|&s| s));
    }

    #[test]
    fn constant_feature_scores_zero() {
        let mut x = informative_plus_noise(12).0;
        x.column_mut(2).fill(3.0);
        let y: Vec<usize> = (0..12).map(|i| i % 2).collect();
        let mut r = ReliefF::new(3, 2);
        r.fit(&x, &y).unwrap();
        assert_eq!(r.scores().unwrap()[2], 0.0);
    }
}
