//! Class re-balancing of training folds.
//!
//! Samplers only act while a pipeline is being fitted; prediction never
//! resamples. Returned data keeps the original rows first (for the
//! under-sampler: the kept original rows in their original order) followed
//! by the generated rows.
use ndarray::{Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::Sampling;
use crate::error::{check_xy, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Sampler {
    RandomUnder { seed: u64 },
    RandomOver { seed: u64 },
    Smote { k_neighbors: usize, seed: u64 },
}

impl Sampler {
    /// Sampler for a configured strategy; `Sampling::Raw` has none.
    pub fn from_strategy(sampling: Sampling, seed: u64) -> Option<Sampler> {
        match sampling {
            Sampling::Raw => None,
            Sampling::DownSample => Some(Sampler::RandomUnder { seed }),
            Sampling::UpSample => Some(Sampler::RandomOver { seed }),
            Sampling::SmoteSample => Some(Sampler::Smote { k_neighbors: 5, seed }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Sampler::RandomUnder { .. } => "down_sample",
            Sampler::RandomOver { .. } => "up_sample",
            Sampler::Smote { .. } => "smote_sample",
        }
    }

    pub fn fit_resample(&self, x: &Array2<f64>, y: &[usize]) -> Result<(Array2<f64>, Vec<usize>)> {
        check_xy(x.nrows(), y)?;
        let out = match *self {
            Sampler::RandomUnder { seed } => random_under_sample(x, y, seed),
            Sampler::RandomOver { seed } => random_over_sample(x, y, seed),
            Sampler::Smote { k_neighbors, seed } => smote(x, y, k_neighbors, seed),
        };
        log::debug!(
            "{}: resampled {} rows into {} rows",
            self.name(),
            y.len(),
            out.1.len()
        );
        Ok(out)
    }
}

fn class_indices(y: &[usize]) -> [Vec<usize>; 2] {
    let mut idx = [Vec::new(), Vec::new()];
    for (i, &l) in y.iter().enumerate() {
        idx[l].push(i);
    }
    idx
}

fn minority_majority(idx: &[Vec<usize>; 2]) -> (usize, usize) {
    // ties resolve to class 0 as majority
    if idx[1].len() < idx[0].len() {
        (1, 0)
    } else if idx[0].len() < idx[1].len() {
        (0, 1)
    } else {
        (1, 0)
    }
}

fn random_under_sample(x: &Array2<f64>, y: &[usize], seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let idx = class_indices(y);
    let (minority, majority) = minority_majority(&idx);
    let n_keep = idx[minority].len();

    let mut keep: Vec<usize> = idx[majority]
        .choose_multiple(&mut rng, n_keep)
        .cloned()
        .collect();
    keep.extend(idx[minority].iter().cloned());
    keep.sort_unstable();

    let y_out = keep.iter().map(|&i| y[i]).collect();
    (x.select(Axis(0), &keep), y_out)
}

fn random_over_sample(x: &Array2<f64>, y: &[usize], seed: u64) -> (Array2<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let idx = class_indices(y);
    let (minority, majority) = minority_majority(&idx);
    let n_extra = idx[majority].len() - idx[minority].len();

    let mut rows: Vec<usize> = (0..y.len()).collect();
    for _ in 0..n_extra {
        let pick = idx[minority][rng.gen_range(0..idx[minority].len())];
        rows.push(pick);
    }

    let y_out = rows.iter().map(|&i| y[i]).collect();
    (x.select(Axis(0), &rows), y_out)
}

fn squared_distance(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum()
}

fn smote(x: &Array2<f64>, y: &[usize], k_neighbors: usize, seed: u64) -> (Array2<f64>, Vec<usize>) {
    let idx = class_indices(y);
    let (minority, majority) = minority_majority(&idx);
    let members = &idx[minority];
    let n_extra = idx[majority].len() - members.len();

    if members.len() < 2 {
        log::warn!(
            "SMOTE needs at least 2 minority samples, found {}; falling back to random over-sampling",
            members.len()
        );
        return random_over_sample(x, y, seed);
    }

    let k = k_neighbors.max(1).min(members.len() - 1);

    // k nearest minority neighbours of every minority sample
    let neighbours: Vec<Vec<usize>> = members
        .iter()
        .map(|&i| {
            let row = x.row(i);
            let mut dists: Vec<(f64, usize)> = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(&row, &x.row(j)), j))
                .collect();
            dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));
            dists.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let n_features = x.ncols();
    let mut data = x.iter().cloned().collect::<Vec<f64>>();
    let mut y_out = y.to_vec();
    data.reserve(n_extra * n_features);

    for _ in 0..n_extra {
        let which = rng.gen_range(0..members.len());
        let base = x.row(members[which]);
        let nn = neighbours[which][rng.gen_range(0..neighbours[which].len())];
        let other = x.row(nn);
        let gap: f64 = rng.gen();
        data.extend(base.iter().zip(other.iter()).map(|(b, o)| b + gap * (o - b)));
        y_out.push(minority);
    }

    let rows = y_out.len();
    let x_out = Array2::from_shape_vec((rows, n_features), data)
        .unwrap_or_else(|_| unreachable!("rows and features are tracked together"));
    (x_out, y_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::class_counts;

    fn imbalanced() -> (Array2<f64>, Vec<usize>) {
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            data.extend([i as f64, 0.0]);
            y.push(0);
        }
        for i in 0..3 {
            data.extend([10.0 + i as f64, 5.0 + i as f64]);
            y.push(1);
        }
        (Array2::from_shape_vec((13, 2), data).unwrap(), y)
    }

    #[test]
    fn under_sampling_balances_to_minority() {
        let (x, y) = imbalanced();
        let (xs, ys) = Sampler::RandomUnder { seed: 123 }.fit_resample(&x, &y).unwrap();
        assert_eq!(class_counts(&ys), [3, 3]);
        assert_eq!(xs.nrows(), 6);
    }

    #[test]
    fn over_sampling_duplicates_minority_rows() {
        let (x, y) = imbalanced();
        let (xs, ys) = Sampler::RandomOver { seed: 456 }.fit_resample(&x, &y).unwrap();
        assert_eq!(class_counts(&ys), [10, 10]);
        for r in 13..xs.nrows() {
            assert!(xs[(r, 0)] >= 10.0);
        }
        // original rows come first and untouched
        assert_eq!(xs.row(0), x.row(0));
    }

    #[test]
    fn smote_points_stay_in_minority_hull() {
        let (x, y) = imbalanced();
        let (xs, ys) = Sampler::Smote { k_neighbors: 5, seed: 789 }.fit_resample(&x, &y).unwrap();
        assert_eq!(class_counts(&ys), [10, 10]);
        for r in 13..xs.nrows() {
            assert!(xs[(r, 0)] >= 10.0 && xs[(r, 0)] <= 12.0);
            assert!(xs[(r, 1)] >= 5.0 && xs[(r, 1)] <= 7.0);
        }
    }

    #[test]
    fn resampling_is_deterministic() {
        let (x, y) = imbalanced();
        let s = Sampler::Smote { k_neighbors: 2, seed: 1 };
        assert_eq!(s.fit_resample(&x, &y).unwrap(), s.fit_resample(&x, &y).unwrap());
    }
}
