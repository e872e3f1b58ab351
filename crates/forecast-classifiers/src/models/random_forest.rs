use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::models::classifier_trait::ClassifierModel;

const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        /// Weighted class fractions `[p0, p1]`.
        proba: [f64; 2],
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART classification tree with weighted Gini impurity. Samples with
/// `x[feature] <= threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn predict_row(&self, row: &[f64]) -> [f64; 2] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return *proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn gini(w: [f64; 2]) -> f64 {
    let total = w[0] + w[1];
    if total <= 0.0 {
        return 0.0;
    }
    let (p0, p1) = (w[0] / total, w[1] / total);
    1.0 - p0 * p0 - p1 * p1
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    weights: &'a [f64],
    max_features: usize,
    min_samples_split: usize,
    max_depth: Option<usize>,
    nodes: Vec<Node>,
    /// Weighted impurity decrease per feature.
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl<'a> TreeBuilder<'a> {
    fn class_weights(&self, samples: &[usize]) -> [f64; 2] {
        let mut w = [0.0; 2];
        for &i in samples {
            w[self.y[i]] += self.weights[i];
        }
        w
    }

    fn best_split(&self, samples: &[usize], parent: [f64; 2], rng: &mut StdRng) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let parent_total = parent[0] + parent[1];
        let parent_impurity = gini(parent) * parent_total;

        let mut best: Option<BestSplit> = None;
        let mut sorted = samples.to_vec();

        for feature in sample(rng, n_features, self.max_features).into_iter() {
            sorted.sort_by(|&a, &b| {
                self.x[(a, feature)]
                    .partial_cmp(&self.x[(b, feature)])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left = [0.0f64; 2];
            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                left[self.y[i]] += self.weights[i];
                let here = self.x[(i, feature)];
                let next = self.x[(sorted[pos + 1], feature)];
                if next <= here {
                    continue;
                }
                let right = [parent[0] - left[0], parent[1] - left[1]];
                let (wl, wr) = (left[0] + left[1], right[0] + right[1]);
                if wl <= 0.0 || wr <= 0.0 {
                    continue;
                }
                let decrease = parent_impurity - gini(left) * wl - gini(right) * wr;
                if decrease > MIN_IMPURITY_DECREASE && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                    let mut threshold = here / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some(BestSplit {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }

    fn build(&mut self, samples: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let class_w = self.class_weights(&samples);
        let total = class_w[0] + class_w[1];
        let id = self.nodes.len();
        let leaf = Node::Leaf {
            proba: if total > 0.0 {
                [class_w[0] / total, class_w[1] / total]
            } else {
                [0.5, 0.5]
            },
        };
        self.nodes.push(leaf);

        let pure = class_w[0] <= 0.0 || class_w[1] <= 0.0;
        let too_deep = self.max_depth.map_or(false, |d| depth >= d);
        if pure || too_deep || samples.len() < self.min_samples_split {
            return id;
        }

        let split = match self.best_split(&samples, class_w, rng) {
            Some(s) => s,
            None => return id,
        };
        self.importances[split.feature] += split.decrease;

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[(i, split.feature)] <= split.threshold);

        let left = self.build(left_samples, depth + 1, rng);
        let right = self.build(right_samples, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }
}

/// Fitted trees and forest-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestFit {
    pub trees: Vec<DecisionTree>,
    /// Mean decrease in impurity, normalised to sum to one.
    pub importances: Vec<f64>,
    pub oob_score: Option<f64>,
    pub n_features: usize,
}

/// Random forest of CART trees grown on bootstrap samples.
///
/// Every tree draws its bootstrap sample and its candidate features from a
/// `StdRng` seeded with `seed + tree index`, so a fit is reproducible
/// whatever the size of the rayon pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub bootstrap: bool,
    pub balanced: bool,
    pub oob_score: bool,
    pub seed: u64,
    pub fitted: Option<ForestFit>,
}

impl RandomForest {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        RandomForest {
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            bootstrap: true,
            balanced: true,
            oob_score: true,
            seed,
            fitted: None,
        }
    }

    fn fit_ref(&self) -> Result<&ForestFit> {
        self.fitted.as_ref().ok_or(ForecastError::NotFitted("rf"))
    }

    pub fn oob_score(&self) -> Option<f64> {
        self.fitted.as_ref().and_then(|f| f.oob_score)
    }
}

/// `max(1, floor(sqrt(n_features)))` candidate features per split.
fn sqrt_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

impl ClassifierModel for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        check_xy(x.nrows(), y)?;
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter("n_estimators must be at least 1".to_string()));
        }
        let (n_samples, n_features) = x.dim();
        let counts = crate::data_handling::class_counts(y);
        let class_weight: [f64; 2] = if self.balanced {
            [
                n_samples as f64 / (2.0 * counts[0] as f64),
                n_samples as f64 / (2.0 * counts[1] as f64),
            ]
        } else {
            [1.0, 1.0]
        };
        let max_features = sqrt_features(n_features);

        let grown: Vec<(DecisionTree, Vec<f64>, Vec<bool>)> = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(t as u64));
                let mut draws = vec![0usize; n_samples];
                if self.bootstrap {
                    for _ in 0..n_samples {
                        draws[rng.gen_range(0..n_samples)] += 1;
                    }
                } else {
                    draws.iter_mut().for_each(|d| *d = 1);
                }
                let weights: Vec<f64> = draws
                    .iter()
                    .zip(y)
                    .map(|(&d, &l)| d as f64 * class_weight[l])
                    .collect();
                let in_bag: Vec<usize> = (0..n_samples).filter(|&i| draws[i] > 0).collect();

                let mut builder = TreeBuilder {
                    x,
                    y,
                    weights: &weights,
                    max_features,
                    min_samples_split: self.min_samples_split,
                    max_depth: self.max_depth,
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                };
                builder.build(in_bag, 0, &mut rng);

                let out_of_bag = draws.iter().map(|&d| d == 0).collect();
                (DecisionTree { nodes: builder.nodes }, builder.importances, out_of_bag)
            })
            .collect();

        // per-tree normalised importances averaged over trees that split
        let mut importances = vec![0.0f64; n_features];
        let mut splitting_trees = 0usize;
        for (_, tree_imp, _) in &grown {
            let total: f64 = tree_imp.iter().sum();
            if total > 0.0 {
                splitting_trees += 1;
                for (acc, v) in importances.iter_mut().zip(tree_imp) {
                    *acc += v / total;
                }
            }
        }
        let imp_total: f64 = importances.iter().sum();
        if splitting_trees > 0 && imp_total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= imp_total);
        }

        let oob_score = if self.oob_score && self.bootstrap {
            let mut votes = vec![[0.0f64; 2]; n_samples];
            for (tree, _, oob) in &grown {
                for i in (0..n_samples).filter(|&i| oob[i]) {
                    let p = tree.predict_row(&x.row(i).to_vec());
                    votes[i][0] += p[0];
                    votes[i][1] += p[1];
                }
            }
            let scored: Vec<usize> = (0..n_samples).filter(|&i| votes[i][0] + votes[i][1] > 0.0).collect();
            if scored.len() < n_samples {
                log::warn!(
                    "rf: {} samples were never out of bag; too few trees for a reliable OOB score",
                    n_samples - scored.len()
                );
            }
            if scored.is_empty() {
                None
            } else {
                let hits = scored
                    .iter()
                    .filter(|&&i| (if votes[i][1] > votes[i][0] { 1 } else { 0 }) == y[i])
                    .count();
                Some(hits as f64 / scored.len() as f64)
            }
        } else {
            None
        };

        self.fitted = Some(ForestFit {
            trees: grown.into_iter().map(|(t, _, _)| t).collect(),
            importances,
            oob_score,
            n_features,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let fit = self.fit_ref()?;
        if x.ncols() != fit.n_features {
            return Err(ForecastError::ShapeMismatch("rf columns", fit.n_features, x.ncols()));
        }
        let n_trees = fit.trees.len() as f64;
        let rows: Vec<[f64; 2]> = x
            .rows()
            .into_iter()
            .map(|r| r.to_vec())
            .collect::<Vec<_>>()
            .par_iter()
            .map(|row| {
                let mut acc = [0.0f64; 2];
                for tree in &fit.trees {
                    let p = tree.predict_row(row);
                    acc[0] += p[0];
                    acc[1] += p[1];
                }
                [acc[0] / n_trees, acc[1] / n_trees]
            })
            .collect();

        let mut proba = Array2::zeros((x.nrows(), 2));
        for (i, p) in rows.iter().enumerate() {
            proba[(i, 0)] = p[0];
            proba[(i, 1)] = p[1];
        }
        Ok(proba)
    }

    fn feature_weights(&self) -> Option<Vec<f64>> {
        self.fitted.as_ref().map(|f| f.importances.clone())
    }

    fn name(&self) -> &'static str {
        "rf"
    }
}
