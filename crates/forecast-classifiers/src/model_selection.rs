//! Stratified cross-validation and hyper-parameter grid search.
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{check_xy, ForecastError, Result};
use crate::metrics::{f1_weighted, mean, std};
use crate::pipeline::Pipeline;

/// (train indices, test indices)
pub type Split = (Vec<usize>, Vec<usize>);

/// K-fold splitter preserving the class proportions in every fold.
///
/// Labels are sorted and dealt round-robin to the folds, which fixes how many
/// members of each class every test fold receives; within a class the samples
/// are assigned to folds in index order, or in a seeded random order when
/// `shuffle` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, shuffle: bool, seed: u64) -> Self {
        StratifiedKFold { n_splits, shuffle, seed }
    }

    pub fn split(&self, y: &[usize]) -> Result<Vec<Split>> {
        let n_samples = y.len();
        if self.n_splits < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if self.n_splits > n_samples {
            return Err(ForecastError::InvalidParameter(format!(
                "cannot have n_splits={} greater than the number of samples {}",
                self.n_splits, n_samples
            )));
        }

        // classes in order of first appearance
        let mut classes: Vec<usize> = Vec::new();
        for &l in y {
            if !classes.contains(&l) {
                classes.push(l);
            }
        }
        let encoded: Vec<usize> = y
            .iter()
            .map(|l| classes.iter().position(|c| c == l).unwrap_or(0))
            .collect();
        let n_classes = classes.len();
        let mut counts = vec![0usize; n_classes];
        for &k in &encoded {
            counts[k] += 1;
        }

        if counts.iter().all(|&c| self.n_splits > c) {
            return Err(ForecastError::InvalidParameter(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                self.n_splits
            )));
        }
        if let Some(&min) = counts.iter().min() {
            if self.n_splits > min {
                log::warn!(
                    "The least populated class has only {} members, which is less than n_splits={}",
                    min,
                    self.n_splits
                );
            }
        }

        let mut sorted = encoded.clone();
        sorted.sort_unstable();
        // allocation[fold][class]
        let mut allocation = vec![vec![0usize; n_classes]; self.n_splits];
        for (pos, &k) in sorted.iter().enumerate() {
            allocation[pos % self.n_splits][k] += 1;
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut test_fold = vec![0usize; n_samples];
        for k in 0..n_classes {
            let mut folds_for_class: Vec<usize> = (0..self.n_splits)
                .flat_map(|f| std::iter::repeat(f).take(allocation[f][k]))
                .collect();
            if self.shuffle {
                folds_for_class.shuffle(&mut rng);
            }
            let members = (0..n_samples).filter(|&i| encoded[i] == k);
            for (i, fold) in members.zip(folds_for_class) {
                test_fold[i] = fold;
            }
        }

        Ok((0..self.n_splits)
            .map(|f| {
                let (test, train): (Vec<usize>, Vec<usize>) = (0..n_samples).partition(|&i| test_fold[i] == f);
                (train, test)
            })
            .collect())
    }
}

fn fit_and_score(
    base: &Pipeline,
    param: f64,
    x: &Array2<f64>,
    y: &[usize],
    (train, test): &Split,
) -> Result<(f64, f64)> {
    let mut pipe = base.with_param(param);
    let x_train = x.select(Axis(0), train);
    let y_train: Vec<usize> = train.iter().map(|&i| y[i]).collect();
    pipe.fit(&x_train, &y_train)?;

    let train_score = f1_weighted(&y_train, &pipe.predict(&x_train)?)?;
    let x_test = x.select(Axis(0), test);
    let y_test: Vec<usize> = test.iter().map(|&i| y[i]).collect();
    let test_score = f1_weighted(&y_test, &pipe.predict(&x_test)?)?;
    Ok((test_score, train_score))
}

/// Weighted F1 of a freshly fitted copy of `pipeline` on every test fold.
pub fn cross_val_score(pipeline: &Pipeline, x: &Array2<f64>, y: &[usize], cv: &StratifiedKFold) -> Result<Vec<f64>> {
    check_xy(x.nrows(), y)?;
    let splits = cv.split(y)?;
    let param = pipeline.param();
    splits
        .par_iter()
        .map(|split| fit_and_score(pipeline, param, x, y, split).map(|(test, _)| test))
        .collect()
}

/// Per-candidate scores of a grid search. Candidates whose fit failed on some
/// fold have `None` scores and rank last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResults {
    pub param_name: String,
    pub params: Vec<f64>,
    pub split_test_scores: Vec<Vec<Option<f64>>>,
    pub mean_test_score: Vec<Option<f64>>,
    pub std_test_score: Vec<Option<f64>>,
    pub mean_train_score: Vec<Option<f64>>,
    pub std_train_score: Vec<Option<f64>>,
    pub rank_test_score: Vec<usize>,
}

pub struct GridSearchResult {
    pub cv_results: CvResults,
    pub best_index: usize,
    pub best_param: f64,
    pub best_score: f64,
    /// The best candidate refitted on the whole training set.
    pub best_estimator: Pipeline,
}

/// Exhaustive search over one classifier hyper-parameter, scored by
/// weighted F1 over stratified folds.
#[derive(Debug, Clone)]
pub struct GridSearchCv {
    pub param_name: String,
    pub grid: Vec<f64>,
    pub cv: StratifiedKFold,
}

fn ranks(means: &[Option<f64>]) -> Vec<usize> {
    // "min" ranking: equal scores share the best rank, failures come last
    means
        .iter()
        .map(|m| match m {
            Some(v) => 1 + means.iter().filter(|o| matches!(o, Some(w) if w > v)).count(),
            None => 1 + means.iter().filter(|o| o.is_some()).count(),
        })
        .collect()
}

impl GridSearchCv {
    pub fn new(param_name: &str, grid: Vec<f64>, cv: StratifiedKFold) -> Self {
        GridSearchCv {
            param_name: param_name.to_string(),
            grid,
            cv,
        }
    }

    pub fn fit(&self, base: &Pipeline, x: &Array2<f64>, y: &[usize]) -> Result<GridSearchResult> {
        check_xy(x.nrows(), y)?;
        if self.grid.is_empty() {
            return Err(ForecastError::InvalidParameter("empty parameter grid".to_string()));
        }
        let splits = self.cv.split(y)?;
        let n_folds = splits.len();

        let tasks: Vec<(usize, usize)> = (0..self.grid.len())
            .flat_map(|p| (0..n_folds).map(move |f| (p, f)))
            .collect();

        let scores: Vec<Option<(f64, f64)>> = tasks
            .par_iter()
            .map(|&(p, f)| match fit_and_score(base, self.grid[p], x, y, &splits[f]) {
                Ok(s) => Some(s),
                Err(e) => {
                    log::warn!(
                        "{}={} failed on fold {}: {}",
                        self.param_name,
                        self.grid[p],
                        f,
                        e
                    );
                    None
                }
            })
            .collect();

        let mut cv_results = CvResults {
            param_name: self.param_name.clone(),
            params: self.grid.clone(),
            split_test_scores: Vec::with_capacity(self.grid.len()),
            mean_test_score: Vec::with_capacity(self.grid.len()),
            std_test_score: Vec::with_capacity(self.grid.len()),
            mean_train_score: Vec::with_capacity(self.grid.len()),
            std_train_score: Vec::with_capacity(self.grid.len()),
            rank_test_score: Vec::new(),
        };

        for p in 0..self.grid.len() {
            let folds = &scores[p * n_folds..(p + 1) * n_folds];
            cv_results
                .split_test_scores
                .push(folds.iter().map(|s| s.map(|(test, _)| test)).collect());
            let complete: Option<Vec<(f64, f64)>> = folds.iter().cloned().collect();
            match complete {
                Some(folds) => {
                    let test: Vec<f64> = folds.iter().map(|s| s.0).collect();
                    let train: Vec<f64> = folds.iter().map(|s| s.1).collect();
                    cv_results.mean_test_score.push(Some(mean(&test)));
                    cv_results.std_test_score.push(Some(std(&test)));
                    cv_results.mean_train_score.push(Some(mean(&train)));
                    cv_results.std_train_score.push(Some(std(&train)));
                }
                None => {
                    cv_results.mean_test_score.push(None);
                    cv_results.std_test_score.push(None);
                    cv_results.mean_train_score.push(None);
                    cv_results.std_train_score.push(None);
                }
            }
        }
        cv_results.rank_test_score = ranks(&cv_results.mean_test_score);

        // first candidate with the highest mean score wins
        let mut best: Option<(usize, f64)> = None;
        for (i, m) in cv_results.mean_test_score.iter().enumerate() {
            if let Some(v) = *m {
                if best.map_or(true, |(_, b)| v > b) {
                    best = Some((i, v));
                }
            }
        }
        let (best_index, best_score) = best.ok_or_else(|| {
            ForecastError::InvalidParameter(format!("every {} candidate failed to fit", self.param_name))
        })?;
        let best_param = self.grid[best_index];
        log::info!(
            "Best {}: {} (mean weighted F1 {:.4} over {} folds)",
            self.param_name,
            best_param,
            best_score,
            n_folds
        );

        let mut best_estimator = base.with_param(best_param);
        best_estimator.fit(x, y)?;

        Ok(GridSearchResult {
            cv_results,
            best_index,
            best_param,
            best_score,
            best_estimator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierType, FsMethod, Sampling, SamplingTiming};
    use crate::pipeline::PipelineSpec;
    use rand::Rng;

    #[test]
    fn folds_partition_and_stratify() {
        let y: Vec<usize> = (0..23).map(|i| if i % 4 == 0 { 1 } else { 0 }).collect();
        let skf = StratifiedKFold::new(5, false, 0);
        let splits = skf.split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen = vec![0usize; y.len()];
        let ones_total = y.iter().filter(|&&l| l == 1).count() as f64;
        for (train, test) in &splits {
            assert_eq!(train.len() + test.len(), y.len());
            for &i in test {
                seen[i] += 1;
                assert!(!train.contains(&i));
            }
            let ones = test.iter().filter(|&&i| y[i] == 1).count() as f64;
            let expected = ones_total * test.len() as f64 / y.len() as f64;
            assert!((ones - expected).abs() <= 1.0);
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn unshuffled_folds_are_deterministic_and_ordered() {
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let splits = StratifiedKFold::new(2, false, 99).split(&y).unwrap();
        assert_eq!(splits[0].1, vec![0, 1, 4, 5]);
        assert_eq!(splits[1].1, vec![2, 3, 6, 7]);
        assert_eq!(splits, StratifiedKFold::new(2, false, 1).split(&y).unwrap());
    }

    #[test]
    fn too_many_splits_is_an_error() {
        let y = vec![0, 0, 1, 1];
        assert!(StratifiedKFold::new(3, false, 0).split(&y).is_err());
        assert!(StratifiedKFold::new(1, false, 0).split(&y).is_err());
    }

    #[test]
    fn ranks_share_ties_and_put_failures_last() {
        assert_eq!(ranks(&[Some(0.5), Some(0.9), Some(0.9), None]), vec![3, 1, 1, 4]);
    }

    fn separable(n: usize) -> (Array2<f64>, Vec<usize>) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let mut data = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let label = i % 2;
            data.push(label as f64 * 4.0 + rng.gen::<f64>());
            data.push(rng.gen::<f64>());
            y.push(label);
        }
        (Array2::from_shape_vec((n, 2), data).unwrap(), y)
    }

    #[test]
    fn grid_search_skips_failing_candidates_and_refits() {
        let (x, y) = separable(40);
        let spec = PipelineSpec::new(FsMethod::Anova, ClassifierType::Knn, Sampling::Raw, SamplingTiming::BeforeFs);
        let base = Pipeline::new(&spec);
        // 50 neighbours cannot be fitted on 36 training rows
        let search = GridSearchCv::new("n_neighbors", vec![5.0, 50.0], StratifiedKFold::new(10, false, 123456));
        let result = search.fit(&base, &x, &y).unwrap();

        assert_eq!(result.best_param, 5.0);
        assert_eq!(result.best_index, 0);
        assert_eq!(result.cv_results.mean_test_score[1], None);
        assert_eq!(result.cv_results.rank_test_score, vec![1, 2]);
        assert!(result.best_score > 0.9);
        assert!(result.best_estimator.support().is_some());
        assert_eq!(result.best_estimator.param(), 5.0);
    }

    #[test]
    fn cross_val_score_returns_one_score_per_fold() {
        let (x, y) = separable(30);
        let spec = PipelineSpec::new(FsMethod::Anova, ClassifierType::LinearSvm, Sampling::Raw, SamplingTiming::AfterFs);
        let scores = cross_val_score(&Pipeline::new(&spec), &x, &y, &StratifiedKFold::new(5, false, 789012)).unwrap();
        assert_eq!(scores.len(), 5);
        assert!(mean(&scores) > 0.9);
    }
}
