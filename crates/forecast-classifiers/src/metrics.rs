//! Classification metrics for binary labels (class ids 0 and 1).
//!
//! Conventions follow scikit-learn: confusion matrix rows are true classes,
//! columns are predicted classes; a zero denominator yields a score of 0.
use crate::error::{ForecastError, Result};

/// Per-class precision, recall, F1 and support, indexed by class id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassReport {
    pub precision: [f64; 2],
    pub recall: [f64; 2],
    pub f1: [f64; 2],
    pub support: [usize; 2],
}

impl ClassReport {
    /// Support-weighted averages `(precision, recall, f1)`.
    pub fn weighted(&self) -> (f64, f64, f64) {
        let total = (self.support[0] + self.support[1]) as f64;
        if total == 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let w = |v: &[f64; 2]| (v[0] * self.support[0] as f64 + v[1] * self.support[1] as f64) / total;
        (w(&self.precision), w(&self.recall), w(&self.f1))
    }
}

fn check_lengths(y_true: &[usize], other: usize) -> Result<()> {
    if y_true.is_empty() {
        return Err(ForecastError::EmptyData("no labels to score"));
    }
    if y_true.len() != other {
        return Err(ForecastError::ShapeMismatch("predictions", y_true.len(), other));
    }
    Ok(())
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_lengths(y_true, y_pred.len())?;
    let hits = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / y_true.len() as f64)
}

/// 2x2 confusion matrix, `cm[true][predicted]`.
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize]) -> Result<[[usize; 2]; 2]> {
    check_lengths(y_true, y_pred.len())?;
    let mut cm = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t > 1 || p > 1 {
            return Err(ForecastError::InvalidParameter(format!(
                "labels must be 0 or 1, got true={} predicted={}",
                t, p
            )));
        }
        cm[t][p] += 1;
    }
    Ok(cm)
}

pub fn precision_recall_fscore_support(y_true: &[usize], y_pred: &[usize]) -> Result<ClassReport> {
    let cm = confusion_matrix(y_true, y_pred)?;
    let mut report = ClassReport {
        precision: [0.0; 2],
        recall: [0.0; 2],
        f1: [0.0; 2],
        support: [cm[0][0] + cm[0][1], cm[1][0] + cm[1][1]],
    };
    for k in 0..2 {
        let other = 1 - k;
        let tp = cm[k][k] as f64;
        let fp = cm[other][k] as f64;
        let fn_ = cm[k][other] as f64;
        let p = safe_div(tp, tp + fp);
        let r = safe_div(tp, tp + fn_);
        report.precision[k] = p;
        report.recall[k] = r;
        report.f1[k] = safe_div(2.0 * p * r, p + r);
    }
    Ok(report)
}

/// Support-weighted F1, the scoring function of every grid search.
pub fn f1_weighted(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    Ok(precision_recall_fscore_support(y_true, y_pred)?.weighted().2)
}

/// Receiver operating characteristic curve.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// ROC curve of `scores` for detecting `pos_label`.
///
/// Thresholds are the distinct scores in decreasing order preceded by +inf;
/// points lying on a straight segment between their neighbours are dropped.
pub fn roc_curve(y_true: &[usize], scores: &[f64], pos_label: usize) -> Result<RocCurve> {
    check_lengths(y_true, scores.len())?;
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ForecastError::InvalidParameter("scores must be finite".to_string()));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(std::cmp::Ordering::Equal));

    // cumulative true / false positives at the last index of every distinct score
    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0.0f64, 0.0f64);
    for (i, &idx) in order.iter().enumerate() {
        if y_true[idx] == pos_label {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_group = i + 1 == order.len() || scores[order[i + 1]] != scores[idx];
        if last_of_group {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[idx]);
        }
    }

    if tp == 0.0 || fp == 0.0 {
        return Err(ForecastError::SingleClass);
    }

    // drop collinear intermediate points
    let n = tps.len();
    let keep: Vec<usize> = (0..n)
        .filter(|&i| {
            if i == 0 || i + 1 == n {
                return true;
            }
            let d2_fp = fps[i + 1] - 2.0 * fps[i] + fps[i - 1];
            let d2_tp = tps[i + 1] - 2.0 * tps[i] + tps[i - 1];
            d2_fp != 0.0 || d2_tp != 0.0
        })
        .collect();

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(fps[i] / fp);
        curve.tpr.push(tps[i] / tp);
        curve.thresholds.push(thresholds[i]);
    }
    Ok(curve)
}

/// Area under a curve by the trapezoidal rule; `x` must be monotonic.
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(ForecastError::ShapeMismatch("curve points", x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(ForecastError::InvalidParameter(
            "at least 2 points are needed to compute an area under a curve".to_string(),
        ));
    }
    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum();
    Ok(area.abs())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}
