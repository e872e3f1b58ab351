use plotly::common::{DashType, Line, Mode};
use plotly::layout::{Axis, Layout};
use plotly::{HeatMap, Plot, Scatter};

use crate::error::{ForecastError, Result};

/// Class labels shown on confusion-matrix axes; class 0 first.
pub const CLASS_LABELS: [&str; 2] = ["Positive", "Negative"];

/// Heatmap of a 2x2 confusion matrix, rows = true label, columns = predicted.
pub fn plot_confusion_matrix(cm: &[[usize; 2]; 2], title: &str) -> Plot {
    let labels: Vec<String> = CLASS_LABELS.iter().map(|s| s.to_string()).collect();
    // plotly draws row 0 at the bottom
    let z: Vec<Vec<f64>> = cm.iter().rev().map(|row| row.iter().map(|&v| v as f64).collect()).collect();
    let y_labels: Vec<String> = labels.iter().rev().cloned().collect();

    let trace = HeatMap::new(labels, y_labels, z).name("count");
    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Predicted label"))
        .y_axis(Axis::new().title("True label"));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

/// ROC curve with the chance diagonal.
pub fn plot_roc(fpr: &[f64], tpr: &[f64], auc: f64, title: &str) -> Result<Plot> {
    if fpr.len() != tpr.len() {
        return Err(ForecastError::ShapeMismatch("roc points", fpr.len(), tpr.len()));
    }
    if fpr.is_empty() {
        return Err(ForecastError::EmptyData("roc curve"));
    }

    let curve = Scatter::new(fpr.to_vec(), tpr.to_vec())
        .mode(Mode::Lines)
        .name(&format!("ROC curve (area = {:.2})", auc));
    let chance = Scatter::new(vec![0.0, 1.0], vec![0.0, 1.0])
        .mode(Mode::Lines)
        .name("Chance")
        .line(Line::new().color("navy").dash(DashType::Dash));

    let mut plot = Plot::new();
    plot.add_trace(curve);
    plot.add_trace(chance);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title("False Positive Rate").range(vec![0.0, 1.0]))
            .y_axis(Axis::new().title("True Positive Rate").range(vec![0.0, 1.05])),
    );
    Ok(plot)
}

/// Mean cross-validated score against the tuned hyper-parameter.
pub fn plot_grid_scores(params: &[f64], scores: &[Option<f64>], param_name: &str, title: &str) -> Plot {
    let (x, y): (Vec<f64>, Vec<f64>) = params
        .iter()
        .zip(scores)
        .filter_map(|(&p, s)| s.map(|s| (p, s)))
        .unzip();
    let trace = Scatter::new(x, y).mode(Mode::LinesMarkers).name("mean test score");

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(
        Layout::new()
            .title(title)
            .x_axis(Axis::new().title(param_name))
            .y_axis(Axis::new().title("Weighted F1")),
    );
    plot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_heatmap_renders_counts() {
        let plot = plot_confusion_matrix(&[[7, 1], [2, 9]], "Confusion matrix");
        let html = plot.to_inline_html(Some("cm"));
        assert!(html.contains("Positive"));
        assert!(html.contains("Negative"));
    }

    #[test]
    fn roc_rejects_ragged_points() {
        assert!(plot_roc(&[0.0, 1.0], &[1.0], 0.5, "roc").is_err());
        assert!(plot_roc(&[], &[], 0.5, "roc").is_err());
        assert!(plot_roc(&[0.0, 0.0, 1.0], &[0.0, 1.0, 1.0], 1.0, "roc").is_ok());
    }

    #[test]
    fn grid_plot_skips_failed_candidates() {
        let plot = plot_grid_scores(&[5.0, 20.0], &[Some(0.8), None], "n_neighbors", "grid");
        assert!(plot.to_json().contains("0.8"));
    }
}
