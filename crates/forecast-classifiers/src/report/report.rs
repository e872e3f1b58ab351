use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use plotly::Plot;

use crate::report::plots::{plot_confusion_matrix, plot_grid_scores, plot_roc};
use crate::results::ExperimentResults;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

/// A titled block of HTML content and plots.
pub struct ReportSection {
    title: String,
    content: Vec<Markup>,
}

impl ReportSection {
    pub fn new(title: &str) -> Self {
        ReportSection {
            title: title.to_string(),
            content: Vec::new(),
        }
    }

    pub fn add_content(&mut self, content: Markup) {
        self.content.push(content);
    }

    pub fn add_plot(&mut self, plot: Plot) {
        let id = format!("plot-{}-{}", slug(&self.title), self.content.len());
        self.content.push(PreEscaped(plot.to_inline_html(Some(&id))));
    }

    fn render(&self) -> Markup {
        html! {
            section id=(slug(&self.title)) {
                h2 { (self.title) }
                @for block in &self.content {
                    div class="block" { (block) }
                }
            }
        }
    }
}

/// Single-page HTML report.
pub struct Report {
    app_name: String,
    version: String,
    title: String,
    generated: String,
    sections: Vec<ReportSection>,
}

impl Report {
    pub fn new(app_name: &str, version: &str, title: &str) -> Self {
        Report {
            app_name: app_name.to_string(),
            version: version.to_string(),
            title: title.to_string(),
            generated: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            sections: Vec::new(),
        }
    }

    pub fn add_section(&mut self, section: ReportSection) {
        self.sections.push(section);
    }

    pub fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html {
                head {
                    meta charset="utf-8";
                    title { (self.title) }
                    script src=(PLOTLY_CDN) {}
                    style {
                        "body { font-family: sans-serif; margin: 2em; }
                        table { border-collapse: collapse; }
                        td, th { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }"
                    }
                }
                body {
                    h1 { (self.title) }
                    p { (self.app_name) " " (self.version) " | generated " (self.generated) }
                    @for section in &self.sections {
                        (section.render())
                    }
                }
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(&path, self.render().into_string())
            .with_context(|| format!("Failed to write report {}", path.as_ref().display()))
    }
}

fn slug(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

fn metrics_table(results: &ExperimentResults) -> Markup {
    let rows = [
        ("accuracy", results.accuracy),
        ("cv f1", results.cv_score),
        ("train f1", results.train_score),
        ("precision", results.precision),
        ("recall", results.recall),
        ("f1", results.f1),
        ("positive AUC", results.pos_auc),
        ("negative AUC", results.neg_auc),
    ];
    html! {
        table {
            tr { th { "metric" } th { "value" } }
            @for (name, value) in rows {
                tr { td { (name) } td { (format!("{:.4}", value)) } }
            }
        }
        table {
            tr { th {} th { "precision" } th { "recall" } th { "f1" } }
            tr {
                td { "Positive" }
                td { (format!("{:.4}", results.pos_precision)) }
                td { (format!("{:.4}", results.pos_recall)) }
                td { (format!("{:.4}", results.pos_f1)) }
            }
            tr {
                td { "Negative" }
                td { (format!("{:.4}", results.neg_precision)) }
                td { (format!("{:.4}", results.neg_recall)) }
                td { (format!("{:.4}", results.neg_f1)) }
            }
        }
    }
}

/// Write `<stem>.html`, plus `<stem>.png` with the `png` feature.
pub fn write_plot(plot: &Plot, dir: &Path, stem: &str) -> Result<()> {
    let path = dir.join(format!("{}.html", stem));
    std::fs::write(&path, plot.to_html()).with_context(|| format!("Failed to write {}", path.display()))?;
    #[cfg(feature = "png")]
    write_png(plot, &dir.join(format!("{}.png", stem)))?;
    Ok(())
}

#[cfg(feature = "png")]
fn write_png(plot: &Plot, path: &Path) -> Result<()> {
    use plotly::ImageFormat;
    // plotly panics when kaleido fails
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        plot.write_image(path, ImageFormat::PNG, 800, 600, 1.0)
    }))
    .map_err(|_| anyhow::anyhow!("Failed to render {}", path.display()))
}

/// Write the three standalone plots and `report.html` into `dir`.
pub fn write_experiment_report<P: AsRef<Path>>(results: &ExperimentResults, dir: P) -> Result<()> {
    let dir = dir.as_ref();
    let cm = plot_confusion_matrix(&results.confusion_matrix, "Confusion matrix");
    let pos_roc = plot_roc(&results.fpr, &results.tpr, results.pos_auc, "Positive ROC")?;
    let neg_roc = plot_roc(&results.fnr, &results.tnr, results.neg_auc, "Negative ROC")?;
    write_plot(&cm, dir, "confusion_matrix")?;
    write_plot(&pos_roc, dir, "pos_roc")?;
    write_plot(&neg_roc, dir, "neg_roc")?;

    let mut report = Report::new(
        "health-forecast",
        env!("CARGO_PKG_VERSION"),
        &format!("{} + {} report", results.fs, results.classifier),
    );

    let mut overview = ReportSection::new("Overview");
    overview.add_content(html! {
        p {
            "Sampling " (results.sampling) " (" (results.sampling_timing) ") on "
            (results.dataset_type)
            @if let Some(sub) = &results.sub_type { " / " (sub) }
            ", best " (results.classifier.param_name()) " = " (results.best_param) "."
        }
    });
    overview.add_content(metrics_table(results));
    report.add_section(overview);

    let mut plots = ReportSection::new("Test set");
    plots.add_plot(cm);
    plots.add_plot(pos_roc);
    plots.add_plot(neg_roc);
    report.add_section(plots);

    if let Some(cv) = &results.cv_results {
        let mut grid = ReportSection::new("Grid search");
        grid.add_plot(plot_grid_scores(&cv.params, &cv.mean_test_score, &cv.param_name, "Mean CV score"));
        report.add_section(grid);
    }

    report.save_to_file(dir.join("report.html"))
}
