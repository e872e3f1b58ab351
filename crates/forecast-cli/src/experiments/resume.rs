use std::path::Path;

use anyhow::{Context, Result};

use forecast_classifiers::results::{ExperimentResults, RESUMED_HEADER};

use crate::experiments::experiments;
use crate::input::ExperimentConfig;

/// Collect every saved `<classifier>_results.json` of the configured grid
/// into one CSV. Missing results are skipped with a warning. Returns the
/// number of rows written.
pub fn resume<P: AsRef<Path>>(config: &ExperimentConfig, output: P) -> Result<usize> {
    let output = output.as_ref();
    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    writer.write_record(RESUMED_HEADER)?;

    let mut n = 0;
    for exp in experiments(config) {
        let path = exp.results.results_json();
        if !path.exists() {
            log::warn!("No results for {} at {}", exp.label(), path.display());
            continue;
        }
        let results = ExperimentResults::load_json(&path)?;
        writer.write_record(results.resumed_row(&exp.data_name()))?;
        n += 1;
    }
    writer.flush()?;
    log::info!("{} result rows written to {}", n, output.display());
    Ok(n)
}
