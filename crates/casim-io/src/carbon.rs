//! Carbon trace loading.
//!
//! Traces are tabular files with one hourly row per sample and at least a
//! `carbon_intensity_avg` column in gCO₂eq/kWh. Values are scaled to
//! kgCO₂eq/kWh on load. Optional `datetime`/`timestamp` columns pass
//! through untouched; they do not affect the simulation.

use anyhow::{anyhow, Context, Result};
use casim_core::CarbonSeries;
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// Two 30-day months of hourly rows.
pub const CARBON_WINDOW_ROWS: usize = 720 * 2;

/// Load the simulation window of a carbon trace: [`CARBON_WINDOW_ROWS`]
/// hourly samples starting at `start_index`, scaled to kgCO₂eq/kWh.
pub fn load_carbon(path: &Path, name: &str, start_index: usize) -> Result<CarbonSeries> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let headers = reader.headers().context("reading carbon trace header")?;
    let column = headers
        .iter()
        .position(|h| h == "carbon_intensity_avg")
        .ok_or_else(|| {
            anyhow!(
                "carbon trace {} has no 'carbon_intensity_avg' column",
                path.display()
            )
        })?;

    let mut values = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading carbon trace row {row}"))?;
        let raw = record
            .get(column)
            .ok_or_else(|| anyhow!("carbon trace row {row} is missing the intensity column"))?;
        let grams: f64 = raw
            .trim()
            .parse()
            .with_context(|| format!("parsing carbon intensity '{raw}' at row {row}"))?;
        values.push(grams / 1000.0);
    }

    if start_index >= values.len() {
        return Err(anyhow!(
            "carbon start index {start_index} is past the end of {} ({} rows)",
            path.display(),
            values.len()
        ));
    }
    let end = (start_index + CARBON_WINDOW_ROWS).min(values.len());
    if end - start_index < CARBON_WINDOW_ROWS {
        warn!(
            trace = name,
            start_index,
            rows = end - start_index,
            "carbon trace shorter than the full simulation window"
        );
    }
    Ok(CarbonSeries::new(
        name,
        start_index,
        values[start_index..end].to_vec(),
    ))
}
