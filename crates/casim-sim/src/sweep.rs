//! Parameter sweeps over carbon start indices.
//!
//! Each run owns its cluster and scheduler, so runs fan out across a Rayon
//! pool with no synchronization beyond each run's own cluster lock. A JSON
//! manifest summarizing the sweep lands next to the result files.

use crate::config::SimulationConfig;
use crate::runner::run_simulation;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::error;

/// Start indices swept when a whole trace is scanned.
pub fn default_start_indices() -> Vec<usize> {
    (0..8500).step_by(500).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRunRecord {
    pub start_index: usize,
    pub status: String,
    pub error: Option<String>,
    pub carbon_cost: f64,
    pub dollar_cost: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepManifest {
    pub created_at: DateTime<Utc>,
    pub scheduling_policy: String,
    pub carbon_policy: String,
    pub num_runs: usize,
    pub success: usize,
    pub failure: usize,
    pub runs: Vec<SweepRunRecord>,
}

/// Summary returned after the sweep so callers can report counts and the
/// manifest location.
#[derive(Debug)]
pub struct SweepSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub runs: Vec<SweepRunRecord>,
}

pub fn run_sweep(
    base: &SimulationConfig,
    start_indices: &[usize],
    threads: usize,
) -> Result<SweepSummary> {
    base.validate()?;
    let thread_count = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for sweep runs")?;

    let runs: Vec<SweepRunRecord> = pool.install(|| {
        start_indices
            .par_iter()
            .map(|&start_index| {
                let mut config = base.clone();
                config.start_index = start_index;
                match run_simulation(&config) {
                    Ok(outcome) => SweepRunRecord {
                        start_index,
                        status: "ok".to_string(),
                        error: None,
                        carbon_cost: outcome.total_carbon,
                        dollar_cost: outcome.total_dollars,
                    },
                    Err(err) => {
                        error!(start_index, %err, "sweep run failed");
                        SweepRunRecord {
                            start_index,
                            status: "error".to_string(),
                            error: Some(err.to_string()),
                            carbon_cost: 0.0,
                            dollar_cost: 0.0,
                        }
                    }
                }
            })
            .collect()
    });

    let success = runs.iter().filter(|run| run.status == "ok").count();
    let failure = runs.len() - success;
    let manifest = SweepManifest {
        created_at: Utc::now(),
        scheduling_policy: base.scheduling_policy.as_str().to_string(),
        carbon_policy: base.carbon_policy.as_str().to_string(),
        num_runs: runs.len(),
        success,
        failure,
        runs: runs.clone(),
    };
    let manifest_path = base.output_dir.join("sweep_manifest.json");
    write_sweep_manifest(&manifest_path, &manifest)?;
    Ok(SweepSummary {
        success,
        failure,
        manifest_path,
        runs,
    })
}

pub fn write_sweep_manifest(path: &Path, manifest: &SweepManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing sweep manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing sweep manifest '{}'", path.display()))?;
    Ok(())
}
