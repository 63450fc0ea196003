//! Job trace loading.
//!
//! Tabular files with `arrival_time` (seconds), `length` (seconds), `cpus`,
//! and an optional `name` column selecting a power profile from the
//! registry (default `constant`). The loader also computes the trace-wide
//! mean lengths that seed the average-length placement policies.

use anyhow::{anyhow, Context, Result};
use casim_core::{PowerProfile, TraceStats, SHORT_QUEUE_SECS};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// One raw job request, not yet bound to a scheduling context.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: i64,
    pub arrival: u64,
    pub length: u64,
    pub cpus: u32,
    pub profile: Arc<PowerProfile>,
}

#[derive(Debug, Deserialize)]
struct JobRow {
    arrival_time: f64,
    length: f64,
    cpus: f64,
    #[serde(default)]
    name: Option<String>,
}

/// Load a job trace sorted by arrival, plus the length statistics used by
/// the surrogate-length policies.
pub fn load_jobs(path: &Path) -> Result<(Vec<JobSpec>, TraceStats)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut profiles: HashMap<String, Arc<PowerProfile>> = HashMap::new();
    let mut specs = Vec::new();
    let mut short_lengths = Vec::new();
    let mut long_lengths = Vec::new();

    for (row, record) in reader.deserialize::<JobRow>().enumerate() {
        let record = record.with_context(|| format!("reading job trace row {row}"))?;
        let profile_name = record.name.as_deref().unwrap_or("constant");
        let profile = match profiles.get(profile_name) {
            Some(profile) => Arc::clone(profile),
            None => {
                let built = PowerProfile::by_name(profile_name).ok_or_else(|| {
                    anyhow!("job trace row {row}: unknown power profile '{profile_name}'")
                })?;
                let shared = Arc::new(built);
                profiles.insert(profile_name.to_string(), Arc::clone(&shared));
                shared
            }
        };
        let length = record.length as u64;
        if length <= SHORT_QUEUE_SECS {
            short_lengths.push(record.length);
        }
        if length >= SHORT_QUEUE_SECS {
            long_lengths.push(record.length);
        }
        specs.push(JobSpec {
            id: row as i64,
            arrival: record.arrival_time as u64,
            length,
            cpus: record.cpus as u32,
            profile,
        });
    }

    specs.sort_by_key(|spec| spec.arrival);

    let mean = |values: &[f64]| -> u64 {
        if values.is_empty() {
            0
        } else {
            (values.iter().sum::<f64>() / values.len() as f64) as u64
        }
    };
    let stats = TraceStats {
        mean_short: mean(&short_lengths),
        mean_long: mean(&long_lengths),
    };
    Ok((specs, stats))
}
