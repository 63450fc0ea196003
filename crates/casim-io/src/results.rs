//! Result serialization.
//!
//! Each run produces three tabular files: per-subtask details (with a final
//! sentinel row carrying the reserved-instance settlement), per-minute mean
//! CPU utilization, and a one-row run summary. File names encode the run
//! parameters so sweeps can drop everything into one directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One dispatched subtask, as written to the details file. The sentinel row
/// uses `ID = -1` and carries only the settlement dollar cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(rename = "ID")]
    pub id: i64,
    pub arrival_time: u64,
    pub length: u64,
    pub cpus: u32,
    pub length_class: String,
    pub resource_class: String,
    pub carbon_cost: f64,
    pub dollar_cost: f64,
    pub start_time: u64,
    pub waiting_time: u64,
    pub exit_time: u64,
    pub reason: String,
}

/// Parameters identifying one run, used to label output files.
#[derive(Debug, Clone)]
pub struct RunLabel {
    pub scheduling_policy: String,
    pub carbon_policy: String,
    pub carbon_trace: String,
    pub task_trace: String,
    pub start_index: usize,
    pub reserved_instances: u32,
    pub waiting_times: String,
}

impl RunLabel {
    fn stem(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}-{}",
            self.scheduling_policy,
            self.start_index,
            self.carbon_policy,
            self.carbon_trace,
            self.reserved_instances,
            self.waiting_times
        )
    }

    pub fn details_filename(&self) -> String {
        format!("details-{}.csv", self.stem())
    }

    pub fn runtime_filename(&self) -> String {
        format!("runtime-{}.csv", self.stem())
    }

    pub fn summary_filename(&self) -> String {
        format!("{}.csv", self.stem())
    }
}

pub fn write_details(path: &Path, records: &[TaskRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().context("writing details file")?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct RuntimeRow {
    time: u64,
    cpus: f64,
}

/// Collapse the per-tick CPU allocation vector into per-minute means.
pub fn write_runtime(path: &Path, allocation: &[u64]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for (minute, chunk) in allocation.chunks(60).enumerate() {
        let mean = chunk.iter().sum::<u64>() as f64 / chunk.len() as f64;
        writer.serialize(RuntimeRow {
            time: minute as u64,
            cpus: mean,
        })?;
    }
    writer.flush().context("writing runtime file")?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct SummaryRow {
    carbon_cost: f64,
    dollar_cost: f64,
}

pub fn write_summary(path: &Path, carbon_cost: f64, dollar_cost: f64) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.serialize(SummaryRow {
        carbon_cost,
        dollar_cost,
    })?;
    writer.flush().context("writing summary file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: i64) -> TaskRecord {
        TaskRecord {
            id,
            arrival_time: 0,
            length: 10,
            cpus: 1,
            length_class: "0-2".into(),
            resource_class: "1".into(),
            carbon_cost: 1.5,
            dollar_cost: 0.1,
            start_time: 5,
            waiting_time: 5,
            exit_time: 15,
            reason: "completed".into(),
        }
    }

    #[test]
    fn details_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("details.csv");
        write_details(&path, &[record(0), record(1)]).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap().iter().next().unwrap(),
            "ID"
        );
        let rows: Vec<TaskRecord> = reader
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id, 1);
    }

    #[test]
    fn runtime_means_per_minute() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("runtime.csv");
        let mut allocation = vec![2u64; 60];
        allocation.extend(vec![4u64; 30]);
        write_runtime(&path, &allocation).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,cpus");
        assert_eq!(lines[1], "0,2.0");
        assert_eq!(lines[2], "1,4.0");
    }

    #[test]
    fn labels_encode_run_parameters() {
        let label = RunLabel {
            scheduling_policy: "suspend-resume".into(),
            carbon_policy: "oracle".into(),
            carbon_trace: "AU-SA".into(),
            task_trace: "cluster".into(),
            start_index: 7000,
            reserved_instances: 4,
            waiting_times: "6x24".into(),
        };
        assert_eq!(
            label.details_filename(),
            "details-suspend-resume-7000-oracle-AU-SA-4-6x24.csv"
        );
        assert!(label.runtime_filename().starts_with("runtime-"));
    }
}
