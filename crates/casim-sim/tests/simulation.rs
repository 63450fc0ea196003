//! End-to-end simulation runs over small synthetic traces.

use casim_algo::{CarbonPolicy, PhasePlanConfig};
use casim_io::TaskRecord;
use casim_sim::{run_simulation, SchedulingPolicy, SimulationConfig};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    path
}

fn read_details(path: &Path) -> Vec<TaskRecord> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    reader
        .deserialize()
        .collect::<Result<Vec<TaskRecord>, _>>()
        .unwrap()
}

fn config(dir: &Path, carbon: PathBuf, jobs: PathBuf) -> SimulationConfig {
    SimulationConfig {
        carbon_trace: carbon,
        carbon_trace_name: "synthetic".into(),
        task_trace: jobs,
        task_trace_name: "cluster".into(),
        scheduling_policy: SchedulingPolicy::Carbon,
        carbon_policy: CarbonPolicy::Oracle,
        reserved_instances: 0,
        waiting_times: "1".into(),
        start_index: 0,
        dynamic_power: false,
        phase_plan: PhasePlanConfig::default(),
        output_dir: dir.join("out"),
    }
}

/// One low-carbon hour; the oracle delays the one-hour job into it.
#[test]
fn oracle_run_waits_for_the_low_hour() {
    let dir = tempdir().unwrap();
    let carbon = write_file(
        dir.path(),
        "carbon.csv",
        "carbon_intensity_avg\n1000\n100\n1000\n1000\n1000\n1000\n",
    );
    let jobs = write_file(dir.path(), "jobs.csv", "arrival_time,length,cpus\n0,3600,1\n");
    let cfg = config(dir.path(), carbon, jobs);
    let outcome = run_simulation(&cfg).unwrap();

    let details = read_details(&outcome.details_path);
    assert_eq!(details.len(), 2, "one job plus the sentinel");
    let job = &details[0];
    assert_eq!(job.start_time, 3600);
    assert_eq!(job.exit_time, 7200);
    assert_eq!(job.waiting_time, 3600);
    assert_eq!(job.reason, "completed");
    // 3600 ticks x (100 g / 1000 / 3600) kg per tick.
    assert!((job.carbon_cost - 0.1).abs() < 1e-9);
    assert!((outcome.total_carbon - 0.1).abs() < 1e-9);

    let sentinel = details.last().unwrap();
    assert_eq!(sentinel.id, -1);
    assert!(outcome.runtime_path.exists());
    assert!(outcome.summary_path.exists());
}

/// The threshold planner spends its waiting budget on the expensive first
/// hour and lands exactly on the cheap one.
#[test]
fn threshold_run_suspends_through_expensive_slots() {
    let dir = tempdir().unwrap();
    let carbon = write_file(
        dir.path(),
        "carbon.csv",
        "carbon_intensity_avg\n1000\n100\n1000\n1000\n1000\n1000\n",
    );
    let jobs = write_file(dir.path(), "jobs.csv", "arrival_time,length,cpus\n0,3600,1\n");
    let mut cfg = config(dir.path(), carbon, jobs);
    cfg.scheduling_policy = SchedulingPolicy::SuspendResumeThreshold;
    let outcome = run_simulation(&cfg).unwrap();

    let details = read_details(&outcome.details_path);
    let rows: Vec<&TaskRecord> = details.iter().filter(|r| r.id >= 0).collect();
    let total: u64 = rows.iter().map(|r| r.length).sum();
    assert_eq!(total, 3600, "subtask lengths sum to the job length");
    assert_eq!(rows[0].start_time, 3600);
    assert!((outcome.total_carbon - 0.1).abs() < 1e-9);
}

/// Scenario from the pricing model: four reserved instances observed through
/// one hour settle at 4 x 0.4 x 0.0624.
#[test]
fn cost_run_settles_reserved_instances() {
    let dir = tempdir().unwrap();
    let carbon = write_file(
        dir.path(),
        "carbon.csv",
        "carbon_intensity_avg\n1000\n1000\n1000\n1000\n1000\n1000\n",
    );
    let jobs = write_file(
        dir.path(),
        "jobs.csv",
        "arrival_time,length,cpus\n3600,600,2\n",
    );
    let mut cfg = config(dir.path(), carbon, jobs);
    cfg.scheduling_policy = SchedulingPolicy::Cost;
    cfg.reserved_instances = 4;
    let outcome = run_simulation(&cfg).unwrap();

    let details = read_details(&outcome.details_path);
    let job = &details[0];
    // Work-conserving dispatch starts the job on arrival despite the
    // waiting budget.
    assert_eq!(job.start_time, 3600);
    assert_eq!(job.dollar_cost, 0.0, "reserved capacity is prepaid");
    let sentinel = details.last().unwrap();
    assert!((sentinel.dollar_cost - 0.09984).abs() < 1e-9);
    assert!((outcome.total_dollars - 0.09984).abs() < 1e-9);
}

/// Two queues route short and long jobs to different waiting budgets.
#[test]
fn two_queue_run_respects_both_budgets() {
    let dir = tempdir().unwrap();
    let mut carbon_rows = String::from("carbon_intensity_avg\n");
    for _ in 0..30 {
        carbon_rows.push_str("1000\n");
    }
    let carbon = write_file(dir.path(), "carbon.csv", &carbon_rows);
    let jobs = write_file(
        dir.path(),
        "jobs.csv",
        "arrival_time,length,cpus\n0,600,1\n0,10800,1\n",
    );
    let mut cfg = config(dir.path(), carbon, jobs);
    cfg.waiting_times = "1x4".into();
    let outcome = run_simulation(&cfg).unwrap();

    let details = read_details(&outcome.details_path);
    for row in details.iter().filter(|r| r.id >= 0) {
        let budget = if row.length <= 7200 { 3600 } else { 4 * 3600 };
        assert!(row.start_time + row.length <= row.arrival_time + row.length + budget);
        assert!(row.start_time >= row.arrival_time);
    }
}
