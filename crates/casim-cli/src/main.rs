//! `casim`: carbon-aware batch scheduling simulator.
//!
//! Replays a job trace against a grid carbon intensity trace under a chosen
//! scheduling policy and writes per-subtask details, CPU utilization, and a
//! run summary. A negative start index sweeps the whole carbon trace in
//! parallel.

use anyhow::{Context, Result};
use casim_algo::PhasePlanConfig;
use casim_sim::{default_start_indices, run_simulation, run_sweep, SimulationConfig};
use clap::Parser;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(author, version, about = "Carbon-aware batch scheduling simulator")]
struct Cli {
    /// Carbon intensity trace (CSV with a carbon_intensity_avg column)
    #[arg(short = 'c', long)]
    carbon_trace: PathBuf,

    /// Job trace (CSV with arrival_time, length, cpus and optional name)
    #[arg(short = 't', long)]
    task_trace: PathBuf,

    /// Number of prepaid reserved instances
    #[arg(short = 'r', long, default_value_t = 0)]
    reserved_instances: u32,

    /// Waiting times per queue in hours, `x`-separated (one or two queues)
    #[arg(short = 'w', long, default_value = "6x24")]
    waiting_times: String,

    /// Scheduling policy: carbon[-spot], carbon-cost[-spot], cost,
    /// suspend-resume[-spot], suspend-resume-threshold
    #[arg(long, default_value = "suspend-resume-threshold")]
    scheduling_policy: String,

    /// Start-time policy for the non-suspending modes: waiting, lowest,
    /// oracle, cst_oracle, cst_average
    #[arg(long, default_value = "oracle")]
    carbon_policy: String,

    /// Offset into the carbon trace; -1 sweeps the whole trace
    #[arg(short = 'i', long, default_value_t = 7000)]
    start_index: i64,

    /// Honor per-phase power draws via the integer-program planner
    #[arg(long, default_value_t = false)]
    dynamic_power_draw: bool,

    /// Wall-clock limit for one integer-program solve, in seconds
    #[arg(long, default_value_t = 1200.0)]
    solve_time_limit: f64,

    /// Resume cap for the integer-program planner
    #[arg(long, default_value_t = 5)]
    max_resumes: u64,

    /// Output directory for result files
    #[arg(short = 'o', long, default_value = "results")]
    out: PathBuf,

    /// Worker threads for sweeps (0 = all cores)
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Set the logging level
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn trace_name(path: &Path) -> String {
    path.file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("trace")
        .to_string()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting tracing subscriber")?;

    let mut config = SimulationConfig {
        carbon_trace_name: trace_name(&cli.carbon_trace),
        task_trace_name: trace_name(&cli.task_trace),
        carbon_trace: cli.carbon_trace,
        task_trace: cli.task_trace,
        scheduling_policy: cli.scheduling_policy.parse()?,
        carbon_policy: cli.carbon_policy.parse()?,
        reserved_instances: cli.reserved_instances,
        waiting_times: cli.waiting_times,
        start_index: 0,
        dynamic_power: cli.dynamic_power_draw,
        phase_plan: PhasePlanConfig {
            time_limit: cli.solve_time_limit,
            max_resumes: cli.max_resumes,
            scale_time: true,
        },
        output_dir: cli.out,
    };
    config.validate()?;

    if cli.start_index < 0 {
        let summary = run_sweep(&config, &default_start_indices(), cli.threads)?;
        info!(
            success = summary.success,
            failure = summary.failure,
            manifest = %summary.manifest_path.display(),
            "sweep finished"
        );
        if summary.failure > 0 {
            anyhow::bail!("{} sweep run(s) failed", summary.failure);
        }
    } else {
        config.start_index = cli.start_index as usize;
        let outcome = run_simulation(&config)?;
        info!(
            total_carbon = outcome.total_carbon,
            total_dollars = outcome.total_dollars,
            details = %outcome.details_path.display(),
            "run finished"
        );
    }
    Ok(())
}
