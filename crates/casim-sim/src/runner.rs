//! Single-run simulation driver.
//!
//! Loads the traces, builds the scheduler and accountant, feeds jobs through
//! in arrival order, drains the queue, and writes the result files.

use crate::cluster::ClusterAccountant;
use crate::config::SimulationConfig;
use crate::frontend::SchedulerFrontEnd;
use anyhow::{Context, Result};
use casim_core::{Job, SchedulingContext, TICKS_PER_HOUR};
use casim_io::{load_carbon, load_jobs, write_details, write_runtime, write_summary};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Paths and totals of one finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub total_carbon: f64,
    pub total_dollars: f64,
    pub details_path: PathBuf,
    pub runtime_path: PathBuf,
    pub summary_path: PathBuf,
}

pub fn run_simulation(config: &SimulationConfig) -> Result<RunOutcome> {
    config.validate()?;
    info!(
        scheduling_policy = config.scheduling_policy.as_str(),
        carbon_policy = config.carbon_policy.as_str(),
        carbon_trace = %config.carbon_trace_name,
        task_trace = %config.task_trace_name,
        start_index = config.start_index,
        reserved = config.reserved_instances,
        waiting_times = %config.waiting_times,
        "starting simulation"
    );

    let hourly = load_carbon(
        &config.carbon_trace,
        &config.carbon_trace_name,
        config.start_index,
    )?;
    // Hourly samples expand to the one-second simulation tick.
    let series = hourly.repeat(TICKS_PER_HOUR as usize);

    let (specs, stats) = load_jobs(&config.task_trace)?;
    let ctx = SchedulingContext::from_spec(&config.waiting_times, stats)?;

    let cluster = ClusterAccountant::new(
        config.reserved_instances,
        series.clone(),
        config.scheduling_policy.allows_spot(),
    );
    let mut frontend = SchedulerFrontEnd::new(
        config.planner(),
        ctx.clone(),
        series,
        config.cost_aware(),
        config.spot_aware(),
    );

    // Jobs arrive in order. Between arrivals the clock advances to each
    // pending ready time, so no entry is released later than planned.
    let mut now = 0;
    for spec in &specs {
        while let Some(ready) = frontend.next_ready_time() {
            if ready >= spec.arrival {
                break;
            }
            now = now.max(ready);
            frontend.execute(now, &cluster);
        }
        now = now.max(spec.arrival);
        let job = Job::new(
            &ctx,
            spec.id,
            spec.arrival,
            spec.length,
            spec.cpus,
            Arc::clone(&spec.profile),
        );
        frontend.submit(now, job, &cluster);
        frontend.execute(now, &cluster);
    }

    // Entries planned past the last arrival still have to run: advance the
    // clock to each remaining ready time until the queue empties.
    while let Some(ready) = frontend.next_ready_time() {
        now = now.max(ready);
        frontend.execute(now, &cluster);
    }

    let report = cluster.finalize();
    let label = config.label();
    let details_path = config.output_dir.join(label.details_filename());
    let runtime_path = config.output_dir.join(label.runtime_filename());
    let summary_path = config.output_dir.join(label.summary_filename());
    write_details(&details_path, &report.details)
        .with_context(|| format!("writing {}", details_path.display()))?;
    write_runtime(&runtime_path, &report.runtime_allocation)
        .with_context(|| format!("writing {}", runtime_path.display()))?;
    write_summary(&summary_path, report.total_carbon, report.total_dollars)
        .with_context(|| format!("writing {}", summary_path.display()))?;

    info!(
        total_carbon = report.total_carbon,
        total_dollars = report.total_dollars,
        details = %details_path.display(),
        "simulation finished"
    );
    Ok(RunOutcome {
        total_carbon: report.total_carbon,
        total_dollars: report.total_dollars,
        details_path,
        runtime_path,
        summary_path,
    })
}
