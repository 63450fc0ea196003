//! Single-interval, non-preemptive placement policies.
//!
//! Every policy picks one contiguous start offset inside the job's carbon
//! window and returns a [`Schedule`]. Candidate starts are hour-aligned
//! (`0, T, 2T, …` with `T` = one native carbon sample) because jobs enter
//! the cluster on an hour basis; only the instantaneous policy looks at
//! individual slots.
//!
//! The carbon integral keeps the trace's proportional convention: power in
//! watts times intensity per slot, summed over the execution window, with
//! no dt factor. All policies and the accountant share this convention, so
//! relative comparisons are exact.

use crate::PlanError;
use casim_core::{CarbonSeries, Job, Schedule, SimError, TICKS_PER_HOUR};
use std::str::FromStr;
use tracing::warn;

/// Carbon integral of running `job` straight through from `start`.
///
/// Fails with [`PlanError::TraceExhausted`] if the window does not cover
/// `[start, start + length)`.
pub fn carbon_cost(job: &Job, window: &CarbonSeries, start: u64) -> Result<Schedule, PlanError> {
    let needed = (start + job.length) as usize;
    if window.len() < needed {
        return Err(PlanError::TraceExhausted {
            needed,
            available: window.len(),
        });
    }
    Ok(integrate(job, window, start))
}

/// Carbon integral over whatever suffix of the window is available. Used by
/// the trace-end fallback; the accountant clips the same way on dispatch.
fn integrate(job: &Job, window: &CarbonSeries, start: u64) -> Schedule {
    let mut carbon = 0.0;
    for i in 0..job.length {
        let Some(intensity) = window.get((start + i) as usize) else {
            break;
        };
        let time_in_job = (job.work_done_before + i) as f64;
        carbon += job.profile.power_at(time_in_job, 0.0) * intensity * job.cpus as f64;
    }
    Schedule::new(start, start + job.length, carbon)
}

/// Start-time policy used by the non-suspending scheduling modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarbonPolicy {
    /// Oracle best slot over the surrogate average-length job.
    Waiting,
    /// Lowest instantaneous intensity; ignores the job length.
    Lowest,
    /// Oracle best slot using the true job length.
    #[default]
    Oracle,
    /// Oracle carbon-savings-per-wait using the true job length.
    CstOracle,
    /// Carbon-savings-per-wait over the surrogate average-length job.
    CstAverage,
}

impl CarbonPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CarbonPolicy::Waiting => "waiting",
            CarbonPolicy::Lowest => "lowest",
            CarbonPolicy::Oracle => "oracle",
            CarbonPolicy::CstOracle => "cst_oracle",
            CarbonPolicy::CstAverage => "cst_average",
        }
    }

    /// Choose a start for `job` inside `window` (the carbon subtrace over
    /// the permissible execution period).
    pub fn place(&self, job: &Job, window: &CarbonSeries) -> Schedule {
        let result = match self {
            CarbonPolicy::Lowest => lowest_carbon_slot(job, window),
            CarbonPolicy::Oracle => oracle_carbon_slot(job, window),
            CarbonPolicy::CstOracle => oracle_carbon_slot_waiting(job, window),
            CarbonPolicy::CstAverage => average_carbon_slot_waiting(job, window),
            CarbonPolicy::Waiting => best_waiting_time(job, window),
        };
        match result {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(
                    job = job.id,
                    policy = self.as_str(),
                    %err,
                    "placement window exhausted, falling back to immediate start"
                );
                integrate(job, window, 0)
            }
        }
    }
}

impl FromStr for CarbonPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(CarbonPolicy::Waiting),
            "lowest" => Ok(CarbonPolicy::Lowest),
            "oracle" => Ok(CarbonPolicy::Oracle),
            "cst_oracle" => Ok(CarbonPolicy::CstOracle),
            "cst_average" => Ok(CarbonPolicy::CstAverage),
            other => Err(SimError::Config(format!(
                "carbon_policy: unknown policy '{other}' (expected waiting, lowest, oracle, cst_oracle, or cst_average)"
            ))),
        }
    }
}

/// Hour-aligned candidate starts within the waiting budget.
fn aligned_starts(waiting: u64) -> impl Iterator<Item = u64> {
    (0..=waiting).step_by(TICKS_PER_HOUR as usize)
}

fn lowest_carbon_slot(job: &Job, window: &CarbonSeries) -> Result<Schedule, PlanError> {
    let start = if job.waiting_time == 0 {
        0
    } else {
        let horizon = ((job.waiting_time + 1) as usize).min(window.len());
        let mut best = 0usize;
        for i in 1..horizon {
            if window.at(i) < window.at(best) {
                best = i;
            }
        }
        best as u64
    };
    carbon_cost(job, window, start)
}

fn oracle_carbon_slot(job: &Job, window: &CarbonSeries) -> Result<Schedule, PlanError> {
    let mut best: Option<Schedule> = None;
    for start in aligned_starts(job.waiting_time) {
        let Ok(schedule) = carbon_cost(job, window, start) else {
            continue;
        };
        let better = match &best {
            Some(current) => schedule.carbon < current.carbon,
            None => true,
        };
        if better {
            best = Some(schedule);
        }
    }
    best.ok_or(PlanError::TraceExhausted {
        needed: job.length as usize,
        available: window.len(),
    })
}

fn oracle_carbon_slot_waiting(job: &Job, window: &CarbonSeries) -> Result<Schedule, PlanError> {
    let immediate = carbon_cost(job, window, 0)?;
    let mut best = immediate;
    let mut best_ratio = 0.0;
    for start in aligned_starts(job.waiting_time).skip(1) {
        let Ok(schedule) = carbon_cost(job, window, start) else {
            continue;
        };
        let ratio =
            (immediate.carbon - schedule.carbon) / (schedule.start + job.length) as f64;
        if ratio > best_ratio {
            best = schedule;
            best_ratio = ratio;
        }
    }
    Ok(best)
}

/// Surrogate of `job` with the trace-average length, modeling ignorance of
/// the true length at scheduling time.
fn surrogate(job: &Job) -> Job {
    Job {
        length: job.expected_length.max(1),
        work_done_before: 0,
        ..job.clone()
    }
}

fn average_carbon_slot_waiting(job: &Job, window: &CarbonSeries) -> Result<Schedule, PlanError> {
    let common = oracle_carbon_slot_waiting(&surrogate(job), window)?;
    carbon_cost(job, window, common.start)
}

fn best_waiting_time(job: &Job, window: &CarbonSeries) -> Result<Schedule, PlanError> {
    let common = oracle_carbon_slot(&surrogate(job), window)?;
    carbon_cost(job, window, common.start)
}
