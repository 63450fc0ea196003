//! Simulation configuration and fail-fast validation.

use crate::frontend::Planner;
use casim_algo::{CarbonPolicy, PhasePlanConfig};
use casim_core::{SimError, SimResult};
use casim_io::RunLabel;
use std::path::PathBuf;
use std::str::FromStr;

/// The scheduling mode selected for a run. Spot variants route non-reserved
/// capacity to interruptible (cheaper) instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    Carbon,
    CarbonSpot,
    CarbonCost,
    CarbonCostSpot,
    Cost,
    SuspendResume,
    SuspendResumeSpot,
    SuspendResumeThreshold,
}

impl SchedulingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingPolicy::Carbon => "carbon",
            SchedulingPolicy::CarbonSpot => "carbon-spot",
            SchedulingPolicy::CarbonCost => "carbon-cost",
            SchedulingPolicy::CarbonCostSpot => "carbon-cost-spot",
            SchedulingPolicy::Cost => "cost",
            SchedulingPolicy::SuspendResume => "suspend-resume",
            SchedulingPolicy::SuspendResumeSpot => "suspend-resume-spot",
            SchedulingPolicy::SuspendResumeThreshold => "suspend-resume-threshold",
        }
    }

    /// Whether the cluster may place non-reserved work on spot instances.
    pub fn allows_spot(&self) -> bool {
        matches!(
            self,
            SchedulingPolicy::CarbonSpot
                | SchedulingPolicy::CarbonCostSpot
                | SchedulingPolicy::SuspendResumeSpot
        )
    }
}

impl FromStr for SchedulingPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carbon" => Ok(SchedulingPolicy::Carbon),
            "carbon-spot" => Ok(SchedulingPolicy::CarbonSpot),
            "carbon-cost" => Ok(SchedulingPolicy::CarbonCost),
            "carbon-cost-spot" => Ok(SchedulingPolicy::CarbonCostSpot),
            "cost" => Ok(SchedulingPolicy::Cost),
            "suspend-resume" => Ok(SchedulingPolicy::SuspendResume),
            "suspend-resume-spot" => Ok(SchedulingPolicy::SuspendResumeSpot),
            "suspend-resume-threshold" => Ok(SchedulingPolicy::SuspendResumeThreshold),
            other => Err(SimError::Config(format!(
                "scheduling_policy: unknown policy '{other}'"
            ))),
        }
    }
}

/// Everything one simulation needs; cloneable so sweeps can fan out copies
/// with different start indices.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub carbon_trace: PathBuf,
    pub carbon_trace_name: String,
    pub task_trace: PathBuf,
    pub task_trace_name: String,
    pub scheduling_policy: SchedulingPolicy,
    pub carbon_policy: CarbonPolicy,
    pub reserved_instances: u32,
    /// `x`-separated waiting budgets in hours, e.g. `"6x24"`.
    pub waiting_times: String,
    pub start_index: usize,
    pub dynamic_power: bool,
    pub phase_plan: PhasePlanConfig,
    pub output_dir: PathBuf,
}

impl SimulationConfig {
    /// Reject bad configurations before any trace is read.
    pub fn validate(&self) -> SimResult<()> {
        let queues = self.waiting_times.split('x').count();
        if !(1..=2).contains(&queues) {
            return Err(SimError::Config(format!(
                "waiting_times: expected 1 or 2 queue budgets, got {queues}"
            )));
        }
        for part in self.waiting_times.split('x') {
            if part.trim().parse::<f64>().is_err() {
                return Err(SimError::Config(format!(
                    "waiting_times: '{part}' is not a number of hours"
                )));
            }
        }
        if self.dynamic_power {
            if self.carbon_policy != CarbonPolicy::Oracle {
                return Err(SimError::Config(format!(
                    "dynamic_power: requires carbon_policy=oracle, got '{}'",
                    self.carbon_policy.as_str()
                )));
            }
            if !matches!(
                self.scheduling_policy,
                SchedulingPolicy::Carbon | SchedulingPolicy::SuspendResume
            ) {
                return Err(SimError::Config(format!(
                    "dynamic_power: requires scheduling_policy carbon or suspend-resume, got '{}'",
                    self.scheduling_policy.as_str()
                )));
            }
        }
        Ok(())
    }

    /// The planner variant this configuration selects.
    pub fn planner(&self) -> Planner {
        match self.scheduling_policy {
            SchedulingPolicy::Cost => Planner::Hold,
            SchedulingPolicy::Carbon
            | SchedulingPolicy::CarbonSpot
            | SchedulingPolicy::CarbonCost
            | SchedulingPolicy::CarbonCostSpot => Planner::Placement(self.carbon_policy),
            SchedulingPolicy::SuspendResume => {
                if self.dynamic_power {
                    Planner::PhaseIlp(self.phase_plan.clone())
                } else {
                    Planner::SuspendOptimal
                }
            }
            SchedulingPolicy::SuspendResumeSpot => Planner::SuspendOptimal,
            SchedulingPolicy::SuspendResumeThreshold => Planner::SuspendThreshold,
        }
    }

    /// Work-conserving dispatch onto idle reservations.
    pub fn cost_aware(&self) -> bool {
        matches!(
            self.scheduling_policy,
            SchedulingPolicy::CarbonCost | SchedulingPolicy::CarbonCostSpot | SchedulingPolicy::Cost
        )
    }

    /// Restrict early dispatch to jobs outside the shortest length bucket.
    pub fn spot_aware(&self) -> bool {
        matches!(
            self.scheduling_policy,
            SchedulingPolicy::CarbonSpot | SchedulingPolicy::CarbonCostSpot
        )
    }

    pub fn label(&self) -> RunLabel {
        RunLabel {
            scheduling_policy: self.scheduling_policy.as_str().to_string(),
            carbon_policy: self.carbon_policy.as_str().to_string(),
            carbon_trace: self.carbon_trace_name.clone(),
            task_trace: self.task_trace_name.clone(),
            start_index: self.start_index,
            reserved_instances: self.reserved_instances,
            waiting_times: self.waiting_times.clone(),
        }
    }
}
