//! # casim-algo: Placement Policies and Suspend/Resume Planners
//!
//! The scheduling core. Every function here is a deterministic pure
//! function of `(job, carbon window)`; nothing touches shared state, so
//! parameter sweeps can run planners from many threads at once.
//!
//! Three families:
//!
//! - [`placement`]: single-interval, non-preemptive start-time policies
//! - [`threshold`] / [`optimal`]: suspend/resume planners for constant
//!   power draw
//! - [`milp`]: the phase-aware integer program that pays a startup penalty
//!   on every resume (requires the `solver-highs` feature)

pub mod optimal;
pub mod placement;
pub mod threshold;

#[cfg(feature = "solver-highs")]
pub mod milp;

pub use optimal::plan_cheapest;
pub use placement::{carbon_cost, CarbonPolicy};
pub use threshold::plan_threshold;

#[cfg(feature = "solver-highs")]
pub use milp::{plan_phases, PhasePlanConfig};

use thiserror::Error;

/// Planner failure modes.
///
/// Planners return results, not panics: the simulation loop records a
/// failed job and continues.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The carbon window is shorter than the span the planner must search.
    #[error("carbon trace exhausted: needed {needed} slots, window has {available}")]
    TraceExhausted { needed: usize, available: usize },

    /// The integer program has no feasible schedule within the deadline.
    #[error("no feasible schedule within the deadline")]
    Infeasible,

    /// The MILP backend failed for a reason other than infeasibility
    /// (including a time limit hit without a proven incumbent).
    #[error("solver failed: {0}")]
    SolverFailed(String),

    /// The planner cannot handle this power profile shape.
    #[error("unsupported power profile: {0}")]
    UnsupportedProfile(String),
}
