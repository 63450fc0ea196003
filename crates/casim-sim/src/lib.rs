//! # casim-sim: Simulation Harness
//!
//! The tick-driven, single-threaded simulation around the planners: a
//! scheduler front-end holding the pending queue, the cluster accountant
//! tracking carbon, dollars, and CPU-seconds, and the run/sweep drivers.
//!
//! The simulator is deterministic: ties in the queue break by submission
//! order and all planner tie-breaks favor the smallest index, so a
//! configuration always reproduces the same result files.

pub mod cluster;
pub mod config;
pub mod frontend;
pub mod runner;
pub mod sweep;

pub use cluster::{
    ClusterAccountant, ClusterReport, ClusterState, ON_DEMAND_COST_HOUR, RESERVED_DISCOUNT_RATE,
    SPOT_COST_HOUR,
};
pub use config::{SchedulingPolicy, SimulationConfig};
pub use frontend::{Planner, SchedulerFrontEnd};
pub use runner::{run_simulation, RunOutcome};
pub use sweep::{default_start_indices, run_sweep, SweepSummary};
