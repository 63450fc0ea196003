//! # casim-io: Trace Loading and Result Serialization
//!
//! External interfaces of the simulator: CSV loaders for carbon and job
//! traces and CSV writers for per-run results. Everything here is plain
//! tabular I/O; the simulation itself never touches the filesystem.

pub mod carbon;
pub mod jobs;
pub mod results;

pub use carbon::{load_carbon, CARBON_WINDOW_ROWS};
pub use jobs::{load_jobs, JobSpec};
pub use results::{write_details, write_runtime, write_summary, RunLabel, TaskRecord};
