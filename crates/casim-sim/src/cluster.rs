//! Cluster accounting.
//!
//! The accountant is the only mutable state in a simulation. It integrates
//! each dispatched subtask's power profile against the carbon series,
//! charges dollars under a mixed on-demand / reserved-instance model, and
//! keeps the per-tick CPU utilization vector and per-job detail records.
//!
//! All state sits behind one mutex (the cluster lock) so a parameter-sweep
//! driver can run independent simulations from parallel workers; within one
//! simulation there is no contention.

use casim_core::{CarbonSeries, Job};
use casim_io::TaskRecord;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Mutex, MutexGuard};

pub const ON_DEMAND_COST_HOUR: f64 = 0.0624;
pub const SPOT_COST_HOUR: f64 = 0.01248;
pub const RESERVED_DISCOUNT_RATE: f64 = 0.4;

/// Aggregated results of one simulation.
#[derive(Debug, Clone)]
pub struct ClusterReport {
    pub total_carbon: f64,
    pub total_dollars: f64,
    pub details: Vec<TaskRecord>,
    pub runtime_allocation: Vec<u64>,
}

/// Mutable cluster state; reachable only through [`ClusterAccountant::lock`].
#[derive(Debug)]
pub struct ClusterState {
    series: CarbonSeries,
    total_carbon: f64,
    total_dollars: f64,
    /// Per-tick rates derived from the hourly prices.
    on_demand_cost: f64,
    spot_cost: f64,
    /// Latest observed subtask start, used for reserved settlement.
    max_time: u64,
    total_reserved: u32,
    available_reserved: u32,
    /// Reserved capacity handed out, keyed by release tick.
    releases: BinaryHeap<Reverse<(u64, u32)>>,
    allow_spot: bool,
    runtime_allocation: Vec<u64>,
    details: Vec<TaskRecord>,
}

/// The cluster accountant: one mutual-exclusion region around the per-tick
/// dispatch and refresh step.
#[derive(Debug)]
pub struct ClusterAccountant {
    state: Mutex<ClusterState>,
}

impl ClusterAccountant {
    pub fn new(reserved_instances: u32, series: CarbonSeries, allow_spot: bool) -> Self {
        let ticks_per_hour = 3600.0;
        let len = series.len();
        ClusterAccountant {
            state: Mutex::new(ClusterState {
                series,
                total_carbon: 0.0,
                total_dollars: 0.0,
                on_demand_cost: ON_DEMAND_COST_HOUR / ticks_per_hour,
                spot_cost: SPOT_COST_HOUR / ticks_per_hour,
                max_time: 0,
                total_reserved: reserved_instances,
                available_reserved: reserved_instances,
                releases: BinaryHeap::new(),
                allow_spot,
                runtime_allocation: vec![0; len],
                details: Vec::new(),
            }),
        }
    }

    /// Take the cluster lock for one dispatch+refresh step.
    pub fn lock(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().expect("cluster lock poisoned")
    }

    /// Settle reserved instances and hand back the report. Appends the
    /// sentinel record (ID = -1) carrying the settlement cost.
    pub fn finalize(self) -> ClusterReport {
        let mut state = self.state.into_inner().expect("cluster lock poisoned");
        let settlement = state.total_reserved as f64
            * RESERVED_DISCOUNT_RATE
            * state.max_time as f64
            * state.on_demand_cost;
        state.total_dollars += settlement;
        state.details.push(TaskRecord {
            id: -1,
            arrival_time: 0,
            length: 0,
            cpus: 0,
            length_class: String::new(),
            resource_class: String::new(),
            carbon_cost: 0.0,
            dollar_cost: settlement,
            start_time: 0,
            waiting_time: 0,
            exit_time: 0,
            reason: String::new(),
        });
        ClusterReport {
            total_carbon: state.total_carbon,
            total_dollars: state.total_dollars,
            details: state.details,
            runtime_allocation: state.runtime_allocation,
        }
    }
}

impl ClusterState {
    pub fn available_reserved(&self) -> u32 {
        self.available_reserved
    }

    /// Run a subtask starting now: integrate carbon, charge dollars, and
    /// record the details row.
    pub fn dispatch(&mut self, now: u64, job: &Job) {
        let start = now;
        let mut carbon = 0.0;
        let mut reason = "completed";
        for i in 0..job.length {
            let Some(intensity) = self.series.get((start + i) as usize) else {
                // Past the end of the carbon series: nothing left to integrate.
                reason = "trace_end";
                break;
            };
            carbon += job.profile.power_at(i as f64, job.work_done_before as f64)
                * intensity
                * job.cpus as f64;
        }

        let dollars = if self.available_reserved >= job.cpus {
            self.available_reserved -= job.cpus;
            self.releases.push(Reverse((start + job.length, job.cpus)));
            // Reserved capacity is prepaid; charged at settlement.
            0.0
        } else {
            let rate = if self.allow_spot {
                self.spot_cost
            } else {
                self.on_demand_cost
            };
            job.cpus as f64 * job.length as f64 * rate
        };

        self.max_time = self.max_time.max(start);
        if (start as usize) < self.runtime_allocation.len() {
            let end = ((start + job.length) as usize).min(self.runtime_allocation.len() - 1);
            for slot in &mut self.runtime_allocation[start as usize..=end] {
                *slot += job.cpus as u64;
            }
        }

        self.total_carbon += carbon;
        self.total_dollars += dollars;
        self.details.push(TaskRecord {
            id: job.id,
            arrival_time: job.arrival,
            length: job.length,
            cpus: job.cpus,
            length_class: job.length_class.to_string(),
            resource_class: job.resource_class.to_string(),
            carbon_cost: carbon,
            dollar_cost: dollars,
            start_time: start,
            waiting_time: start - job.arrival,
            exit_time: start + job.length,
            reason: reason.to_string(),
        });
    }

    /// Record a job whose planning failed: zero schedule, zero cost.
    pub fn log_failure(&mut self, now: u64, job: &Job, reason: &str) {
        self.details.push(TaskRecord {
            id: job.id,
            arrival_time: job.arrival,
            length: job.length,
            cpus: job.cpus,
            length_class: job.length_class.to_string(),
            resource_class: job.resource_class.to_string(),
            carbon_cost: 0.0,
            dollar_cost: 0.0,
            start_time: now,
            waiting_time: now - job.arrival,
            exit_time: now,
            reason: reason.to_string(),
        });
    }

    /// Release reserved capacity whose subtasks have exited by `now`.
    pub fn refresh(&mut self, now: u64) {
        while let Some(Reverse((release_at, cpus))) = self.releases.peek().copied() {
            if release_at > now {
                break;
            }
            self.releases.pop();
            self.available_reserved += cpus;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casim_core::{PowerProfile, SchedulingContext, TraceStats};
    use std::sync::Arc;

    fn ctx() -> SchedulingContext {
        SchedulingContext::new(
            vec![3600],
            TraceStats {
                mean_short: 2,
                mean_long: 4,
            },
        )
        .unwrap()
    }

    fn job(id: i64, arrival: u64, length: u64, cpus: u32) -> Job {
        Job::new(
            &ctx(),
            id,
            arrival,
            length,
            cpus,
            Arc::new(PowerProfile::constant(1.0)),
        )
    }

    fn flat_series(len: usize, value: f64) -> CarbonSeries {
        CarbonSeries::new("test", 0, vec![value; len])
    }

    #[test]
    fn dispatch_integrates_carbon_and_charges_on_demand() {
        let cluster = ClusterAccountant::new(0, flat_series(100, 2.0), false);
        {
            let mut state = cluster.lock();
            state.dispatch(10, &job(1, 0, 5, 2));
        }
        let report = cluster.finalize();
        // 5 ticks x 2 kg x 2 cpus x 1 W
        assert!((report.total_carbon - 20.0).abs() < 1e-12);
        let expected_dollars = 2.0 * 5.0 * ON_DEMAND_COST_HOUR / 3600.0;
        assert!((report.total_dollars - expected_dollars).abs() < 1e-12);
        let record = &report.details[0];
        assert_eq!(record.start_time, 10);
        assert_eq!(record.waiting_time, 10);
        assert_eq!(record.exit_time, 15);
        assert_eq!(record.reason, "completed");
    }

    #[test]
    fn reserved_capacity_is_free_until_settlement() {
        let cluster = ClusterAccountant::new(4, flat_series(10_000, 1.0), false);
        {
            let mut state = cluster.lock();
            state.dispatch(0, &job(1, 0, 100, 4));
            assert_eq!(state.available_reserved(), 0);
            // Exhausted: the next job pays on demand.
            state.dispatch(0, &job(2, 0, 100, 1));
            assert!(state.total_dollars > 0.0);
            // Capacity comes back once the first job exits.
            state.refresh(100);
            assert_eq!(state.available_reserved(), 4);
        }
    }

    #[test]
    fn settlement_row_carries_reserved_cost() {
        let cluster = ClusterAccountant::new(4, flat_series(10_000, 1.0), false);
        {
            let mut state = cluster.lock();
            state.dispatch(3600, &job(1, 0, 10, 1));
        }
        let report = cluster.finalize();
        let sentinel = report.details.last().unwrap();
        assert_eq!(sentinel.id, -1);
        // 4 reserved x 0.4 x 0.0624 $/h x 1 h
        assert!((sentinel.dollar_cost - 0.09984).abs() < 1e-9);
    }

    #[test]
    fn spot_clusters_charge_the_spot_rate() {
        let cluster = ClusterAccountant::new(0, flat_series(100, 1.0), true);
        {
            let mut state = cluster.lock();
            state.dispatch(0, &job(1, 0, 10, 1));
        }
        let report = cluster.finalize();
        let expected = 10.0 * SPOT_COST_HOUR / 3600.0;
        assert!((report.total_dollars - expected).abs() < 1e-12);
    }

    #[test]
    fn dispatch_past_series_end_is_trace_end() {
        let cluster = ClusterAccountant::new(0, flat_series(10, 1.0), false);
        {
            let mut state = cluster.lock();
            state.dispatch(8, &job(1, 0, 5, 1));
        }
        let report = cluster.finalize();
        let record = &report.details[0];
        assert_eq!(record.reason, "trace_end");
        // Only slots 8 and 9 exist.
        assert!((record.carbon_cost - 2.0).abs() < 1e-12);
    }

    #[test]
    fn runtime_allocation_covers_the_execution_span() {
        let cluster = ClusterAccountant::new(0, flat_series(20, 1.0), false);
        {
            let mut state = cluster.lock();
            state.dispatch(2, &job(1, 0, 3, 2));
        }
        let report = cluster.finalize();
        assert_eq!(report.runtime_allocation[1], 0);
        for slot in 2..=5 {
            assert_eq!(report.runtime_allocation[slot], 2);
        }
        assert_eq!(report.runtime_allocation[6], 0);
    }
}
