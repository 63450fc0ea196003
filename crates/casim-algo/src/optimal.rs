//! Optimal suspend/resume planner for constant power draw.
//!
//! With a flat power profile and no startup penalty, the minimum-carbon
//! schedule is simply the `length` cheapest slots of the deadline window.

use casim_core::{CarbonSeries, Job, RunPlan};

/// Select the `job.length` cheapest slots in `[0, length + waiting)` and
/// coalesce them into contiguous runs. Ties break toward the earlier slot;
/// slots past the end of the trace read as zero intensity.
pub fn plan_cheapest(job: &Job, window: &CarbonSeries) -> RunPlan {
    let horizon = (job.length + job.waiting_time) as usize;
    let mut order: Vec<usize> = (0..horizon).collect();
    order.sort_by(|&a, &b| {
        let ia = window.get(a).unwrap_or(0.0);
        let ib = window.get(b).unwrap_or(0.0);
        ia.partial_cmp(&ib)
            .expect("carbon values are comparable")
            .then(a.cmp(&b))
    });
    let mut slots = vec![false; horizon];
    for &i in order.iter().take(job.length as usize) {
        slots[i] = true;
    }
    RunPlan::from_slots(&slots)
}
