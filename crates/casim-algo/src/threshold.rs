//! Threshold suspend/resume planner.
//!
//! Runs the job in every slot whose intensity sits below a carbon threshold
//! θ, spending the waiting budget to skip expensive slots. θ is computed by
//! the caller (the 0.3 quantile of the next 24 h of the series), so the
//! planner itself stays a pure function of `(job, window, θ)`.

use casim_core::{CarbonSeries, Job, RunPlan};

/// Plan contiguous runs across all slots below `theta`.
///
/// Walks the window left to right. A slot executes when its intensity is
/// below `theta` or the waiting budget is spent; otherwise one tick of
/// waiting budget is consumed. The walk always schedules exactly
/// `job.length` slots within `length + waiting`. Slots past the end of the
/// trace read as zero intensity: there is nothing left to wait for.
pub fn plan_threshold(job: &Job, window: &CarbonSeries, theta: f64) -> RunPlan {
    let horizon = (job.length + job.waiting_time) as usize;
    let mut slots = vec![false; horizon];
    let mut remaining_work = job.length;
    let mut remaining_wait = job.waiting_time;
    for (i, slot) in slots.iter_mut().enumerate() {
        if remaining_work == 0 {
            break;
        }
        let intensity = window.get(i).unwrap_or(0.0);
        if intensity < theta || remaining_wait == 0 {
            *slot = true;
            remaining_work -= 1;
        } else {
            remaining_wait -= 1;
        }
    }
    debug_assert_eq!(remaining_work, 0, "walk must place the whole job");
    RunPlan::from_slots(&slots)
}
