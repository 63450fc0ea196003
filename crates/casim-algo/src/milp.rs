//! Phase-aware suspend/resume planning as a mixed-integer program.
//!
//! ## The problem
//!
//! A job with a piecewise-constant power profile pays its startup phases on
//! *every* resume, and only work completed past the latest checkpoint
//! persists across a suspension. Picking the cheapest slots is therefore no
//! longer a sort: splitting a run buys cheaper carbon slots at the price of
//! replaying startup. The planner places startup and work slots jointly and
//! lets the objective arbitrate.
//!
//! ## Formulation
//!
//! Per scaled tick `t ∈ [0, N)`:
//!
//! ```text
//! start[t], work[t], startup_done[t]  binary state indicators
//! sp[t] ∈ [0, S]                      startup progress counter
//! wp[t] ∈ [0, W]                      work progress counter
//! lower_p[t], upper_p[t], in_p[t]     per-phase activation binaries
//!
//! minimize   Σ_t Σ_p in_p[t] · watts_p · carbon[t]
//!
//! subject to state exclusivity, progress accounting, startup-before-resume
//! contiguity, big-M phase activation (M = 2N), and a resume cap.
//! ```
//!
//! `in_p[t]` linearizes "the job is inside phase p at tick t": the phase's
//! kind matches the state indicator and the kind's progress counter lies in
//! the phase's cumulative bounds.
//!
//! ## Time scaling
//!
//! Second-resolution deadlines make the model enormous, so time is rescaled
//! by `Δ = gcd(3600, deadline, ⌊duration_p⌋ …)` and the carbon window is
//! subsampled at stride Δ. Δ = 1 when scaling is disabled.

use crate::PlanError;
use casim_core::{CarbonSeries, Phase, PowerProfile, RunPlan};
use good_lp::solvers::highs::highs as highs_solver;
use good_lp::{constraint, variable, variables, Constraint, Expression, ResolutionError, Solution,
    SolverModel, Variable};

/// Tuning knobs for the phase-aware planner.
#[derive(Debug, Clone)]
pub struct PhasePlanConfig {
    /// Wall-clock solve limit in seconds.
    pub time_limit: f64,
    /// Upper bound on resumes. A search-space bound: deadlines with many
    /// low-carbon pockets may need a larger cap.
    pub max_resumes: u64,
    /// Rescale time by the gcd of the deadline and phase durations.
    pub scale_time: bool,
}

impl Default for PhasePlanConfig {
    fn default() -> Self {
        PhasePlanConfig {
            time_limit: 20.0 * 60.0,
            max_resumes: 5,
            scale_time: true,
        }
    }
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Cumulative activation bounds for one phase, in scaled ticks.
struct PhaseSlot<'a> {
    phase: &'a Phase,
    /// Progress counter lower bound (inclusive).
    lo: f64,
    /// Progress counter upper bound (exclusive, with the +1 slack the
    /// activation encoding needs).
    hi: f64,
    /// True for startup phases, false for work phases.
    is_startup: bool,
}

fn phase_slots<'a>(
    startup: &'a [Phase],
    work: &'a [Phase],
    delta: u64,
) -> Vec<PhaseSlot<'a>> {
    let mut slots = Vec::new();
    for (phases, is_startup) in [(startup, true), (work, false)] {
        let mut cum: u64 = 0;
        for phase in phases {
            let dur = phase.duration as u64;
            if dur == 0 {
                continue;
            }
            slots.push(PhaseSlot {
                phase,
                lo: cum as f64,
                hi: cum as f64 + 1.0 + dur as f64 / delta as f64,
                is_startup,
            });
            cum += dur / delta;
        }
    }
    slots
}

/// Place startup and work slots for a phased job inside a deadline window.
///
/// `window` is the carbon subtrace starting at the current time with at
/// least `deadline` one-second slots. Returns the executed slots coalesced
/// into contiguous runs at second resolution.
pub fn plan_phases(
    window: &CarbonSeries,
    deadline: u64,
    profile: &PowerProfile,
    config: &PhasePlanConfig,
) -> Result<RunPlan, PlanError> {
    let (startup, work) = match profile {
        PowerProfile::Phased { startup, work } => (startup.as_slice(), work.as_slice()),
        PowerProfile::Constant { .. } => {
            return Err(PlanError::UnsupportedProfile(
                "constant draw needs no phase-aware planning".into(),
            ))
        }
    };
    for phase in startup.iter().chain(work) {
        if !phase.duration.is_finite() || phase.duration < 0.0 {
            return Err(PlanError::UnsupportedProfile(format!(
                "phase '{}' has duration {}",
                phase.name, phase.duration
            )));
        }
    }
    if deadline == 0 {
        return Err(PlanError::Infeasible);
    }

    let delta = if config.scale_time {
        let mut d = gcd(3600, deadline);
        for phase in startup.iter().chain(work) {
            d = gcd(d, phase.duration as u64);
        }
        d
    } else {
        1
    };

    let n = (deadline / delta) as usize;
    let startup_len = (startup.iter().map(|p| p.duration).sum::<f64>() as u64 / delta) as usize;
    let work_len = (work.iter().map(|p| p.duration).sum::<f64>() as u64 / delta) as usize;
    if work_len == 0 {
        return Err(PlanError::UnsupportedProfile(
            "profile has no work to schedule".into(),
        ));
    }
    if startup_len + work_len > n {
        return Err(PlanError::Infeasible);
    }

    let strided = window.stride(delta as usize);
    if strided.len() < n {
        return Err(PlanError::TraceExhausted {
            needed: deadline as usize,
            available: window.len(),
        });
    }
    let carbon: Vec<f64> = strided.as_slice()[..n].to_vec();

    // A bound no progress counter can reach.
    let big_m = 2.0 * n as f64;

    let mut vars = variables!();
    let start: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();
    let work_v: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();
    let done: Vec<Variable> = (0..n).map(|_| vars.add(variable().binary())).collect();
    let sp: Vec<Variable> = (0..n)
        .map(|_| vars.add(variable().integer().min(0).max(startup_len as f64)))
        .collect();
    let wp: Vec<Variable> = (0..n)
        .map(|_| vars.add(variable().integer().min(0).max(work_len as f64)))
        .collect();

    let slots = phase_slots(startup, work, delta);
    struct SlotVars {
        watts: f64,
        lower: Vec<Variable>,
        upper: Vec<Variable>,
        active: Vec<Variable>,
        is_startup: bool,
        lo: f64,
        hi: f64,
    }
    let slot_vars: Vec<SlotVars> = slots
        .iter()
        .map(|slot| SlotVars {
            watts: slot.phase.watts,
            lower: (0..n).map(|_| vars.add(variable().binary())).collect(),
            upper: (0..n).map(|_| vars.add(variable().binary())).collect(),
            active: (0..n).map(|_| vars.add(variable().binary())).collect(),
            is_startup: slot.is_startup,
            lo: slot.lo,
            hi: slot.hi,
        })
        .collect();

    // Objective: carbon emitted by whichever phase is active at each tick.
    let mut objective = Expression::from(0.0);
    for sv in &slot_vars {
        for t in 0..n {
            objective += sv.watts * carbon[t] * sv.active[t];
        }
    }

    let mut constraints: Vec<Constraint> = Vec::new();

    // State exclusivity.
    for t in 0..n {
        constraints.push(constraint!(start[t] + work_v[t] <= 1.0));
        constraints.push(constraint!(done[t] + work_v[t] <= 1.0));
    }

    // Work accounting: wp counts executed work ticks and never resets.
    constraints.push(constraint!(wp[0] - work_v[0] == 0.0));
    for t in 1..n {
        constraints.push(constraint!(wp[t] - wp[t - 1] - work_v[t] == 0.0));
    }
    let total_work = work_v[startup_len..]
        .iter()
        .fold(Expression::from(0.0), |acc, v| acc + *v);
    constraints.push(constraint!(total_work == work_len as f64));
    if startup_len > 0 {
        let head_work = work_v[..startup_len]
            .iter()
            .fold(Expression::from(0.0), |acc, v| acc + *v);
        constraints.push(constraint!(head_work == 0.0));
    }

    // Startup accounting: sp counts up while starting and resets to 0
    // whenever the job is not in a startup slot.
    if startup_len > 0 {
        constraints.push(constraint!(sp[0] - start[0] == 0.0));
        for t in 1..n {
            constraints.push(constraint!(
                sp[t] - sp[t - 1] - big_m * start[t] >= 1.0 - big_m
            ));
            constraints.push(constraint!(
                sp[t] - sp[t - 1] + big_m * start[t] <= 1.0 + big_m
            ));
            constraints.push(constraint!(sp[t] - big_m * start[t] <= 0.0));
        }
    }

    // Every transition into work marks a completed startup, and a completed
    // startup needs S contiguous startup slots right before it.
    for t in 0..n.saturating_sub(1) {
        constraints.push(constraint!(done[t] - work_v[t + 1] + work_v[t] >= 0.0));
    }
    if startup_len > 0 {
        for t in (startup_len - 1)..n {
            let run = (0..startup_len)
                .map(|j| start[t - j])
                .fold(Expression::from(0.0), |acc, v| acc + v);
            constraints.push(constraint!(run - (startup_len as f64) * done[t] >= 0.0));
        }
    }

    // Phase activation: in_p[t] = 1 exactly when the kind's progress counter
    // lies inside the phase's cumulative bounds and the state matches.
    for sv in &slot_vars {
        let prog = if sv.is_startup { &sp } else { &wp };
        let state = if sv.is_startup { &start } else { &work_v };
        for t in 0..n {
            constraints.push(constraint!(prog[t] - sv.lo <= big_m * sv.lower[t]));
            constraints.push(constraint!(
                big_m * sv.lower[t] - prog[t] <= big_m - sv.lo
            ));
            constraints.push(constraint!(big_m * sv.upper[t] + prog[t] >= sv.hi));
            constraints.push(constraint!(
                prog[t] + big_m * sv.upper[t] <= sv.hi + big_m
            ));
            constraints.push(constraint!(
                sv.active[t] - sv.lower[t] - sv.upper[t] - state[t] >= -2.0
            ));
            constraints.push(constraint!(sv.active[t] - sv.lower[t] <= 0.0));
            constraints.push(constraint!(sv.active[t] - sv.upper[t] <= 0.0));
            constraints.push(constraint!(sv.active[t] - state[t] <= 0.0));
        }
    }

    // Resume cap keeps the search space sane.
    let resumes = done
        .iter()
        .fold(Expression::from(0.0), |acc, v| acc + *v);
    constraints.push(constraint!(resumes <= config.max_resumes as f64));

    let mut model = vars
        .minimise(objective)
        .using(highs_solver)
        .set_time_limit(config.time_limit);
    for c in constraints {
        model = model.with(c);
    }

    let solution = match model.solve() {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => return Err(PlanError::Infeasible),
        Err(err) => return Err(PlanError::SolverFailed(err.to_string())),
    };

    // Expand scheduled ticks back to second resolution and coalesce.
    let mut slots_mask = Vec::with_capacity(n * delta as usize);
    for t in 0..n {
        let on = solution.value(start[t]) > 0.5 || solution.value(work_v[t]) > 0.5;
        slots_mask.extend(std::iter::repeat(on).take(delta as usize));
    }
    Ok(RunPlan::from_slots(&slots_mask))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcd_chain_scales_time() {
        assert_eq!(gcd(3600, 7200), 3600);
        assert_eq!(gcd(gcd(3600, 10), 5), 5);
        assert_eq!(gcd(42, 0), 42);
    }

    #[test]
    fn phase_slots_accumulate_bounds_per_kind() {
        let startup = vec![Phase::new("boot", 2.0, 5.0)];
        let work = vec![Phase::new("a", 3.0, 10.0), Phase::new("b", 2.0, 20.0)];
        let slots = phase_slots(&startup, &work, 1);
        assert_eq!(slots.len(), 3);
        assert!(slots[0].is_startup);
        assert_eq!(slots[0].lo, 0.0);
        assert_eq!(slots[0].hi, 3.0);
        assert!(!slots[1].is_startup);
        assert_eq!(slots[1].lo, 0.0);
        assert_eq!(slots[2].lo, 3.0);
        assert_eq!(slots[2].hi, 6.0);
    }

    #[test]
    fn zero_duration_phases_are_dropped() {
        let work = vec![Phase::new("noop", 0.0, 99.0), Phase::new("a", 2.0, 1.0)];
        let slots = phase_slots(&[], &work, 1);
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].phase.name, "a");
    }

    #[test]
    fn constant_profiles_are_rejected() {
        let window = CarbonSeries::new("test", 0, vec![1.0; 8]);
        let err = plan_phases(
            &window,
            8,
            &PowerProfile::constant(1.0),
            &PhasePlanConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::UnsupportedProfile(_)));
    }

    #[test]
    fn deadline_shorter_than_job_is_infeasible() {
        let window = CarbonSeries::new("test", 0, vec![1.0; 4]);
        let profile = PowerProfile::phased(
            vec![Phase::new("boot", 2.0, 1.0)],
            vec![Phase::new("work", 3.0, 1.0)],
        );
        let err = plan_phases(&window, 4, &profile, &PhasePlanConfig::default()).unwrap_err();
        assert_eq!(err, PlanError::Infeasible);
    }

    #[test]
    fn short_window_is_trace_exhausted() {
        let window = CarbonSeries::new("test", 0, vec![1.0; 5]);
        let profile = PowerProfile::phased(vec![], vec![Phase::new("work", 3.0, 1.0)]);
        let err = plan_phases(&window, 10, &profile, &PhasePlanConfig::default()).unwrap_err();
        assert!(matches!(err, PlanError::TraceExhausted { .. }));
    }
}
