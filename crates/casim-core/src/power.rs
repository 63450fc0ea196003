//! Piecewise-constant power draw profiles.
//!
//! A job's power draw over its lifetime is a list of *startup phases*
//! followed by a list of *work phases*. Startup is replayed on every resume;
//! work advances persistent progress. A work phase flagged as a checkpoint
//! persists everything up to its end, so a resumed job restarts from the
//! phase right after the latest crossed checkpoint and redoes any
//! non-checkpointed work.
//!
//! The common case is a flat draw, kept as its own variant so the planners
//! can tell cheap constant-power jobs from jobs that need phase-aware
//! treatment.

use serde::{Deserialize, Serialize};

/// One phase of execution: a name, a duration in seconds, a power draw in
/// watts, and (for work phases) whether completing it checkpoints progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub duration: f64,
    pub watts: f64,
    #[serde(default)]
    pub checkpoint: bool,
}

impl Phase {
    pub fn new(name: impl Into<String>, duration: f64, watts: f64) -> Self {
        Phase {
            name: name.into(),
            duration,
            watts,
            checkpoint: false,
        }
    }

    pub fn with_checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }
}

/// Power draw over a job's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerProfile {
    /// Flat draw for the whole (arbitrarily long) job.
    Constant { watts: f64 },
    /// Startup phases replayed on every resume, then work phases.
    Phased {
        startup: Vec<Phase>,
        work: Vec<Phase>,
    },
}

impl PowerProfile {
    pub fn constant(watts: f64) -> Self {
        PowerProfile::Constant { watts }
    }

    pub fn phased(startup: Vec<Phase>, work: Vec<Phase>) -> Self {
        PowerProfile::Phased { startup, work }
    }

    /// Look up a named profile from the registry used by job traces.
    pub fn by_name(name: &str) -> Option<PowerProfile> {
        match name {
            "constant" => Some(PowerProfile::constant(1.0)),
            "constant-2" => Some(PowerProfile::constant(2.0)),
            "roberta" => Some(roberta()),
            _ => None,
        }
    }

    /// Whether this profile needs the phase-aware planner.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, PowerProfile::Phased { .. })
    }

    pub fn startup_phases(&self) -> &[Phase] {
        match self {
            PowerProfile::Constant { .. } => &[],
            PowerProfile::Phased { startup, .. } => startup,
        }
    }

    pub fn work_phases(&self) -> &[Phase] {
        match self {
            PowerProfile::Constant { .. } => &[],
            PowerProfile::Phased { work, .. } => work,
        }
    }

    /// Total startup duration in seconds (replayed on each resume).
    pub fn startup_duration(&self) -> f64 {
        self.startup_phases().iter().map(|p| p.duration).sum()
    }

    /// Total work duration in seconds.
    pub fn work_duration(&self) -> f64 {
        match self {
            PowerProfile::Constant { .. } => f64::INFINITY,
            PowerProfile::Phased { work, .. } => work.iter().map(|p| p.duration).sum(),
        }
    }

    pub fn total_duration(&self) -> f64 {
        self.startup_duration() + self.work_duration()
    }

    /// Persistent work offset a resume restarts from: the end of the latest
    /// checkpointed work phase fully covered by `work_done`.
    pub fn resume_offset(&self, work_done: f64) -> f64 {
        let mut cum = 0.0;
        let mut last_checkpoint = 0.0;
        for phase in self.work_phases() {
            cum += phase.duration;
            if phase.checkpoint && cum <= work_done {
                last_checkpoint = cum;
            }
        }
        last_checkpoint
    }

    /// Power in watts at `time_since_resume` seconds into a run, given
    /// `work_done` seconds of persistent progress before the resume.
    ///
    /// Bins are left-inclusive, right-exclusive; past the end of all phases
    /// the draw is 0.
    pub fn power_at(&self, time_since_resume: f64, work_done: f64) -> f64 {
        match self {
            PowerProfile::Constant { watts } => *watts,
            PowerProfile::Phased { startup, work } => {
                let startup_duration = self.startup_duration();
                if time_since_resume < startup_duration {
                    return power_in_phases(startup, time_since_resume);
                }
                let work_time = self.resume_offset(work_done) + (time_since_resume - startup_duration);
                power_in_phases(work, work_time)
            }
        }
    }
}

fn power_in_phases(phases: &[Phase], time: f64) -> f64 {
    let mut cum = 0.0;
    for phase in phases {
        let end = cum + phase.duration;
        if time >= cum && time < end {
            return phase.watts;
        }
        cum = end;
    }
    0.0
}

/// Parameters for a synthetic ML training profile: startup, then
/// `epochs` × (train, evaluate, save), checkpointing on each save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlProfileParams {
    pub start_duration: f64,
    pub start_power: f64,
    pub training_duration: f64,
    pub training_power: f64,
    pub evaluate_duration: f64,
    pub evaluate_power: f64,
    pub save_duration: f64,
    pub save_power: f64,
    pub epochs: usize,
}

/// Build an ML training profile from measured phase parameters.
pub fn ml_profile(params: &MlProfileParams) -> PowerProfile {
    let startup = vec![Phase::new("Startup", params.start_duration, params.start_power)];
    let mut work = Vec::with_capacity(params.epochs * 3);
    for _ in 0..params.epochs {
        work.push(Phase::new(
            "Train",
            params.training_duration,
            params.training_power,
        ));
        work.push(Phase::new(
            "Evaluate",
            params.evaluate_duration,
            params.evaluate_power,
        ));
        work.push(Phase::new("Save", params.save_duration, params.save_power).with_checkpoint());
    }
    PowerProfile::phased(startup, work)
}

/// Measured RoBERTa fine-tuning phases (durations truncated to 2 significant
/// digits). Imports and data loading are startup; each epoch's save is a
/// checkpoint.
pub fn roberta() -> PowerProfile {
    let startup = vec![
        Phase::new("Start", 5.349, 59.9),
        Phase::new("Finish Imports", 12.36, 53.77),
        Phase::new("Load Data", 5.7513, 63.17),
    ];
    let work = vec![
        Phase::new("Start Training", 8.171, 221.93),
        Phase::new("Epoch 1.0 Ended", 1.5477, 134.0),
        Phase::new("Evaluate", 2.720, 105.1),
        Phase::new("Epoch 1.0 Saved", 7.437, 235.37).with_checkpoint(),
        Phase::new("Epoch 2.0 Ended", 1.5130, 139.88),
        Phase::new("Evaluate", 2.698, 114.09),
        Phase::new("Epoch 2.0 Saved", 7.430, 239.19).with_checkpoint(),
        Phase::new("Epoch 3.0 Ended", 1.4680, 143.62),
        Phase::new("Evaluate", 2.679, 112.46),
        Phase::new("Epoch 3.0 Saved", 7.453, 238.28).with_checkpoint(),
        Phase::new("Epoch 4.0 Ended", 1.5398, 141.87),
        Phase::new("Evaluate", 2.669, 112.87),
        Phase::new("Epoch 4.0 Saved", 7.455, 236.59).with_checkpoint(),
        Phase::new("Epoch 5.0 Ended", 1.514, 146.69),
        Phase::new("Evaluate", 2.668, 107.83),
        Phase::new("End Training", 1.5576, 123.31),
    ];
    PowerProfile::phased(startup, work)
}
