//! Immutable compute requests.
//!
//! A [`Job`] describes one request: arrival, executable length, CPU count,
//! deadline budget, and a shared power profile. Suspend/resume planners
//! split a job into subtasks; a subtask is an independent new `Job` that
//! shares the parent's id and profile and carries the work already done in
//! `work_done_before`.

use crate::context::{QueueClass, SchedulingContext};
use crate::power::PowerProfile;
use std::sync::Arc;

/// Map a job length in seconds to its reporting bucket.
pub fn classify_length(length: u64) -> &'static str {
    let hours = length as f64 / 3600.0;
    if hours <= 2.0 {
        "0-2"
    } else if hours <= 4.0 {
        "2-6"
    } else if hours <= 8.0 {
        "6-12"
    } else if hours <= 16.0 {
        "12-24"
    } else if hours <= 48.0 {
        "24-48"
    } else {
        "48+"
    }
}

/// Map a CPU count to its reporting bucket.
pub fn classify_resources(cpus: u32) -> &'static str {
    match cpus {
        1 => "1",
        2 => "2",
        3..=4 => "3-4",
        5..=8 => "5-8",
        9..=16 => "9-16",
        17..=32 => "17-32",
        33..=64 => "33-64",
        _ => "64+",
    }
}

/// Immutable description of one compute request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i64,
    pub arrival: u64,
    /// Ticks of executable work; clamped to at least 1.
    pub length: u64,
    pub cpus: u32,
    pub length_class: &'static str,
    pub resource_class: &'static str,
    /// Surrogate length used when the true length is unknown at scheduling
    /// time.
    pub expected_length: u64,
    pub queue: QueueClass,
    /// Maximum ticks the job may wait; deadline = arrival + length + waiting.
    pub waiting_time: u64,
    /// Work already completed by earlier subtasks of the same job.
    pub work_done_before: u64,
    pub profile: Arc<PowerProfile>,
}

impl Job {
    pub fn new(
        ctx: &SchedulingContext,
        id: i64,
        arrival: u64,
        length: u64,
        cpus: u32,
        profile: Arc<PowerProfile>,
    ) -> Self {
        let length = length.max(1);
        let (expected_length, waiting_time, queue) = ctx.expected(length);
        Job {
            id,
            arrival,
            length,
            cpus,
            length_class: classify_length(length),
            resource_class: classify_resources(cpus),
            expected_length,
            queue,
            waiting_time,
            work_done_before: 0,
            profile,
        }
    }

    /// A resumed piece of this job: new arrival and length, shared id,
    /// CPUs, and profile, with the parent's completed work carried over.
    /// Classes and queue routing are recomputed from the piece's own length.
    pub fn subtask(
        &self,
        ctx: &SchedulingContext,
        arrival: u64,
        length: u64,
        work_done_before: u64,
    ) -> Self {
        let mut sub = Job::new(
            ctx,
            self.id,
            arrival,
            length,
            self.cpus,
            Arc::clone(&self.profile),
        );
        sub.work_done_before = work_done_before;
        sub
    }

    /// Override the length class, used where a split keeps reporting under
    /// the parent job's bucket.
    pub fn with_length_class(mut self, class: &'static str) -> Self {
        self.length_class = class;
        self
    }

    /// Latest permissible finish tick.
    pub fn deadline(&self) -> u64 {
        self.arrival + self.length + self.waiting_time
    }
}
