//! Per-simulation scheduling parameters.
//!
//! The waiting-time budgets and trace-wide average job lengths are read by
//! every job on construction. They are carried in an explicit immutable
//! [`SchedulingContext`] handed to the job loader, so parallel parameter
//! sweeps never share mutable state.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};

/// Jobs at or below this length (seconds) fall into the short queue.
pub const SHORT_QUEUE_SECS: u64 = 7200;

/// Which waiting-time queue a job was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueClass {
    /// Single-queue configuration: every job shares one budget.
    Same,
    Short,
    Long,
}

impl QueueClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueClass::Same => "Same",
            QueueClass::Short => "Short",
            QueueClass::Long => "Long",
        }
    }
}

/// Trace-wide mean lengths, computed by the job loader and used by the
/// average-length placement policies as the surrogate job length.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraceStats {
    /// Mean length of jobs ≤ 2 h, in seconds.
    pub mean_short: u64,
    /// Mean length of jobs > 2 h, in seconds.
    pub mean_long: u64,
}

/// Immutable per-simulation scheduling parameters.
#[derive(Debug, Clone)]
pub struct SchedulingContext {
    waiting_times: Vec<u64>,
    stats: TraceStats,
}

impl SchedulingContext {
    /// Parse an `x`-separated list of waiting-time budgets in hours, e.g.
    /// `"6x24"`. One entry means a single queue; two entries split jobs at
    /// the 2 h boundary. Any other arity is a configuration error.
    pub fn from_spec(waiting_times: &str, stats: TraceStats) -> SimResult<Self> {
        let mut parsed = Vec::new();
        for part in waiting_times.split('x') {
            let hours: f64 = part.trim().parse().map_err(|_| {
                SimError::Config(format!(
                    "waiting_times: '{part}' is not a number of hours"
                ))
            })?;
            if hours < 0.0 {
                return Err(SimError::Config(format!(
                    "waiting_times: '{part}' is negative"
                )));
            }
            parsed.push((hours * 3600.0) as u64);
        }
        Self::new(parsed, stats)
    }

    pub fn new(waiting_times: Vec<u64>, stats: TraceStats) -> SimResult<Self> {
        if waiting_times.is_empty() || waiting_times.len() > 2 {
            return Err(SimError::Config(format!(
                "waiting_times: expected 1 or 2 queue budgets, got {}",
                waiting_times.len()
            )));
        }
        Ok(SchedulingContext {
            waiting_times,
            stats,
        })
    }

    pub fn waiting_times(&self) -> &[u64] {
        &self.waiting_times
    }

    pub fn stats(&self) -> TraceStats {
        self.stats
    }

    /// Expected length, waiting budget, and queue for a job of the given
    /// length. The expected length stands in for the true length in the
    /// average-length policies; with a single queue the surrogate is a
    /// 2-tick stub.
    pub fn expected(&self, length: u64) -> (u64, u64, QueueClass) {
        match self.waiting_times.as_slice() {
            [only] => (2, *only, QueueClass::Same),
            [short, long] => {
                if length < SHORT_QUEUE_SECS {
                    (self.stats.mean_short, *short, QueueClass::Short)
                } else {
                    (self.stats.mean_long, *long, QueueClass::Long)
                }
            }
            _ => unreachable!("arity checked at construction"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> TraceStats {
        TraceStats {
            mean_short: 1800,
            mean_long: 14400,
        }
    }

    #[test]
    fn parses_hour_spec() {
        let ctx = SchedulingContext::from_spec("6x24", stats()).unwrap();
        assert_eq!(ctx.waiting_times(), &[6 * 3600, 24 * 3600]);
    }

    #[test]
    fn single_queue_uses_stub_expected_length() {
        let ctx = SchedulingContext::from_spec("6", stats()).unwrap();
        let (expected, waiting, queue) = ctx.expected(10_000);
        assert_eq!(expected, 2);
        assert_eq!(waiting, 6 * 3600);
        assert_eq!(queue, QueueClass::Same);
    }

    #[test]
    fn two_queues_split_at_two_hours() {
        let ctx = SchedulingContext::from_spec("6x24", stats()).unwrap();
        let (expected, waiting, queue) = ctx.expected(3600);
        assert_eq!((expected, waiting, queue), (1800, 6 * 3600, QueueClass::Short));
        let (expected, waiting, queue) = ctx.expected(7200);
        assert_eq!((expected, waiting, queue), (14400, 24 * 3600, QueueClass::Long));
    }

    #[test]
    fn rejects_bad_arity_and_garbage() {
        assert!(SchedulingContext::from_spec("6x24x48", stats()).is_err());
        assert!(SchedulingContext::from_spec("", stats()).is_err());
        assert!(SchedulingContext::from_spec("sixx24", stats()).is_err());
    }
}
