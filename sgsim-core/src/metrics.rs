use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accumulated scheduler counters and timing.
#[derive(Default, Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub total_ticks: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub withdrawn: u64,
    pub executed: u64,
    pub failed: u64,
    pub dropped: u64,
    /// Time inside `tick`, CP recovery included.
    pub total_time: Duration,
    pub recovery_time: Duration,
    pub execution_time: Duration,
}

impl SchedulerMetrics {
    pub fn tick_avg_ms(&self) -> f64 {
        if self.total_ticks == 0 {
            0.0
        } else {
            self.total_time.as_secs_f64() * 1000.0 / self.total_ticks as f64
        }
    }

    /// Share of due commands that ran successfully.
    pub fn success_rate(&self) -> f64 {
        let due = self.executed + self.failed + self.dropped;
        if due == 0 {
            0.0
        } else {
            self.executed as f64 / due as f64
        }
    }
}
