// ABOUTME: Wall-clock budget shared by every engine part during a tick cycle
// ABOUTME: Reports remaining time and enforces the minimum cycle length

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Remaining-time oracle consulted by the engine before each unit of work
#[async_trait]
pub trait TimeBudget: Send + Sync {
    /// Seconds left in the current budget; negative once overrun
    fn time_left(&self) -> f64;

    /// Seconds elapsed since the last reset
    fn running_time(&self) -> f64;

    /// Start a fresh budget; called by the host between tick cycles
    fn reset(&mut self);

    /// Wait until the minimum cycle length has passed since the last reset
    async fn enforce_min_execution_time(&self);
}

/// Monotonic-clock timer
#[derive(Debug, Clone)]
pub struct Timer {
    started: Instant,
    budget: f64,
    min_execution_time: f64,
}

impl Timer {
    /// Budget is `max_execution_time * bias_percent / 100` seconds
    pub fn new(min_execution_time: f64, max_execution_time: f64, bias_percent: u32) -> Self {
        Self {
            started: Instant::now(),
            budget: max_execution_time * f64::from(bias_percent) / 100.0,
            min_execution_time,
        }
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }
}

#[async_trait]
impl TimeBudget for Timer {
    fn time_left(&self) -> f64 {
        self.budget - self.running_time()
    }

    fn running_time(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn reset(&mut self) {
        self.started = Instant::now();
    }

    async fn enforce_min_execution_time(&self) {
        let remaining = self.min_execution_time - self.running_time();
        if remaining > 0.0 {
            tracing::debug!("Sleeping {:.3}s to honour the minimum execution time", remaining);
            tokio::time::sleep(Duration::from_secs_f64(remaining)).await;
        }
    }
}
