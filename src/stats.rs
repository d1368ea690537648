//! Performance stats tracking for command execution

use crate::catalog::CommandId;
use crate::executor::ExecutionOutcome;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Executions kept for the rolling summary
pub const WINDOW: usize = 100;

#[derive(Debug, Clone)]
pub struct Sample {
    pub command: CommandId,
    pub duration: Duration,
    pub success: bool,
}

impl Sample {
    /// Sample from the executor's own timing
    pub fn from_outcome(command: CommandId, outcome: &ExecutionOutcome) -> Self {
        Self {
            command,
            duration: Duration::try_from_secs_f64(outcome.elapsed_ms / 1000.0).unwrap_or_default(),
            success: outcome.success,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionStats {
    samples: VecDeque<Sample>,
    total: u64,
}

/// Rolling view over the last `WINDOW` executions
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerfSummary {
    pub total_executions: u64,
    pub window: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub success_rate: f64,
}

impl PerfSummary {
    pub fn summary(&self) -> String {
        if self.window == 0 {
            return "No executions recorded yet.\n".to_string();
        }
        format!(
            "Execution (n={}, last {}): avg={:.1}ms min={:.1}ms max={:.1}ms success={:.0}%\n",
            self.total_executions,
            self.window,
            self.avg_ms,
            self.min_ms,
            self.max_ms,
            self.success_rate * 100.0
        )
    }
}

impl ExecutionStats {
    pub fn record(&mut self, sample: Sample) {
        if self.samples.len() == WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        self.total += 1;
    }

    pub fn perf(&self) -> PerfSummary {
        if self.samples.is_empty() {
            return PerfSummary {
                total_executions: self.total,
                ..Default::default()
            };
        }
        let (avg, min, max) = Self::calc(self.samples.iter());
        let ok = self.samples.iter().filter(|s| s.success).count();
        PerfSummary {
            total_executions: self.total,
            window: self.samples.len(),
            avg_ms: avg.as_secs_f64() * 1000.0,
            min_ms: min.as_secs_f64() * 1000.0,
            max_ms: max.as_secs_f64() * 1000.0,
            success_rate: ok as f64 / self.samples.len() as f64,
        }
    }

    fn calc<'a>(samples: impl Iterator<Item = &'a Sample> + Clone) -> (Duration, Duration, Duration) {
        let count = samples.clone().count().max(1) as u32;
        let total: Duration = samples.clone().map(|s| s.duration).sum();
        let min = samples.clone().map(|s| s.duration).min().unwrap_or_default();
        let max = samples.map(|s| s.duration).max().unwrap_or_default();
        (total / count, min, max)
    }
}

pub type SharedStats = Arc<Mutex<ExecutionStats>>;

pub fn new_shared() -> SharedStats {
    Arc::new(Mutex::new(ExecutionStats::default()))
}
