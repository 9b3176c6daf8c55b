//! Engine metrics.
//!
//! Counters for the work the engine does plus rolling timing of
//! revalidation passes.

use std::collections::VecDeque;
use std::time::Duration;

/// Maximum number of samples to keep for rolling averages.
const MAX_SAMPLES: usize = 120;

/// Rolling statistics for a duration metric.
#[derive(Debug, Clone)]
pub struct RollingStats {
    samples: VecDeque<Duration>,
    sum: Duration,
    max: Duration,
}

impl Default for RollingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingStats {
    /// Creates a new empty rolling stats tracker.
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            sum: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    /// Records a new sample.
    pub fn record(&mut self, duration: Duration) {
        // Remove old sample if at capacity
        if self.samples.len() >= MAX_SAMPLES {
            if let Some(old) = self.samples.pop_front() {
                self.sum = self.sum.saturating_sub(old);
            }
        }

        self.samples.push_back(duration);
        self.sum += duration;
        self.max = self.max.max(duration);
    }

    /// Returns the number of samples.
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    /// Returns the average duration.
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            Duration::ZERO
        } else {
            self.sum / self.samples.len() as u32
        }
    }

    /// Returns the maximum duration seen.
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Returns the most recent duration.
    pub fn last(&self) -> Duration {
        self.samples.back().copied().unwrap_or(Duration::ZERO)
    }

    /// Returns the average as milliseconds.
    pub fn average_ms(&self) -> f64 {
        self.average().as_secs_f64() * 1000.0
    }
}

/// Render job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub started: u64,
    /// Jobs killed before finishing, by cancellation or restart.
    pub killed: u64,
    pub succeeded: u64,
    /// Failed jobs, including spawn failures and timeouts.
    pub failed: u64,
}

impl RenderStats {
    /// Adds another set of counters to this one.
    pub fn merge(&mut self, other: RenderStats) {
        self.started += other.started;
        self.killed += other.killed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Counters maintained by the validation engine.
#[derive(Debug, Clone, Default)]
pub struct ValidationStats {
    /// Revalidation passes run.
    pub passes: u64,
    /// Lines rescanned across all passes.
    pub lines_scanned: u64,
    pub regions_created: u64,
    pub regions_destroyed: u64,
    /// Totals across all rendering validators.
    pub renders: RenderStats,
    /// Duration of revalidation passes.
    pub pass_time: RollingStats,
}
