//! Logging and refresh timing
//!
//! Logger setup for binaries and tests, plus metrics collection for
//! mapping table refreshes (the only operation that waits on the OS).

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default threshold above which a refresh is reported as slow
pub const DEFAULT_SLOW_REFRESH: Duration = Duration::from_millis(500);

/// Install `env_logger`, honoring `RUST_LOG` and falling back to `default_filter`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// How a single refresh ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Updated,
    Failed,
    TimedOut,
}

/// Aggregated refresh statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub last_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
}

/// Refresh metrics for one mapping table
#[derive(Debug)]
pub struct RefreshMetrics {
    summary: Mutex<RefreshSummary>,
    slow_threshold: Duration,
}

impl Default for RefreshMetrics {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_REFRESH)
    }
}

impl RefreshMetrics {
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            summary: Mutex::new(RefreshSummary::default()),
            slow_threshold,
        }
    }

    /// Record one refresh attempt
    pub fn record(&self, source: &str, duration: Duration, status: RefreshStatus) {
        {
            let mut summary = self.summary.lock().unwrap_or_else(|e| e.into_inner());
            summary.total += 1;
            match status {
                RefreshStatus::Updated => summary.updated += 1,
                RefreshStatus::Failed => summary.failed += 1,
                RefreshStatus::TimedOut => summary.timed_out += 1,
            }
            summary.last_duration = Some(duration);
            summary.max_duration = Some(summary.max_duration.map_or(duration, |m| m.max(duration)));
        }

        if duration > self.slow_threshold {
            log::warn!(
                "[MappingTable] refresh from '{}' took {:?} (threshold: {:?})",
                source,
                duration,
                self.slow_threshold
            );
        }
    }

    pub fn summary(&self) -> RefreshSummary {
        self.summary.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Fraction of refreshes that produced a new snapshot
    pub fn success_rate(&self) -> Option<f64> {
        let summary = self.summary();
        if summary.total == 0 {
            return None;
        }
        Some(summary.updated as f64 / summary.total as f64)
    }
}

/// Timer utility for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed time without stopping
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
