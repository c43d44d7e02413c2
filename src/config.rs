use std::time::Duration;

use crate::buffer::OverflowPolicy;
use crate::ScopeError;

/// Pipeline configuration, fixed at startup.
#[derive(Debug, Clone, Copy)]
pub struct ScopeConfig {
    /// Per-channel sampling interval `ts` in seconds of logical time.
    pub sample_interval: f64,
    /// Time-slice duration `dt` in seconds; also the producer's wall-clock
    /// pacing between cycles.
    pub slice_duration: f64,
    /// Drainer tick period.
    pub tick_period: Duration,
    /// Buffer capacity in batches.
    pub buffer_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl ScopeConfig {
    pub fn validate(&self) -> Result<(), ScopeError> {
        if !(self.sample_interval > 0.0) {
            return Err(ScopeError::Config {
                reason: format!("sample_interval must be > 0, got {}", self.sample_interval),
            });
        }
        if !(self.slice_duration > 0.0) {
            return Err(ScopeError::Config {
                reason: format!("slice_duration must be > 0, got {}", self.slice_duration),
            });
        }
        if self.slice_duration < self.sample_interval {
            return Err(ScopeError::Config {
                reason: format!(
                    "slice_duration {} is shorter than sample_interval {}",
                    self.slice_duration, self.sample_interval
                ),
            });
        }
        if self.tick_period == Duration::from_secs(0) {
            return Err(ScopeError::Config {
                reason: "tick_period must be non-zero".to_string(),
            });
        }
        if self.buffer_capacity == 0 {
            return Err(ScopeError::Config {
                reason: "buffer_capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ScopeConfig {
    fn default() -> ScopeConfig {
        ScopeConfig {
            sample_interval: 0.0001,
            slice_duration: 0.2,
            tick_period: Duration::from_millis(50),
            buffer_capacity: 64,
            overflow: OverflowPolicy::DropOldest,
        }
    }
}
