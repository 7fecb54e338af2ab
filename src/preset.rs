//! Performance presets controlling upload pacing.
//!
//! A preset carries the five delay knobs consumed by
//! [`UploadDelay`](crate::delay::UploadDelay) and the client-level request
//! timeout applied by the HTTP transport. Two presets are predefined:
//!
//! - [`PerformancePreset::LOW_RUNTIME_IMPACT`] issues few requests and adapts
//!   slowly. This is the default.
//! - [`PerformancePreset::INSTANT_DATA_DELIVERY`] starts uploading almost
//!   immediately and reacts quickly, which suits short-lived processes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Default client-level timeout for a single upload request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upload pacing parameters for one worker.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformancePreset {
    /// Delay before the first upload cycle.
    pub initial_delay: Duration,
    /// Steady-state delay restored after storage has been fully drained.
    pub default_delay: Duration,
    /// Lower bound of the pacing interval.
    pub min_delay: Duration,
    /// Upper bound of the pacing interval.
    pub max_delay: Duration,
    /// Fraction by which the interval shrinks on success and grows on
    /// failure or starvation. Must lie in `(0, 1]`.
    pub change_rate: f64,
    /// Timeout applied by the HTTP client to each upload request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl PerformancePreset {
    /// Few requests, slow adaptation.
    pub const LOW_RUNTIME_IMPACT: Self = Self {
        initial_delay: Duration::from_secs(5),
        default_delay: Duration::from_secs(5),
        min_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(20),
        change_rate: 0.1,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };

    /// Quick first upload and fast reaction to outcomes.
    pub const INSTANT_DATA_DELIVERY: Self = Self {
        initial_delay: Duration::from_millis(500),
        default_delay: Duration::from_secs(3),
        min_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(5),
        change_rate: 0.5,
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    };

    /// Return a copy with a different request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Check the preset describes a usable pacing range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("initial_delay", self.initial_delay),
            ("default_delay", self.default_delay),
            ("min_delay", self.min_delay),
            ("max_delay", self.max_delay),
            ("request_timeout", self.request_timeout),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| value.is_zero()) {
            return Err(ConfigError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.min_delay > self.max_delay {
            return Err(ConfigError::InvalidConfig(format!(
                "min_delay ({:?}) must not exceed max_delay ({:?})",
                self.min_delay, self.max_delay
            )));
        }
        if !(self.change_rate > 0.0 && self.change_rate <= 1.0) {
            return Err(ConfigError::InvalidConfig(format!(
                "change_rate must lie in (0, 1], got {}",
                self.change_rate
            )));
        }
        Ok(())
    }
}

impl Default for PerformancePreset {
    fn default() -> Self {
        Self::LOW_RUNTIME_IMPACT
    }
}
