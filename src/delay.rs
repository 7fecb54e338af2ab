//! Adaptive pacing interval used between upload cycles.
//!
//! The interval is adjusted multiplicatively: it shrinks by `change_rate`
//! after a delivered batch and grows by the same rate after a failed
//! attempt or when nothing was available to upload. Every mutation clamps
//! the result to `[min_delay, max_delay]`.

use std::time::Duration;

use crate::preset::PerformancePreset;

/// Pacing capability consumed by the upload worker.
pub trait Delay: Send {
    /// The interval to wait before the next cycle.
    fn current(&self) -> Duration;
    /// Speed up after a batch left storage.
    fn decrease(&mut self);
    /// Slow down after a retryable failure or an idle cycle.
    fn increase(&mut self);
    /// Return to the steady-state interval.
    fn reset(&mut self) {}
}

/// [`Delay`] implementation driven by a [`PerformancePreset`].
#[derive(Clone, Debug, PartialEq)]
pub struct UploadDelay {
    current: f64,
    default: f64,
    min: f64,
    max: f64,
    change_rate: f64,
}

impl UploadDelay {
    /// Start at the preset's initial delay.
    ///
    /// The initial value is not clamped, so a preset may schedule its first
    /// cycle earlier than `min_delay`.
    pub fn new(preset: &PerformancePreset) -> Self {
        Self {
            current: preset.initial_delay.as_secs_f64(),
            default: preset.default_delay.as_secs_f64(),
            min: preset.min_delay.as_secs_f64(),
            max: preset.max_delay.as_secs_f64(),
            change_rate: preset.change_rate,
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

impl Delay for UploadDelay {
    fn current(&self) -> Duration {
        Duration::try_from_secs_f64(self.current.max(0.0)).unwrap_or(Duration::MAX)
    }

    fn decrease(&mut self) {
        self.current = self.clamp(self.min.max(self.current * (1.0 - self.change_rate)));
    }

    fn increase(&mut self) {
        self.current = self.clamp((self.current * (1.0 + self.change_rate)).min(self.max));
    }

    fn reset(&mut self) {
        self.current = self.clamp(self.default);
    }
}

impl<D: Delay + ?Sized> Delay for Box<D> {
    fn current(&self) -> Duration {
        (**self).current()
    }

    fn decrease(&mut self) {
        (**self).decrease();
    }

    fn increase(&mut self) {
        (**self).increase();
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
