use crate::error::ConfigurationError;
use std::time::Duration;

/// How many consecutive qualifying observations are needed before the
/// trigger condition counts as met, and optionally how long the streak
/// must have lasted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebounceWindow {
    pub frames: u32,
    pub hold: Duration,
}

impl Default for DebounceWindow {
    fn default() -> Self {
        Self {
            frames: 1,
            hold: Duration::ZERO,
        }
    }
}

/// Release policies for leaving the triggered state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReleasePolicy {
    /// Release once the condition clears and `min_dwell` has passed
    pub on_condition: bool,
    /// Minimum time in the triggered state before a condition release
    pub min_dwell: Duration,
    /// Forced release after this long in the triggered state
    pub auto_release: Option<Duration>,
}

/// Immutable controller configuration.
///
/// Only obtainable through [`ControllerConfigBuilder::build`], which rejects
/// invalid combinations instead of clamping them.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    trigger_label: String,
    confidence_threshold: f64,
    cooldown: Duration,
    debounce: DebounceWindow,
    release: ReleasePolicy,
    tick_interval: Duration,
}

impl ControllerConfig {
    pub fn builder<S: Into<String>>(trigger_label: S) -> ControllerConfigBuilder {
        ControllerConfigBuilder::new(trigger_label)
    }

    pub fn trigger_label(&self) -> &str {
        &self.trigger_label
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn debounce(&self) -> DebounceWindow {
        self.debounce
    }

    pub fn release(&self) -> ReleasePolicy {
        self.release
    }

    pub fn min_dwell(&self) -> Duration {
        self.release.min_dwell
    }

    pub fn auto_release(&self) -> Option<Duration> {
        self.release.auto_release
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

/// Builder for [`ControllerConfig`]
#[derive(Debug, Clone)]
pub struct ControllerConfigBuilder {
    trigger_label: String,
    confidence_threshold: f64,
    cooldown: Duration,
    debounce: DebounceWindow,
    release: ReleasePolicy,
    tick_interval: Duration,
}

impl ControllerConfigBuilder {
    pub fn new<S: Into<String>>(trigger_label: S) -> Self {
        Self {
            trigger_label: trigger_label.into(),
            confidence_threshold: 0.9,
            cooldown: Duration::ZERO,
            debounce: DebounceWindow::default(),
            release: ReleasePolicy {
                on_condition: true,
                min_dwell: Duration::ZERO,
                auto_release: None,
            },
            tick_interval: Duration::from_millis(50),
        }
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn debounce_frames(mut self, frames: u32) -> Self {
        self.debounce.frames = frames;
        self
    }

    pub fn debounce_hold(mut self, hold: Duration) -> Self {
        self.debounce.hold = hold;
        self
    }

    pub fn release_on_condition(mut self, enabled: bool) -> Self {
        self.release.on_condition = enabled;
        self
    }

    pub fn min_dwell(mut self, min_dwell: Duration) -> Self {
        self.release.min_dwell = min_dwell;
        self
    }

    /// A zero duration disables automatic release
    pub fn auto_release(mut self, auto_release: Duration) -> Self {
        self.release.auto_release = if auto_release.is_zero() {
            None
        } else {
            Some(auto_release)
        };
        self
    }

    pub fn tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn build(self) -> Result<ControllerConfig, ConfigurationError> {
        if self.trigger_label.trim().is_empty() {
            return Err(ConfigurationError::EmptyTriggerLabel);
        }

        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigurationError::ThresholdOutOfRange {
                value: self.confidence_threshold,
            });
        }

        if self.debounce.frames == 0 {
            return Err(ConfigurationError::EmptyDebounceWindow);
        }

        if !self.release.on_condition && self.release.auto_release.is_none() {
            return Err(ConfigurationError::NoReleasePolicy);
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigurationError::ZeroTickInterval);
        }

        Ok(ControllerConfig {
            trigger_label: self.trigger_label,
            confidence_threshold: self.confidence_threshold,
            cooldown: self.cooldown,
            debounce: self.debounce,
            release: self.release,
            tick_interval: self.tick_interval,
        })
    }
}

/// Convert a user-supplied number of seconds into a `Duration`
pub fn duration_from_secs(field: &'static str, value: f64) -> Result<Duration, ConfigurationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigurationError::InvalidDuration { field, value });
    }

    Duration::try_from_secs_f64(value)
        .map_err(|_| ConfigurationError::InvalidDuration { field, value })
}
