use super::settings::ControllerConfig;
use crate::observation::Observation;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::trace;

/// Smooths raw per-frame confidence into a stable "condition met" signal.
///
/// The condition is met once `debounce.frames` consecutive observations
/// qualify (label matches and confidence reaches the threshold) and the
/// streak spans at least `debounce.hold`. A single disqualifying
/// observation cancels the streak.
pub struct DebouncedClassifier {
    config: Arc<ControllerConfig>,
    streak: u32,
    streak_started: Option<Instant>,
    met: bool,
    /// The latest observation since the last reset disqualified. Silence
    /// never sets it, only an explicit negative report does.
    cleared: bool,
}

impl DebouncedClassifier {
    pub fn new(config: Arc<ControllerConfig>) -> Self {
        Self {
            config,
            streak: 0,
            streak_started: None,
            met: false,
            cleared: false,
        }
    }

    /// Feed one observation and report whether the condition is stably met
    pub fn observe(&mut self, observation: &Observation) -> bool {
        if self.qualifies(observation) {
            self.streak = self.streak.saturating_add(1);
            let started = *self.streak_started.get_or_insert(observation.timestamp);
            let debounce = self.config.debounce();
            let held = observation.timestamp.saturating_duration_since(started);

            self.met = self.streak >= debounce.frames && held >= debounce.hold;
            self.cleared = false;
        } else {
            if self.streak > 0 {
                trace!(
                    "Streak of {} broken by '{}' at {:.3}",
                    self.streak,
                    observation.label,
                    observation.confidence
                );
            }
            self.streak = 0;
            self.streak_started = None;
            self.met = false;
            self.cleared = true;
        }

        self.met
    }

    fn qualifies(&self, observation: &Observation) -> bool {
        observation.label == self.config.trigger_label()
            && observation.confidence >= self.config.confidence_threshold()
    }

    /// Whether the condition is currently met
    pub fn is_met(&self) -> bool {
        self.met
    }

    /// Whether the most recent observation since the last reset disqualified
    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Drop all accumulated evidence
    pub fn reset(&mut self) {
        self.streak = 0;
        self.streak_started = None;
        self.met = false;
        self.cleared = false;
    }
}
