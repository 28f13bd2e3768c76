use super::settings::ControllerConfig;
use crate::error::ConfigurationError;
use crate::observation::{OperatingState, TransitionCause, TransitionEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::debug;

/// Permitted `(current, requested)` state pairs
#[derive(Debug, Clone)]
pub struct TransitionTable {
    allowed: HashSet<(OperatingState, OperatingState)>,
}

impl TransitionTable {
    /// An empty table that forbids everything
    pub fn empty() -> Self {
        Self {
            allowed: HashSet::new(),
        }
    }

    /// Permit `from -> to`. Self-transitions are never recorded.
    pub fn allow(mut self, from: OperatingState, to: OperatingState) -> Self {
        if from != to {
            self.allowed.insert((from, to));
        }
        self
    }

    pub fn allows(&self, from: OperatingState, to: OperatingState) -> bool {
        from != to && self.allowed.contains(&(from, to))
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::empty()
            .allow(OperatingState::Idle, OperatingState::Triggered)
            .allow(OperatingState::Triggered, OperatingState::Idle)
    }
}

/// Classifier evidence presented to the state machine for one evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Evidence {
    /// The debounced condition is met
    pub met: bool,
    /// The condition has cleared since the last transition
    pub cleared: bool,
}

/// Idle/triggered state machine with cooldown, minimum dwell and
/// automatic release.
///
/// Pure state computation: no I/O, cannot fail once constructed.
pub struct TriggerStateMachine {
    config: Arc<ControllerConfig>,
    table: TransitionTable,
    current: OperatingState,
    entered_at: Instant,
    last_transition: Option<Instant>,
}

impl TriggerStateMachine {
    pub fn new(config: Arc<ControllerConfig>, now: Instant) -> Self {
        Self {
            config,
            table: TransitionTable::default(),
            current: OperatingState::Idle,
            entered_at: now,
            last_transition: None,
        }
    }

    /// Build a machine with a custom transition table.
    ///
    /// The table must allow entering and releasing the triggered state.
    pub fn with_table(
        config: Arc<ControllerConfig>,
        table: TransitionTable,
        now: Instant,
    ) -> Result<Self, ConfigurationError> {
        for (from, to) in [
            (OperatingState::Idle, OperatingState::Triggered),
            (OperatingState::Triggered, OperatingState::Idle),
        ] {
            if !table.allows(from, to) {
                return Err(ConfigurationError::ForbiddenTransition { from, to });
            }
        }

        Ok(Self {
            table,
            ..Self::new(config, now)
        })
    }

    pub fn current_state(&self) -> OperatingState {
        self.current
    }

    pub fn entered_at(&self) -> Instant {
        self.entered_at
    }

    pub fn last_transition(&self) -> Option<Instant> {
        self.last_transition
    }

    /// Evaluate at most one transition. Release is considered before entry.
    ///
    /// `now` is clamped to the last transition, so an observation stamped
    /// before a tick that already moved the machine is evaluated at that
    /// tick's time and transition times never go backwards.
    pub fn evaluate(
        &mut self,
        evidence: Evidence,
        now: Instant,
        cause: TransitionCause,
    ) -> Option<TransitionEvent> {
        let now = self.last_transition.map_or(now, |last| now.max(last));
        let requested = match self.current {
            OperatingState::Triggered if self.release_due(evidence, now) => OperatingState::Idle,
            OperatingState::Idle if evidence.met => OperatingState::Triggered,
            _ => return None,
        };

        if !self.cooled_down(now) {
            debug!(
                "Transition {} -> {} suppressed by cooldown",
                self.current, requested
            );
            return None;
        }

        self.request(requested, now, cause)
    }

    fn release_due(&self, evidence: Evidence, now: Instant) -> bool {
        let release = self.config.release();
        let in_state = now.saturating_duration_since(self.entered_at);

        let timed_out = release
            .auto_release
            .map_or(false, |limit| in_state >= limit);
        let condition_cleared =
            release.on_condition && evidence.cleared && in_state >= release.min_dwell;

        timed_out || condition_cleared
    }

    fn cooled_down(&self, now: Instant) -> bool {
        self.last_transition.map_or(true, |last| {
            now.saturating_duration_since(last) >= self.config.cooldown()
        })
    }

    fn request(
        &mut self,
        to: OperatingState,
        now: Instant,
        cause: TransitionCause,
    ) -> Option<TransitionEvent> {
        if !self.table.allows(self.current, to) {
            return None;
        }

        let from = self.current;
        self.current = to;
        self.entered_at = now;
        self.last_transition = Some(now);

        Some(TransitionEvent::new(from, to, now, cause))
    }
}
