mod debounce;
mod machine;
mod settings;
mod snapshot;

#[cfg(test)]
mod tests;

pub use debounce::DebouncedClassifier;
pub use machine::{Evidence, TransitionTable, TriggerStateMachine};
pub use settings::{
    duration_from_secs, ControllerConfig, ControllerConfigBuilder, DebounceWindow, ReleasePolicy,
};
pub use snapshot::{ControllerSnapshot, StatusHandle, StatusReport, TransitionRecord, TransitionReport};

use crate::error::ConfigurationError;
use crate::observation::{Observation, OperatingState, TransitionCause, TransitionEvent};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

/// The trigger controller: debounced classifier plus state machine.
///
/// Owned by exactly one task. Every mutation goes through [`observe`] or
/// [`tick`], which keeps observation feed and timer evaluation serialized.
///
/// [`observe`]: TriggerController::observe
/// [`tick`]: TriggerController::tick
pub struct TriggerController {
    config: Arc<ControllerConfig>,
    classifier: DebouncedClassifier,
    machine: TriggerStateMachine,
    status: watch::Sender<ControllerSnapshot>,
}

impl TriggerController {
    pub fn new(config: ControllerConfig) -> Self {
        Self::starting_at(config, Instant::now())
    }

    /// Create a controller whose initial idle state began at `now`
    pub fn starting_at(config: ControllerConfig, now: Instant) -> Self {
        let config = Arc::new(config);
        let machine = TriggerStateMachine::new(Arc::clone(&config), now);
        Self::assemble(config, machine)
    }

    /// Create a controller with a custom transition table
    pub fn with_table(
        config: ControllerConfig,
        table: TransitionTable,
        now: Instant,
    ) -> Result<Self, ConfigurationError> {
        let config = Arc::new(config);
        let machine = TriggerStateMachine::with_table(Arc::clone(&config), table, now)?;
        Ok(Self::assemble(config, machine))
    }

    fn assemble(config: Arc<ControllerConfig>, machine: TriggerStateMachine) -> Self {
        let (status, _) = watch::channel(ControllerSnapshot {
            current_state: machine.current_state(),
            entered_at: machine.entered_at(),
            last_transition: None,
        });

        Self {
            classifier: DebouncedClassifier::new(Arc::clone(&config)),
            config,
            machine,
            status,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn current_state(&self) -> OperatingState {
        self.machine.current_state()
    }

    /// Process one observation and return the transition it caused, if any
    pub fn observe(&mut self, observation: Observation) -> Option<TransitionEvent> {
        let met = self.classifier.observe(&observation);
        debug!(
            label = %observation.label,
            confidence = observation.confidence,
            streak = self.classifier.streak(),
            met,
            "Observation processed"
        );

        let now = observation.timestamp;
        let evidence = self.evidence();
        let event = self
            .machine
            .evaluate(evidence, now, TransitionCause::Observation(observation));
        self.accept(event)
    }

    /// Evaluate time-based release without a new observation
    pub fn tick(&mut self, now: Instant) -> Option<TransitionEvent> {
        let evidence = self.evidence();
        let event = self.machine.evaluate(evidence, now, TransitionCause::Timer);
        self.accept(event)
    }

    fn evidence(&self) -> Evidence {
        Evidence {
            met: self.classifier.is_met(),
            cleared: self.classifier.is_cleared(),
        }
    }

    fn accept(&mut self, event: Option<TransitionEvent>) -> Option<TransitionEvent> {
        let event = event?;

        info!(
            "State transition {} -> {} ({})",
            event.from,
            event.to,
            event.cause.description()
        );

        self.classifier.reset();
        self.status.send_replace(ControllerSnapshot {
            current_state: event.to,
            entered_at: event.at,
            last_transition: Some(TransitionRecord::from(&event)),
        });

        Some(event)
    }

    /// Current snapshot for status reporting
    pub fn snapshot(&self) -> ControllerSnapshot {
        self.status.borrow().clone()
    }

    /// Read-only handle that follows the controller's state
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(self.status.subscribe())
    }
}
