use crate::observation::{OperatingState, TransitionEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Summary of the most recent accepted transition
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRecord {
    pub from: OperatingState,
    pub to: OperatingState,
    pub at: Instant,
    pub wall_clock: DateTime<Utc>,
    pub cause: String,
}

impl From<&TransitionEvent> for TransitionRecord {
    fn from(event: &TransitionEvent) -> Self {
        Self {
            from: event.from,
            to: event.to,
            at: event.at,
            wall_clock: Utc::now(),
            cause: event.cause.description(),
        }
    }
}

/// Read-only view of the controller state
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub current_state: OperatingState,
    pub entered_at: Instant,
    pub last_transition: Option<TransitionRecord>,
}

impl ControllerSnapshot {
    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.entered_at)
    }

    /// Serializable report for status surfaces
    pub fn report(&self, now: Instant) -> StatusReport {
        StatusReport {
            current_state: self.current_state,
            time_in_state_secs: self.time_in_state(now).as_secs_f64(),
            last_transition: self.last_transition.as_ref().map(|t| TransitionReport {
                from: t.from,
                to: t.to,
                at: t.wall_clock,
                seconds_ago: now.saturating_duration_since(t.at).as_secs_f64(),
                cause: t.cause.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub current_state: OperatingState,
    pub time_in_state_secs: f64,
    pub last_transition: Option<TransitionReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionReport {
    pub from: OperatingState,
    pub to: OperatingState,
    pub at: DateTime<Utc>,
    pub seconds_ago: f64,
    pub cause: String,
}

/// Cloneable read-only handle onto the controller's latest snapshot
#[derive(Clone)]
pub struct StatusHandle {
    receiver: watch::Receiver<ControllerSnapshot>,
}

impl StatusHandle {
    pub(crate) fn new(receiver: watch::Receiver<ControllerSnapshot>) -> Self {
        Self { receiver }
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn current_state(&self) -> OperatingState {
        self.receiver.borrow().current_state
    }

    pub fn report(&self) -> StatusReport {
        self.snapshot().report(Instant::now())
    }

    /// Wait until the controller publishes a new snapshot
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }
}
