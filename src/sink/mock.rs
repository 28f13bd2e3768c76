//! In-memory sinks for exercising the dispatcher and control loop.

use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Records every state it is asked to apply
#[derive(Clone)]
pub struct RecordingSink {
    name: String,
    applied: Arc<Mutex<Vec<OperatingState>>>,
    delay: Duration,
}

impl RecordingSink {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            applied: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
        }
    }

    /// Take `delay` to complete every apply
    pub fn slow<S: Into<String>>(name: S, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(name)
        }
    }

    pub fn applied(&self) -> Vec<OperatingState> {
        self.applied.lock().clone()
    }

    pub fn last(&self) -> Option<OperatingState> {
        self.applied.lock().last().copied()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.applied.lock().push(state);
        Ok(())
    }
}

/// Fails every apply, counting the attempts
#[derive(Clone)]
pub struct FailingSink {
    name: String,
    attempts: Arc<Mutex<u32>>,
}

impl FailingSink {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock()
    }
}

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        *self.attempts.lock() += 1;
        Err(SinkError::rejected(&self.name, state, "always fails"))
    }
}
