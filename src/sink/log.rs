use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use tracing::info;

/// Logs the requested state. Used when no other sink is configured.
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Sink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        info!(sink = %self.name, state = %state, "Output state requested");
        Ok(())
    }
}
