use super::Sink;
use crate::error::SinkError;
use crate::events::{BridgeEvent, EventBus};
use crate::observation::{OperatingState, TransitionEvent};
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Outcome of delivering one state to every registered sink
#[derive(Debug)]
pub struct DispatchReport {
    pub state: OperatingState,
    pub delivered: Vec<String>,
    pub failures: Vec<SinkError>,
}

impl DispatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_sinks(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|e| e.sink_name().to_string())
            .collect()
    }
}

/// Fans a requested state out to every sink in parallel.
///
/// Each sink is bounded by the per-sink timeout, and a dispatch returns only
/// once every sink has finished or timed out, so successive transitions
/// reach each sink in order. Failures never stop delivery to other sinks.
pub struct SinkDispatcher {
    sinks: Vec<Arc<dyn Sink>>,
    sink_timeout: Duration,
    event_bus: Option<EventBus>,
}

impl SinkDispatcher {
    pub fn new(sink_timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            sink_timeout,
            event_bus: None,
        }
    }

    /// Report sink failures and applied transitions on the event bus
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn register(&mut self, sink: Arc<dyn Sink>) {
        debug!("Registered sink '{}'", sink.name());
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.iter().map(|s| s.name().to_string()).collect()
    }

    /// Deliver a transition's target state to every sink
    pub async fn dispatch(&self, event: &TransitionEvent) -> DispatchReport {
        debug!(
            transition_id = %event.id,
            "Dispatching {} -> {} to {} sinks",
            event.from,
            event.to,
            self.sinks.len()
        );

        let report = self.apply_all(event.to).await;

        if let Some(bus) = &self.event_bus {
            bus.publish(BridgeEvent::transition_applied(event, report.failed_sinks()));
        }
        report
    }

    /// (Re)apply a state to every sink outside the transition flow
    pub async fn apply_all(&self, state: OperatingState) -> DispatchReport {
        let calls = self.sinks.iter().map(|sink| {
            let sink = Arc::clone(sink);
            let limit = self.sink_timeout;
            async move {
                match timeout(limit, sink.apply(state)).await {
                    Ok(Ok(())) => Ok(sink.name().to_string()),
                    Ok(Err(e)) => Err(e),
                    Err(_) => Err(SinkError::Timeout {
                        sink: sink.name().to_string(),
                        timeout: limit,
                    }),
                }
            }
        });

        let mut report = DispatchReport {
            state,
            delivered: Vec::new(),
            failures: Vec::new(),
        };

        for outcome in join_all(calls).await {
            match outcome {
                Ok(name) => report.delivered.push(name),
                Err(error) => {
                    warn!(
                        sink = error.sink_name(),
                        state = %state,
                        "Sink failed: {}",
                        error
                    );
                    if let Some(bus) = &self.event_bus {
                        bus.publish(BridgeEvent::SinkFailed {
                            sink: error.sink_name().to_string(),
                            state,
                            error: error.to_string(),
                            timestamp: SystemTime::now(),
                        });
                    }
                    report.failures.push(error);
                }
            }
        }

        report
    }
}
