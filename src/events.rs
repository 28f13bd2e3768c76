use crate::error::EventBusError;
use crate::observation::{OperatingState, TransitionEvent};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events published while the bridge runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BridgeEvent {
    /// A transition was dispatched to every sink
    TransitionApplied {
        transition_id: Uuid,
        from: OperatingState,
        to: OperatingState,
        cause: String,
        failed_sinks: Vec<String>,
        timestamp: SystemTime,
    },
    /// One sink failed to apply a state
    SinkFailed {
        sink: String,
        state: OperatingState,
        error: String,
        timestamp: SystemTime,
    },
    /// The observation source reported an error
    SourceFailed {
        source_name: String,
        error: String,
        terminal: bool,
        timestamp: SystemTime,
    },
    /// System shutdown requested
    ShutdownRequested {
        reason: String,
        timestamp: SystemTime,
    },
}

impl BridgeEvent {
    pub fn transition_applied(event: &TransitionEvent, failed_sinks: Vec<String>) -> Self {
        BridgeEvent::TransitionApplied {
            transition_id: event.id,
            from: event.from,
            to: event.to,
            cause: event.cause.description(),
            failed_sinks,
            timestamp: SystemTime::now(),
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            BridgeEvent::TransitionApplied { timestamp, .. }
            | BridgeEvent::SinkFailed { timestamp, .. }
            | BridgeEvent::SourceFailed { timestamp, .. }
            | BridgeEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            BridgeEvent::TransitionApplied {
                from,
                to,
                cause,
                failed_sinks,
                ..
            } => {
                if failed_sinks.is_empty() {
                    format!("Applied {} -> {} ({})", from, to, cause)
                } else {
                    format!(
                        "Applied {} -> {} ({}), failed sinks: {}",
                        from,
                        to,
                        cause,
                        failed_sinks.join(", ")
                    )
                }
            }
            BridgeEvent::SinkFailed {
                sink, state, error, ..
            } => {
                format!("Sink {} failed to apply {}: {}", sink, state, error)
            }
            BridgeEvent::SourceFailed {
                source_name,
                error,
                terminal,
                ..
            } => {
                format!(
                    "Source {} {}: {}",
                    source_name,
                    if *terminal { "ended" } else { "faltered" },
                    error
                )
            }
            BridgeEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            BridgeEvent::TransitionApplied { .. } => "transition_applied",
            BridgeEvent::SinkFailed { .. } => "sink_failed",
            BridgeEvent::SourceFailed { .. } => "source_failed",
            BridgeEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter
    pub fn subscribe_filtered<S: Into<String>>(&self, filter: EventFilter, name: S) -> EventReceiver {
        EventReceiver::new(self.subscribe(), filter, name.into())
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of receivers; having none is not an error.
    pub fn publish(&self, event: BridgeEvent) -> usize {
        match &event {
            BridgeEvent::SourceFailed { .. } => {
                warn!("{}", event.description());
            }
            BridgeEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            // Sinks and the dispatcher log their own outcomes
            BridgeEvent::SinkFailed { .. } | BridgeEvent::TransitionApplied { .. } => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender.send(event).unwrap_or(0)
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept failures of the named sinks
    Sinks(Vec<String>),
    /// Custom filter function
    Custom(fn(&BridgeEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &BridgeEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Sinks(sinks) => match event {
                BridgeEvent::SinkFailed { sink, .. } => sinks.contains(sink),
                _ => false,
            },
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<BridgeEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<BridgeEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<BridgeEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                    return Err(EventBusError::Lagged { skipped });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<BridgeEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, skipped);
                    return Err(EventBusError::Lagged { skipped });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}
