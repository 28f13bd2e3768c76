use super::control_loop::LoopExit;
use super::types::{ComponentState, ShutdownReason};
use crate::config::BridgeConfig;
use crate::controller::{StatusHandle, TriggerController};
use crate::error::Result;
use crate::events::EventBus;
use crate::sink::{build_sinks, Sink, SinkDispatcher};
use crate::source::{build_source, ObservationSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub(super) type ShutdownSender = Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>;

/// Composition root: owns the controller, sinks and observation source for one run
pub struct BridgeOrchestrator {
    pub(super) config: BridgeConfig,
    pub(super) event_bus: EventBus,
    pub(super) dispatcher: Arc<SinkDispatcher>,
    pub(super) status: StatusHandle,

    // Moved into their tasks by start()
    pub(super) controller: Option<TriggerController>,
    pub(super) source: Option<Box<dyn ObservationSource>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: ShutdownSender,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
    pub(super) loop_task: Option<JoinHandle<LoopExit>>,
    pub(super) pump_task: Option<JoinHandle<()>>,
    pub(super) status_task: Option<JoinHandle<()>>,
}

impl BridgeOrchestrator {
    /// Create an orchestrator with the configured source and sinks
    pub async fn new(config: BridgeConfig) -> Result<Self> {
        let source = build_source(&config.source, &config.trigger.label).await?;
        let sinks = build_sinks(&config.sinks);
        Self::from_parts(config, source, sinks)
    }

    /// Create an orchestrator around an explicit source and sink set
    pub fn from_parts(
        config: BridgeConfig,
        source: Box<dyn ObservationSource>,
        sinks: Vec<Arc<dyn Sink>>,
    ) -> Result<Self> {
        let controller = TriggerController::new(config.controller_config()?);
        let status = controller.status_handle();
        let event_bus = EventBus::new(config.system.event_bus_capacity);

        let mut dispatcher =
            SinkDispatcher::new(config.sink_timeout()).with_event_bus(event_bus.clone());
        for sink in sinks {
            dispatcher.register(sink);
        }

        info!(
            "Bridge assembled: label '{}', source '{}', sinks [{}]",
            config.trigger.label,
            source.name(),
            dispatcher.sink_names().join(", ")
        );

        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            dispatcher: Arc::new(dispatcher),
            status,
            controller: Some(controller),
            source: Some(source),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(Some(shutdown_sender))),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            loop_task: None,
            pump_task: None,
            status_task: None,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Read-only view of the controller state
    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }
}

/// Deliver a shutdown reason unless one was already delivered
pub(super) async fn request_shutdown(sender: &ShutdownSender, reason: ShutdownReason) {
    if let Some(sender) = sender.lock().await.take() {
        let _ = sender.send(reason);
    }
}
