use super::control_loop::{pump_source, ControlLoop, LoopExit};
use super::orchestrator::request_shutdown;
use super::{BridgeOrchestrator, ComponentState, ShutdownReason};
use crate::error::{Result, ScareError};
use crate::events::{BridgeEvent, EventFilter};
use crate::observation::OperatingState;
use crate::recovery::RecoveryManager;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const OBSERVATION_QUEUE: usize = 64;

impl BridgeOrchestrator {
    /// Register components and force every sink to idle
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing scarebridge components");

        let mut states = self.component_states.lock().await;
        states.insert("sinks".to_string(), ComponentState::Stopped);
        states.insert("source".to_string(), ComponentState::Stopped);
        states.insert("controller".to_string(), ComponentState::Stopped);
        if self.config.status.enabled {
            states.insert("status".to_string(), ComponentState::Stopped);
        }
        drop(states);

        if self.config.controller.force_idle_on_start {
            self.set_component_state("sinks", ComponentState::Starting)
                .await;
            let report = self.dispatcher.apply_all(OperatingState::Idle).await;
            if report.is_success() {
                info!("All {} sinks forced to idle", self.dispatcher.len());
            } else {
                warn!(
                    "Sinks failed to reach idle at startup: {}",
                    report.failed_sinks().join(", ")
                );
            }
        }
        self.set_component_state("sinks", ComponentState::Running)
            .await;

        info!("All components initialized successfully");
        Ok(())
    }

    /// Spawn the source pump, control loop and optional status server
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting scarebridge");

        let controller = self
            .controller
            .take()
            .ok_or_else(|| ScareError::system("Controller already started"))?;
        let source = self
            .source
            .take()
            .ok_or_else(|| ScareError::system("Observation source already started"))?;

        let (sender, receiver) = mpsc::channel(OBSERVATION_QUEUE);

        self.set_component_state("source", ComponentState::Starting)
            .await;
        self.pump_task = Some(tokio::spawn(pump_source(
            source,
            sender,
            RecoveryManager::with_config(self.config.recovery_config()),
            self.event_bus.clone(),
            self.cancellation_token.clone(),
        )));
        self.set_component_state("source", ComponentState::Running)
            .await;

        self.set_component_state("controller", ComponentState::Starting)
            .await;
        let control_loop = ControlLoop::new(controller, Arc::clone(&self.dispatcher));
        let token = self.cancellation_token.clone();
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        let states = Arc::clone(&self.component_states);
        self.loop_task = Some(tokio::spawn(async move {
            let exit = control_loop.run(receiver, token).await;
            let reason = match &exit {
                LoopExit::EndOfStream => Some(ShutdownReason::EndOfStream),
                LoopExit::SourceFailed(details) => {
                    states
                        .lock()
                        .await
                        .insert("source".to_string(), ComponentState::Failed);
                    Some(ShutdownReason::SourceFailed(details.clone()))
                }
                LoopExit::Cancelled => None,
            };
            if let Some(reason) = reason {
                request_shutdown(&shutdown_sender, reason).await;
            }
            exit
        }));
        self.set_component_state("controller", ComponentState::Running)
            .await;

        self.spawn_shutdown_listener();

        if self.config.status.enabled {
            self.start_status_server().await?;
        }

        info!("scarebridge started");
        Ok(())
    }

    /// Turn `ShutdownRequested` events on the bus into a shutdown
    fn spawn_shutdown_listener(&self) {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "shutdown-listener",
        );
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    event = receiver.recv() => match event {
                        Ok(BridgeEvent::ShutdownRequested { reason, .. }) => {
                            request_shutdown(&shutdown_sender, ShutdownReason::UserRequest(reason)).await;
                            return;
                        }
                        Ok(_) => {}
                        Err(crate::error::EventBusError::ChannelClosed) => return,
                        Err(e) => debug!("Shutdown listener: {}", e),
                    }
                }
            }
        });
    }

    #[cfg(feature = "status")]
    async fn start_status_server(&mut self) -> Result<()> {
        use crate::status::StatusServer;

        self.set_component_state("status", ComponentState::Starting)
            .await;

        let addr = format!("{}:{}", self.config.status.ip, self.config.status.port);
        let server = StatusServer::new(self.status.clone(), Arc::clone(&self.component_states));
        let listener = server.bind(&addr).await?;
        let token = self.cancellation_token.clone();
        let states = Arc::clone(&self.component_states);

        self.status_task = Some(tokio::spawn(async move {
            if let Err(e) = server.serve(listener, token).await {
                error!("Status server error: {}", e);
                states
                    .lock()
                    .await
                    .insert("status".to_string(), ComponentState::Failed);
            }
        }));

        self.set_component_state("status", ComponentState::Running)
            .await;
        info!("Status server listening on {}", addr);
        Ok(())
    }

    #[cfg(not(feature = "status"))]
    async fn start_status_server(&mut self) -> Result<()> {
        warn!("Status server requested but scarebridge was built without the 'status' feature");
        Ok(())
    }
}
