use super::{BridgeOrchestrator, ComponentState, ShutdownReason};
use crate::error::Result;
use crate::events::BridgeEvent;
use crate::observation::OperatingState;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

impl BridgeOrchestrator {
    /// Stop all tasks, drain in-flight dispatch and force sinks back to idle
    pub async fn shutdown(&mut self, reason: ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.event_bus.publish(BridgeEvent::ShutdownRequested {
            reason: reason.to_string(),
            timestamp: SystemTime::now(),
        });
        self.cancellation_token.cancel();

        let mut exit_code = reason.exit_code();
        let limit = self.config.shutdown_timeout();

        // The control loop finishes any dispatch already in flight
        if let Some(task) = self.loop_task.take() {
            self.set_component_state("controller", ComponentState::Stopping)
                .await;
            match self.join_within("controller", task).await {
                Some(exit) => {
                    info!("Control loop stopped: {:?}", exit);
                    self.set_component_state("controller", ComponentState::Stopped)
                        .await;
                }
                None => {
                    self.set_component_state("controller", ComponentState::Failed)
                        .await;
                    exit_code = 1;
                }
            }
        }

        if let Some(task) = self.pump_task.take() {
            let failed = matches!(
                self.get_component_state("source").await,
                Some(ComponentState::Failed)
            );
            if self.join_within("source", task).await.is_none() {
                exit_code = 1;
            } else if !failed {
                self.set_component_state("source", ComponentState::Stopped)
                    .await;
            }
        }

        if let Some(task) = self.status_task.take() {
            if self.join_within("status", task).await.is_some() {
                self.set_component_state("status", ComponentState::Stopped)
                    .await;
            }
        }

        // Best-effort cleanup: every output back to idle
        self.set_component_state("sinks", ComponentState::Stopping)
            .await;
        match timeout(limit, self.dispatcher.apply_all(OperatingState::Idle)).await {
            Ok(report) if report.is_success() => {
                info!("All sinks returned to idle");
                self.set_component_state("sinks", ComponentState::Stopped)
                    .await;
            }
            Ok(report) => {
                warn!(
                    "Sinks failed to return to idle: {}",
                    report.failed_sinks().join(", ")
                );
                self.set_component_state("sinks", ComponentState::Stopped)
                    .await;
            }
            Err(_) => {
                error!("Sink idle cleanup did not finish within {:?}", limit);
                self.set_component_state("sinks", ComponentState::Failed)
                    .await;
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Await a task within the shutdown timeout, aborting it on expiry
    async fn join_within<T>(&self, component: &str, mut task: JoinHandle<T>) -> Option<T> {
        let limit = self.config.shutdown_timeout();
        match timeout(limit, &mut task).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                error!("{} task failed: {}", component, e);
                None
            }
            Err(_) => {
                error!("{} task did not stop within {:?}, aborting", component, limit);
                task.abort();
                None
            }
        }
    }
}
