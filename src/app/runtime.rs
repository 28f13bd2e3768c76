use super::orchestrator::{request_shutdown, ShutdownSender};
use super::{BridgeOrchestrator, ShutdownReason};
use crate::error::{Result, ScareError};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

impl BridgeOrchestrator {
    /// Run until a signal, end of stream or source failure, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("scarebridge is running");

        self.setup_signal_handlers();
        let exit_code = self.wait_and_shutdown().await?;

        info!("scarebridge shutdown complete");
        Ok(exit_code)
    }

    /// Wait for a shutdown reason without installing signal handlers
    pub async fn wait_and_shutdown(&mut self) -> Result<i32> {
        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| ScareError::system("Shutdown receiver already taken"))?;

        let reason = shutdown_receiver
            .await
            .map_err(|_| ScareError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {:?}", reason);
        self.shutdown(reason).await
    }

    /// Set up signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) {
        // Handle SIGTERM (systemd stop) - Unix only
        #[cfg(unix)]
        {
            let shutdown_sender: ShutdownSender = Arc::clone(&self.shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm =
                    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                        Ok(sigterm) => sigterm,
                        Err(e) => {
                            error!("Failed to register SIGTERM handler: {}", e);
                            return;
                        }
                    };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    request_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGTERM".to_string()))
                        .await;
                }
            });
        }

        // Handle SIGINT (Ctrl+C) - Cross-platform
        let shutdown_sender = Arc::clone(&self.shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                request_shutdown(&shutdown_sender, ShutdownReason::Signal("SIGINT".to_string()))
                    .await;
            }
        });
    }
}
