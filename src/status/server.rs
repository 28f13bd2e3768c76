use super::handlers::{health_handler, status_handler};
use crate::app::ComponentState;
use crate::controller::StatusHandle;
use crate::error::{Result, StatusError};
use axum::{routing::get, Router};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state for the Axum server
#[derive(Clone)]
pub struct StatusState {
    pub(crate) status: StatusHandle,
    pub(crate) components: Arc<Mutex<HashMap<String, ComponentState>>>,
}

/// Read-only HTTP view of the controller and component states
pub struct StatusServer {
    state: StatusState,
}

impl StatusServer {
    pub fn new(
        status: StatusHandle,
        components: Arc<Mutex<HashMap<String, ComponentState>>>,
    ) -> Self {
        Self {
            state: StatusState { status, components },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/status", get(status_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    pub async fn bind(&self, addr: &str) -> Result<TcpListener> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusError::BindFailed {
                address: addr.to_string(),
                source: e,
            })?;
        Ok(listener)
    }

    /// Serve until the token is cancelled
    pub async fn serve(self, listener: TcpListener, token: CancellationToken) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!("Status server listening on {}", addr);
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await
            .map_err(|e| StatusError::ServeFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Status server stopped");
        Ok(())
    }
}
