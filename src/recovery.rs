use crate::error::SourceError;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after an error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Stop retrying; the component is finished
    GiveUp,
}

/// Recovery strategy configuration
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_backoff: true,
        }
    }
}

/// Tracks consecutive failures per component and decides whether to retry
pub struct RecoveryManager {
    config: RecoveryConfig,
    retry_counts: HashMap<String, u32>,
}

impl RecoveryManager {
    /// Create a new recovery manager with default configuration
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    /// Create a new recovery manager with custom configuration
    pub fn with_config(config: RecoveryConfig) -> Self {
        Self {
            config,
            retry_counts: HashMap::new(),
        }
    }

    /// Determine recovery action for a source failure
    pub fn handle_error(&mut self, component: &str, error: &SourceError) -> RecoveryAction {
        if !error.is_transient() {
            warn!("Non-recoverable error in {}: {}", component, error);
            return RecoveryAction::GiveUp;
        }

        let retry_count = self.get_retry_count(component);
        if retry_count >= self.config.max_retries {
            error!(
                "Maximum retries ({}) exceeded for component {}: {}",
                self.config.max_retries, component, error
            );
            return RecoveryAction::GiveUp;
        }

        self.retry_counts
            .insert(component.to_string(), retry_count + 1);
        let delay = self.calculate_delay(retry_count);

        info!(
            "Scheduling recovery for {} in {:?} (attempt {}/{}): {}",
            component,
            delay,
            retry_count + 1,
            self.config.max_retries,
            error
        );

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset retry count for a component after a successful read
    pub fn reset_retry_count(&mut self, component: &str) {
        if self.retry_counts.remove(component).is_some() {
            info!("Component {} recovered, reset retry count", component);
        }
    }

    /// Calculate delay for retry with exponential backoff
    fn calculate_delay(&self, retry_count: u32) -> Duration {
        if !self.config.exponential_backoff {
            return self.config.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count);
        self.config
            .base_delay
            .saturating_mul(factor)
            .min(self.config.max_delay)
    }

    /// Get current retry count for a component
    pub fn get_retry_count(&self, component: &str) -> u32 {
        self.retry_counts.get(component).copied().unwrap_or(0)
    }

    /// Check if component has exceeded retry limit
    pub fn has_exceeded_retry_limit(&self, component: &str) -> bool {
        self.get_retry_count(component) >= self.config.max_retries
    }
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self::new()
    }
}
