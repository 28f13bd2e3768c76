use crate::observation::OperatingState;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScareError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid controller configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Observation source error: {0}")]
    Source(#[from] SourceError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Status server error: {0}")]
    Status(#[from] StatusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ScareError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Fatal errors raised while constructing the trigger controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("confidence_threshold must be within [0, 1], got {value}")]
    ThresholdOutOfRange { value: f64 },

    #[error("{field} must be a finite, non-negative number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: f64 },

    #[error("debounce_frames must be at least 1")]
    EmptyDebounceWindow,

    #[error("trigger_label must not be empty")]
    EmptyTriggerLabel,

    #[error("no release policy enabled: set release.on_condition or a non-zero auto_release")]
    NoReleasePolicy,

    #[error("tick interval must be greater than zero")]
    ZeroTickInterval,

    #[error("transition {from} -> {to} is not permitted by the transition table")]
    ForbiddenTransition {
        from: OperatingState,
        to: OperatingState,
    },
}

/// Recoverable failure of a single sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink '{sink}' I/O failure: {source}")]
    Io {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sink '{sink}' did not complete within {timeout:?}")]
    Timeout { sink: String, timeout: Duration },

    #[error("sink '{sink}' rejected state {state}: {details}")]
    Rejected {
        sink: String,
        state: OperatingState,
        details: String,
    },

    #[error("sink '{sink}' unavailable: {details}")]
    Unavailable { sink: String, details: String },
}

impl SinkError {
    pub fn io<S: Into<String>>(sink: S, source: std::io::Error) -> Self {
        Self::Io {
            sink: sink.into(),
            source,
        }
    }

    pub fn rejected<S: Into<String>, D: Into<String>>(
        sink: S,
        state: OperatingState,
        details: D,
    ) -> Self {
        Self::Rejected {
            sink: sink.into(),
            state,
            details: details.into(),
        }
    }

    /// Name of the sink that produced this error
    pub fn sink_name(&self) -> &str {
        match self {
            SinkError::Io { sink, .. }
            | SinkError::Timeout { sink, .. }
            | SinkError::Rejected { sink, .. }
            | SinkError::Unavailable { sink, .. } => sink,
        }
    }
}

/// Failure reported by an observation source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transient source failure in {source_name}: {details}")]
    Transient {
        source_name: String,
        details: String,
    },

    #[error("terminal source failure in {source_name}: {details}")]
    Terminal {
        source_name: String,
        details: String,
    },
}

impl SourceError {
    pub fn transient<S: Into<String>, D: Into<String>>(source_name: S, details: D) -> Self {
        Self::Transient {
            source_name: source_name.into(),
            details: details.into(),
        }
    }

    pub fn terminal<S: Into<String>, D: Into<String>>(source_name: S, details: D) -> Self {
        Self::Terminal {
            source_name: source_name.into(),
            details: details.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient { .. })
    }

    /// Classify an I/O error raised while reading observations
    pub fn from_io<S: Into<String>>(source_name: S, error: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                Self::transient(source_name, error.to_string())
            }
            _ => Self::terminal(source_name, error.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("Failed to bind status server to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Status server failed: {details}")]
    ServeFailed { details: String },
}

pub type Result<T> = std::result::Result<T, ScareError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let interrupted = std::io::Error::new(std::io::ErrorKind::Interrupted, "signal");
        assert!(SourceError::from_io("stdin", &interrupted).is_transient());

        let broken = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(!SourceError::from_io("stdin", &broken).is_transient());
    }

    #[test]
    fn test_sink_error_carries_sink_name() {
        let err = SinkError::rejected("vpt", OperatingState::Triggered, "bad address");
        assert_eq!(err.sink_name(), "vpt");
        assert!(err.to_string().contains("triggered"));
    }
}
