use serde::Serialize;
use std::fmt;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    /// The observation source ended normally
    EndOfStream,
    /// The observation source failed for good
    SourceFailed(String),
    UserRequest(String),
    Error(String),
}

impl ShutdownReason {
    /// Process exit code for this reason
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::SourceFailed(_) | ShutdownReason::Error(_) => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "received {}", signal),
            ShutdownReason::EndOfStream => f.write_str("observation source ended"),
            ShutdownReason::SourceFailed(details) => {
                write!(f, "observation source failed: {}", details)
            }
            ShutdownReason::UserRequest(reason) => write!(f, "requested: {}", reason),
            ShutdownReason::Error(details) => write!(f, "error: {}", details),
        }
    }
}
