pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod observation;
pub mod recovery;
pub mod sink;
pub mod source;

#[cfg(feature = "status")]
pub mod status;

pub use app::{BridgeOrchestrator, ComponentState, ShutdownReason};
pub use config::{BridgeConfig, SinkConfig, SourceConfig, SourceKind};
pub use controller::{
    ControllerConfig, ControllerSnapshot, DebouncedClassifier, StatusHandle, TriggerController,
    TriggerStateMachine,
};
pub use error::{Result, ScareError};
pub use events::{BridgeEvent, EventBus, EventFilter, EventReceiver};
pub use observation::{Observation, OperatingState, TransitionCause, TransitionEvent};
pub use recovery::{RecoveryAction, RecoveryConfig, RecoveryManager};
pub use sink::{build_sinks, DispatchReport, Sink, SinkDispatcher};
pub use source::{build_source, ObservationSource};

#[cfg(feature = "status")]
pub use status::StatusServer;
