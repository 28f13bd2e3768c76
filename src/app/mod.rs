mod control_loop;
mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use control_loop::{pump_source, ControlLoop, LoopExit, SourceMessage};
pub use orchestrator::BridgeOrchestrator;
pub use types::{ComponentState, ShutdownReason};
