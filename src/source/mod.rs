mod keyboard;
mod line;
mod scripted;
mod udp;

pub use keyboard::{KeyAction, KeyboardSource};
pub use line::LineSource;
pub use scripted::{ScriptStep, ScriptedSource};
pub use udp::UdpSource;

use crate::config::{SourceConfig, SourceKind};
use crate::error::SourceError;
use crate::observation::Observation;
use async_trait::async_trait;
use std::time::Duration;

/// Interval between steps of the built-in simulation
pub const SIMULATION_INTERVAL: Duration = Duration::from_millis(1500);

/// A lazy, potentially infinite stream of classifier observations.
///
/// `Ok(None)` is end of stream. Transient errors may be retried by calling
/// `next` again; terminal errors end the stream.
#[async_trait]
pub trait ObservationSource: Send {
    fn name(&self) -> &str;

    async fn next(&mut self) -> Result<Option<Observation>, SourceError>;
}

/// Build the configured observation source
pub async fn build_source(
    config: &SourceConfig,
    trigger_label: &str,
) -> Result<Box<dyn ObservationSource>, SourceError> {
    let source: Box<dyn ObservationSource> = match config.kind {
        SourceKind::Stdin => Box::new(LineSource::stdin()),
        SourceKind::File => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| SourceError::terminal("file", "source.path is not set"))?;
            Box::new(LineSource::open(path).await?)
        }
        SourceKind::Udp => Box::new(UdpSource::bind(&config.bind).await?),
        SourceKind::Keyboard => Box::new(KeyboardSource::new(trigger_label)),
        SourceKind::Simulate => Box::new(ScriptedSource::simulation(
            trigger_label,
            SIMULATION_INTERVAL,
        )),
    };
    Ok(source)
}
