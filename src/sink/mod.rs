mod command;
mod crossfade;
mod dispatcher;
mod log;
mod midi;
pub mod mock;
mod osc;


pub use command::CommandSink;
pub use crossfade::CrossfadeSink;
pub use dispatcher::{DispatchReport, SinkDispatcher};
pub use log::LogSink;
pub use midi::{MidiNote, MidiSink};
pub use osc::{OscArg, OscMessage, OscMode, OscSink, OscTransport};

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// An output that mirrors the controller's operating state.
///
/// `apply` must tolerate being asked for the state it is already in.
/// Implementations that are not reentrant serialize their own calls.
#[async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &str;

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError>;
}

/// Build every configured sink. An empty list yields a single log sink.
pub fn build_sinks(configs: &[SinkConfig]) -> Vec<Arc<dyn Sink>> {
    if configs.is_empty() {
        return vec![Arc::new(LogSink::new("log"))];
    }

    configs.iter().map(build_sink).collect()
}

pub fn build_sink(config: &SinkConfig) -> Arc<dyn Sink> {
    let name = config.name();
    match config {
        SinkConfig::Log { .. } => Arc::new(LogSink::new(name)),
        SinkConfig::OscMix {
            host,
            port,
            addresses,
            ..
        } => Arc::new(OscSink::new(
            name,
            format!("{}:{}", host, port),
            OscMode::MixFader {
                addresses: addresses.clone(),
            },
        )),
        SinkConfig::OscClips {
            host,
            port,
            source,
            idle_clip,
            scare_clip,
            ..
        } => Arc::new(OscSink::new(
            name,
            format!("{}:{}", host, port),
            OscMode::Clips {
                source: source.clone(),
                idle: *idle_clip,
                scare: *scare_clip,
            },
        )),
        SinkConfig::OscPreset {
            host,
            port,
            address,
            idle_preset,
            scare_preset,
            ..
        } => Arc::new(OscSink::new(
            name,
            format!("{}:{}", host, port),
            OscMode::Presets {
                address: address.clone(),
                idle: *idle_preset,
                scare: *scare_preset,
            },
        )),
        SinkConfig::Crossfade {
            host,
            port,
            idle_layer,
            scare_layer,
            rise_ms,
            step_ms,
            ..
        } => Arc::new(CrossfadeSink::new(
            name,
            format!("{}:{}", host, port),
            *idle_layer,
            *scare_layer,
            Duration::from_millis(*rise_ms),
            Duration::from_millis(*step_ms),
        )),
        SinkConfig::Command {
            idle,
            scare,
            stop,
            settle_ms,
            ..
        } => Arc::new(CommandSink::new(
            name,
            idle.clone(),
            scare.clone(),
            stop.clone(),
            Duration::from_millis(*settle_ms),
        )),
        SinkConfig::Midi {
            device,
            channel,
            idle_note,
            scare_note,
            velocity,
            note_length_ms,
            ..
        } => Arc::new(MidiSink::new(
            name,
            device.clone(),
            MidiNote {
                channel: *channel,
                note: *idle_note,
                velocity: *velocity,
            },
            MidiNote {
                channel: *channel,
                note: *scare_note,
                velocity: *velocity,
            },
            Duration::from_millis(*note_length_ms),
        )),
    }
}
