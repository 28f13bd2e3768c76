use super::osc::{OscArg, OscMessage, OscTransport};
use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Crossfades between an idle layer and a scare layer over OSC.
///
/// The ramp runs inside `apply`; the call returns once the target layer is
/// fully up. Calls are serialized so two ramps never interleave.
pub struct CrossfadeSink {
    name: String,
    transport: OscTransport,
    idle_layer: u32,
    scare_layer: u32,
    rise: Duration,
    step: Duration,
    current: Mutex<Option<OperatingState>>,
}

impl CrossfadeSink {
    pub fn new<S: Into<String>, T: Into<String>>(
        name: S,
        target: T,
        idle_layer: u32,
        scare_layer: u32,
        rise: Duration,
        step: Duration,
    ) -> Self {
        let name = name.into();
        Self {
            transport: OscTransport::new(name.clone(), target),
            name,
            idle_layer,
            scare_layer,
            rise,
            step,
            current: Mutex::new(None),
        }
    }

    fn steps(&self) -> u32 {
        if self.step.is_zero() {
            return 1;
        }
        let steps = self.rise.as_millis() / self.step.as_millis().max(1);
        u32::try_from(steps).unwrap_or(u32::MAX).max(1)
    }

    fn levels(&self, scare_level: f32) -> [OscMessage; 2] {
        [
            OscMessage::new(format!("/{}layer/fade", self.scare_layer))
                .with_arg(OscArg::Float(scare_level)),
            OscMessage::new(format!("/{}layer/fade", self.idle_layer))
                .with_arg(OscArg::Float(1.0 - scare_level)),
        ]
    }
}

#[async_trait]
impl Sink for CrossfadeSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        let mut current = self.current.lock().await;
        let triggered = state == OperatingState::Triggered;
        let end = if triggered { 1.0 } else { 0.0 };

        if *current == Some(state) {
            debug!("Sink '{}' already at {}, resending end levels", self.name, state);
            return self.transport.send(&self.levels(end)).await;
        }

        // Unknown position until the ramp completes
        *current = None;

        let steps = self.steps();
        for i in 1..=steps {
            let progress = i as f32 / steps as f32;
            let scare_level = if triggered { progress } else { 1.0 - progress };
            self.transport.send(&self.levels(scare_level)).await?;
            if i < steps {
                tokio::time::sleep(self.step).await;
            }
        }

        *current = Some(state);
        info!(
            "Sink '{}' crossfaded to {} over {:?}",
            self.name, state, self.rise
        );
        Ok(())
    }
}
