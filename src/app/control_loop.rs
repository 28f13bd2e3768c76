use crate::controller::TriggerController;
use crate::events::{BridgeEvent, EventBus};
use crate::observation::{Observation, TransitionEvent};
use crate::recovery::{RecoveryAction, RecoveryManager};
use crate::sink::SinkDispatcher;
use crate::source::ObservationSource;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Messages from the source pump to the control loop
#[derive(Debug)]
pub enum SourceMessage {
    Observation(Observation),
    /// The source gave up; no further messages follow
    Failed(String),
}

/// Why the control loop returned
#[derive(Debug, Clone, PartialEq)]
pub enum LoopExit {
    EndOfStream,
    SourceFailed(String),
    Cancelled,
}

/// Single owner of the trigger controller.
///
/// Observations and timer ticks are handled one at a time in one task, so
/// state mutation never runs concurrently. Each transition is dispatched to
/// the sinks and awaited before the next message is taken.
pub struct ControlLoop {
    controller: TriggerController,
    dispatcher: Arc<SinkDispatcher>,
}

impl ControlLoop {
    pub fn new(controller: TriggerController, dispatcher: Arc<SinkDispatcher>) -> Self {
        Self {
            controller,
            dispatcher,
        }
    }

    pub async fn run(
        mut self,
        mut observations: mpsc::Receiver<SourceMessage>,
        cancellation_token: CancellationToken,
    ) -> LoopExit {
        let mut ticker = interval(self.controller.config().tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Control loop running with {:?} tick",
            self.controller.config().tick_interval()
        );

        loop {
            tokio::select! {
                biased;

                _ = cancellation_token.cancelled() => {
                    debug!("Control loop cancelled");
                    return LoopExit::Cancelled;
                }
                _ = ticker.tick() => {
                    if let Some(event) = self.controller.tick(Instant::now()) {
                        self.dispatch(event).await;
                    }
                }
                message = observations.recv() => match message {
                    Some(SourceMessage::Observation(observation)) => {
                        if let Some(event) = self.controller.observe(observation) {
                            self.dispatch(event).await;
                        }
                    }
                    Some(SourceMessage::Failed(details)) => {
                        error!("Observation source failed: {}", details);
                        return LoopExit::SourceFailed(details);
                    }
                    None => {
                        info!("Observation source ended");
                        return LoopExit::EndOfStream;
                    }
                },
            }
        }
    }

    async fn dispatch(&self, event: TransitionEvent) {
        let report = self.dispatcher.dispatch(&event).await;
        if !report.is_success() {
            warn!(
                transition_id = %event.id,
                "{} of {} sinks failed to apply {}",
                report.failures.len(),
                self.dispatcher.len(),
                event.to
            );
        }
    }
}

/// Read observations into the control loop's queue, retrying transient
/// failures with backoff. Returns when the source ends, gives up, the queue
/// closes or the token is cancelled.
pub async fn pump_source(
    mut source: Box<dyn ObservationSource>,
    sender: mpsc::Sender<SourceMessage>,
    mut recovery: RecoveryManager,
    event_bus: EventBus,
    cancellation_token: CancellationToken,
) {
    let name = source.name().to_string();

    loop {
        let next = tokio::select! {
            _ = cancellation_token.cancelled() => return,
            next = source.next() => next,
        };

        match next {
            Ok(Some(observation)) => {
                recovery.reset_retry_count(&name);
                if sender
                    .send(SourceMessage::Observation(observation))
                    .await
                    .is_err()
                {
                    debug!("Control loop gone, stopping source '{}'", name);
                    return;
                }
            }
            Ok(None) => {
                info!("Source '{}' reached end of stream", name);
                return;
            }
            Err(e) => {
                event_bus.publish(BridgeEvent::SourceFailed {
                    source_name: name.clone(),
                    error: e.to_string(),
                    terminal: !e.is_transient(),
                    timestamp: SystemTime::now(),
                });

                match recovery.handle_error(&name, &e) {
                    RecoveryAction::RetryAfterDelay(delay) => {
                        tokio::select! {
                            _ = cancellation_token.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    RecoveryAction::GiveUp => {
                        let _ = sender.send(SourceMessage::Failed(e.to_string())).await;
                        return;
                    }
                }
            }
        }
    }
}
