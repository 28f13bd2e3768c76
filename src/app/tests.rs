use super::*;
use crate::config::BridgeConfig;
use crate::error::SourceError;
use crate::events::BridgeEvent;
use crate::observation::{Observation, OperatingState};
use crate::sink::mock::{FailingSink, RecordingSink};
use crate::sink::Sink;
use crate::source::{ObservationSource, ScriptStep, ScriptedSource};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::Instant;

fn test_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.trigger.cooldown_secs = 1.5;
    config.release.on_condition = false;
    config.release.auto_release_secs = 2.0;
    config.source.retry_base_delay_ms = 10;
    config.source.retry_max_delay_ms = 40;
    config
}

/// Source that replays a fixed list of results, then ends
struct ResultSource {
    results: VecDeque<Result<Option<Observation>, SourceError>>,
}

impl ResultSource {
    fn new(results: Vec<Result<Option<Observation>, SourceError>>) -> Self {
        Self {
            results: results.into(),
        }
    }
}

#[async_trait]
impl ObservationSource for ResultSource {
    fn name(&self) -> &str {
        "results"
    }

    async fn next(&mut self) -> Result<Option<Observation>, SourceError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        match self.results.pop_front() {
            Some(Ok(Some(obs))) => Ok(Some(Observation::now(obs.label, obs.confidence))),
            Some(other) => other,
            None => Ok(None),
        }
    }
}

async fn run_bridge(
    config: BridgeConfig,
    source: Box<dyn ObservationSource>,
    sinks: Vec<Arc<dyn Sink>>,
) -> (BridgeOrchestrator, i32) {
    let mut orchestrator = BridgeOrchestrator::from_parts(config, source, sinks).unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();
    let exit_code = orchestrator.wait_and_shutdown().await.unwrap();
    (orchestrator, exit_code)
}

#[tokio::test(start_paused = true)]
async fn test_simulation_triggers_and_cleans_up() {
    let recording = RecordingSink::new("projector");
    let source = ScriptedSource::simulation("hand", Duration::from_millis(100));

    let (orchestrator, exit_code) = run_bridge(
        test_config(),
        Box::new(source),
        vec![Arc::new(recording.clone())],
    )
    .await;

    assert_eq!(exit_code, 0);
    // Forced idle, the 0.92 detection, then the shutdown cleanup
    assert_eq!(
        recording.applied(),
        vec![
            OperatingState::Idle,
            OperatingState::Triggered,
            OperatingState::Idle
        ]
    );
    assert_eq!(
        orchestrator.get_component_state("controller").await,
        Some(ComponentState::Stopped)
    );
    assert_eq!(
        orchestrator.get_component_state("sinks").await,
        Some(ComponentState::Stopped)
    );
}

#[tokio::test(start_paused = true)]
async fn test_auto_release_fires_between_observations() {
    let recording = RecordingSink::new("projector");
    let source = ScriptedSource::new(
        "script",
        vec![
            ScriptStep::new(Duration::from_millis(100), "hand", 0.95),
            ScriptStep::new(Duration::from_secs(3), "none", 0.0),
        ],
    );

    let (orchestrator, exit_code) = run_bridge(
        test_config(),
        Box::new(source),
        vec![Arc::new(recording.clone())],
    )
    .await;

    assert_eq!(exit_code, 0);
    assert_eq!(
        recording.applied(),
        vec![
            OperatingState::Idle,
            OperatingState::Triggered,
            OperatingState::Idle,
            OperatingState::Idle
        ]
    );

    let snapshot = orchestrator.status().snapshot();
    assert_eq!(snapshot.current_state, OperatingState::Idle);
    let last = snapshot.last_transition.unwrap();
    assert_eq!(last.cause, "timer");
}

#[tokio::test(start_paused = true)]
async fn test_failing_sink_does_not_stop_the_bridge() {
    let recording = RecordingSink::new("projector");
    let failing = FailingSink::new("broken");
    let source = ScriptedSource::new(
        "script",
        vec![ScriptStep::new(Duration::from_millis(100), "hand", 0.99)],
    );

    let (orchestrator, exit_code) = run_bridge(
        test_config(),
        Box::new(source),
        vec![Arc::new(failing.clone()), Arc::new(recording.clone())],
    )
    .await;

    assert_eq!(exit_code, 0);
    assert_eq!(orchestrator.status().current_state(), OperatingState::Triggered);
    assert_eq!(recording.applied().len(), 3);
    assert_eq!(failing.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_errors_are_retried() {
    let recording = RecordingSink::new("projector");
    let source = ResultSource::new(vec![
        Err(SourceError::transient("results", "garbled")),
        Err(SourceError::transient("results", "garbled")),
        Ok(Some(Observation::now("hand", 0.97))),
    ]);

    let (_, exit_code) = run_bridge(
        test_config(),
        Box::new(source),
        vec![Arc::new(recording.clone())],
    )
    .await;

    assert_eq!(exit_code, 0);
    assert!(recording.applied().contains(&OperatingState::Triggered));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_source_failure_exits_nonzero() {
    let recording = RecordingSink::new("projector");
    let source = ResultSource::new(vec![Err(SourceError::terminal("results", "device gone"))]);

    let (orchestrator, exit_code) = run_bridge(
        test_config(),
        Box::new(source),
        vec![Arc::new(recording.clone())],
    )
    .await;

    assert_eq!(exit_code, 1);
    assert_eq!(
        recording.applied(),
        vec![OperatingState::Idle, OperatingState::Idle]
    );
    assert_eq!(
        orchestrator.get_component_state("source").await,
        Some(ComponentState::Failed)
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhaustion_is_terminal() {
    let mut config = test_config();
    config.source.max_retries = 2;
    let source = ResultSource::new(
        (0..5)
            .map(|_| Err(SourceError::transient("results", "garbled")))
            .collect(),
    );

    let (_, exit_code) = run_bridge(config, Box::new(source), Vec::new()).await;
    assert_eq!(exit_code, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_requested_on_event_bus() {
    let recording = RecordingSink::new("projector");
    let source = ScriptedSource::new(
        "script",
        vec![
            ScriptStep::new(Duration::from_millis(100), "hand", 0.99),
            ScriptStep::new(Duration::from_secs(3600), "none", 0.0),
        ],
    );

    let mut orchestrator = BridgeOrchestrator::from_parts(
        test_config(),
        Box::new(source),
        vec![Arc::new(recording.clone())],
    )
    .unwrap();
    orchestrator.initialize().await.unwrap();
    orchestrator.start().await.unwrap();

    let bus = orchestrator.event_bus().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        bus.publish(BridgeEvent::ShutdownRequested {
            reason: "operator".to_string(),
            timestamp: SystemTime::now(),
        });
    });

    let started = Instant::now();
    let exit_code = orchestrator.wait_and_shutdown().await.unwrap();

    assert_eq!(exit_code, 0);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(recording.last(), Some(OperatingState::Idle));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_bounds_slow_sink_cleanup() {
    let mut config = test_config();
    config.controller.sink_timeout_ms = 10_000;
    config.controller.shutdown_timeout_ms = 500;
    config.controller.force_idle_on_start = false;

    let slow = RecordingSink::slow("slow", Duration::from_secs(5));
    let source = ScriptedSource::new("script", Vec::new());

    let (orchestrator, exit_code) =
        run_bridge(config, Box::new(source), vec![Arc::new(slow.clone())]).await;

    assert_eq!(exit_code, 1);
    assert!(slow.applied().is_empty());
    assert_eq!(
        orchestrator.get_component_state("sinks").await,
        Some(ComponentState::Failed)
    );
}

#[tokio::test]
async fn test_component_state_management() {
    let source = ScriptedSource::new("script", Vec::new());
    let orchestrator =
        BridgeOrchestrator::from_parts(test_config(), Box::new(source), Vec::new()).unwrap();

    assert!(orchestrator.get_all_component_states().await.is_empty());

    orchestrator
        .set_component_state("source", ComponentState::Starting)
        .await;
    orchestrator
        .set_component_state("sinks", ComponentState::Failed)
        .await;

    assert_eq!(
        orchestrator.get_component_state("source").await,
        Some(ComponentState::Starting)
    );
    assert_eq!(orchestrator.get_all_component_states().await.len(), 2);
}

#[test]
fn test_invalid_controller_config_is_rejected() {
    let mut config = test_config();
    config.release.auto_release_secs = 0.0;

    let source = ScriptedSource::new("script", Vec::new());
    let result = BridgeOrchestrator::from_parts(config, Box::new(source), Vec::new());
    assert!(matches!(
        result,
        Err(crate::error::ScareError::Configuration(
            crate::error::ConfigurationError::NoReleasePolicy
        ))
    ));
}

#[test]
fn test_shutdown_reason_exit_codes() {
    assert_eq!(ShutdownReason::EndOfStream.exit_code(), 0);
    assert_eq!(ShutdownReason::Signal("SIGINT".to_string()).exit_code(), 0);
    assert_eq!(
        ShutdownReason::SourceFailed("gone".to_string()).exit_code(),
        1
    );
}
