use super::ObservationSource;
use crate::error::SourceError;
use crate::observation::Observation;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    /// Wait before producing this observation
    pub delay: Duration,
    pub label: String,
    pub confidence: f64,
}

impl ScriptStep {
    pub fn new<S: Into<String>>(delay: Duration, label: S, confidence: f64) -> Self {
        Self {
            delay,
            label: label.into(),
            confidence,
        }
    }
}

/// Replays a fixed list of observations, then ends
pub struct ScriptedSource {
    name: String,
    steps: VecDeque<ScriptStep>,
}

impl ScriptedSource {
    pub fn new<S: Into<String>>(name: S, steps: Vec<ScriptStep>) -> Self {
        Self {
            name: name.into(),
            steps: steps.into(),
        }
    }

    /// A hand approaching, triggering, then leaving the camera
    pub fn simulation(label: &str, interval: Duration) -> Self {
        const CONFIDENCES: [f64; 9] = [0.15, 0.45, 0.73, 0.92, 0.94, 0.88, 0.23, 0.05, 0.0];

        info!(
            "Simulating {} observations of '{}' every {:?}",
            CONFIDENCES.len(),
            label,
            interval
        );
        let steps = CONFIDENCES
            .iter()
            .map(|confidence| ScriptStep::new(interval, label, *confidence))
            .collect();
        Self::new("simulate", steps)
    }

    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

#[async_trait]
impl ObservationSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Result<Option<Observation>, SourceError> {
        let Some(step) = self.steps.pop_front() else {
            debug!("Source '{}' script finished", self.name);
            return Ok(None);
        };

        tokio::time::sleep(step.delay).await;
        Ok(Some(Observation::new(
            step.label,
            step.confidence,
            Instant::now(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_replays_with_delays() {
        let start = Instant::now();
        let mut source = ScriptedSource::new(
            "script",
            vec![
                ScriptStep::new(Duration::from_millis(100), "hand", 0.5),
                ScriptStep::new(Duration::from_millis(250), "hand", 0.95),
            ],
        );

        let first = source.next().await.unwrap().unwrap();
        assert_eq!(first.timestamp - start, Duration::from_millis(100));

        let second = source.next().await.unwrap().unwrap();
        assert_eq!(second.timestamp - start, Duration::from_millis(350));
        assert_eq!(second.confidence, 0.95);

        assert!(source.next().await.unwrap().is_none());
    }

    #[test]
    fn test_simulation_scenario() {
        let source = ScriptedSource::simulation("hand", Duration::from_millis(10));
        assert_eq!(source.remaining(), 9);
        assert_eq!(source.steps[3].confidence, 0.92);
        assert!(source.steps.iter().all(|s| s.label == "hand"));
    }
}
