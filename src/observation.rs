use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;
use uuid::Uuid;

/// One classifier output: label, confidence and the monotonic time it was received
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub label: String,
    pub confidence: f64,
    pub timestamp: Instant,
}

impl Observation {
    pub fn new<S: Into<String>>(label: S, confidence: f64, timestamp: Instant) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp,
        }
    }

    /// Stamp an observation with the current monotonic time
    pub fn now<S: Into<String>>(label: S, confidence: f64) -> Self {
        Self::new(label, confidence, Instant::now())
    }

    /// Parse one line of classifier output.
    ///
    /// Accepts either a JSON object (`{"label": "hand", "confidence": 0.93}`)
    /// or the whitespace form `hand 0.93`.
    pub fn parse(line: &str, timestamp: Instant) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Err("empty observation".to_string());
        }

        let record = if line.starts_with('{') {
            serde_json::from_str::<ObservationRecord>(line)
                .map_err(|e| format!("invalid JSON observation: {}", e))?
        } else {
            let mut parts = line.split_whitespace();
            let label = parts.next().ok_or("missing label")?;
            let confidence = parts
                .next()
                .ok_or_else(|| format!("missing confidence for label '{}'", label))?
                .parse::<f64>()
                .map_err(|e| format!("invalid confidence: {}", e))?;
            if parts.next().is_some() {
                return Err(format!("trailing data in observation '{}'", line));
            }
            ObservationRecord {
                label: label.to_string(),
                confidence,
            }
        };

        if !(0.0..=1.0).contains(&record.confidence) {
            return Err(format!(
                "confidence {} outside [0, 1] for label '{}'",
                record.confidence, record.label
            ));
        }

        Ok(Self::new(record.label, record.confidence, timestamp))
    }
}

/// Wire form of an observation as produced by an external classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub label: String,
    pub confidence: f64,
}

/// Output state mirrored by every sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingState {
    Idle,
    Triggered,
}

impl OperatingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingState::Idle => "idle",
            OperatingState::Triggered => "triggered",
        }
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" | "sleep" => Ok(OperatingState::Idle),
            "triggered" | "scare" => Ok(OperatingState::Triggered),
            other => Err(format!("unknown operating state '{}'", other)),
        }
    }
}

/// What caused a transition to be accepted
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionCause {
    /// Evaluated while processing an observation
    Observation(Observation),
    /// Evaluated on a periodic tick with no new observation
    Timer,
}

impl TransitionCause {
    pub fn description(&self) -> String {
        match self {
            TransitionCause::Observation(obs) => {
                format!("observation '{}' at {:.1}%", obs.label, obs.confidence * 100.0)
            }
            TransitionCause::Timer => "timer".to_string(),
        }
    }
}

/// A single accepted state change, handed to the sink dispatcher exactly once
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub id: Uuid,
    pub from: OperatingState,
    pub to: OperatingState,
    pub at: Instant,
    pub cause: TransitionCause,
}

impl TransitionEvent {
    pub fn new(
        from: OperatingState,
        to: OperatingState,
        at: Instant,
        cause: TransitionCause,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            at,
            cause,
        }
    }
}
