use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct Running {
    state: OperatingState,
    child: Child,
}

/// Launches an external program per state, e.g. a fullscreen video player.
///
/// The previous program is stopped before the next one starts. Re-applying
/// the state whose program is still running is a no-op.
pub struct CommandSink {
    name: String,
    idle: Vec<String>,
    scare: Vec<String>,
    stop: Option<Vec<String>>,
    settle: Duration,
    running: Mutex<Option<Running>>,
}

impl CommandSink {
    pub fn new<S: Into<String>>(
        name: S,
        idle: Vec<String>,
        scare: Vec<String>,
        stop: Option<Vec<String>>,
        settle: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            idle,
            scare,
            stop,
            settle,
            running: Mutex::new(None),
        }
    }

    /// Process id of the program launched for the current state
    pub async fn running_pid(&self) -> Option<u32> {
        self.running.lock().await.as_ref().and_then(|r| r.child.id())
    }

    fn argv(&self, state: OperatingState) -> &[String] {
        match state {
            OperatingState::Idle => &self.idle,
            OperatingState::Triggered => &self.scare,
        }
    }

    fn command(&self, argv: &[String]) -> Result<Command, SinkError> {
        let (program, args) = argv.split_first().ok_or_else(|| SinkError::Unavailable {
            sink: self.name.clone(),
            details: "empty command".to_string(),
        })?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        Ok(command)
    }

    async fn stop_previous(&self, previous: Option<Running>) {
        if let Some(mut previous) = previous {
            if let Err(e) = previous.child.start_kill() {
                debug!("Sink '{}' previous process already gone: {}", self.name, e);
            }
            let _ = previous.child.wait().await;
        }

        if let Some(stop) = &self.stop {
            match self.command(stop) {
                Ok(mut command) => match command.status().await {
                    Ok(status) if !status.success() => {
                        debug!("Sink '{}' stop command exited with {}", self.name, status);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Sink '{}' stop command failed: {}", self.name, e),
                },
                Err(e) => warn!("{}", e),
            }
        }
    }
}

#[async_trait]
impl Sink for CommandSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_mut() {
            if current.state == state && matches!(current.child.try_wait(), Ok(None)) {
                debug!("Sink '{}' already running {} program", self.name, state);
                return Ok(());
            }
        }

        self.stop_previous(running.take()).await;

        let argv = self.argv(state);
        let mut child = self
            .command(argv)?
            .spawn()
            .map_err(|e| SinkError::io(&self.name, e))?;

        // A program that fails straight away is a rejection
        match tokio::time::timeout(self.settle, child.wait()).await {
            Ok(Ok(status)) if !status.success() => {
                return Err(SinkError::rejected(
                    &self.name,
                    state,
                    format!("'{}' exited with {}", argv.join(" "), status),
                ));
            }
            Ok(Ok(_)) => {
                debug!("Sink '{}' command for {} completed", self.name, state);
            }
            Ok(Err(e)) => return Err(SinkError::io(&self.name, e)),
            Err(_) => {}
        }

        info!("Sink '{}' launched '{}' for {}", self.name, argv.join(" "), state);
        *running = Some(Running { state, child });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reapply_does_not_relaunch() {
        let sink = CommandSink::new(
            "player",
            argv(&["sleep", "5"]),
            argv(&["sleep", "6"]),
            None,
            Duration::from_millis(50),
        );

        sink.apply(OperatingState::Idle).await.unwrap();
        let first = sink.running_pid().await.unwrap();

        sink.apply(OperatingState::Idle).await.unwrap();
        assert_eq!(sink.running_pid().await, Some(first));

        sink.apply(OperatingState::Triggered).await.unwrap();
        let second = sink.running_pid().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_failing_program_is_rejected() {
        let sink = CommandSink::new(
            "player",
            argv(&["true"]),
            argv(&["false"]),
            None,
            Duration::from_millis(500),
        );

        sink.apply(OperatingState::Idle).await.unwrap();
        let err = sink.apply(OperatingState::Triggered).await.unwrap_err();
        assert!(matches!(err, SinkError::Rejected { state: OperatingState::Triggered, .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let sink = CommandSink::new(
            "player",
            argv(&["/nonexistent/scarebridge-player"]),
            argv(&["true"]),
            None,
            Duration::from_millis(50),
        );

        let err = sink.apply(OperatingState::Idle).await.unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        assert_eq!(err.sink_name(), "player");
    }
}
