use super::ObservationSource;
use crate::error::SourceError;
use crate::observation::Observation;
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a key press means to the keyboard source
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Emit { label: String, confidence: f64 },
    Quit,
    Ignore,
}

impl KeyAction {
    /// SPACE fakes a confident detection, `n` a miss, `q`/ESC ends the stream
    pub fn for_key(code: KeyCode, trigger_label: &str) -> Self {
        match code {
            KeyCode::Char(' ') => KeyAction::Emit {
                label: trigger_label.to_string(),
                confidence: 1.0,
            },
            KeyCode::Char('n') => KeyAction::Emit {
                label: "none".to_string(),
                confidence: 0.0,
            },
            KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
            _ => KeyAction::Ignore,
        }
    }
}

/// Manual trigger from the terminal for rehearsals without a camera
pub struct KeyboardSource {
    trigger_label: String,
    receiver: Option<mpsc::Receiver<Observation>>,
    cancellation_token: CancellationToken,
}

impl KeyboardSource {
    pub fn new<S: Into<String>>(trigger_label: S) -> Self {
        Self {
            trigger_label: trigger_label.into(),
            receiver: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    fn start(&mut self) -> mpsc::Receiver<Observation> {
        info!("Keyboard source active - SPACE triggers, 'n' clears, 'q' quits");

        let (sender, receiver) = mpsc::channel(16);
        let label = self.trigger_label.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }
                        match KeyAction::for_key(key_event.code, &label) {
                            KeyAction::Emit { label, confidence } => {
                                debug!("Key {:?} -> {} {:.2}", key_event.code, label, confidence);
                                if sender
                                    .blocking_send(Observation::now(label, confidence))
                                    .is_err()
                                {
                                    break;
                                }
                            }
                            KeyAction::Quit => {
                                info!("Quit key pressed - ending keyboard source");
                                break;
                            }
                            KeyAction::Ignore => {}
                        }
                    }
                    Ok(false) => {}
                    Err(e) => warn!("Error polling for keyboard events: {}", e),
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard source task exited");
        });

        receiver
    }
}

#[async_trait]
impl ObservationSource for KeyboardSource {
    fn name(&self) -> &str {
        "keyboard"
    }

    async fn next(&mut self) -> Result<Option<Observation>, SourceError> {
        if self.receiver.is_none() {
            self.receiver = Some(self.start());
        }

        match self.receiver.as_mut() {
            Some(receiver) => Ok(receiver.recv().await),
            None => Ok(None),
        }
    }
}

impl Drop for KeyboardSource {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(
            KeyAction::for_key(KeyCode::Char(' '), "hand"),
            KeyAction::Emit {
                label: "hand".to_string(),
                confidence: 1.0
            }
        );
        assert_eq!(
            KeyAction::for_key(KeyCode::Char('n'), "hand"),
            KeyAction::Emit {
                label: "none".to_string(),
                confidence: 0.0
            }
        );
        assert_eq!(KeyAction::for_key(KeyCode::Esc, "hand"), KeyAction::Quit);
        assert_eq!(KeyAction::for_key(KeyCode::Char('x'), "hand"), KeyAction::Ignore);
    }

    #[test]
    fn test_drop_cancels_reader() {
        let source = KeyboardSource::new("hand");
        let token = source.cancellation_token.clone();
        drop(source);
        assert!(token.is_cancelled());
    }
}
