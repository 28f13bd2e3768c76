use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiNote {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

impl MidiNote {
    pub fn note_on(&self) -> [u8; 3] {
        [0x90 | (self.channel & 0x0f), self.note & 0x7f, self.velocity & 0x7f]
    }

    pub fn note_off(&self) -> [u8; 3] {
        [0x80 | (self.channel & 0x0f), self.note & 0x7f, 0]
    }
}

/// Plays one note per state on a raw MIDI device such as `/dev/snd/midiC1D0`
pub struct MidiSink {
    name: String,
    device: PathBuf,
    idle: MidiNote,
    scare: MidiNote,
    note_length: Duration,
    // Last state whose note was played; a repeat is not replayed
    played: Mutex<Option<OperatingState>>,
}

impl MidiSink {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(
        name: S,
        device: P,
        idle: MidiNote,
        scare: MidiNote,
        note_length: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            idle,
            scare,
            note_length,
            played: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Sink for MidiSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        let mut played = self.played.lock().await;
        if *played == Some(state) {
            debug!("Sink '{}' already played {}, skipping", self.name, state);
            return Ok(());
        }
        *played = None;

        let note = match state {
            OperatingState::Idle => self.idle,
            OperatingState::Triggered => self.scare,
        };

        // Opened per call so a replugged device is picked up
        let mut device = OpenOptions::new()
            .append(true)
            .open(&self.device)
            .await
            .map_err(|e| SinkError::io(&self.name, e))?;

        device
            .write_all(&note.note_on())
            .await
            .map_err(|e| SinkError::io(&self.name, e))?;
        device.flush().await.map_err(|e| SinkError::io(&self.name, e))?;

        tokio::time::sleep(self.note_length).await;

        device
            .write_all(&note.note_off())
            .await
            .map_err(|e| SinkError::io(&self.name, e))?;
        device.flush().await.map_err(|e| SinkError::io(&self.name, e))?;
        *played = Some(state);

        info!(
            "Sink '{}' played note {} for {} on {}",
            self.name,
            note.note,
            state,
            self.device.display()
        );
        Ok(())
    }
}
