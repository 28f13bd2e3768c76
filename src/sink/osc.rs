use super::Sink;
use crate::error::SinkError;
use crate::observation::OperatingState;
use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// One OSC 1.0 argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
        }
    }
}

/// A single OSC message; no bundles
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: OscArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Encode to the OSC binary form: padded address, type tags, big-endian args
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + self.address.len());
        write_padded(&mut buf, self.address.as_bytes());

        let tags: String = std::iter::once(',')
            .chain(self.args.iter().map(OscArg::type_tag))
            .collect();
        write_padded(&mut buf, tags.as_bytes());

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => buf.extend_from_slice(&v.to_bits().to_be_bytes()),
                OscArg::Str(s) => write_padded(&mut buf, s.as_bytes()),
            }
        }

        buf
    }
}

/// OSC strings are NUL terminated and padded to a 4-byte boundary
fn write_padded(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(bytes);
    let padding = 4 - (bytes.len() % 4);
    buf.extend(std::iter::repeat(0u8).take(padding));
}

/// UDP transport shared by the OSC based sinks
pub struct OscTransport {
    sink: String,
    target: String,
    socket: Mutex<Option<UdpSocket>>,
}

impl OscTransport {
    pub fn new<S: Into<String>, T: Into<String>>(sink: S, target: T) -> Self {
        Self {
            sink: sink.into(),
            target: target.into(),
            socket: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Send messages in order. The socket is bound on first use.
    pub async fn send(&self, messages: &[OscMessage]) -> Result<(), SinkError> {
        let mut guard = self.socket.lock().await;
        if guard.is_none() {
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| SinkError::io(&self.sink, e))?;
            debug!("Sink '{}' bound OSC socket for {}", self.sink, self.target);
            *guard = Some(socket);
        }

        let result = match guard.as_ref() {
            Some(socket) => self.send_all(socket, messages).await,
            None => Err(SinkError::Unavailable {
                sink: self.sink.clone(),
                details: "OSC socket not bound".to_string(),
            }),
        };

        if result.is_err() {
            // Rebind on the next call in case the local socket went bad
            *guard = None;
        }
        result
    }

    async fn send_all(&self, socket: &UdpSocket, messages: &[OscMessage]) -> Result<(), SinkError> {
        for message in messages {
            let packet = message.encode();
            socket
                .send_to(&packet, self.target.as_str())
                .await
                .map_err(|e| SinkError::io(&self.sink, e))?;
            debug!(
                "Sink '{}' sent OSC {} {:?}",
                self.sink, message.address, message.args
            );
        }
        Ok(())
    }
}

/// How an `OscSink` expresses the two states
#[derive(Debug, Clone, PartialEq)]
pub enum OscMode {
    /// Float 0.0 (idle) or 1.0 (triggered) to every address
    MixFader { addresses: Vec<String> },
    /// Select a clip on a source, then start it
    Clips { source: String, idle: i32, scare: i32 },
    /// Recall a numbered preset
    Presets { address: String, idle: i32, scare: i32 },
}

impl OscMode {
    /// Whether sending the same messages twice restarts playback
    pub fn is_cue(&self) -> bool {
        matches!(self, OscMode::Clips { .. })
    }

    pub fn messages(&self, state: OperatingState) -> Vec<OscMessage> {
        let triggered = state == OperatingState::Triggered;
        match self {
            OscMode::MixFader { addresses } => {
                let value = if triggered { 1.0 } else { 0.0 };
                addresses
                    .iter()
                    .map(|address| OscMessage::new(address.as_str()).with_arg(OscArg::Float(value)))
                    .collect()
            }
            OscMode::Clips {
                source,
                idle,
                scare,
            } => {
                let clip = if triggered { *scare } else { *idle };
                vec![
                    OscMessage::new(format!("{}/clipnr", source)).with_arg(OscArg::Int(clip)),
                    OscMessage::new(format!("{}/start", source)),
                ]
            }
            OscMode::Presets {
                address,
                idle,
                scare,
            } => {
                let preset = if triggered { *scare } else { *idle };
                vec![OscMessage::new(address.as_str()).with_arg(OscArg::Int(preset))]
            }
        }
    }
}

/// Sends OSC messages over UDP to a show-control application
pub struct OscSink {
    name: String,
    mode: OscMode,
    transport: OscTransport,
    // Last state delivered; cue modes skip a repeat of it
    current: Mutex<Option<OperatingState>>,
}

impl OscSink {
    pub fn new<S: Into<String>, T: Into<String>>(name: S, target: T, mode: OscMode) -> Self {
        let name = name.into();
        Self {
            transport: OscTransport::new(name.clone(), target),
            name,
            mode,
            current: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> &OscMode {
        &self.mode
    }
}

#[async_trait]
impl Sink for OscSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, state: OperatingState) -> Result<(), SinkError> {
        let mut current = self.current.lock().await;
        if self.mode.is_cue() && *current == Some(state) {
            debug!("Sink '{}' already cued {}, not restarting", self.name, state);
            return Ok(());
        }

        *current = None;
        self.transport.send(&self.mode.messages(state)).await?;
        *current = Some(state);
        info!(
            "Sink '{}' applied {} via OSC to {}",
            self.name,
            state,
            self.transport.target()
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    /// Decode a single OSC message; enough for the encoder's own output
    pub(crate) fn decode(packet: &[u8]) -> OscMessage {
        fn read_str(packet: &[u8], pos: &mut usize) -> String {
            let end = packet[*pos..].iter().position(|b| *b == 0).unwrap() + *pos;
            let s = String::from_utf8(packet[*pos..end].to_vec()).unwrap();
            *pos = (end / 4 + 1) * 4;
            s
        }
        fn read_word(packet: &[u8], pos: &mut usize) -> [u8; 4] {
            let word = [packet[*pos], packet[*pos + 1], packet[*pos + 2], packet[*pos + 3]];
            *pos += 4;
            word
        }

        let mut pos = 0;
        let address = read_str(packet, &mut pos);
        let tags = read_str(packet, &mut pos);
        assert!(tags.starts_with(','));

        let mut message = OscMessage::new(address);
        for tag in tags.chars().skip(1) {
            let arg = match tag {
                'i' => OscArg::Int(i32::from_be_bytes(read_word(packet, &mut pos))),
                'f' => OscArg::Float(f32::from_bits(u32::from_be_bytes(read_word(
                    packet, &mut pos,
                )))),
                's' => OscArg::Str(read_str(packet, &mut pos)),
                other => panic!("unexpected type tag {}", other),
            };
            message.args.push(arg);
        }
        assert_eq!(pos, packet.len());
        message
    }

    pub(crate) async fn receive(socket: &UdpSocket) -> OscMessage {
        let mut buf = [0u8; 1024];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        decode(&buf[..len])
    }

    #[test]
    fn test_encode_layout() {
        let packet = OscMessage::new("/preset")
            .with_arg(OscArg::Int(2))
            .encode();

        // "/preset\0" + ",i\0\0" + int32
        assert_eq!(packet.len(), 16);
        assert_eq!(&packet[..8], b"/preset\0");
        assert_eq!(&packet[8..12], b",i\0\0");
        assert_eq!(&packet[12..], &[0, 0, 0, 2]);
    }

    #[test]
    fn test_encode_no_args_and_aligned_address() {
        // A 4-byte aligned address still gets a full word of padding
        let packet = OscMessage::new("/abc").encode();
        assert_eq!(packet, b"/abc\0\0\0\0,\0\0\0".to_vec());
    }

    #[test]
    fn test_encode_float_and_string() {
        let message = OscMessage::new("/1layer/fade")
            .with_arg(OscArg::Float(0.5))
            .with_arg(OscArg::Str("on".to_string()));
        assert_eq!(decode(&message.encode()), message);
    }

    #[test]
    fn test_mode_messages() {
        let clips = OscMode::Clips {
            source: "/sources/1video".to_string(),
            idle: 1,
            scare: 2,
        };
        let messages = clips.messages(OperatingState::Triggered);
        assert_eq!(messages[0].address, "/sources/1video/clipnr");
        assert_eq!(messages[0].args, vec![OscArg::Int(2)]);
        assert_eq!(messages[1].address, "/sources/1video/start");
        assert!(messages[1].args.is_empty());

        let mix = OscMode::MixFader {
            addresses: vec!["/a".to_string(), "/b".to_string()],
        };
        let messages = mix.messages(OperatingState::Idle);
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.args == vec![OscArg::Float(0.0)]));
    }

    #[tokio::test]
    async fn test_osc_sink_sends_preset() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let sink = OscSink::new(
            "presets",
            target,
            OscMode::Presets {
                address: "/preset".to_string(),
                idle: 1,
                scare: 2,
            },
        );

        sink.apply(OperatingState::Triggered).await.unwrap();
        let message = receive(&receiver).await;
        assert_eq!(message.address, "/preset");
        assert_eq!(message.args, vec![OscArg::Int(2)]);

        // Presets are levels, so a repeat is sent again
        sink.apply(OperatingState::Triggered).await.unwrap();
        assert_eq!(receive(&receiver).await, message);
    }

    #[tokio::test]
    async fn test_clip_reapply_does_not_restart() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap().to_string();

        let sink = OscSink::new(
            "clips",
            target,
            OscMode::Clips {
                source: "/sources/1video".to_string(),
                idle: 1,
                scare: 2,
            },
        );

        sink.apply(OperatingState::Idle).await.unwrap();
        assert_eq!(receive(&receiver).await.args, vec![OscArg::Int(1)]);
        assert_eq!(receive(&receiver).await.address, "/sources/1video/start");

        sink.apply(OperatingState::Idle).await.unwrap();
        let mut buf = [0u8; 64];
        let repeat =
            tokio::time::timeout(Duration::from_millis(100), receiver.recv_from(&mut buf)).await;
        assert!(repeat.is_err(), "idle clip was restarted");

        sink.apply(OperatingState::Triggered).await.unwrap();
        assert_eq!(receive(&receiver).await.args, vec![OscArg::Int(2)]);
        assert_eq!(receive(&receiver).await.address, "/sources/1video/start");
    }
}
