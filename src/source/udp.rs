use super::ObservationSource;
use crate::error::SourceError;
use crate::observation::Observation;
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{info, trace};

/// Receives one observation per UDP datagram. Never ends on its own.
pub struct UdpSource {
    name: String,
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    pub async fn bind(addr: &str) -> Result<Self, SourceError> {
        let name = format!("udp:{}", addr);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| SourceError::terminal(&name, e.to_string()))?;
        info!("Listening for observations on udp://{}", addr);
        Ok(Self {
            name,
            socket,
            buf: vec![0u8; 2048],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SourceError> {
        self.socket
            .local_addr()
            .map_err(|e| SourceError::from_io(&self.name, &e))
    }
}

#[async_trait]
impl ObservationSource for UdpSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Result<Option<Observation>, SourceError> {
        let (len, peer) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .map_err(|e| SourceError::from_io(&self.name, &e))?;
        let received = Instant::now();
        trace!("Source '{}' received {} bytes from {}", self.name, len, peer);

        let text = std::str::from_utf8(&self.buf[..len]).map_err(|e| {
            SourceError::transient(&self.name, format!("datagram from {} is not UTF-8: {}", peer, e))
        })?;

        Observation::parse(text, received)
            .map(Some)
            .map_err(|details| SourceError::transient(&self.name, details))
    }
}
