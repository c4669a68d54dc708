use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{Transport, MAX_DATAGRAM_SIZE};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{info, instrument, trace};

/// BACnet/IP transport over UDP.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind `addr` with broadcast enabled.
    #[instrument]
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        socket.set_broadcast(true)?;
        info!(local = %socket.local_addr()?, "BACnet/IP socket bound");
        Ok(Self { socket })
    }

    /// Bind the interface and port from `config`.
    pub async fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::bind(config.bind_address()?).await
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<()> {
        let sent = self.socket.send_to(payload, destination).await?;
        trace!(bytes = sent, %destination, "Datagram sent");
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, source) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        trace!(bytes = len, %source, "Datagram received");
        Ok((buf, source))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
