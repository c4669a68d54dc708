//! # Transport Layer
//!
//! Datagram transports the client engine runs on.
//!
//! The engine only needs to send a datagram to an address and to receive the
//! next datagram with its source address. Delivery is unreliable and
//! unordered; broadcast is addressed like any other destination.
//!
//! ## Implementations
//! - **UDP**: BACnet/IP over a tokio UDP socket with broadcast enabled
//! - **Local**: in-process datagram network for tests and simulation

use crate::error::Result;
use async_trait::async_trait;
use std::net::SocketAddr;

pub mod local;
pub mod udp;

pub use local::{LocalNetwork, LocalTransport};
pub use udp::UdpTransport;

/// Largest datagram a transport reads: a 1476-byte APDU with headers fits.
pub const MAX_DATAGRAM_SIZE: usize = 1500;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<()>;

    /// Wait for the next datagram.
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)>;

    fn local_addr(&self) -> Result<SocketAddr>;
}
