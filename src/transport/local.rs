//! In-process datagram network.
//!
//! [`LocalNetwork`] connects any number of [`LocalTransport`] endpoints by
//! socket address. Datagrams to the limited broadcast address
//! `255.255.255.255` reach every other endpoint bound to the destination
//! port. Datagrams to an address nobody is bound to are dropped, as UDP
//! would drop them.

use crate::error::{constants, BacnetError, Result};
use crate::transport::Transport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, instrument, trace};

type Datagram = (Vec<u8>, SocketAddr);

#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    endpoints: Arc<Mutex<HashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>>>,
}

fn poisoned() -> BacnetError {
    BacnetError::TransportError(constants::ERR_LOCK_POISONED.to_string())
}

fn is_broadcast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_broadcast(),
        IpAddr::V6(_) => false,
    }
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an endpoint at `addr`.
    #[instrument(skip(self))]
    pub fn bind(&self, addr: SocketAddr) -> Result<LocalTransport> {
        if is_broadcast(addr.ip()) {
            return Err(BacnetError::InvalidAddress(format!(
                "cannot bind broadcast address {addr}"
            )));
        }
        let mut endpoints = self.endpoints.lock().map_err(|_| poisoned())?;
        if endpoints.contains_key(&addr) {
            return Err(BacnetError::TransportError(format!(
                "address {addr} already in use"
            )));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        endpoints.insert(addr, tx);
        debug!(%addr, "Local endpoint bound");
        Ok(LocalTransport {
            addr,
            network: self.clone(),
            inbox: AsyncMutex::new(rx),
        })
    }

    /// Number of bound endpoints.
    pub fn endpoint_count(&self) -> usize {
        self.endpoints.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Deliver a datagram. Returns how many endpoints received it.
    fn deliver(&self, source: SocketAddr, payload: &[u8], destination: SocketAddr) -> Result<usize> {
        let endpoints = self.endpoints.lock().map_err(|_| poisoned())?;

        if is_broadcast(destination.ip()) {
            let mut delivered = 0;
            for (addr, inbox) in endpoints.iter() {
                if *addr != source
                    && addr.port() == destination.port()
                    && inbox.send((payload.to_vec(), source)).is_ok()
                {
                    delivered += 1;
                }
            }
            return Ok(delivered);
        }

        match endpoints.get(&destination) {
            Some(inbox) if inbox.send((payload.to_vec(), source)).is_ok() => Ok(1),
            _ => {
                trace!(%destination, "No local endpoint, datagram dropped");
                Ok(0)
            }
        }
    }

    fn unbind(&self, addr: SocketAddr) {
        if let Ok(mut endpoints) = self.endpoints.lock() {
            endpoints.remove(&addr);
        }
    }
}

/// One endpoint on a [`LocalNetwork`]. Unbinds when dropped.
#[derive(Debug)]
pub struct LocalTransport {
    addr: SocketAddr,
    network: LocalNetwork,
    inbox: AsyncMutex<mpsc::UnboundedReceiver<Datagram>>,
}

#[async_trait]
impl Transport for LocalTransport {
    async fn send(&self, payload: &[u8], destination: SocketAddr) -> Result<()> {
        let delivered = self.network.deliver(self.addr, payload, destination)?;
        trace!(from = %self.addr, %destination, delivered, "Local datagram sent");
        Ok(())
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| BacnetError::TransportError(format!("endpoint {} closed", self.addr)))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.addr)
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.network.unbind(self.addr);
    }
}
