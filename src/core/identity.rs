//! Object identifiers and network addresses.
//!
//! An object identifier travels as one 32-bit word: the upper 10 bits hold the
//! object type and the lower 22 bits the instance number.

use crate::error::{constants, BacnetError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Largest object type representable in 10 bits.
pub const MAX_OBJECT_TYPE: u16 = 0x3FF;

/// Largest instance number representable in 22 bits.
pub const MAX_INSTANCE: u32 = 0x3F_FFFF;

/// Standard BACnet/IP UDP port (0xBAC0).
pub const DEFAULT_PORT: u16 = 47808;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawObjectIdentifier")]
pub struct ObjectIdentifier {
    #[serde(rename = "type")]
    object_type: u16,
    instance: u32,
}

/// Unchecked serde form of [`ObjectIdentifier`].
#[derive(Deserialize)]
struct RawObjectIdentifier {
    #[serde(rename = "type")]
    object_type: u16,
    instance: u32,
}

impl TryFrom<RawObjectIdentifier> for ObjectIdentifier {
    type Error = BacnetError;

    fn try_from(raw: RawObjectIdentifier) -> Result<Self> {
        ObjectIdentifier::new(raw.object_type, raw.instance)
    }
}

impl ObjectIdentifier {
    /// Build an identifier, rejecting fields wider than their wire width.
    pub fn new(object_type: u16, instance: u32) -> Result<Self> {
        if object_type > MAX_OBJECT_TYPE {
            return Err(BacnetError::ValueOutOfRange(
                constants::ERR_OBJECT_TYPE_RANGE.to_string(),
            ));
        }
        if instance > MAX_INSTANCE {
            return Err(BacnetError::ValueOutOfRange(
                constants::ERR_INSTANCE_RANGE.to_string(),
            ));
        }
        Ok(Self {
            object_type,
            instance,
        })
    }

    pub fn object_type(&self) -> u16 {
        self.object_type
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Pack into the 32-bit wire word.
    #[inline]
    pub fn to_u32(self) -> u32 {
        (u32::from(self.object_type) << 22) | self.instance
    }

    /// Unpack a 32-bit wire word. Every word maps to a valid identifier.
    #[inline]
    pub fn from_u32(word: u32) -> Self {
        Self {
            object_type: ((word >> 22) & u32::from(MAX_OBJECT_TYPE)) as u16,
            instance: word & MAX_INSTANCE,
        }
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.instance)
    }
}

/// BACnet network address: network number plus MAC bytes.
///
/// A network number of `0xFFFF` is the global broadcast and carries no MAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BacnetAddress {
    pub net: u16,
    pub adr: Vec<u8>,
}

impl BacnetAddress {
    pub const GLOBAL_BROADCAST: u16 = 0xFFFF;

    pub fn new(net: u16, adr: Vec<u8>) -> Self {
        Self { net, adr }
    }

    pub fn is_global_broadcast(&self) -> bool {
        self.net == Self::GLOBAL_BROADCAST
    }
}

/// Resolve a peer given as `"ip"`, `"ip:port"` or `"host:port"`.
///
/// A bare IP address gets `default_port`. Host names go through
/// [`tokio::net::lookup_host`].
pub async fn resolve_peer(peer: &str, default_port: u16) -> Result<SocketAddr> {
    let peer = peer.trim();
    if peer.is_empty() {
        return Err(BacnetError::InvalidAddress("empty address".to_string()));
    }
    if let Ok(ip) = peer.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    if let Ok(addr) = peer.parse::<SocketAddr>() {
        return Ok(addr);
    }
    tokio::net::lookup_host(peer)
        .await
        .map_err(|e| BacnetError::InvalidAddress(format!("{peer}: {e}")))?
        .next()
        .ok_or_else(|| BacnetError::InvalidAddress(peer.to_string()))
}
