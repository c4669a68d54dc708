//! BACnet/IP framing: BVLC header and NPDU.
//!
//! ```text
//! [0x81] [function] [length u16] ([origin ip:port] if forwarded) [NPDU] [APDU]
//! ```
//!
//! The client only ever sends local NPDUs (no destination network). Inbound
//! NPDUs may carry routing information, which is decoded and skipped.

use crate::core::identity::BacnetAddress;
use crate::error::{constants, BacnetError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

pub const BVLL_TYPE_BACNET_IP: u8 = 0x81;
pub const BVLC_HEADER_LEN: usize = 4;
pub const NPDU_VERSION: u8 = 0x01;

pub mod bvlc_function {
    pub const RESULT: u8 = 0x00;
    pub const FORWARDED_NPDU: u8 = 0x04;
    pub const DISTRIBUTE_BROADCAST_TO_NETWORK: u8 = 0x09;
    pub const ORIGINAL_UNICAST_NPDU: u8 = 0x0A;
    pub const ORIGINAL_BROADCAST_NPDU: u8 = 0x0B;
}

pub mod npdu_control {
    pub const NETWORK_LAYER_MESSAGE: u8 = 0x80;
    pub const DESTINATION_SPECIFIED: u8 = 0x20;
    pub const SOURCE_SPECIFIED: u8 = 0x08;
    pub const EXPECTING_REPLY: u8 = 0x04;
    pub const PRIORITY_MASK: u8 = 0x03;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bvlc {
    pub function: u8,
    /// Original sender of a forwarded NPDU.
    pub origin: Option<SocketAddr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Npdu {
    pub control: u8,
    pub destination: Option<BacnetAddress>,
    pub source: Option<BacnetAddress>,
    pub hop_count: Option<u8>,
    /// Message type of a network-layer message.
    pub network_message: Option<u8>,
}

impl Npdu {
    pub fn expecting_reply(&self) -> bool {
        self.control & npdu_control::EXPECTING_REPLY != 0
    }

    pub fn is_network_message(&self) -> bool {
        self.control & npdu_control::NETWORK_LAYER_MESSAGE != 0
    }
}

/// A BACnet/IP datagram reduced to the peer it came from and its APDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram<'a> {
    pub peer: SocketAddr,
    pub npdu: Npdu,
    pub apdu: &'a [u8],
}

fn invalid_bvlc() -> BacnetError {
    BacnetError::InvalidHeader(constants::ERR_INVALID_BVLC.to_string())
}

fn invalid_npdu() -> BacnetError {
    BacnetError::InvalidHeader(constants::ERR_INVALID_NPDU.to_string())
}

/// Decode the BVLC header. Returns the header and its length. Bytes beyond
/// the declared length are ignored.
pub fn decode_bvlc(buf: &[u8]) -> Result<(Bvlc, usize)> {
    if buf.len() < BVLC_HEADER_LEN || buf[0] != BVLL_TYPE_BACNET_IP {
        return Err(invalid_bvlc());
    }
    let function = buf[1];
    let declared = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
    if declared < BVLC_HEADER_LEN {
        return Err(invalid_bvlc());
    }
    if declared > buf.len() {
        return Err(BacnetError::InvalidHeader(
            constants::ERR_TRUNCATED_FRAME.to_string(),
        ));
    }

    if function == bvlc_function::FORWARDED_NPDU {
        let origin = buf
            .get(BVLC_HEADER_LEN..BVLC_HEADER_LEN + 6)
            .filter(|_| declared >= BVLC_HEADER_LEN + 6)
            .ok_or_else(invalid_bvlc)?;
        let ip = Ipv4Addr::new(origin[0], origin[1], origin[2], origin[3]);
        let port = u16::from_be_bytes([origin[4], origin[5]]);
        return Ok((
            Bvlc {
                function,
                origin: Some(SocketAddr::V4(SocketAddrV4::new(ip, port))),
            },
            BVLC_HEADER_LEN + 6,
        ));
    }

    Ok((
        Bvlc {
            function,
            origin: None,
        },
        BVLC_HEADER_LEN,
    ))
}

fn take_bytes<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    let bytes = buf.get(*pos..*pos + n).ok_or_else(invalid_npdu)?;
    *pos += n;
    Ok(bytes)
}

/// Local NPDU header: version and control byte.
pub fn encode_npdu(buf: &mut BytesMut, expecting_reply: bool) -> usize {
    let control = if expecting_reply {
        npdu_control::EXPECTING_REPLY
    } else {
        0
    };
    buf.put_slice(&[NPDU_VERSION, control]);
    2
}

/// Decode the NPDU at `offset`. Returns it and its length.
pub fn decode_npdu(buf: &[u8], offset: usize) -> Result<(Npdu, usize)> {
    let mut pos = offset;
    let mut take = |n: usize| take_bytes(buf, &mut pos, n);

    let header = take(2)?;
    if header[0] != NPDU_VERSION {
        return Err(invalid_npdu());
    }
    let control = header[1];
    let mut npdu = Npdu {
        control,
        ..Npdu::default()
    };

    if control & npdu_control::DESTINATION_SPECIFIED != 0 {
        let net = take(2)?;
        let net = u16::from_be_bytes([net[0], net[1]]);
        let len = usize::from(take(1)?[0]);
        npdu.destination = Some(BacnetAddress::new(net, take(len)?.to_vec()));
    }
    if control & npdu_control::SOURCE_SPECIFIED != 0 {
        let net = take(2)?;
        let net = u16::from_be_bytes([net[0], net[1]]);
        let len = usize::from(take(1)?[0]);
        // a zero-length source address is not allowed
        if len == 0 {
            return Err(invalid_npdu());
        }
        npdu.source = Some(BacnetAddress::new(net, take(len)?.to_vec()));
    }
    if npdu.destination.is_some() {
        npdu.hop_count = Some(take(1)?[0]);
    }
    if control & npdu_control::NETWORK_LAYER_MESSAGE != 0 {
        let message = take(1)?[0];
        if message >= 0x80 {
            take(2)?;
        }
        npdu.network_message = Some(message);
    }

    Ok((npdu, pos - offset))
}

/// Wrap an APDU in a local NPDU and a BVLC header.
pub fn frame_apdu(broadcast: bool, expecting_reply: bool, apdu: &[u8]) -> Result<Bytes> {
    let total = BVLC_HEADER_LEN + 2 + apdu.len();
    let length = u16::try_from(total)
        .map_err(|_| BacnetError::ValueOutOfRange(format!("frame of {total} bytes too large")))?;
    let function = if broadcast {
        bvlc_function::ORIGINAL_BROADCAST_NPDU
    } else {
        bvlc_function::ORIGINAL_UNICAST_NPDU
    };

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u8(BVLL_TYPE_BACNET_IP);
    buf.put_u8(function);
    buf.put_u16(length);
    encode_npdu(&mut buf, expecting_reply);
    buf.put_slice(apdu);
    Ok(buf.freeze())
}

/// Strip BVLC and NPDU from an inbound datagram.
///
/// Returns `Ok(None)` for frames that carry no APDU for the client: BVLC
/// management functions and network-layer messages.
pub fn parse_datagram(buf: &[u8], source: SocketAddr) -> Result<Option<Datagram<'_>>> {
    let (bvlc, header_len) = decode_bvlc(buf)?;
    match bvlc.function {
        bvlc_function::ORIGINAL_UNICAST_NPDU
        | bvlc_function::ORIGINAL_BROADCAST_NPDU
        | bvlc_function::FORWARDED_NPDU
        | bvlc_function::DISTRIBUTE_BROADCAST_TO_NETWORK => {}
        _ => return Ok(None),
    }

    let declared = usize::from(u16::from_be_bytes([buf[2], buf[3]]));
    let frame = &buf[..declared];
    let (npdu, npdu_len) = decode_npdu(frame, header_len)?;
    if npdu.is_network_message() {
        return Ok(None);
    }

    Ok(Some(Datagram {
        peer: bvlc.origin.unwrap_or(source),
        npdu,
        apdu: &frame[header_len + npdu_len..],
    }))
}
