//! APDU headers.
//!
//! ```text
//! confirmed request   [0x0_|flags] [max-seg|max-apdu] [invoke-id] ([seq] [window]) [service]
//! unconfirmed request [0x10] [service]
//! simple ack          [0x20] [invoke-id] [service]
//! complex ack         [0x3_|flags] [invoke-id] ([seq] [window]) [service]
//! segment ack         [0x4_|flags] [invoke-id] [seq] [window]
//! error               [0x50] [invoke-id] [service]
//! reject              [0x60] [invoke-id] [reason]
//! abort               [0x7_|server] [invoke-id] [reason]
//! ```

use crate::error::{constants, BacnetError, Result};
use bytes::{BufMut, BytesMut};

pub mod pdu_type {
    pub const CONFIRMED_REQUEST: u8 = 0x00;
    pub const UNCONFIRMED_REQUEST: u8 = 0x10;
    pub const SIMPLE_ACK: u8 = 0x20;
    pub const COMPLEX_ACK: u8 = 0x30;
    pub const SEGMENT_ACK: u8 = 0x40;
    pub const ERROR: u8 = 0x50;
    pub const REJECT: u8 = 0x60;
    pub const ABORT: u8 = 0x70;
}

pub mod confirmed_service {
    pub const READ_PROPERTY: u8 = 12;
    pub const READ_PROPERTY_MULTIPLE: u8 = 14;
    pub const WRITE_PROPERTY: u8 = 15;
    pub const DEVICE_COMMUNICATION_CONTROL: u8 = 17;
    pub const REINITIALIZE_DEVICE: u8 = 20;
}

pub mod unconfirmed_service {
    pub const I_AM: u8 = 0;
    pub const TIME_SYNCHRONIZATION: u8 = 6;
    pub const WHO_IS: u8 = 8;
}

const SEGMENTED: u8 = 0x08;
const MORE_FOLLOWS: u8 = 0x04;
const SEGMENTED_RESPONSE_ACCEPTED: u8 = 0x02;
const NEGATIVE_ACK: u8 = 0x02;
const SERVER: u8 = 0x01;

/// Max-APDU sizes and their header codes.
pub const MAX_APDU_SIZES: [(u16, u8); 6] =
    [(50, 0), (128, 1), (206, 2), (480, 3), (1024, 4), (1476, 5)];

pub fn max_apdu_code(size: u16) -> Result<u8> {
    MAX_APDU_SIZES
        .iter()
        .find(|(s, _)| *s == size)
        .map(|(_, code)| *code)
        .ok_or_else(|| BacnetError::ValueOutOfRange(format!("max APDU {size} not a BACnet size")))
}

pub fn max_apdu_size(code: u8) -> Option<u16> {
    MAX_APDU_SIZES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(size, _)| *size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduHeader {
    ConfirmedRequest {
        segmented: bool,
        more_follows: bool,
        segmented_response_accepted: bool,
        max_segments: u8,
        max_apdu: u8,
        invoke_id: u8,
        sequence_number: Option<u8>,
        window: Option<u8>,
        service: u8,
    },
    UnconfirmedRequest {
        service: u8,
    },
    SimpleAck {
        invoke_id: u8,
        service: u8,
    },
    ComplexAck {
        segmented: bool,
        more_follows: bool,
        invoke_id: u8,
        sequence_number: Option<u8>,
        window: Option<u8>,
        service: u8,
    },
    SegmentAck {
        negative: bool,
        server: bool,
        invoke_id: u8,
        sequence_number: u8,
        window: u8,
    },
    Error {
        invoke_id: u8,
        service: u8,
    },
    Reject {
        invoke_id: u8,
        reason: u8,
    },
    Abort {
        server: bool,
        invoke_id: u8,
        reason: u8,
    },
}

impl ApduHeader {
    /// Invoke id of replies and confirmed requests.
    pub fn invoke_id(&self) -> Option<u8> {
        match *self {
            ApduHeader::UnconfirmedRequest { .. } => None,
            ApduHeader::ConfirmedRequest { invoke_id, .. }
            | ApduHeader::SimpleAck { invoke_id, .. }
            | ApduHeader::ComplexAck { invoke_id, .. }
            | ApduHeader::SegmentAck { invoke_id, .. }
            | ApduHeader::Error { invoke_id, .. }
            | ApduHeader::Reject { invoke_id, .. }
            | ApduHeader::Abort { invoke_id, .. } => Some(invoke_id),
        }
    }
}

pub fn encode_confirmed_request(
    buf: &mut BytesMut,
    invoke_id: u8,
    service: u8,
    max_apdu_code: u8,
) -> usize {
    buf.put_slice(&[
        pdu_type::CONFIRMED_REQUEST,
        max_apdu_code & 0x0F,
        invoke_id,
        service,
    ]);
    4
}

pub fn encode_unconfirmed_request(buf: &mut BytesMut, service: u8) -> usize {
    buf.put_slice(&[pdu_type::UNCONFIRMED_REQUEST, service]);
    2
}

pub fn encode_simple_ack(buf: &mut BytesMut, invoke_id: u8, service: u8) -> usize {
    buf.put_slice(&[pdu_type::SIMPLE_ACK, invoke_id, service]);
    3
}

/// Unsegmented complex ack header; the service body follows.
pub fn encode_complex_ack(buf: &mut BytesMut, invoke_id: u8, service: u8) -> usize {
    buf.put_slice(&[pdu_type::COMPLEX_ACK, invoke_id, service]);
    3
}

/// Error-PDU header; the error class/code body follows.
pub fn encode_error(buf: &mut BytesMut, invoke_id: u8, service: u8) -> usize {
    buf.put_slice(&[pdu_type::ERROR, invoke_id, service]);
    3
}

pub fn encode_reject(buf: &mut BytesMut, invoke_id: u8, reason: u8) -> usize {
    buf.put_slice(&[pdu_type::REJECT, invoke_id, reason]);
    3
}

pub fn encode_abort(buf: &mut BytesMut, server: bool, invoke_id: u8, reason: u8) -> usize {
    let first = if server { pdu_type::ABORT | SERVER } else { pdu_type::ABORT };
    buf.put_slice(&[first, invoke_id, reason]);
    3
}

/// Invoke id of a reply PDU, read without decoding the rest of the header.
pub fn reply_invoke_id(buf: &[u8]) -> Option<u8> {
    match buf.first()? & 0xF0 {
        pdu_type::SIMPLE_ACK
        | pdu_type::COMPLEX_ACK
        | pdu_type::ERROR
        | pdu_type::REJECT
        | pdu_type::ABORT => buf.get(1).copied(),
        _ => None,
    }
}

/// Decode an APDU header. Returns the header and its length; the service
/// body starts right after it.
pub fn decode_header(buf: &[u8]) -> Result<(ApduHeader, usize)> {
    let invalid = || BacnetError::InvalidHeader(constants::ERR_INVALID_APDU.to_string());
    let byte = |i: usize| buf.get(i).copied().ok_or_else(invalid);

    let first = byte(0)?;
    let flags = first & 0x0F;
    match first & 0xF0 {
        pdu_type::CONFIRMED_REQUEST => {
            let segmented = flags & SEGMENTED != 0;
            let limits = byte(1)?;
            let invoke_id = byte(2)?;
            let (sequence_number, window, service_at) = if segmented {
                (Some(byte(3)?), Some(byte(4)?), 5)
            } else {
                (None, None, 3)
            };
            Ok((
                ApduHeader::ConfirmedRequest {
                    segmented,
                    more_follows: flags & MORE_FOLLOWS != 0,
                    segmented_response_accepted: flags & SEGMENTED_RESPONSE_ACCEPTED != 0,
                    max_segments: (limits >> 4) & 0x07,
                    max_apdu: limits & 0x0F,
                    invoke_id,
                    sequence_number,
                    window,
                    service: byte(service_at)?,
                },
                service_at + 1,
            ))
        }
        pdu_type::UNCONFIRMED_REQUEST => Ok((
            ApduHeader::UnconfirmedRequest { service: byte(1)? },
            2,
        )),
        pdu_type::SIMPLE_ACK => Ok((
            ApduHeader::SimpleAck {
                invoke_id: byte(1)?,
                service: byte(2)?,
            },
            3,
        )),
        pdu_type::COMPLEX_ACK => {
            let segmented = flags & SEGMENTED != 0;
            let invoke_id = byte(1)?;
            let (sequence_number, window, service_at) = if segmented {
                (Some(byte(2)?), Some(byte(3)?), 4)
            } else {
                (None, None, 2)
            };
            Ok((
                ApduHeader::ComplexAck {
                    segmented,
                    more_follows: flags & MORE_FOLLOWS != 0,
                    invoke_id,
                    sequence_number,
                    window,
                    service: byte(service_at)?,
                },
                service_at + 1,
            ))
        }
        pdu_type::SEGMENT_ACK => Ok((
            ApduHeader::SegmentAck {
                negative: flags & NEGATIVE_ACK != 0,
                server: flags & SERVER != 0,
                invoke_id: byte(1)?,
                sequence_number: byte(2)?,
                window: byte(3)?,
            },
            4,
        )),
        pdu_type::ERROR => Ok((
            ApduHeader::Error {
                invoke_id: byte(1)?,
                service: byte(2)?,
            },
            3,
        )),
        pdu_type::REJECT => Ok((
            ApduHeader::Reject {
                invoke_id: byte(1)?,
                reason: byte(2)?,
            },
            3,
        )),
        pdu_type::ABORT => Ok((
            ApduHeader::Abort {
                server: flags & SERVER != 0,
                invoke_id: byte(1)?,
                reason: byte(2)?,
            },
            3,
        )),
        _ => Err(invalid()),
    }
}
