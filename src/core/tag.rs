//! Tag header encoding.
//!
//! ```text
//! bit:   7 6 5 4 | 3     | 2 1 0
//!        number  | class | length/value/type
//! ```
//!
//! Tag numbers above 14 set the number nibble to `0xF` and follow with a full
//! byte. A length of 5 escapes to an extended length: one byte up to 253,
//! `254` plus a u16, or `255` plus a u32. Context tags use length 6 and 7 as
//! opening and closing markers.

use crate::error::{BacnetError, Result};
use bytes::{BufMut, BytesMut};

const EXTENDED_TAG_NUMBER: u8 = 0x0F;
const EXTENDED_LENGTH: u8 = 5;
const OPENING: u8 = 6;
const CLOSING: u8 = 7;
const CONTEXT_BIT: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Application,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Primitive data of the given length. For application booleans this
    /// holds the value itself.
    Length(u32),
    Opening,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub number: u8,
    pub class: TagClass,
    pub kind: TagKind,
}

impl Tag {
    pub fn length(&self) -> u32 {
        match self.kind {
            TagKind::Length(len) => len,
            TagKind::Opening | TagKind::Closing => 0,
        }
    }

    pub fn is_application(&self) -> bool {
        self.class == TagClass::Application
    }

    /// Context-tagged primitive data with the given tag number.
    pub fn is_context(&self, number: u8) -> bool {
        self.class == TagClass::Context
            && self.number == number
            && matches!(self.kind, TagKind::Length(_))
    }

    pub fn is_opening(&self, number: u8) -> bool {
        self.kind == TagKind::Opening && self.number == number
    }

    pub fn is_closing(&self, number: u8) -> bool {
        self.kind == TagKind::Closing && self.number == number
    }
}

/// Encode a tag header. Returns the header length.
pub fn encode_tag(buf: &mut BytesMut, number: u8, class: TagClass, length: u32) -> usize {
    let start = buf.len();
    let class_bit = if class == TagClass::Context { CONTEXT_BIT } else { 0 };
    let lvt = if length <= 4 { length as u8 } else { EXTENDED_LENGTH };

    if number <= 14 {
        buf.put_u8((number << 4) | class_bit | lvt);
    } else {
        buf.put_u8((EXTENDED_TAG_NUMBER << 4) | class_bit | lvt);
        buf.put_u8(number);
    }

    if lvt == EXTENDED_LENGTH {
        if length <= 253 {
            buf.put_u8(length as u8);
        } else if length <= u32::from(u16::MAX) {
            buf.put_u8(254);
            buf.put_u16(length as u16);
        } else {
            buf.put_u8(255);
            buf.put_u32(length);
        }
    }
    buf.len() - start
}

pub fn encode_opening_tag(buf: &mut BytesMut, number: u8) -> usize {
    encode_marker(buf, number, OPENING)
}

pub fn encode_closing_tag(buf: &mut BytesMut, number: u8) -> usize {
    encode_marker(buf, number, CLOSING)
}

fn encode_marker(buf: &mut BytesMut, number: u8, marker: u8) -> usize {
    if number <= 14 {
        buf.put_u8((number << 4) | CONTEXT_BIT | marker);
        1
    } else {
        buf.put_u8((EXTENDED_TAG_NUMBER << 4) | CONTEXT_BIT | marker);
        buf.put_u8(number);
        2
    }
}

/// Decode the tag header at `offset`. Returns the tag and the header length.
pub fn decode_tag(buf: &[u8], offset: usize) -> Result<(Tag, usize)> {
    let malformed = || BacnetError::MalformedTag { offset };
    let first = *buf.get(offset).ok_or_else(malformed)?;
    let mut len = 1usize;

    let mut number = first >> 4;
    if number == EXTENDED_TAG_NUMBER {
        number = *buf.get(offset + len).ok_or_else(malformed)?;
        len += 1;
    }

    let class = if first & CONTEXT_BIT != 0 {
        TagClass::Context
    } else {
        TagClass::Application
    };

    let lvt = first & 0x07;
    let kind = match (class, lvt) {
        (TagClass::Context, OPENING) => TagKind::Opening,
        (TagClass::Context, CLOSING) => TagKind::Closing,
        (TagClass::Application, OPENING | CLOSING) => return Err(malformed()),
        (_, EXTENDED_LENGTH) => {
            let escape = *buf.get(offset + len).ok_or_else(malformed)?;
            len += 1;
            let value = match escape {
                254 => {
                    let bytes = buf.get(offset + len..offset + len + 2).ok_or_else(malformed)?;
                    len += 2;
                    u32::from(u16::from_be_bytes([bytes[0], bytes[1]]))
                }
                255 => {
                    let bytes = buf.get(offset + len..offset + len + 4).ok_or_else(malformed)?;
                    len += 4;
                    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
                }
                short => u32::from(short),
            };
            TagKind::Length(value)
        }
        (_, literal) => TagKind::Length(u32::from(literal)),
    };

    Ok((Tag { number, class, kind }, len))
}
