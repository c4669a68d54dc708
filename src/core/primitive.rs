//! Primitive value codec.
//!
//! Numbers use the fewest big-endian octets that represent them: unsigned and
//! enumerated values take 1 to 4 octets, signed values the smallest width whose
//! two's complement form is exact. Every encoder returns the number of bytes
//! written; every decoder returns the value together with the bytes consumed,
//! tag header included.

use crate::core::identity::ObjectIdentifier;
use crate::core::tag::{decode_tag, encode_tag, Tag, TagClass};
use crate::core::types::{
    ApplicationTag, BacnetDate, BacnetTime, BacnetValue, BitString,
};
use crate::error::{BacnetError, Result};
use crate::service::{cov, property};
use bytes::{BufMut, BytesMut};

/// Character sets understood by the decoder. Encoding always uses UTF-8.
pub const CHARSET_UTF8: u8 = 0;
pub const CHARSET_UCS2: u8 = 4;
pub const CHARSET_ISO_8859_1: u8 = 5;

#[inline]
pub fn unsigned_width(value: u32) -> usize {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}

#[inline]
pub fn signed_width(value: i32) -> usize {
    match value {
        -0x80..=0x7F => 1,
        -0x8000..=0x7FFF => 2,
        -0x80_0000..=0x7F_FFFF => 3,
        _ => 4,
    }
}

fn content_len(value: &BacnetValue) -> Result<u32> {
    Ok(match value {
        BacnetValue::Null => 0,
        BacnetValue::Boolean(_) => 1,
        BacnetValue::Unsigned(v) | BacnetValue::Enumerated(v) => unsigned_width(*v) as u32,
        BacnetValue::Signed(v) => signed_width(*v) as u32,
        BacnetValue::Real(_) => 4,
        BacnetValue::Double(_) => 8,
        BacnetValue::OctetString(bytes) => bytes.len() as u32,
        BacnetValue::CharacterString(text) => text.len() as u32 + 1,
        BacnetValue::BitString(bits) => bits.as_bytes().len() as u32 + 1,
        BacnetValue::Date(_) | BacnetValue::Time(_) | BacnetValue::ObjectIdentifier(_) => 4,
        BacnetValue::CovSubscription(_) | BacnetValue::ReadAccessSpecification(_) => {
            return Err(BacnetError::UnsupportedTag {
                tag: value.tag().number(),
            })
        }
    })
}

fn put_content(buf: &mut BytesMut, value: &BacnetValue) {
    match value {
        BacnetValue::Null => {}
        BacnetValue::Boolean(v) => buf.put_u8(u8::from(*v)),
        BacnetValue::Unsigned(v) | BacnetValue::Enumerated(v) => {
            buf.put_slice(&v.to_be_bytes()[4 - unsigned_width(*v)..])
        }
        BacnetValue::Signed(v) => buf.put_slice(&v.to_be_bytes()[4 - signed_width(*v)..]),
        BacnetValue::Real(v) => buf.put_f32(*v),
        BacnetValue::Double(v) => buf.put_f64(*v),
        BacnetValue::OctetString(bytes) => buf.put_slice(bytes),
        BacnetValue::CharacterString(text) => {
            buf.put_u8(CHARSET_UTF8);
            buf.put_slice(text.as_bytes());
        }
        BacnetValue::BitString(bits) => {
            buf.put_u8(bits.unused_bits());
            buf.put_slice(bits.as_bytes());
        }
        BacnetValue::Date(date) => {
            buf.put_slice(&[date.year, date.month, date.day, date.weekday]);
        }
        BacnetValue::Time(time) => {
            buf.put_slice(&[time.hour, time.minute, time.second, time.hundredths]);
        }
        BacnetValue::ObjectIdentifier(id) => buf.put_u32(id.to_u32()),
        // rejected by content_len
        BacnetValue::CovSubscription(_) | BacnetValue::ReadAccessSpecification(_) => {}
    }
}

/// Encode an application-tagged value. The composite kinds have no
/// application tag of their own and are written as their context-tagged body.
pub fn encode_application(buf: &mut BytesMut, value: &BacnetValue) -> Result<usize> {
    match value {
        BacnetValue::Boolean(v) => Ok(encode_tag(
            buf,
            ApplicationTag::Boolean.number(),
            TagClass::Application,
            u32::from(*v),
        )),
        BacnetValue::CovSubscription(sub) => Ok(cov::encode_cov_subscription(buf, sub)),
        BacnetValue::ReadAccessSpecification(spec) => {
            Ok(property::encode_read_access_specification(buf, spec))
        }
        _ => {
            let len = content_len(value)?;
            let header = encode_tag(buf, value.tag().number(), TagClass::Application, len);
            put_content(buf, value);
            Ok(header + len as usize)
        }
    }
}

/// Encode a primitive value under context tag `tag_number`.
pub fn encode_context(buf: &mut BytesMut, tag_number: u8, value: &BacnetValue) -> Result<usize> {
    let len = content_len(value)?;
    let header = encode_tag(buf, tag_number, TagClass::Context, len);
    put_content(buf, value);
    Ok(header + len as usize)
}

pub fn encode_application_unsigned(buf: &mut BytesMut, value: u32) -> usize {
    encode_numeric(buf, ApplicationTag::UnsignedInt.number(), TagClass::Application, value)
}

pub fn encode_application_enumerated(buf: &mut BytesMut, value: u32) -> usize {
    encode_numeric(buf, ApplicationTag::Enumerated.number(), TagClass::Application, value)
}

pub fn encode_application_object_id(buf: &mut BytesMut, id: ObjectIdentifier) -> usize {
    let header = encode_tag(buf, ApplicationTag::ObjectId.number(), TagClass::Application, 4);
    buf.put_u32(id.to_u32());
    header + 4
}

pub fn encode_application_octet_string(buf: &mut BytesMut, bytes: &[u8]) -> usize {
    let header = encode_tag(
        buf,
        ApplicationTag::OctetString.number(),
        TagClass::Application,
        bytes.len() as u32,
    );
    buf.put_slice(bytes);
    header + bytes.len()
}

pub fn encode_application_date(buf: &mut BytesMut, date: BacnetDate) -> usize {
    let header = encode_tag(buf, ApplicationTag::Date.number(), TagClass::Application, 4);
    buf.put_slice(&[date.year, date.month, date.day, date.weekday]);
    header + 4
}

pub fn encode_application_time(buf: &mut BytesMut, time: BacnetTime) -> usize {
    let header = encode_tag(buf, ApplicationTag::Time.number(), TagClass::Application, 4);
    buf.put_slice(&[time.hour, time.minute, time.second, time.hundredths]);
    header + 4
}

pub fn encode_context_unsigned(buf: &mut BytesMut, tag_number: u8, value: u32) -> usize {
    encode_numeric(buf, tag_number, TagClass::Context, value)
}

pub fn encode_context_enumerated(buf: &mut BytesMut, tag_number: u8, value: u32) -> usize {
    encode_numeric(buf, tag_number, TagClass::Context, value)
}

pub fn encode_context_object_id(buf: &mut BytesMut, tag_number: u8, id: ObjectIdentifier) -> usize {
    let header = encode_tag(buf, tag_number, TagClass::Context, 4);
    buf.put_u32(id.to_u32());
    header + 4
}

pub fn encode_context_boolean(buf: &mut BytesMut, tag_number: u8, value: bool) -> usize {
    let header = encode_tag(buf, tag_number, TagClass::Context, 1);
    buf.put_u8(u8::from(value));
    header + 1
}

pub fn encode_context_real(buf: &mut BytesMut, tag_number: u8, value: f32) -> usize {
    let header = encode_tag(buf, tag_number, TagClass::Context, 4);
    buf.put_f32(value);
    header + 4
}

pub fn encode_context_character_string(buf: &mut BytesMut, tag_number: u8, text: &str) -> usize {
    let len = text.len() + 1;
    let header = encode_tag(buf, tag_number, TagClass::Context, len as u32);
    buf.put_u8(CHARSET_UTF8);
    buf.put_slice(text.as_bytes());
    header + len
}

fn encode_numeric(buf: &mut BytesMut, tag_number: u8, class: TagClass, value: u32) -> usize {
    let width = unsigned_width(value);
    let header = encode_tag(buf, tag_number, class, width as u32);
    buf.put_slice(&value.to_be_bytes()[4 - width..]);
    header + width
}

/// Borrow `len` content bytes at `start`; `offset` is the tag position for errors.
#[inline]
pub(crate) fn content(buf: &[u8], start: usize, len: usize, offset: usize) -> Result<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| buf.get(start..end))
        .ok_or(BacnetError::MalformedTag { offset })
}

pub fn decode_unsigned(content: &[u8], offset: usize) -> Result<u32> {
    if content.is_empty() || content.len() > 4 {
        return Err(BacnetError::MalformedTag { offset });
    }
    Ok(content
        .iter()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte)))
}

pub fn decode_signed(content: &[u8], offset: usize) -> Result<i32> {
    if content.is_empty() || content.len() > 4 {
        return Err(BacnetError::MalformedTag { offset });
    }
    let seed: i32 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(seed, |acc, byte| (acc << 8) | i32::from(*byte)))
}

pub fn decode_real(content: &[u8], offset: usize) -> Result<f32> {
    let bytes: [u8; 4] = content
        .try_into()
        .map_err(|_| BacnetError::MalformedTag { offset })?;
    Ok(f32::from_be_bytes(bytes))
}

pub fn decode_double(content: &[u8], offset: usize) -> Result<f64> {
    let bytes: [u8; 8] = content
        .try_into()
        .map_err(|_| BacnetError::MalformedTag { offset })?;
    Ok(f64::from_be_bytes(bytes))
}

pub fn decode_character_string(content: &[u8], offset: usize) -> Result<String> {
    let (charset, text) = content
        .split_first()
        .ok_or(BacnetError::MalformedTag { offset })?;
    match *charset {
        CHARSET_UTF8 => String::from_utf8(text.to_vec())
            .map_err(|_| BacnetError::MalformedTag { offset }),
        CHARSET_UCS2 => {
            if text.len() % 2 != 0 {
                return Err(BacnetError::MalformedTag { offset });
            }
            let units: Vec<u16> = text
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).map_err(|_| BacnetError::MalformedTag { offset })
        }
        CHARSET_ISO_8859_1 => Ok(text.iter().map(|b| char::from(*b)).collect()),
        _ => Err(BacnetError::UnsupportedTag {
            tag: ApplicationTag::CharacterString.number(),
        }),
    }
}

pub fn decode_bit_string(content: &[u8], offset: usize) -> Result<BitString> {
    let (unused, bytes) = content
        .split_first()
        .ok_or(BacnetError::MalformedTag { offset })?;
    if *unused > 7 || (bytes.is_empty() && *unused != 0) {
        return Err(BacnetError::MalformedTag { offset });
    }
    let bits_used = bytes.len() as u32 * 8 - u32::from(*unused);
    BitString::new(bits_used, bytes.to_vec()).map_err(|_| BacnetError::MalformedTag { offset })
}

fn four(content: &[u8], offset: usize) -> Result<[u8; 4]> {
    content
        .try_into()
        .map_err(|_| BacnetError::MalformedTag { offset })
}

pub fn decode_date(content: &[u8], offset: usize) -> Result<BacnetDate> {
    let [year, month, day, weekday] = four(content, offset)?;
    Ok(BacnetDate {
        year,
        month,
        day,
        weekday,
    })
}

pub fn decode_time(content: &[u8], offset: usize) -> Result<BacnetTime> {
    let [hour, minute, second, hundredths] = four(content, offset)?;
    Ok(BacnetTime {
        hour,
        minute,
        second,
        hundredths,
    })
}

pub fn decode_object_id(content: &[u8], offset: usize) -> Result<ObjectIdentifier> {
    Ok(ObjectIdentifier::from_u32(u32::from_be_bytes(four(content, offset)?)))
}

/// Decode the content of a primitive of known kind.
pub fn decode_content(kind: ApplicationTag, content: &[u8], offset: usize) -> Result<BacnetValue> {
    Ok(match kind {
        ApplicationTag::Null => {
            if !content.is_empty() {
                return Err(BacnetError::MalformedTag { offset });
            }
            BacnetValue::Null
        }
        ApplicationTag::Boolean => match content {
            [value] => BacnetValue::Boolean(*value != 0),
            _ => return Err(BacnetError::MalformedTag { offset }),
        },
        ApplicationTag::UnsignedInt => BacnetValue::Unsigned(decode_unsigned(content, offset)?),
        ApplicationTag::SignedInt => BacnetValue::Signed(decode_signed(content, offset)?),
        ApplicationTag::Real => BacnetValue::Real(decode_real(content, offset)?),
        ApplicationTag::Double => BacnetValue::Double(decode_double(content, offset)?),
        ApplicationTag::OctetString => BacnetValue::OctetString(content.to_vec()),
        ApplicationTag::CharacterString => {
            BacnetValue::CharacterString(decode_character_string(content, offset)?)
        }
        ApplicationTag::BitString => BacnetValue::BitString(decode_bit_string(content, offset)?),
        ApplicationTag::Enumerated => BacnetValue::Enumerated(decode_unsigned(content, offset)?),
        ApplicationTag::Date => BacnetValue::Date(decode_date(content, offset)?),
        ApplicationTag::Time => BacnetValue::Time(decode_time(content, offset)?),
        ApplicationTag::ObjectId => {
            BacnetValue::ObjectIdentifier(decode_object_id(content, offset)?)
        }
        ApplicationTag::CovSubscription | ApplicationTag::ReadAccessSpecification => {
            return Err(BacnetError::UnsupportedTag { tag: kind.number() })
        }
    })
}

/// Decode one application-tagged primitive at `offset`.
pub fn decode_application(buf: &[u8], offset: usize) -> Result<(BacnetValue, usize)> {
    let (tag, header) = decode_tag(buf, offset)?;
    decode_application_with(buf, offset, tag, header)
}

pub(crate) fn decode_application_with(
    buf: &[u8],
    offset: usize,
    tag: Tag,
    header: usize,
) -> Result<(BacnetValue, usize)> {
    if !tag.is_application() {
        return Err(BacnetError::MalformedTag { offset });
    }
    let kind = ApplicationTag::from_wire(tag.number)?;
    if kind == ApplicationTag::Boolean {
        // application booleans carry the value in the length field
        return match tag.length() {
            0 => Ok((BacnetValue::Boolean(false), header)),
            1 => Ok((BacnetValue::Boolean(true), header)),
            _ => Err(BacnetError::MalformedTag { offset }),
        };
    }
    let len = tag.length() as usize;
    let bytes = content(buf, offset + header, len, offset)?;
    Ok((decode_content(kind, bytes, offset)?, header + len))
}

/// Decode a context-tagged primitive whose kind is known from its position.
pub fn decode_context(
    buf: &[u8],
    offset: usize,
    tag_number: u8,
    kind: ApplicationTag,
) -> Result<(BacnetValue, usize)> {
    let (tag, header) = decode_tag(buf, offset)?;
    if !tag.is_context(tag_number) {
        return Err(BacnetError::MalformedTag { offset });
    }
    let len = tag.length() as usize;
    let bytes = content(buf, offset + header, len, offset)?;
    Ok((decode_content(kind, bytes, offset)?, header + len))
}
