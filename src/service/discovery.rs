//! Device and object discovery: Who-Is, I-Am and Who-Has.

use crate::core::identity::{ObjectIdentifier, MAX_INSTANCE};
use crate::core::primitive::{
    encode_application_enumerated, encode_application_object_id, encode_application_unsigned,
    encode_context_character_string, encode_context_object_id, encode_context_unsigned,
};
use crate::core::reader::TagReader;
use crate::core::types::{Segmentation, OBJECT_DEVICE};
use crate::error::{constants, BacnetError, Result};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

/// I-Am announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IAm {
    pub device_id: u32,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u32,
}

/// Who-Is with an optional device instance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoIs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_limit: Option<u32>,
}

/// The object a Who-Has asks about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhoHasObject {
    #[serde(rename = "objId")]
    Identifier(ObjectIdentifier),
    #[serde(rename = "objName")]
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoHas {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_limit: Option<u32>,
    #[serde(flatten)]
    pub object: WhoHasObject,
}

/// Limits come in pairs and address device instances.
fn check_limits(low: Option<u32>, high: Option<u32>) -> Result<Option<(u32, u32)>> {
    match (low, high) {
        (None, None) => Ok(None),
        (Some(low), Some(high)) if low <= MAX_INSTANCE && high <= MAX_INSTANCE => {
            Ok(Some((low, high)))
        }
        _ => Err(BacnetError::ValueOutOfRange(
            constants::ERR_WHO_IS_LIMITS.to_string(),
        )),
    }
}

fn encode_limits(buf: &mut BytesMut, low: Option<u32>, high: Option<u32>) -> Result<()> {
    if let Some((low, high)) = check_limits(low, high)? {
        encode_context_unsigned(buf, 0, low);
        encode_context_unsigned(buf, 1, high);
    }
    Ok(())
}

fn read_limits(reader: &mut TagReader<'_>) -> Result<(Option<u32>, Option<u32>)> {
    let low = reader.optional_context_unsigned(0)?;
    let high = reader.optional_context_unsigned(1)?;
    check_limits(low, high)?;
    Ok((low, high))
}

pub fn encode_iam(buf: &mut BytesMut, iam: &IAm) -> Result<usize> {
    let start = buf.len();
    let device = ObjectIdentifier::new(OBJECT_DEVICE, iam.device_id)?;
    encode_application_object_id(buf, device);
    encode_application_unsigned(buf, iam.max_apdu);
    encode_application_enumerated(buf, iam.segmentation as u32);
    encode_application_unsigned(buf, iam.vendor_id);
    Ok(buf.len() - start)
}

pub fn decode_iam(buf: &[u8], offset: usize) -> Result<(IAm, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let device = reader.application_object_id()?;
    if device.object_type() != OBJECT_DEVICE {
        return Err(BacnetError::ValueOutOfRange(format!(
            "I-Am for non-device object {device}"
        )));
    }
    let max_apdu = reader.application_unsigned()?;
    let segmentation = Segmentation::try_from(reader.application_enumerated()?)?;
    let vendor_id = reader.application_unsigned()?;
    Ok((
        IAm {
            device_id: device.instance(),
            max_apdu,
            segmentation,
            vendor_id,
        },
        reader.finish()?,
    ))
}

/// An unrestricted Who-Is has an empty body.
pub fn encode_who_is(buf: &mut BytesMut, who_is: &WhoIs) -> Result<usize> {
    let start = buf.len();
    encode_limits(buf, who_is.low_limit, who_is.high_limit)?;
    Ok(buf.len() - start)
}

pub fn decode_who_is(buf: &[u8], offset: usize) -> Result<(WhoIs, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let (low_limit, high_limit) = read_limits(&mut reader)?;
    Ok((
        WhoIs {
            low_limit,
            high_limit,
        },
        reader.finish()?,
    ))
}

pub fn encode_who_has(buf: &mut BytesMut, who_has: &WhoHas) -> Result<usize> {
    let start = buf.len();
    encode_limits(buf, who_has.low_limit, who_has.high_limit)?;
    match &who_has.object {
        WhoHasObject::Identifier(id) => {
            encode_context_object_id(buf, 2, *id);
        }
        WhoHasObject::Name(name) => {
            encode_context_character_string(buf, 3, name);
        }
    }
    Ok(buf.len() - start)
}

pub fn decode_who_has(buf: &[u8], offset: usize) -> Result<(WhoHas, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let (low_limit, high_limit) = read_limits(&mut reader)?;
    let object = if reader.peek_is_context(2)? {
        WhoHasObject::Identifier(reader.context_object_id(2)?)
    } else {
        WhoHasObject::Name(reader.context_character_string(3)?)
    };
    Ok((
        WhoHas {
            low_limit,
            high_limit,
            object,
        },
        reader.finish()?,
    ))
}
