//! Device management services: Device-Communication-Control,
//! Reinitialize-Device and Time-Synchronization.
//!
//! Optional fields that were not on the wire decode to `None` and are left
//! out when serialized.

use crate::core::primitive::{
    encode_application_date, encode_application_time, encode_context_character_string,
    encode_context_enumerated, encode_context_unsigned,
};
use crate::core::reader::TagReader;
use crate::core::types::split_datetime;
use crate::error::{BacnetError, Result};
use bytes::BytesMut;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `enable_disable` values.
pub mod enable_disable {
    pub const ENABLE: u32 = 0;
    pub const DISABLE: u32 = 1;
    pub const DISABLE_INITIATION: u32 = 2;
}

/// `state` values for Reinitialize-Device.
pub mod reinitialized_state {
    pub const COLDSTART: u32 = 0;
    pub const WARMSTART: u32 = 1;
    pub const START_BACKUP: u32 = 2;
    pub const END_BACKUP: u32 = 3;
    pub const START_RESTORE: u32 = 4;
    pub const END_RESTORE: u32 = 5;
    pub const ABORT_RESTORE: u32 = 6;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCommunicationControl {
    /// Minutes; `None` means indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_duration: Option<u32>,
    pub enable_disable: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReinitializeDevice {
    pub state: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

pub fn encode_device_communication_control(
    buf: &mut BytesMut,
    request: &DeviceCommunicationControl,
) -> usize {
    let start = buf.len();
    if let Some(minutes) = request.time_duration {
        encode_context_unsigned(buf, 0, minutes);
    }
    encode_context_enumerated(buf, 1, request.enable_disable);
    if let Some(password) = &request.password {
        encode_context_character_string(buf, 2, password);
    }
    buf.len() - start
}

pub fn decode_device_communication_control(
    buf: &[u8],
    offset: usize,
) -> Result<(DeviceCommunicationControl, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let time_duration = reader.optional_context_unsigned(0)?;
    let enable_disable = reader.context_enumerated(1)?;
    let password = reader.optional_context_character_string(2)?;
    Ok((
        DeviceCommunicationControl {
            time_duration,
            enable_disable,
            password,
        },
        reader.finish()?,
    ))
}

pub fn encode_reinitialize_device(buf: &mut BytesMut, request: &ReinitializeDevice) -> usize {
    let start = buf.len();
    encode_context_enumerated(buf, 0, request.state);
    if let Some(password) = &request.password {
        encode_context_character_string(buf, 1, password);
    }
    buf.len() - start
}

pub fn decode_reinitialize_device(buf: &[u8], offset: usize) -> Result<(ReinitializeDevice, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let state = reader.context_enumerated(0)?;
    let password = reader.optional_context_character_string(1)?;
    Ok((ReinitializeDevice { state, password }, reader.finish()?))
}

/// Encode a date and a time. Sub-second precision is cut to hundredths.
pub fn encode_time_synchronization(buf: &mut BytesMut, value: NaiveDateTime) -> Result<usize> {
    let (date, time) = split_datetime(value)?;
    Ok(encode_application_date(buf, date) + encode_application_time(buf, time))
}

pub fn decode_time_synchronization(buf: &[u8], offset: usize) -> Result<(NaiveDateTime, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let date = reader.application_date()?;
    let time = reader.application_time()?;
    let value = date
        .to_naive()
        .zip(time.to_naive())
        .map(|(date, time)| date.and_time(time))
        .ok_or_else(|| {
            BacnetError::ValueOutOfRange(format!(
                "time synchronization needs a concrete date and time, got {date:?} {time:?}"
            ))
        })?;
    Ok((value, reader.finish()?))
}
