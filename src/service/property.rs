//! Property access services: Read-Property, Write-Property and
//! Read-Property-Multiple, plus the read-access specification they share.
//!
//! Value lists are application-tagged. The only context-tagged values a
//! list may carry are the composite entries of two properties, selected by
//! property identifier: Active-COV-Subscriptions holds COV subscriptions and
//! List-Of-Group-Members holds read-access specifications. Any other
//! context-tagged value fails the whole decode with `UnsupportedTag`.

use crate::core::identity::ObjectIdentifier;
use crate::core::primitive::{
    encode_application, encode_application_enumerated, encode_context_enumerated,
    encode_context_object_id, encode_context_unsigned,
};
use crate::core::reader::TagReader;
use crate::core::tag::{encode_closing_tag, encode_opening_tag};
use crate::core::types::{
    BacnetValue, ErrorInfo, PropertyReference, PropertyValue, ReadAccessResult,
    ReadAccessSpecification, BACNET_ARRAY_ALL, MAX_PRIORITY, MIN_PRIORITY, NO_PRIORITY,
    PROP_ACTIVE_COV_SUBSCRIPTIONS, PROP_LIST_OF_GROUP_MEMBERS,
};
use crate::error::{constants, BacnetError, Result};
use crate::service::cov::read_cov_subscription;
use bytes::BytesMut;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property: PropertyReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPropertyAck {
    pub object_identifier: ObjectIdentifier,
    pub property: PropertyReference,
    pub value_list: Vec<BacnetValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritePropertyRequest {
    pub object_identifier: ObjectIdentifier,
    pub property: PropertyReference,
    pub value_list: Vec<BacnetValue>,
    /// 1..=16, or 0 for none.
    pub priority: u8,
}

fn encode_property_reference(
    buf: &mut BytesMut,
    property: &PropertyReference,
    id_tag: u8,
    index_tag: u8,
) {
    encode_context_enumerated(buf, id_tag, property.property_identifier);
    if let Some(index) = property.array_index() {
        encode_context_unsigned(buf, index_tag, index);
    }
}

fn read_property_reference(
    reader: &mut TagReader<'_>,
    id_tag: u8,
    index_tag: u8,
) -> Result<PropertyReference> {
    let property_identifier = reader.context_enumerated(id_tag)?;
    let property_array_index = reader
        .optional_context_unsigned(index_tag)?
        .unwrap_or(BACNET_ARRAY_ALL);
    Ok(PropertyReference {
        property_identifier,
        property_array_index,
    })
}

/// Encode application-tagged values back to back.
pub fn encode_value_list(buf: &mut BytesMut, values: &[BacnetValue]) -> Result<usize> {
    let mut written = 0;
    for value in values {
        written += encode_application(buf, value)?;
    }
    Ok(written)
}

/// Read values up to (not including) the closing tag `closing`.
pub fn read_value_list(
    reader: &mut TagReader<'_>,
    closing: u8,
    property_identifier: u32,
) -> Result<Vec<BacnetValue>> {
    let mut values = Vec::new();
    while !reader.at_closing(closing)? {
        let Some(tag) = reader.peek()? else {
            break;
        };
        if tag.is_application() {
            values.push(reader.application()?);
            continue;
        }
        let value = match property_identifier {
            PROP_ACTIVE_COV_SUBSCRIPTIONS => {
                BacnetValue::CovSubscription(read_cov_subscription(reader)?)
            }
            PROP_LIST_OF_GROUP_MEMBERS => {
                BacnetValue::ReadAccessSpecification(read_read_access_specification(reader)?)
            }
            _ => return Err(BacnetError::UnsupportedTag { tag: tag.number }),
        };
        values.push(value);
    }
    Ok(values)
}

pub fn encode_read_access_specification(buf: &mut BytesMut, spec: &ReadAccessSpecification) -> usize {
    let start = buf.len();
    encode_context_object_id(buf, 0, spec.object_identifier);
    encode_opening_tag(buf, 1);
    for property in &spec.property_references {
        encode_property_reference(buf, property, 0, 1);
    }
    encode_closing_tag(buf, 1);
    buf.len() - start
}

pub fn read_read_access_specification(reader: &mut TagReader<'_>) -> Result<ReadAccessSpecification> {
    let object_identifier = reader.context_object_id(0)?;
    reader.open(1)?;
    let mut property_references = Vec::new();
    while !reader.at_closing(1)? {
        property_references.push(read_property_reference(reader, 0, 1)?);
    }
    reader.close(1)?;
    Ok(ReadAccessSpecification {
        object_identifier,
        property_references,
    })
}

/// Decode one read-access specification. Returns it and the bytes consumed.
pub fn decode_read_access_specification(
    buf: &[u8],
    offset: usize,
) -> Result<(ReadAccessSpecification, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let spec = read_read_access_specification(&mut reader)?;
    Ok((spec, reader.finish()?))
}

pub fn encode_read_property(buf: &mut BytesMut, request: &ReadPropertyRequest) -> usize {
    let start = buf.len();
    encode_context_object_id(buf, 0, request.object_identifier);
    encode_property_reference(buf, &request.property, 1, 2);
    buf.len() - start
}

pub fn decode_read_property(buf: &[u8], offset: usize) -> Result<(ReadPropertyRequest, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let object_identifier = reader.context_object_id(0)?;
    let property = read_property_reference(&mut reader, 1, 2)?;
    Ok((
        ReadPropertyRequest {
            object_identifier,
            property,
        },
        reader.finish()?,
    ))
}

pub fn encode_read_property_ack(buf: &mut BytesMut, ack: &ReadPropertyAck) -> Result<usize> {
    let start = buf.len();
    encode_context_object_id(buf, 0, ack.object_identifier);
    encode_property_reference(buf, &ack.property, 1, 2);
    encode_opening_tag(buf, 3);
    encode_value_list(buf, &ack.value_list)?;
    encode_closing_tag(buf, 3);
    Ok(buf.len() - start)
}

pub fn decode_read_property_ack(buf: &[u8], offset: usize) -> Result<(ReadPropertyAck, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let object_identifier = reader.context_object_id(0)?;
    let property = read_property_reference(&mut reader, 1, 2)?;
    reader.open(3)?;
    let value_list = read_value_list(&mut reader, 3, property.property_identifier)?;
    reader.close(3)?;
    Ok((
        ReadPropertyAck {
            object_identifier,
            property,
            value_list,
        },
        reader.finish()?,
    ))
}

pub fn encode_write_property(buf: &mut BytesMut, request: &WritePropertyRequest) -> Result<usize> {
    if request.priority != NO_PRIORITY && !(MIN_PRIORITY..=MAX_PRIORITY).contains(&request.priority) {
        return Err(BacnetError::ValueOutOfRange(
            constants::ERR_PRIORITY_RANGE.to_string(),
        ));
    }
    let start = buf.len();
    encode_context_object_id(buf, 0, request.object_identifier);
    encode_property_reference(buf, &request.property, 1, 2);
    encode_opening_tag(buf, 3);
    encode_value_list(buf, &request.value_list)?;
    encode_closing_tag(buf, 3);
    if request.priority != NO_PRIORITY {
        encode_context_unsigned(buf, 4, u32::from(request.priority));
    }
    Ok(buf.len() - start)
}

pub fn decode_write_property(buf: &[u8], offset: usize) -> Result<(WritePropertyRequest, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let object_identifier = reader.context_object_id(0)?;
    let property = read_property_reference(&mut reader, 1, 2)?;
    reader.open(3)?;
    let value_list = read_value_list(&mut reader, 3, property.property_identifier)?;
    reader.close(3)?;
    let priority = match reader.optional_context_unsigned(4)? {
        None => NO_PRIORITY,
        Some(p) if (u32::from(MIN_PRIORITY)..=u32::from(MAX_PRIORITY)).contains(&p) => p as u8,
        Some(_) => {
            return Err(BacnetError::ValueOutOfRange(
                constants::ERR_PRIORITY_RANGE.to_string(),
            ))
        }
    };
    Ok((
        WritePropertyRequest {
            object_identifier,
            property,
            value_list,
            priority,
        },
        reader.finish()?,
    ))
}

pub fn encode_read_property_multiple(buf: &mut BytesMut, specs: &[ReadAccessSpecification]) -> usize {
    specs
        .iter()
        .map(|spec| encode_read_access_specification(buf, spec))
        .sum()
}

/// Decode specifications until the end of `buf`.
pub fn decode_read_property_multiple(
    buf: &[u8],
    offset: usize,
) -> Result<(Vec<ReadAccessSpecification>, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let mut specs = Vec::new();
    while !reader.is_at_end() {
        specs.push(read_read_access_specification(&mut reader)?);
    }
    Ok((specs, reader.finish()?))
}

pub fn encode_read_property_multiple_ack(
    buf: &mut BytesMut,
    results: &[ReadAccessResult],
) -> Result<usize> {
    let start = buf.len();
    for result in results {
        encode_context_object_id(buf, 0, result.object_identifier);
        encode_opening_tag(buf, 1);
        for value in &result.values {
            encode_property_reference(buf, &value.property, 2, 3);
            match value.access_error {
                Some(error) => {
                    encode_opening_tag(buf, 5);
                    encode_application_enumerated(buf, error.class);
                    encode_application_enumerated(buf, error.code);
                    encode_closing_tag(buf, 5);
                }
                None => {
                    encode_opening_tag(buf, 4);
                    encode_value_list(buf, &value.value)?;
                    encode_closing_tag(buf, 4);
                }
            }
        }
        encode_closing_tag(buf, 1);
    }
    Ok(buf.len() - start)
}

fn read_access_result(reader: &mut TagReader<'_>) -> Result<ReadAccessResult> {
    let object_identifier = reader.context_object_id(0)?;
    reader.open(1)?;
    let mut values = Vec::new();
    while !reader.at_closing(1)? {
        let property = read_property_reference(reader, 2, 3)?;
        if reader.peek_is_opening(5)? {
            reader.open(5)?;
            let class = reader.application_enumerated()?;
            let code = reader.application_enumerated()?;
            reader.close(5)?;
            values.push(PropertyValue {
                property,
                value: Vec::new(),
                access_error: Some(ErrorInfo { class, code }),
            });
        } else {
            reader.open(4)?;
            let value = read_value_list(reader, 4, property.property_identifier)?;
            reader.close(4)?;
            values.push(PropertyValue::new(property, value));
        }
    }
    reader.close(1)?;
    Ok(ReadAccessResult {
        object_identifier,
        values,
    })
}

/// Decode results until the end of `buf`.
pub fn decode_read_property_multiple_ack(
    buf: &[u8],
    offset: usize,
) -> Result<(Vec<ReadAccessResult>, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let mut results = Vec::new();
    while !reader.is_at_end() {
        results.push(read_access_result(&mut reader)?);
    }
    Ok((results, reader.finish()?))
}
