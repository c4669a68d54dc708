//! COV subscription entries (Active-COV-Subscriptions property values).
//!
//! ```text
//! [0] {                                 recipient
//!   [0] { [1] { net, adr } }            recipient address
//!   [1] process-identifier
//! }
//! [1] {                                 monitored property
//!   [0] object-id [1] property-id [2] array-index?
//! }
//! [2] issue-confirmed [3] time-remaining [4] cov-increment?
//! ```

use crate::core::identity::BacnetAddress;
use crate::core::primitive::{
    encode_application_octet_string, encode_application_unsigned, encode_context_boolean,
    encode_context_enumerated, encode_context_object_id, encode_context_real,
    encode_context_unsigned,
};
use crate::core::reader::TagReader;
use crate::core::tag::{encode_closing_tag, encode_opening_tag};
use crate::core::types::{CovSubscription, PropertyReference, BACNET_ARRAY_ALL};
use crate::error::{BacnetError, Result};
use bytes::BytesMut;

pub fn encode_cov_subscription(buf: &mut BytesMut, sub: &CovSubscription) -> usize {
    let start = buf.len();

    encode_opening_tag(buf, 0);
    encode_opening_tag(buf, 0);
    encode_opening_tag(buf, 1);
    encode_application_unsigned(buf, u32::from(sub.recipient.net));
    if sub.recipient.is_global_broadcast() {
        encode_application_octet_string(buf, &[]);
    } else {
        encode_application_octet_string(buf, &sub.recipient.adr);
    }
    encode_closing_tag(buf, 1);
    encode_closing_tag(buf, 0);
    encode_context_unsigned(buf, 1, sub.subscription_process_identifier);
    encode_closing_tag(buf, 0);

    encode_opening_tag(buf, 1);
    encode_context_object_id(buf, 0, sub.monitored_object_identifier);
    encode_context_enumerated(buf, 1, sub.monitored_property.property_identifier);
    if let Some(index) = sub.monitored_property.array_index() {
        encode_context_unsigned(buf, 2, index);
    }
    encode_closing_tag(buf, 1);

    encode_context_boolean(buf, 2, sub.issue_confirmed_notifications);
    encode_context_unsigned(buf, 3, sub.time_remaining);
    if let Some(increment) = sub.cov_increment {
        encode_context_real(buf, 4, increment);
    }

    buf.len() - start
}

/// Read one subscription entry at the reader's cursor.
pub fn read_cov_subscription(reader: &mut TagReader<'_>) -> Result<CovSubscription> {
    reader.open(0)?;
    reader.open(0)?;
    reader.open(1)?;
    let net = u16::try_from(reader.application_unsigned()?)
        .map_err(|_| BacnetError::ValueOutOfRange("network number exceeds 65535".to_string()))?;
    let adr = reader.application_octet_string()?;
    reader.close(1)?;
    reader.close(0)?;
    let subscription_process_identifier = reader.context_unsigned(1)?;
    reader.close(0)?;

    reader.open(1)?;
    let monitored_object_identifier = reader.context_object_id(0)?;
    let property_identifier = reader.context_enumerated(1)?;
    let property_array_index = reader
        .optional_context_unsigned(2)?
        .unwrap_or(BACNET_ARRAY_ALL);
    reader.close(1)?;

    let issue_confirmed_notifications = reader.context_boolean(2)?;
    let time_remaining = reader.context_unsigned(3)?;
    let cov_increment = reader.optional_context_real(4)?;

    Ok(CovSubscription {
        recipient: BacnetAddress::new(net, adr),
        subscription_process_identifier,
        monitored_object_identifier,
        monitored_property: PropertyReference {
            property_identifier,
            property_array_index,
        },
        issue_confirmed_notifications,
        time_remaining,
        cov_increment,
    })
}

/// Decode one subscription entry. Returns it and the bytes consumed.
pub fn decode_cov_subscription(buf: &[u8], offset: usize) -> Result<(CovSubscription, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let sub = read_cov_subscription(&mut reader)?;
    Ok((sub, reader.finish()?))
}
