//! Value model shared by the primitive and composite codecs.

use crate::core::identity::{BacnetAddress, ObjectIdentifier};
use crate::error::{constants, BacnetError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Array index sentinel meaning "no index" / "all elements".
pub const BACNET_ARRAY_ALL: u32 = 0xFFFF_FFFF;

/// Wildcard marker for any date or time subfield.
pub const WILDCARD: u8 = 0xFF;

/// Write priority meaning "no priority given"; nothing is put on the wire.
pub const NO_PRIORITY: u8 = 0;

/// Lowest and highest command priorities.
pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 16;

/// Object type of a device object.
pub const OBJECT_DEVICE: u16 = 8;

/// Property identifiers whose values are context-tagged composites.
pub const PROP_LIST_OF_GROUP_MEMBERS: u32 = 53;
pub const PROP_ACTIVE_COV_SUBSCRIPTIONS: u32 = 152;

/// Application tag numbers, plus the two composite kinds carried in value lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ApplicationTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectId = 12,
    CovSubscription = 111,
    ReadAccessSpecification = 115,
}

impl ApplicationTag {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Map an application tag number from the wire. Tags 13-15 are reserved.
    pub fn from_wire(number: u8) -> Result<Self> {
        Ok(match number {
            0 => ApplicationTag::Null,
            1 => ApplicationTag::Boolean,
            2 => ApplicationTag::UnsignedInt,
            3 => ApplicationTag::SignedInt,
            4 => ApplicationTag::Real,
            5 => ApplicationTag::Double,
            6 => ApplicationTag::OctetString,
            7 => ApplicationTag::CharacterString,
            8 => ApplicationTag::BitString,
            9 => ApplicationTag::Enumerated,
            10 => ApplicationTag::Date,
            11 => ApplicationTag::Time,
            12 => ApplicationTag::ObjectId,
            other => return Err(BacnetError::UnsupportedTag { tag: other }),
        })
    }
}

/// Segmentation support advertised in I-Am.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Segmentation {
    Both = 0,
    Transmit = 1,
    Receive = 2,
    None = 3,
}

impl TryFrom<u32> for Segmentation {
    type Error = BacnetError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Segmentation::Both),
            1 => Ok(Segmentation::Transmit),
            2 => Ok(Segmentation::Receive),
            3 => Ok(Segmentation::None),
            other => Err(BacnetError::ValueOutOfRange(format!(
                "segmentation {other} not in 0..=3"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReference {
    pub property_identifier: u32,
    pub property_array_index: u32,
}

impl PropertyReference {
    /// Reference the whole property (no array index).
    pub fn new(property_identifier: u32) -> Self {
        Self {
            property_identifier,
            property_array_index: BACNET_ARRAY_ALL,
        }
    }

    pub fn with_index(property_identifier: u32, index: u32) -> Self {
        Self {
            property_identifier,
            property_array_index: index,
        }
    }

    /// The array index, or `None` for the sentinel.
    pub fn array_index(&self) -> Option<u32> {
        (self.property_array_index != BACNET_ARRAY_ALL).then_some(self.property_array_index)
    }
}

/// Bit string kept in wire order: bit 0 is the MSB of the first octet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBitString")]
pub struct BitString {
    bits_used: u32,
    value: Vec<u8>,
}

/// Unchecked serde form of [`BitString`].
#[derive(Deserialize)]
struct RawBitString {
    bits_used: u32,
    value: Vec<u8>,
}

impl TryFrom<RawBitString> for BitString {
    type Error = BacnetError;

    fn try_from(raw: RawBitString) -> Result<Self> {
        BitString::new(raw.bits_used, raw.value)
    }
}

impl BitString {
    /// Wrap `value` holding exactly `ceil(bits_used / 8)` octets.
    pub fn new(bits_used: u32, value: Vec<u8>) -> Result<Self> {
        if value.len() != bits_used.div_ceil(8) as usize {
            return Err(BacnetError::ValueOutOfRange(
                constants::ERR_BIT_COUNT.to_string(),
            ));
        }
        Ok(Self { bits_used, value })
    }

    pub fn from_bits(bits: &[bool]) -> Self {
        let mut value = vec![0u8; bits.len().div_ceil(8)];
        for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
            value[i / 8] |= 0x80 >> (i % 8);
        }
        Self {
            bits_used: bits.len() as u32,
            value,
        }
    }

    pub fn bits_used(&self) -> u32 {
        self.bits_used
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn bit(&self, index: u32) -> bool {
        if index >= self.bits_used {
            return false;
        }
        self.value[(index / 8) as usize] & (0x80 >> (index % 8)) != 0
    }

    /// Unused trailing bits in the final octet.
    pub fn unused_bits(&self) -> u8 {
        (self.value.len() as u32)
            .saturating_mul(8)
            .checked_sub(self.bits_used)
            .map_or(0, |unused| unused as u8)
    }
}

/// Date in BACnet's native layout. Any field may be [`WILDCARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BacnetDate {
    /// Years since 1900.
    pub year: u8,
    pub month: u8,
    pub day: u8,
    /// 1 = Monday .. 7 = Sunday.
    pub weekday: u8,
}

impl BacnetDate {
    pub const ANY: BacnetDate = BacnetDate {
        year: WILDCARD,
        month: WILDCARD,
        day: WILDCARD,
        weekday: WILDCARD,
    };

    pub fn from_naive(date: NaiveDate) -> Result<Self> {
        let offset = date.year() - 1900;
        if !(0..i32::from(WILDCARD)).contains(&offset) {
            return Err(BacnetError::ValueOutOfRange(format!(
                "year {} not representable",
                date.year()
            )));
        }
        Ok(Self {
            year: offset as u8,
            month: date.month() as u8,
            day: date.day() as u8,
            weekday: date.weekday().number_from_monday() as u8,
        })
    }

    /// Concrete calendar date, or `None` when year, month or day is a wildcard.
    pub fn to_naive(&self) -> Option<NaiveDate> {
        if self.year == WILDCARD || self.month == WILDCARD || self.day == WILDCARD {
            return None;
        }
        NaiveDate::from_ymd_opt(
            1900 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
    }

    pub fn has_wildcard(&self) -> bool {
        [self.year, self.month, self.day, self.weekday].contains(&WILDCARD)
    }
}

/// Time of day in BACnet's native layout. Any field may be [`WILDCARD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BacnetTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub hundredths: u8,
}

impl BacnetTime {
    pub const ANY: BacnetTime = BacnetTime {
        hour: WILDCARD,
        minute: WILDCARD,
        second: WILDCARD,
        hundredths: WILDCARD,
    };

    /// Sub-second precision is truncated to hundredths.
    pub fn from_naive(time: NaiveTime) -> Self {
        let hundredths = (time.nanosecond() / 10_000_000).min(99);
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
            hundredths: hundredths as u8,
        }
    }

    /// Concrete time, or `None` when any field is a wildcard.
    pub fn to_naive(&self) -> Option<NaiveTime> {
        if self.has_wildcard() {
            return None;
        }
        NaiveTime::from_hms_milli_opt(
            u32::from(self.hour),
            u32::from(self.minute),
            u32::from(self.second),
            u32::from(self.hundredths) * 10,
        )
    }

    pub fn has_wildcard(&self) -> bool {
        [self.hour, self.minute, self.second, self.hundredths].contains(&WILDCARD)
    }
}

/// Split a point in time into the BACnet date/time pair.
pub fn split_datetime(value: NaiveDateTime) -> Result<(BacnetDate, BacnetTime)> {
    Ok((
        BacnetDate::from_naive(value.date())?,
        BacnetTime::from_naive(value.time()),
    ))
}

/// Error class and code, as carried by the Error service and by
/// property access errors in Read-Property-Multiple acks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub class: u32,
    pub code: u32,
}

/// Subscription entry of the Active-COV-Subscriptions property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CovSubscription {
    pub recipient: BacnetAddress,
    pub subscription_process_identifier: u32,
    pub monitored_object_identifier: ObjectIdentifier,
    pub monitored_property: PropertyReference,
    pub issue_confirmed_notifications: bool,
    pub time_remaining: u32,
    pub cov_increment: Option<f32>,
}

/// One object and the properties to read from it. An empty list reads all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAccessSpecification {
    pub object_identifier: ObjectIdentifier,
    pub property_references: Vec<PropertyReference>,
}

/// Decoded tagged value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum BacnetValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(String),
    BitString(BitString),
    Enumerated(u32),
    Date(BacnetDate),
    Time(BacnetTime),
    ObjectIdentifier(ObjectIdentifier),
    CovSubscription(CovSubscription),
    ReadAccessSpecification(ReadAccessSpecification),
}

impl BacnetValue {
    pub fn tag(&self) -> ApplicationTag {
        match self {
            BacnetValue::Null => ApplicationTag::Null,
            BacnetValue::Boolean(_) => ApplicationTag::Boolean,
            BacnetValue::Unsigned(_) => ApplicationTag::UnsignedInt,
            BacnetValue::Signed(_) => ApplicationTag::SignedInt,
            BacnetValue::Real(_) => ApplicationTag::Real,
            BacnetValue::Double(_) => ApplicationTag::Double,
            BacnetValue::OctetString(_) => ApplicationTag::OctetString,
            BacnetValue::CharacterString(_) => ApplicationTag::CharacterString,
            BacnetValue::BitString(_) => ApplicationTag::BitString,
            BacnetValue::Enumerated(_) => ApplicationTag::Enumerated,
            BacnetValue::Date(_) => ApplicationTag::Date,
            BacnetValue::Time(_) => ApplicationTag::Time,
            BacnetValue::ObjectIdentifier(_) => ApplicationTag::ObjectId,
            BacnetValue::CovSubscription(_) => ApplicationTag::CovSubscription,
            BacnetValue::ReadAccessSpecification(_) => ApplicationTag::ReadAccessSpecification,
        }
    }
}

/// A property and its (possibly empty) stack of values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValue {
    pub property: PropertyReference,
    pub value: Vec<BacnetValue>,
    /// Set when the device answered this property with an access error
    /// instead of values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_error: Option<ErrorInfo>,
}

impl PropertyValue {
    pub fn new(property: PropertyReference, value: Vec<BacnetValue>) -> Self {
        Self {
            property,
            value,
            access_error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadAccessResult {
    pub object_identifier: ObjectIdentifier,
    pub values: Vec<PropertyValue>,
}
