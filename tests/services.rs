//! Service layer scenarios: encode a service body, decode it back and check
//! the decoded structure and the consumed length.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bacnet_stack::core::identity::{BacnetAddress, ObjectIdentifier};
use bacnet_stack::core::types::{
    BacnetDate, BacnetTime, BacnetValue, BitString, CovSubscription, ErrorInfo, PropertyReference,
    PropertyValue, ReadAccessResult, ReadAccessSpecification, Segmentation, BACNET_ARRAY_ALL,
};
use bacnet_stack::service::cov::{decode_cov_subscription, encode_cov_subscription};
use bacnet_stack::service::device::{
    decode_device_communication_control, decode_reinitialize_device,
    decode_time_synchronization, encode_device_communication_control,
    encode_reinitialize_device, encode_time_synchronization, DeviceCommunicationControl,
    ReinitializeDevice,
};
use bacnet_stack::service::discovery::{
    decode_iam, decode_who_has, decode_who_is, encode_iam, encode_who_has, encode_who_is, IAm,
    WhoHas, WhoHasObject, WhoIs,
};
use bacnet_stack::service::error::{decode_error, encode_error};
use bacnet_stack::service::property::{
    decode_read_access_specification, decode_read_property_ack,
    decode_read_property_multiple_ack, encode_read_access_specification,
    encode_read_property_ack, encode_read_property_multiple_ack, ReadPropertyAck,
};
use bytes::BytesMut;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

fn oid(object_type: u16, instance: u32) -> ObjectIdentifier {
    ObjectIdentifier::new(object_type, instance).unwrap()
}

/// 1901-02-01, midnight.
fn reference_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(1901, 2, 1).unwrap()
}

fn reference_time() -> NaiveTime {
    NaiveTime::from_hms_milli_opt(0, 0, 0, 990).unwrap()
}

/// Encode a Read-Property ack for device 8:40000, property 81, and decode it.
fn property_ack_round_trip(values: Vec<BacnetValue>) -> ReadPropertyAck {
    let ack = ReadPropertyAck {
        object_identifier: oid(8, 40000),
        property: PropertyReference::new(81),
        value_list: values,
    };
    let mut buf = BytesMut::new();
    let written = encode_read_property_ack(&mut buf, &ack).unwrap();
    let (decoded, consumed) = decode_read_property_ack(&buf, 0).unwrap();
    assert_eq!(consumed, written);
    assert_eq!(decoded.object_identifier, oid(8, 40000));
    assert_eq!(decoded.property.property_array_index, BACNET_ARRAY_ALL);
    assert_eq!(decoded.property.property_identifier, 81);
    decoded
}

#[test]
fn test_iam() {
    let iam = IAm {
        device_id: 47,
        max_apdu: 1,
        segmentation: Segmentation::Transmit,
        vendor_id: 7,
    };
    let mut buf = BytesMut::new();
    let written = encode_iam(&mut buf, &iam).unwrap();
    assert_eq!(decode_iam(&buf, 0).unwrap(), (iam, written));
}

#[test]
fn test_who_has_by_id() {
    let who_has = WhoHas {
        low_limit: Some(3),
        high_limit: Some(4000),
        object: WhoHasObject::Identifier(oid(3, 15)),
    };
    let mut buf = BytesMut::new();
    let written = encode_who_has(&mut buf, &who_has).unwrap();
    let (decoded, consumed) = decode_who_has(&buf, 0).unwrap();
    assert_eq!(decoded, who_has);
    assert_eq!(consumed, written);

    let json = serde_json::to_value(&decoded).unwrap();
    assert!(json.get("objId").is_some());
    assert!(json.get("objName").is_none());
}

#[test]
fn test_who_has_by_name() {
    let who_has = WhoHas {
        low_limit: Some(3),
        high_limit: Some(4000),
        object: WhoHasObject::Name("analog-output-1".to_string()),
    };
    let mut buf = BytesMut::new();
    encode_who_has(&mut buf, &who_has).unwrap();
    let (decoded, _) = decode_who_has(&buf, 0).unwrap();
    assert_eq!(decoded, who_has);

    let json = serde_json::to_value(&decoded).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "lowLimit": 3,
            "highLimit": 4000,
            "objName": "analog-output-1"
        })
    );
}

#[test]
fn test_who_is() {
    let who_is = WhoIs {
        low_limit: Some(1),
        high_limit: Some(3000),
    };
    let mut buf = BytesMut::new();
    let written = encode_who_is(&mut buf, &who_is).unwrap();
    assert_eq!(decode_who_is(&buf, 0).unwrap(), (who_is, written));
}

#[test]
fn test_property_ack_booleans() {
    let values = vec![BacnetValue::Boolean(true), BacnetValue::Boolean(false)];
    assert_eq!(property_ack_round_trip(values.clone()).value_list, values);
}

#[test]
fn test_property_ack_unsigned_and_signed() {
    let values = vec![
        BacnetValue::Unsigned(1),
        BacnetValue::Unsigned(1000),
        BacnetValue::Unsigned(1_000_000),
        BacnetValue::Unsigned(1_000_000_000),
        BacnetValue::Signed(-1),
        BacnetValue::Signed(-1000),
        BacnetValue::Signed(-1_000_000),
        BacnetValue::Signed(-1_000_000_000),
    ];
    assert_eq!(property_ack_round_trip(values.clone()).value_list, values);
}

#[test]
fn test_property_ack_floating_point() {
    let decoded = property_ack_round_trip(vec![
        BacnetValue::Real(0.0),
        BacnetValue::Real(0.1),
        BacnetValue::Double(0.0),
        BacnetValue::Double(100.121212),
    ]);
    match &decoded.value_list[1] {
        BacnetValue::Real(v) => assert_eq!((v * 10000.0).floor(), (0.1f32 * 10000.0).floor()),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(decoded.value_list[3], BacnetValue::Double(100.121212));
}

#[test]
fn test_property_ack_strings() {
    let values = vec![
        BacnetValue::OctetString(vec![]),
        BacnetValue::OctetString(vec![1, 2, 100, 200]),
        BacnetValue::CharacterString(String::new()),
        BacnetValue::CharacterString("Test1234$".to_string()),
        BacnetValue::BitString(BitString::new(0, vec![]).unwrap()),
        BacnetValue::BitString(BitString::new(24, vec![0xAA, 0xAA, 0xAA]).unwrap()),
    ];
    assert_eq!(property_ack_round_trip(values.clone()).value_list, values);
}

#[test]
fn test_property_ack_enumerated_and_identifiers() {
    let values = vec![
        BacnetValue::Enumerated(0),
        BacnetValue::Enumerated(4),
        BacnetValue::ObjectIdentifier(oid(3, 0)),
        BacnetValue::ObjectIdentifier(oid(3, 50000)),
    ];
    assert_eq!(property_ack_round_trip(values.clone()).value_list, values);
}

#[test]
fn test_property_ack_date_and_time() {
    let date = BacnetDate::from_naive(reference_day()).unwrap();
    let time = BacnetTime::from_naive(reference_time());
    let decoded = property_ack_round_trip(vec![BacnetValue::Date(date), BacnetValue::Time(time)]);

    match decoded.value_list.as_slice() {
        [BacnetValue::Date(d), BacnetValue::Time(t)] => {
            assert_eq!(d.to_naive(), Some(reference_day()));
            assert_eq!(t.to_naive(), Some(reference_time()));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_property_ack_cov_subscriptions() {
    let with_increment = CovSubscription {
        recipient: BacnetAddress::new(12, vec![0, 1]),
        subscription_process_identifier: 3,
        monitored_object_identifier: oid(2, 1),
        monitored_property: PropertyReference::with_index(85, 0),
        issue_confirmed_notifications: false,
        time_remaining: 5,
        cov_increment: Some(1.0),
    };
    let without_increment = CovSubscription {
        recipient: BacnetAddress::new(BacnetAddress::GLOBAL_BROADCAST, vec![]),
        subscription_process_identifier: 3,
        monitored_object_identifier: oid(2, 1),
        monitored_property: PropertyReference::with_index(85, 5),
        issue_confirmed_notifications: true,
        time_remaining: 5,
        cov_increment: None,
    };

    // each entry's consumed length, as a list walker sees it
    let mut buf = BytesMut::new();
    assert_eq!(encode_cov_subscription(&mut buf, &with_increment), 33);
    let first_len = buf.len();
    assert_eq!(encode_cov_subscription(&mut buf, &without_increment), 27);
    let (first, used) = decode_cov_subscription(&buf, 0).unwrap();
    assert_eq!((first, used), (with_increment.clone(), first_len));
    let (second, used) = decode_cov_subscription(&buf, first_len).unwrap();
    assert_eq!(second.cov_increment, None);
    assert_eq!(used, 27);

    let ack = ReadPropertyAck {
        object_identifier: oid(222, 3),
        property: PropertyReference::new(152),
        value_list: vec![
            BacnetValue::CovSubscription(with_increment),
            BacnetValue::CovSubscription(without_increment),
        ],
    };
    let mut buf = BytesMut::new();
    let written = encode_read_property_ack(&mut buf, &ack).unwrap();
    assert_eq!(decode_read_property_ack(&buf, 0).unwrap(), (ack, written));
}

#[test]
fn test_property_ack_read_access_specifications() {
    let all = ReadAccessSpecification {
        object_identifier: oid(3, 0),
        property_references: vec![],
    };
    let listed = ReadAccessSpecification {
        object_identifier: oid(3, 50000),
        property_references: vec![
            PropertyReference::new(85),
            PropertyReference::with_index(1, 2),
        ],
    };

    let mut buf = BytesMut::new();
    assert_eq!(encode_read_access_specification(&mut buf, &all), 7);
    assert_eq!(encode_read_access_specification(&mut buf, &listed), 13);
    assert_eq!(decode_read_access_specification(&buf, 0).unwrap(), (all.clone(), 7));
    let (decoded, used) = decode_read_access_specification(&buf, 7).unwrap();
    assert_eq!(used, 13);
    assert_eq!(
        decoded.property_references[0].property_array_index,
        BACNET_ARRAY_ALL
    );

    let ack = ReadPropertyAck {
        object_identifier: oid(223, 90000),
        property: PropertyReference::new(53),
        value_list: vec![
            BacnetValue::ReadAccessSpecification(all),
            BacnetValue::ReadAccessSpecification(listed),
        ],
    };
    let mut buf = BytesMut::new();
    let written = encode_read_property_ack(&mut buf, &ack).unwrap();
    assert_eq!(decode_read_property_ack(&buf, 0).unwrap(), (ack, written));
}

#[test]
fn test_read_property_multiple_ack() {
    let values = vec![
        BacnetValue::Boolean(true),
        BacnetValue::Boolean(false),
        BacnetValue::Unsigned(1),
        BacnetValue::Unsigned(1000),
        BacnetValue::Unsigned(1_000_000),
        BacnetValue::Unsigned(1_000_000_000),
        BacnetValue::Signed(-1),
        BacnetValue::Signed(-1000),
        BacnetValue::Signed(-1_000_000),
        BacnetValue::Signed(-1_000_000_000),
        BacnetValue::Real(0.1),
        BacnetValue::Double(100.121212),
        BacnetValue::OctetString(vec![1, 2, 100, 200]),
        BacnetValue::CharacterString("Test1234$".to_string()),
        BacnetValue::BitString(BitString::new(24, vec![0xAA, 0xAA, 0xAA]).unwrap()),
        BacnetValue::Enumerated(4),
        BacnetValue::Date(BacnetDate::from_naive(reference_day()).unwrap()),
        BacnetValue::Time(BacnetTime::from_naive(reference_time())),
        BacnetValue::ObjectIdentifier(oid(3, 0)),
    ];
    let results = vec![ReadAccessResult {
        object_identifier: oid(9, 50000),
        values: vec![PropertyValue::new(PropertyReference::new(81), values)],
    }];

    let mut buf = BytesMut::new();
    let written = encode_read_property_multiple_ack(&mut buf, &results).unwrap();
    let (decoded, consumed) = decode_read_property_multiple_ack(&buf, 0).unwrap();
    assert_eq!(consumed, written);
    assert_eq!(decoded, results);
    assert_eq!(
        decoded[0].values[0].property.property_array_index,
        0xFFFF_FFFF
    );
}

#[test]
fn test_read_property_multiple_ack_with_access_error() {
    let results = vec![
        ReadAccessResult {
            object_identifier: oid(0, 1),
            values: vec![
                PropertyValue::new(PropertyReference::new(85), vec![BacnetValue::Real(21.5)]),
                PropertyValue {
                    property: PropertyReference::new(4242),
                    value: vec![],
                    access_error: Some(ErrorInfo { class: 2, code: 32 }),
                },
                PropertyValue::new(
                    PropertyReference::new(77),
                    vec![BacnetValue::CharacterString("AI-1".to_string())],
                ),
            ],
        },
        ReadAccessResult {
            object_identifier: oid(8, 1234),
            values: vec![PropertyValue::new(
                PropertyReference::new(75),
                vec![BacnetValue::ObjectIdentifier(oid(8, 1234))],
            )],
        },
    ];
    let mut buf = BytesMut::new();
    encode_read_property_multiple_ack(&mut buf, &results).unwrap();
    let (decoded, _) = decode_read_property_multiple_ack(&buf, 0).unwrap();
    assert_eq!(decoded, results);
}

#[test]
fn test_device_communication_control() {
    let request = DeviceCommunicationControl {
        time_duration: Some(30),
        enable_disable: 1,
        password: None,
    };
    let mut buf = BytesMut::new();
    let written = encode_device_communication_control(&mut buf, &request);
    let (decoded, consumed) = decode_device_communication_control(&buf, 0).unwrap();
    assert_eq!(decoded, request);
    assert_eq!(consumed, written);

    let json = serde_json::to_value(&decoded).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "timeDuration": 30, "enableDisable": 1 })
    );
}

#[test]
fn test_device_communication_control_with_password() {
    let request = DeviceCommunicationControl {
        time_duration: Some(30),
        enable_disable: 1,
        password: Some("Test1234!".to_string()),
    };
    let mut buf = BytesMut::new();
    encode_device_communication_control(&mut buf, &request);
    assert_eq!(decode_device_communication_control(&buf, 0).unwrap().0, request);
}

#[test]
fn test_reinitialize_device() {
    let bare = ReinitializeDevice {
        state: 5,
        password: None,
    };
    let mut buf = BytesMut::new();
    encode_reinitialize_device(&mut buf, &bare);
    let (decoded, _) = decode_reinitialize_device(&buf, 0).unwrap();
    assert_eq!(decoded, bare);
    assert_eq!(serde_json::to_value(&decoded).unwrap(), serde_json::json!({ "state": 5 }));

    let with_password = ReinitializeDevice {
        state: 5,
        password: Some("Test1234$".to_string()),
    };
    let mut buf = BytesMut::new();
    encode_reinitialize_device(&mut buf, &with_password);
    assert_eq!(decode_reinitialize_device(&buf, 0).unwrap().0, with_password);
}

#[test]
fn test_time_synchronization_keeps_hundredths() {
    let value = NaiveDateTime::new(
        NaiveDate::from_ymd_opt(2024, 3, 14).unwrap(),
        NaiveTime::from_hms_milli_opt(15, 9, 26, 990).unwrap(),
    );
    let mut buf = BytesMut::new();
    let written = encode_time_synchronization(&mut buf, value).unwrap();
    assert_eq!(written, 10);
    // hundredths byte of the time value
    assert_eq!(buf[9], 99);
    assert_eq!(decode_time_synchronization(&buf, 0).unwrap(), (value, 10));
}

#[test]
fn test_error() {
    let mut buf = BytesMut::new();
    let written = encode_error(&mut buf, ErrorInfo { class: 15, code: 25 });
    assert_eq!(
        decode_error(&buf, 0).unwrap(),
        (ErrorInfo { class: 15, code: 25 }, written)
    );
}
