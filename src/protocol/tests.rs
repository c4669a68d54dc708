// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::apdu::{
    confirmed_service, encode_abort, encode_complex_ack, encode_confirmed_request, encode_error,
    encode_reject, encode_simple_ack, encode_unconfirmed_request, unconfirmed_service,
};
use crate::core::frame::frame_apdu;
use crate::core::types::{ErrorInfo, Segmentation};
use crate::error::BacnetError;
use crate::protocol::dispatcher::{Dispatched, Dispatcher};
use crate::protocol::transaction::{Reply, TransactionTable, INVOKE_ID_SPACE};
use crate::service::discovery::{encode_iam, IAm};
use crate::service::error::encode_error as encode_error_body;
use crate::utils::metrics::Metrics;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const TIMEOUT: Duration = Duration::from_secs(3);

fn peer() -> SocketAddr {
    "192.168.1.43:47808".parse().unwrap()
}

fn datagram(apdu: &BytesMut) -> Vec<u8> {
    frame_apdu(false, false, apdu).unwrap().to_vec()
}

fn setup() -> (Arc<TransactionTable>, Arc<Metrics>, Dispatcher) {
    let table = Arc::new(TransactionTable::with_first_id(1));
    let metrics = Arc::new(Metrics::new());
    let dispatcher = Dispatcher::new(table.clone(), metrics.clone());
    (table, metrics, dispatcher)
}

#[tokio::test]
async fn test_invoke_ids_are_sequential_and_wrap() {
    let table = TransactionTable::with_first_id(254);
    let (a, _ra) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    let (b, _rb) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    let (c, _rc) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    assert_eq!((a, b, c), (254, 255, 0));
    assert_eq!(table.len().await, 3);
}

#[tokio::test]
async fn test_allocator_skips_pending_ids() {
    let table = TransactionTable::with_first_id(7);
    let mut receivers = Vec::new();
    for _ in 0..INVOKE_ID_SPACE {
        receivers.push(table.begin(12, peer(), TIMEOUT).await.unwrap());
    }
    assert!(matches!(
        table.begin(12, peer(), TIMEOUT).await,
        Err(BacnetError::NoInvokeIdAvailable)
    ));

    // the counter is back at 7, which is still pending; only 100 is free
    assert!(table.complete(100, Ok(Reply::SimpleAck { service: 12 })).await);
    let (id, _rx) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    assert_eq!(id, 100);
}

#[tokio::test]
async fn test_completion_and_sweep_are_exclusive() {
    let table = TransactionTable::with_first_id(0);
    let (id, rx) = table.begin(12, peer(), Duration::ZERO).await.unwrap();

    assert_eq!(table.sweep_expired(Instant::now()).await, 1);
    assert!(!table.complete(id, Ok(Reply::SimpleAck { service: 12 })).await);
    assert!(matches!(rx.await.unwrap(), Err(BacnetError::Timeout)));

    let (id, rx) = table.begin(12, peer(), Duration::ZERO).await.unwrap();
    assert!(table.complete(id, Ok(Reply::SimpleAck { service: 12 })).await);
    assert_eq!(table.sweep_expired(Instant::now()).await, 0);
    assert_eq!(rx.await.unwrap().unwrap(), Reply::SimpleAck { service: 12 });
}

#[tokio::test]
async fn test_sweep_leaves_live_transactions() {
    let table = TransactionTable::with_first_id(0);
    let (expired, _r1) = table.begin(12, peer(), Duration::ZERO).await.unwrap();
    let (live, _r2) = table.begin(12, peer(), TIMEOUT).await.unwrap();

    assert_eq!(table.sweep_expired(Instant::now()).await, 1);
    assert!(!table.is_pending(expired).await);
    assert!(table.is_pending(live).await);
}

#[tokio::test]
async fn test_cancel_all_closes_table() {
    let table = TransactionTable::with_first_id(0);
    let (_, r1) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    let (_, r2) = table.begin(14, peer(), TIMEOUT).await.unwrap();

    assert_eq!(table.cancel_all().await, 2);
    assert!(matches!(r1.await.unwrap(), Err(BacnetError::Cancelled)));
    assert!(matches!(r2.await.unwrap(), Err(BacnetError::Cancelled)));
    assert!(table.is_empty().await);
    assert!(matches!(
        table.begin(12, peer(), TIMEOUT).await,
        Err(BacnetError::Cancelled)
    ));
}

#[tokio::test]
async fn test_abandon_is_silent() {
    let table = TransactionTable::with_first_id(0);
    let (id, rx) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    table.abandon(id).await;
    assert!(rx.await.is_err());
}

#[tokio::test]
async fn test_unmatched_reply_is_dropped() {
    let (_, metrics, dispatcher) = setup();
    let mut apdu = BytesMut::new();
    encode_simple_ack(&mut apdu, 42, confirmed_service::WRITE_PROPERTY);

    let result = dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap();
    assert_eq!(result, Dispatched::Unmatched(42));
    assert_eq!(metrics.snapshot().unmatched_dropped, 1);
}

#[tokio::test]
async fn test_complex_ack_delivers_body() {
    let (table, metrics, dispatcher) = setup();
    let (id, rx) = table
        .begin(confirmed_service::READ_PROPERTY, peer(), TIMEOUT)
        .await
        .unwrap();

    let mut apdu = BytesMut::new();
    encode_complex_ack(&mut apdu, id, confirmed_service::READ_PROPERTY);
    apdu.extend_from_slice(&[0x0C, 0x02, 0x00, 0x00, 0x2A]);

    let result = dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap();
    assert_eq!(result, Dispatched::Matched(id));
    assert_eq!(
        rx.await.unwrap().unwrap(),
        Reply::ComplexAck {
            service: confirmed_service::READ_PROPERTY,
            body: vec![0x0C, 0x02, 0x00, 0x00, 0x2A],
        }
    );
    assert_eq!(metrics.snapshot().acks_matched, 1);
}

#[tokio::test]
async fn test_error_pdu_becomes_protocol_error() {
    let (table, metrics, dispatcher) = setup();
    let (id, rx) = table
        .begin(confirmed_service::READ_PROPERTY, peer(), TIMEOUT)
        .await
        .unwrap();

    let mut apdu = BytesMut::new();
    encode_error(&mut apdu, id, confirmed_service::READ_PROPERTY);
    encode_error_body(&mut apdu, ErrorInfo { class: 2, code: 32 });

    dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap();
    assert!(matches!(
        rx.await.unwrap(),
        Err(BacnetError::ProtocolError { class: 2, code: 32 })
    ));
    assert_eq!(metrics.snapshot().errors_received, 1);
}

#[tokio::test]
async fn test_undecodable_error_body_reaches_waiter() {
    let (table, _, dispatcher) = setup();
    let (id, rx) = table.begin(12, peer(), TIMEOUT).await.unwrap();

    let mut apdu = BytesMut::new();
    encode_error(&mut apdu, id, 12);
    apdu.extend_from_slice(&[0x91, 0x02]);

    assert_eq!(
        dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap(),
        Dispatched::Matched(id)
    );
    assert!(rx.await.unwrap().unwrap_err().is_codec_error());
}

#[tokio::test]
async fn test_truncated_reply_header_reaches_waiter() {
    let (table, metrics, dispatcher) = setup();
    let (error_id, error_rx) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    let (ack_id, ack_rx) = table.begin(12, peer(), TIMEOUT).await.unwrap();

    // error and complex ack cut right after the invoke id
    for apdu in [[0x50, error_id], [0x30, ack_id]] {
        let apdu = BytesMut::from(&apdu[..]);
        assert!(matches!(
            dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap(),
            Dispatched::Matched(_)
        ));
    }
    assert!(matches!(error_rx.await.unwrap(), Err(BacnetError::InvalidHeader(_))));
    assert!(matches!(ack_rx.await.unwrap(), Err(BacnetError::InvalidHeader(_))));
    assert_eq!(metrics.snapshot().errors_received, 2);
    assert!(table.is_empty().await);
}

#[tokio::test]
async fn test_reject_and_abort() {
    let (table, _, dispatcher) = setup();
    let (first, r1) = table.begin(12, peer(), TIMEOUT).await.unwrap();
    let (second, r2) = table.begin(12, peer(), TIMEOUT).await.unwrap();

    let mut reject = BytesMut::new();
    encode_reject(&mut reject, first, 4);
    let mut abort = BytesMut::new();
    encode_abort(&mut abort, true, second, 3);

    dispatcher.dispatch(&datagram(&abort), peer()).await.unwrap();
    dispatcher.dispatch(&datagram(&reject), peer()).await.unwrap();
    assert!(matches!(r1.await.unwrap(), Err(BacnetError::Rejected { reason: 4 })));
    assert!(matches!(r2.await.unwrap(), Err(BacnetError::Aborted { reason: 3 })));
}

#[tokio::test]
async fn test_segmented_ack_fails_waiter() {
    let (table, _, dispatcher) = setup();
    let (id, rx) = table.begin(14, peer(), TIMEOUT).await.unwrap();

    // complex ack, segmented with more to follow, sequence 0, window 4
    let apdu = BytesMut::from(&[0x3C, id, 0x00, 0x04, 14, 0x1E][..]);
    dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap();
    assert!(matches!(
        rx.await.unwrap(),
        Err(BacnetError::SegmentationNotSupported)
    ));
}

#[tokio::test]
async fn test_unconfirmed_handler() {
    let (_, metrics, dispatcher) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    dispatcher
        .register(unconfirmed_service::I_AM, move |source, body| {
            let (iam, _) = crate::service::discovery::decode_iam(body, 0)?;
            sink.lock().unwrap().push((source, iam));
            Ok(())
        })
        .unwrap();
    assert!(dispatcher.is_registered(unconfirmed_service::I_AM).unwrap());

    let iam = IAm {
        device_id: 47,
        max_apdu: 1476,
        segmentation: Segmentation::None,
        vendor_id: 7,
    };
    let mut apdu = BytesMut::new();
    encode_unconfirmed_request(&mut apdu, unconfirmed_service::I_AM);
    encode_iam(&mut apdu, &iam).unwrap();
    assert_eq!(
        dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap(),
        Dispatched::Unconfirmed(unconfirmed_service::I_AM)
    );
    assert_eq!(seen.lock().unwrap().as_slice(), &[(peer(), iam)]);

    // truncated announcement: handler fails, dispatch does not
    let mut bad = BytesMut::new();
    encode_unconfirmed_request(&mut bad, unconfirmed_service::I_AM);
    bad.extend_from_slice(&[0xC4, 0x02, 0x00]);
    assert!(dispatcher.dispatch(&datagram(&bad), peer()).await.is_ok());
    assert_eq!(metrics.snapshot().undecodable_datagrams, 1);
    assert_eq!(seen.lock().unwrap().len(), 1);

    dispatcher.clear().unwrap();
    assert!(!dispatcher.is_registered(unconfirmed_service::I_AM).unwrap());
    assert_eq!(
        dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap(),
        Dispatched::Ignored
    );
}

#[tokio::test]
async fn test_requests_to_a_server_are_ignored() {
    let (_, _, dispatcher) = setup();
    let mut apdu = BytesMut::new();
    encode_confirmed_request(&mut apdu, 9, confirmed_service::READ_PROPERTY, 5);
    assert_eq!(
        dispatcher.dispatch(&datagram(&apdu), peer()).await.unwrap(),
        Dispatched::Ignored
    );

    let mut who_is = BytesMut::new();
    encode_unconfirmed_request(&mut who_is, unconfirmed_service::WHO_IS);
    assert_eq!(
        dispatcher.dispatch(&datagram(&who_is), peer()).await.unwrap(),
        Dispatched::Ignored
    );
}

#[tokio::test]
async fn test_bad_header_is_an_error() {
    let (_, _, dispatcher) = setup();
    assert!(dispatcher.dispatch(&[0x82, 0x0A, 0x00, 0x04], peer()).await.is_err());

    let apdu = BytesMut::from(&[0x20, 0x01][..]);
    assert!(dispatcher.dispatch(&datagram(&apdu), peer()).await.is_err());
}
