#![no_main]

use bacnet_stack::core::apdu::decode_header;
use bacnet_stack::core::frame::parse_datagram;
use bacnet_stack::service::property::{decode_read_property_ack, decode_read_property_multiple_ack};
use libfuzzer_sys::fuzz_target;
use std::net::{Ipv4Addr, SocketAddr};

fuzz_target!(|data: &[u8]| {
    let source = SocketAddr::from((Ipv4Addr::new(192, 168, 1, 43), 47808));
    let Ok(Some(datagram)) = parse_datagram(data, source) else {
        return;
    };
    let Ok((_, header_len)) = decode_header(datagram.apdu) else {
        return;
    };
    let body = &datagram.apdu[header_len..];
    let _ = decode_read_property_ack(body, 0);
    let _ = decode_read_property_multiple_ack(body, 0);
});
