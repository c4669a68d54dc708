#![no_main]

use bacnet_stack::core::primitive::decode_application;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // walk the buffer as a value list until a value fails
    let mut offset = 0;
    while offset < data.len() {
        match decode_application(data, offset) {
            Ok((_, used)) if used > 0 => offset += used,
            _ => break,
        }
    }
});
