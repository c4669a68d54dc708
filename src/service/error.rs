//! Error service body: error class and error code.

use crate::core::primitive::encode_application_enumerated;
use crate::core::reader::TagReader;
use crate::core::types::ErrorInfo;
use crate::error::Result;
use bytes::BytesMut;

pub mod error_class {
    pub const DEVICE: u32 = 0;
    pub const OBJECT: u32 = 1;
    pub const PROPERTY: u32 = 2;
    pub const RESOURCES: u32 = 3;
    pub const SECURITY: u32 = 4;
    pub const SERVICES: u32 = 5;
    pub const VT: u32 = 6;
    pub const COMMUNICATION: u32 = 7;
}

pub fn encode_error(buf: &mut BytesMut, error: ErrorInfo) -> usize {
    encode_application_enumerated(buf, error.class) + encode_application_enumerated(buf, error.code)
}

pub fn decode_error(buf: &[u8], offset: usize) -> Result<(ErrorInfo, usize)> {
    let mut reader = TagReader::new(buf, offset);
    let class = reader.application_enumerated()?;
    let code = reader.application_enumerated()?;
    Ok((ErrorInfo { class, code }, reader.finish()?))
}
