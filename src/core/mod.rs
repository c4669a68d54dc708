//! # Core Codec Components
//!
//! Tag-length-value encoding of BACnet values and the wire layers around it.
//!
//! ## Components
//! - **Tag**: tag header with extended tag numbers and extended lengths
//! - **Primitive**: minimal-width encoders/decoders for every scalar kind
//! - **Reader**: cursor that tracks opening/closing context tags
//! - **APDU / Frame**: application headers, NPDU and BACnet/IP BVLC
//!
//! ## Tag Header
//! ```text
//! [number(4) | class(1) | length/value/type(3)] [ext number] [ext length]
//! ```
//!
//! Decoders never trust declared lengths: every read is bounds-checked and a
//! length that runs past the input fails with `MalformedTag`.

pub mod apdu;
pub mod frame;
pub mod identity;
pub mod primitive;
pub mod reader;
pub mod tag;
pub mod types;
