//! # Error Types
//!
//! Error handling for the BACnet client stack.
//!
//! This module defines every failure the codec and the transaction engine can
//! report, from truncated tag headers up to Error-PDUs returned by a device.
//!
//! ## Error Categories
//! - **Codec Errors**: malformed tags, unbalanced context tags, unsupported tags
//! - **Engine Errors**: timeouts, cancellation, BACnet Error/Reject/Abort replies
//! - **Transport Errors**: socket failures and unusable addresses
//! - **Configuration Errors**: invalid settings
//!
//! Codec errors only abort the structure being decoded. Engine errors are
//! delivered to exactly one waiting caller and never affect other requests.
//!
//! ## Example Usage
//! ```rust
//! use bacnet_stack::error::{BacnetError, Result};
//! use bacnet_stack::core::primitive::decode_application;
//!
//! fn first_value(bytes: &[u8]) -> Result<String> {
//!     let (value, _len) = decode_application(bytes, 0)?;
//!     Ok(format!("{value:?}"))
//! }
//!
//! assert!(matches!(
//!     first_value(&[0x24, 0x01]),
//!     Err(BacnetError::MalformedTag { .. })
//! ));
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Frame validation errors
    pub const ERR_INVALID_BVLC: &str = "Invalid BVLC header";
    pub const ERR_INVALID_NPDU: &str = "Invalid NPDU header";
    pub const ERR_INVALID_APDU: &str = "Invalid APDU header";
    pub const ERR_TRUNCATED_FRAME: &str = "Frame shorter than its declared length";

    /// Encoding validation errors
    pub const ERR_OBJECT_TYPE_RANGE: &str = "Object type exceeds 10 bits";
    pub const ERR_INSTANCE_RANGE: &str = "Object instance exceeds 22 bits";
    pub const ERR_WHO_IS_LIMITS: &str = "Who-Is limits must be given together and within the instance range";
    pub const ERR_PRIORITY_RANGE: &str = "Write priority must be between 1 and 16";
    pub const ERR_BIT_COUNT: &str = "Bit count does not fit the backing bytes";

    /// Engine errors
    pub const ERR_LOCK_POISONED: &str = "Synchronization primitive poisoned";
}

// BacnetError is the primary error type for all codec and engine operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum BacnetError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Malformed tag at offset {offset}")]
    MalformedTag { offset: usize },

    #[error("Unbalanced context tags at offset {offset}")]
    UnbalancedContextTags { offset: usize },

    #[error("Unsupported tag: {tag}")]
    UnsupportedTag { tag: u8 },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Timeout occurred")]
    Timeout,

    #[error("Transaction cancelled")]
    Cancelled,

    #[error("BACnet error: class {class}, code {code}")]
    ProtocolError { class: u32, code: u32 },

    #[error("Request rejected: reason {reason}")]
    Rejected { reason: u8 },

    #[error("Request aborted: reason {reason}")]
    Aborted { reason: u8 },

    #[error("Segmented responses are not supported")]
    SegmentationNotSupported,

    #[error("Unexpected response")]
    UnexpectedResponse,

    #[error("No invoke id available")]
    NoInvokeIdAvailable,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl BacnetError {
    /// True for failures raised by the codec while walking tags.
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            BacnetError::MalformedTag { .. }
                | BacnetError::UnbalancedContextTags { .. }
                | BacnetError::UnsupportedTag { .. }
        )
    }
}

/// Type alias for Results using BacnetError
pub type Result<T> = std::result::Result<T, BacnetError>;
