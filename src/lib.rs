//! # BACnet Stack
//!
//! A BACnet/IP client: discover devices, read and write their properties,
//! and run the administrative services, over an unreliable datagram
//! transport.
//!
//! ## Layers
//! - [`core`]: tag-length-value codec for primitive values, APDU headers,
//!   NPDU and BVLC framing, object identifiers and addresses
//! - [`service`]: encoders and decoders for whole service bodies
//! - [`protocol`]: the transaction engine; invoke id allocation, reply
//!   matching, timeouts and I-Am fan-out
//! - [`transport`]: the datagram contract plus UDP and in-process
//!   implementations
//!
//! ## Example
//! ```rust,no_run
//! use bacnet_stack::config::BacnetConfig;
//! use bacnet_stack::protocol::Client;
//! use bacnet_stack::utils::logging::init_logging;
//!
//! # async fn run() -> bacnet_stack::error::Result<()> {
//! let config = BacnetConfig::from_env()?;
//! init_logging(&config.logging)?;
//!
//! let client = Client::bind(config.client).await?;
//! let results = client
//!     .read_property_multiple("192.168.1.43", &[])
//!     .await?;
//! println!("{results:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use crate::core::identity::{BacnetAddress, ObjectIdentifier};
pub use crate::core::types::{
    BacnetValue, CovSubscription, PropertyReference, PropertyValue, ReadAccessResult,
    ReadAccessSpecification,
};
pub use crate::error::{BacnetError, Result};
pub use crate::protocol::{Client, IAmEvent};
