//! # Service Codecs
//!
//! Encoders and decoders for whole service bodies, built on the primitive
//! codec. None of these structures carries an overall length: a decoder
//! learns where a body ends by walking its tags to the matching closers, so
//! every `decode_*` returns the value together with the exact number of
//! bytes consumed.
//!
//! ## Services
//! - **discovery**: Who-Is, I-Am, Who-Has
//! - **property**: Read-Property, Write-Property, Read-Property-Multiple
//! - **cov**: COV subscription entries
//! - **device**: Device-Communication-Control, Reinitialize-Device, Time-Synchronization
//! - **error**: Error-PDU body

pub mod cov;
pub mod device;
pub mod discovery;
pub mod error;
pub mod property;
