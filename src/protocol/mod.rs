//! # Transaction Engine
//!
//! Correlates confirmed requests with their replies and fans unsolicited
//! announcements out to subscribers.
//!
//! ## Components
//! - **Transaction**: pending table keyed by invoke id, timeout sweep, cancellation
//! - **Dispatcher**: routes each inbound datagram to a handler or a waiter
//! - **Client**: public operations over a [`Transport`](crate::transport::Transport)
//!
//! ## Request Lifecycle
//! ```text
//! Idle -> Sent -> Acknowledged | TimedOut | Errored | Cancelled
//! ```
//!
//! Replies are matched by invoke id alone. A reply nobody waits for is
//! dropped; a reply whose body cannot be decoded still resolves its waiter,
//! with the decode error.

pub mod client;
pub mod dispatcher;
pub mod transaction;

pub use client::{Client, IAmEvent};
pub use dispatcher::{Dispatched, Dispatcher};
pub use transaction::{Outcome, Reply, TransactionTable};

#[cfg(test)]
mod tests;
