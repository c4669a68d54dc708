use crate::core::apdu::{decode_header, reply_invoke_id, ApduHeader};
use crate::core::frame::parse_datagram;
use crate::error::{constants, BacnetError, Result};
use crate::protocol::transaction::{Reply, TransactionTable};
use crate::service::error::decode_error;
use crate::utils::metrics::Metrics;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tracing::{debug, trace, warn};

type HandlerFn = dyn Fn(SocketAddr, &[u8]) -> Result<()> + Send + Sync + 'static;

/// What became of one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// Nothing for the client: BVLC management, network messages, requests
    /// addressed to a server, or an unconfirmed service with no handler.
    Ignored,
    /// Handed to the handler registered for this unconfirmed service.
    Unconfirmed(u8),
    /// Delivered to the pending transaction with this invoke id.
    Matched(u8),
    /// A reply whose invoke id has no pending transaction.
    Unmatched(u8),
}

/// Routes inbound datagrams: unconfirmed services to registered handlers,
/// replies to the transaction table by invoke id.
pub struct Dispatcher {
    handlers: RwLock<HashMap<u8, Box<HandlerFn>>>,
    table: Arc<TransactionTable>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(table: Arc<TransactionTable>, metrics: Arc<Metrics>) -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            table,
            metrics,
        }
    }

    /// Register the handler for an unconfirmed service, replacing any earlier one.
    pub fn register<F>(&self, service: u8, handler: F) -> Result<()>
    where
        F: Fn(SocketAddr, &[u8]) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| BacnetError::TransportError(constants::ERR_LOCK_POISONED.to_string()))?;
        handlers.insert(service, Box::new(handler));
        Ok(())
    }

    pub fn is_registered(&self, service: u8) -> Result<bool> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| BacnetError::TransportError(constants::ERR_LOCK_POISONED.to_string()))?;
        Ok(handlers.contains_key(&service))
    }

    /// Drop every handler.
    pub fn clear(&self) -> Result<()> {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| BacnetError::TransportError(constants::ERR_LOCK_POISONED.to_string()))?;
        handlers.clear();
        Ok(())
    }

    /// Decode one datagram and route it.
    ///
    /// Fails only when the frame or APDU header cannot be decoded and no
    /// waiter can be named. A reply whose header or body is broken but whose
    /// invoke id is readable is delivered to its waiter, as a failure.
    pub async fn dispatch(&self, datagram: &[u8], source: SocketAddr) -> Result<Dispatched> {
        let Some(frame) = parse_datagram(datagram, source)? else {
            return Ok(Dispatched::Ignored);
        };
        let (header, header_len) = match decode_header(frame.apdu) {
            Ok(decoded) => decoded,
            Err(e) => return self.fail_broken_reply(frame.apdu, frame.peer, e).await,
        };
        let body = &frame.apdu[header_len..];
        let peer = frame.peer;

        let (invoke_id, outcome) = match header {
            ApduHeader::UnconfirmedRequest { service } => {
                return self.dispatch_unconfirmed(service, peer, body);
            }
            ApduHeader::ConfirmedRequest { service, .. } => {
                trace!(service, %peer, "Ignoring confirmed request");
                return Ok(Dispatched::Ignored);
            }
            ApduHeader::SegmentAck { invoke_id, .. } => {
                trace!(invoke_id, %peer, "Ignoring segment ack");
                return Ok(Dispatched::Ignored);
            }
            ApduHeader::SimpleAck { invoke_id, service } => {
                (invoke_id, Ok(Reply::SimpleAck { service }))
            }
            ApduHeader::ComplexAck {
                segmented: true,
                invoke_id,
                ..
            } => (invoke_id, Err(BacnetError::SegmentationNotSupported)),
            ApduHeader::ComplexAck {
                invoke_id, service, ..
            } => (
                invoke_id,
                Ok(Reply::ComplexAck {
                    service,
                    body: body.to_vec(),
                }),
            ),
            ApduHeader::Error { invoke_id, .. } => {
                let outcome = match decode_error(body, 0) {
                    Ok((info, _)) => Err(BacnetError::ProtocolError {
                        class: info.class,
                        code: info.code,
                    }),
                    Err(e) => Err(e),
                };
                (invoke_id, outcome)
            }
            ApduHeader::Reject { invoke_id, reason } => {
                (invoke_id, Err(BacnetError::Rejected { reason }))
            }
            ApduHeader::Abort {
                invoke_id, reason, ..
            } => (invoke_id, Err(BacnetError::Aborted { reason })),
        };

        let is_ack = outcome.is_ok();
        if self.table.complete(invoke_id, outcome).await {
            if is_ack {
                self.metrics.ack_matched();
            } else {
                self.metrics.error_received();
            }
            Ok(Dispatched::Matched(invoke_id))
        } else {
            self.metrics.unmatched_dropped();
            debug!(invoke_id, %peer, "Dropping reply with no pending transaction");
            Ok(Dispatched::Unmatched(invoke_id))
        }
    }

    /// Hand a header decode failure to the waiter named by the reply's
    /// invoke id. Without a waiter the error goes back to the caller.
    async fn fail_broken_reply(
        &self,
        apdu: &[u8],
        peer: SocketAddr,
        error: BacnetError,
    ) -> Result<Dispatched> {
        let Some(invoke_id) = reply_invoke_id(apdu) else {
            return Err(error);
        };
        if self.table.complete(invoke_id, Err(error)).await {
            self.metrics.error_received();
            warn!(invoke_id, %peer, "Reply header truncated");
            Ok(Dispatched::Matched(invoke_id))
        } else {
            Err(BacnetError::InvalidHeader(
                constants::ERR_INVALID_APDU.to_string(),
            ))
        }
    }

    fn dispatch_unconfirmed(&self, service: u8, peer: SocketAddr, body: &[u8]) -> Result<Dispatched> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| BacnetError::TransportError(constants::ERR_LOCK_POISONED.to_string()))?;

        match handlers.get(&service) {
            Some(handler) => {
                if let Err(e) = handler(peer, body) {
                    self.metrics.undecodable();
                    warn!(service, %peer, error = %e, "Unconfirmed service handler failed");
                }
                Ok(Dispatched::Unconfirmed(service))
            }
            None => {
                trace!(service, %peer, "No handler for unconfirmed service");
                Ok(Dispatched::Ignored)
            }
        }
    }
}
