//! # Pending Transactions
//!
//! Table of confirmed requests awaiting a reply, keyed by invoke id.
//!
//! A transaction leaves the table exactly once: when its reply is matched,
//! when the sweeper finds its deadline passed, or when the table is closed.
//! All three paths remove the entry under the same lock, so whichever acts
//! first delivers the outcome and the others find nothing to do.
//!
//! Invoke ids come from a cyclic counter seeded randomly. The allocator skips
//! ids that are still pending, so two live requests never share an id.

use crate::error::{BacnetError, Result};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Number of distinct invoke ids.
pub const INVOKE_ID_SPACE: usize = 256;

/// Successful reply to a confirmed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    SimpleAck { service: u8 },
    ComplexAck { service: u8, body: Vec<u8> },
}

impl Reply {
    pub fn service(&self) -> u8 {
        match self {
            Reply::SimpleAck { service } | Reply::ComplexAck { service, .. } => *service,
        }
    }
}

/// What a waiting caller eventually receives.
pub type Outcome = Result<Reply>;

#[derive(Debug)]
struct PendingTransaction {
    service: u8,
    peer: SocketAddr,
    deadline: Instant,
    sink: oneshot::Sender<Outcome>,
}

#[derive(Debug)]
struct TableState {
    pending: HashMap<u8, PendingTransaction>,
    next_id: u8,
    closed: bool,
}

#[derive(Debug)]
pub struct TransactionTable {
    inner: Mutex<TableState>,
}

impl Default for TransactionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::with_first_id(rand::random::<u8>())
    }

    /// Start the invoke id counter at `first_id`.
    pub fn with_first_id(first_id: u8) -> Self {
        Self {
            inner: Mutex::new(TableState {
                pending: HashMap::with_capacity(16),
                next_id: first_id,
                closed: false,
            }),
        }
    }

    /// Register a transaction. Returns its invoke id and the receiver its
    /// outcome will be delivered on.
    pub async fn begin(
        &self,
        service: u8,
        peer: SocketAddr,
        timeout: Duration,
    ) -> Result<(u8, oneshot::Receiver<Outcome>)> {
        let mut state = self.inner.lock().await;
        if state.closed {
            return Err(BacnetError::Cancelled);
        }
        if state.pending.len() >= INVOKE_ID_SPACE {
            return Err(BacnetError::NoInvokeIdAvailable);
        }

        let mut invoke_id = state.next_id;
        while state.pending.contains_key(&invoke_id) {
            invoke_id = invoke_id.wrapping_add(1);
        }
        state.next_id = invoke_id.wrapping_add(1);

        let (sink, receiver) = oneshot::channel();
        state.pending.insert(
            invoke_id,
            PendingTransaction {
                service,
                peer,
                deadline: Instant::now() + timeout,
                sink,
            },
        );
        trace!(invoke_id, service, %peer, "Transaction registered");
        Ok((invoke_id, receiver))
    }

    /// Deliver `outcome` to the transaction with `invoke_id`. Returns false
    /// when no such transaction is pending.
    pub async fn complete(&self, invoke_id: u8, outcome: Outcome) -> bool {
        let entry = self.inner.lock().await.pending.remove(&invoke_id);
        match entry {
            Some(tx) => {
                trace!(invoke_id, service = tx.service, peer = %tx.peer, "Transaction completed");
                // the caller may have stopped waiting
                let _ = tx.sink.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a transaction without notifying its caller.
    pub async fn abandon(&self, invoke_id: u8) {
        self.inner.lock().await.pending.remove(&invoke_id);
    }

    /// Fail every transaction whose deadline is at or before `now` with
    /// `Timeout`. Returns how many expired.
    pub async fn sweep_expired(&self, now: Instant) -> usize {
        let expired: Vec<(u8, PendingTransaction)> = {
            let mut state = self.inner.lock().await;
            let ids: Vec<u8> = state
                .pending
                .iter()
                .filter(|(_, tx)| tx.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.pending.remove(&id).map(|tx| (id, tx)))
                .collect()
        };

        for (invoke_id, tx) in &expired {
            debug!(invoke_id, service = tx.service, peer = %tx.peer, "Transaction timed out");
        }
        let count = expired.len();
        for (_, tx) in expired {
            let _ = tx.sink.send(Err(BacnetError::Timeout));
        }
        count
    }

    /// Close the table and fail everything pending with `Cancelled`. Later
    /// calls to [`begin`](Self::begin) fail with `Cancelled` too.
    pub async fn cancel_all(&self) -> usize {
        let drained: Vec<PendingTransaction> = {
            let mut state = self.inner.lock().await;
            state.closed = true;
            state.pending.drain().map(|(_, tx)| tx).collect()
        };
        let count = drained.len();
        for tx in drained {
            let _ = tx.sink.send(Err(BacnetError::Cancelled));
        }
        if count > 0 {
            debug!(count, "Cancelled pending transactions");
        }
        count
    }

    pub async fn is_pending(&self, invoke_id: u8) -> bool {
        self.inner.lock().await.pending.contains_key(&invoke_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
