//! # Client Engine
//!
//! [`Client`] owns a transport and two background tasks: a receive loop that
//! hands every inbound datagram to the [`Dispatcher`] in arrival order, and a
//! sweeper that fails expired transactions with `Timeout`.
//!
//! Confirmed operations allocate an invoke id, send the request and wait on
//! the transaction's outcome. Unconfirmed operations send and return.
//! I-Am announcements are fanned out to [`Client::subscribe_iam`] receivers
//! once the first Who-Is has registered the discovery listener.
//!
//! ```rust,no_run
//! use bacnet_stack::config::ClientConfig;
//! use bacnet_stack::protocol::Client;
//!
//! # async fn run() -> bacnet_stack::error::Result<()> {
//! let client = Client::bind(ClientConfig::default()).await?;
//! let mut devices = client.subscribe_iam()?;
//! client.who_is(None, None, None).await?;
//!
//! let event = devices.recv().await;
//! println!("{event:?}");
//!
//! let ack = client
//!     .read_property("192.168.1.43", 8, 1234, 77, None)
//!     .await?;
//! println!("{:?}", ack.value_list);
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::ClientConfig;
use crate::core::apdu::{
    confirmed_service, encode_confirmed_request, encode_unconfirmed_request, max_apdu_code,
    unconfirmed_service,
};
use crate::core::frame::frame_apdu;
use crate::core::identity::{resolve_peer, ObjectIdentifier};
use crate::core::types::{
    BacnetValue, PropertyReference, ReadAccessResult, ReadAccessSpecification, Segmentation,
};
use crate::error::{BacnetError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::transaction::{Reply, TransactionTable};
use crate::service::device::{
    encode_device_communication_control, encode_reinitialize_device,
    encode_time_synchronization, DeviceCommunicationControl, ReinitializeDevice,
};
use crate::service::discovery::{decode_iam, encode_who_is, WhoIs};
use crate::service::property::{
    decode_read_property_ack, decode_read_property_multiple_ack, encode_read_property,
    encode_read_property_multiple, encode_write_property, ReadPropertyAck, ReadPropertyRequest,
    WritePropertyRequest,
};
use crate::transport::{Transport, UdpTransport};
use crate::utils::metrics::{Metrics, MetricsSnapshot};
use bytes::{BufMut, BytesMut};
use chrono::NaiveDateTime;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// A device that answered with I-Am.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IAmEvent {
    pub address: SocketAddr,
    pub device_id: u32,
    pub max_apdu: u32,
    pub segmentation: Segmentation,
    pub vendor_id: u32,
}

pub struct Client<T: Transport> {
    transport: Arc<T>,
    config: ClientConfig,
    broadcast_target: SocketAddr,
    max_apdu_code: u8,
    table: Arc<TransactionTable>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    discovery: Mutex<Option<broadcast::Sender<IAmEvent>>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Client<UdpTransport> {
    /// Bind a UDP socket per `config` and start a client on it.
    pub async fn bind(config: ClientConfig) -> Result<Self> {
        let transport = UdpTransport::from_config(&config).await?;
        Self::new(transport, config)
    }
}

impl<T: Transport> Client<T> {
    /// Start a client on `transport`. Must be called within a tokio runtime.
    pub fn new(transport: T, config: ClientConfig) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(BacnetError::ConfigError(errors.join("; ")));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BacnetError::ConfigError(format!("no tokio runtime: {e}")))?;

        let broadcast_target = config.broadcast_target()?;
        let max_apdu_code = max_apdu_code(config.max_apdu)?;
        let transport = Arc::new(transport);
        let table = Arc::new(TransactionTable::new());
        let metrics = Arc::new(Metrics::new());
        let dispatcher = Arc::new(Dispatcher::new(table.clone(), metrics.clone()));
        let (discovery, _) = broadcast::channel(config.discovery_capacity);
        let shutdown = CancellationToken::new();

        let receiver = runtime.spawn(receive_loop(
            transport.clone(),
            dispatcher.clone(),
            metrics.clone(),
            shutdown.clone(),
        ));
        let sweeper = runtime.spawn(sweep_loop(
            table.clone(),
            metrics.clone(),
            config.sweep_interval,
            shutdown.clone(),
        ));

        info!(
            local = ?transport.local_addr().ok(),
            broadcast = %broadcast_target,
            timeout_ms = config.apdu_timeout.as_millis() as u64,
            "BACnet client started"
        );

        Ok(Self {
            transport,
            config,
            broadcast_target,
            max_apdu_code,
            table,
            dispatcher,
            metrics,
            discovery: Mutex::new(Some(discovery)),
            shutdown,
            tasks: Mutex::new(vec![receiver, sweeper]),
        })
    }

    /// Receive I-Am events. The stream ends when the client shuts down.
    pub fn subscribe_iam(&self) -> Result<broadcast::Receiver<IAmEvent>> {
        let discovery = self.discovery.lock().map_err(|_| BacnetError::Cancelled)?;
        let receiver = discovery.as_ref().map(broadcast::Sender::subscribe);
        receiver.ok_or(BacnetError::Cancelled)
    }

    /// Send Who-Is, broadcast unless `address` is given. Answers arrive as
    /// I-Am events.
    #[instrument(skip(self))]
    pub async fn who_is(
        &self,
        low_limit: Option<u32>,
        high_limit: Option<u32>,
        address: Option<&str>,
    ) -> Result<()> {
        let target = self.resolve_optional(address).await?;
        let mut body = BytesMut::with_capacity(10);
        encode_who_is(
            &mut body,
            &WhoIs {
                low_limit,
                high_limit,
            },
        )?;
        self.ensure_discovery_listener()?;
        self.send_unconfirmed(target, unconfirmed_service::WHO_IS, &body)
            .await
    }

    #[instrument(skip(self))]
    pub async fn read_property(
        &self,
        address: &str,
        object_type: u16,
        instance: u32,
        property_id: u32,
        array_index: Option<u32>,
    ) -> Result<ReadPropertyAck> {
        let peer = self.resolve(address).await?;
        let property = match array_index {
            Some(index) => PropertyReference::with_index(property_id, index),
            None => PropertyReference::new(property_id),
        };
        let request = ReadPropertyRequest {
            object_identifier: ObjectIdentifier::new(object_type, instance)?,
            property,
        };
        let mut body = BytesMut::with_capacity(16);
        encode_read_property(&mut body, &request);

        let reply = self
            .confirmed(peer, confirmed_service::READ_PROPERTY, &body)
            .await?;
        let (ack, _) = decode_read_property_ack(&complex_body(reply)?, 0)?;
        Ok(ack)
    }

    #[instrument(skip(self, values))]
    pub async fn write_property(
        &self,
        address: &str,
        object_type: u16,
        instance: u32,
        property_id: u32,
        priority: u8,
        values: Vec<BacnetValue>,
    ) -> Result<()> {
        let peer = self.resolve(address).await?;
        let request = WritePropertyRequest {
            object_identifier: ObjectIdentifier::new(object_type, instance)?,
            property: PropertyReference::new(property_id),
            value_list: values,
            priority,
        };
        let mut body = BytesMut::with_capacity(32);
        encode_write_property(&mut body, &request)?;

        let reply = self
            .confirmed(peer, confirmed_service::WRITE_PROPERTY, &body)
            .await?;
        simple_ack(reply)
    }

    #[instrument(skip(self, specifications), fields(objects = specifications.len()))]
    pub async fn read_property_multiple(
        &self,
        address: &str,
        specifications: &[ReadAccessSpecification],
    ) -> Result<Vec<ReadAccessResult>> {
        let peer = self.resolve(address).await?;
        let mut body = BytesMut::with_capacity(64);
        encode_read_property_multiple(&mut body, specifications);

        let reply = self
            .confirmed(peer, confirmed_service::READ_PROPERTY_MULTIPLE, &body)
            .await?;
        let (results, _) = decode_read_property_multiple_ack(&complex_body(reply)?, 0)?;
        Ok(results)
    }

    #[instrument(skip(self, password))]
    pub async fn device_communication_control(
        &self,
        address: &str,
        time_duration: Option<u32>,
        enable_disable: u32,
        password: Option<&str>,
    ) -> Result<()> {
        let peer = self.resolve(address).await?;
        let request = DeviceCommunicationControl {
            time_duration,
            enable_disable,
            password: password.map(str::to_string),
        };
        let mut body = BytesMut::with_capacity(24);
        encode_device_communication_control(&mut body, &request);

        let reply = self
            .confirmed(peer, confirmed_service::DEVICE_COMMUNICATION_CONTROL, &body)
            .await?;
        simple_ack(reply)
    }

    #[instrument(skip(self, password))]
    pub async fn reinitialize_device(
        &self,
        address: &str,
        state: u32,
        password: Option<&str>,
    ) -> Result<()> {
        let peer = self.resolve(address).await?;
        let request = ReinitializeDevice {
            state,
            password: password.map(str::to_string),
        };
        let mut body = BytesMut::with_capacity(24);
        encode_reinitialize_device(&mut body, &request);

        let reply = self
            .confirmed(peer, confirmed_service::REINITIALIZE_DEVICE, &body)
            .await?;
        simple_ack(reply)
    }

    /// Send Time-Synchronization, broadcast unless `address` is given.
    #[instrument(skip(self))]
    pub async fn time_synchronization(
        &self,
        address: Option<&str>,
        datetime: NaiveDateTime,
    ) -> Result<()> {
        let target = self.resolve_optional(address).await?;
        let mut body = BytesMut::with_capacity(10);
        encode_time_synchronization(&mut body, datetime)?;
        self.send_unconfirmed(target, unconfirmed_service::TIME_SYNCHRONIZATION, &body)
            .await
    }

    /// Fail every pending request with `Cancelled`, end the discovery
    /// stream and stop the background tasks. Later requests fail with
    /// `Cancelled`.
    pub async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();

        let cancelled = self.table.cancel_all().await;
        self.metrics.cancelled(cancelled as u64);
        {
            // sender first, under the lock ensure_discovery_listener holds
            let mut discovery = match self.discovery.lock() {
                Ok(discovery) => discovery,
                Err(poisoned) => poisoned.into_inner(),
            };
            drop(discovery.take());
            if let Err(e) = self.dispatcher.clear() {
                warn!(error = %e, "Failed to clear service handlers");
            }
        }

        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for result in join_all(tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        self.metrics.log_metrics();
        info!(cancelled, "BACnet client shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of confirmed requests awaiting a reply.
    pub async fn pending_transactions(&self) -> usize {
        self.table.len().await
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn resolve(&self, address: &str) -> Result<SocketAddr> {
        resolve_peer(address, self.config.port).await
    }

    async fn resolve_optional(&self, address: Option<&str>) -> Result<Option<SocketAddr>> {
        match address {
            Some(address) => self.resolve(address).await.map(Some),
            None => Ok(None),
        }
    }

    /// Register the I-Am handler once. The discovery lock is held across
    /// registration so `shutdown` cannot interleave with it.
    fn ensure_discovery_listener(&self) -> Result<()> {
        let discovery = self.discovery.lock().map_err(|_| BacnetError::Cancelled)?;
        let sender = discovery.clone().ok_or(BacnetError::Cancelled)?;
        if self.dispatcher.is_registered(unconfirmed_service::I_AM)? {
            return Ok(());
        }
        let metrics = self.metrics.clone();

        self.dispatcher
            .register(unconfirmed_service::I_AM, move |peer, body| {
                let (iam, _) = decode_iam(body, 0)?;
                let event = IAmEvent {
                    address: peer,
                    device_id: iam.device_id,
                    max_apdu: iam.max_apdu,
                    segmentation: iam.segmentation,
                    vendor_id: iam.vendor_id,
                };
                metrics.iam_event();
                debug!(device_id = iam.device_id, %peer, "I-Am received");
                // no subscribers is not an error
                let _ = sender.send(event);
                Ok(())
            })?;
        drop(discovery);
        debug!("Discovery listener registered");
        Ok(())
    }

    async fn send_unconfirmed(
        &self,
        target: Option<SocketAddr>,
        service: u8,
        body: &[u8],
    ) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(BacnetError::Cancelled);
        }
        let mut apdu = BytesMut::with_capacity(2 + body.len());
        encode_unconfirmed_request(&mut apdu, service);
        apdu.put_slice(body);

        let destination = target.unwrap_or(self.broadcast_target);
        let frame = frame_apdu(target.is_none(), false, &apdu)?;
        self.transport.send(&frame, destination).await?;
        self.metrics.broadcast_sent(frame.len() as u64);
        debug!(service, %destination, "Unconfirmed request sent");
        Ok(())
    }

    /// Send a confirmed request and wait for its outcome.
    async fn confirmed(&self, peer: SocketAddr, service: u8, body: &[u8]) -> Result<Reply> {
        if self.shutdown.is_cancelled() {
            return Err(BacnetError::Cancelled);
        }
        let (invoke_id, outcome) = self
            .table
            .begin(service, peer, self.config.apdu_timeout)
            .await?;

        let mut apdu = BytesMut::with_capacity(4 + body.len());
        encode_confirmed_request(&mut apdu, invoke_id, service, self.max_apdu_code);
        apdu.put_slice(body);

        let sent = match frame_apdu(false, true, &apdu) {
            Ok(frame) => self.transport.send(&frame, peer).await.map(|_| frame.len()),
            Err(e) => Err(e),
        };
        match sent {
            Ok(bytes) => self.metrics.request_sent(bytes as u64),
            Err(e) => {
                self.table.abandon(invoke_id).await;
                return Err(e);
            }
        }
        debug!(invoke_id, service, %peer, "Confirmed request sent");

        let reply = outcome.await.map_err(|_| BacnetError::Cancelled)??;
        if reply.service() != service {
            warn!(invoke_id, expected = service, got = reply.service(), "Ack for another service");
            return Err(BacnetError::UnexpectedResponse);
        }
        Ok(reply)
    }
}

impl<T: Transport> Drop for Client<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn complex_body(reply: Reply) -> Result<Vec<u8>> {
    match reply {
        Reply::ComplexAck { body, .. } => Ok(body),
        Reply::SimpleAck { .. } => Err(BacnetError::UnexpectedResponse),
    }
}

fn simple_ack(reply: Reply) -> Result<()> {
    match reply {
        Reply::SimpleAck { .. } => Ok(()),
        Reply::ComplexAck { .. } => Err(BacnetError::UnexpectedResponse),
    }
}

async fn receive_loop<T: Transport>(
    transport: Arc<T>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = transport.recv() => match received {
                Ok((datagram, source)) => {
                    metrics.datagram_received(datagram.len() as u64);
                    if let Err(e) = dispatcher.dispatch(&datagram, source).await {
                        metrics.undecodable();
                        warn!(%source, error = %e, "Dropping undecodable datagram");
                    }
                }
                Err(BacnetError::Io(e)) => {
                    warn!(error = %e, "Receive failed");
                }
                Err(e) => {
                    warn!(error = %e, "Transport closed, stopping receive loop");
                    break;
                }
            }
        }
    }
    debug!("Receive loop stopped");
}

async fn sweep_loop(
    table: Arc<TransactionTable>,
    metrics: Arc<Metrics>,
    period: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let expired = table.sweep_expired(Instant::now()).await;
                if expired > 0 {
                    metrics.timed_out(expired as u64);
                }
            }
        }
    }
    let cancelled = table.cancel_all().await;
    metrics.cancelled(cancelled as u64);
    debug!("Timeout sweeper stopped");
}
