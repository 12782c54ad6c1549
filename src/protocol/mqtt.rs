// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker client built on `rumqttc`.
//!
//! Every [`MqttClient`] owns one `rumqttc` connection. Connecting spawns an
//! event-loop task that dispatches inbound publishes to the stored handlers;
//! disconnecting stops that task. A subscribe completes only once the broker
//! has granted it in its SUBACK. Stored subscriptions are replayed on
//! every connect, so a disconnected client can later resume exactly where it
//! left off.
//!
//! # Examples
//!
//! ```no_run
//! use devrep::protocol::{BrokerClient, ConnectionOptions, Connector, MqttConnector, handler};
//!
//! # async fn example() -> devrep::Result<()> {
//! let connector = MqttConnector::new("tcp://192.168.0.102:1883")?;
//! let client = connector.open(&ConnectionOptions::stable_network()).await?;
//!
//! client
//!     .subscribe("homey/#", handler(|topic, payload, _| println!("{topic}: {payload}")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, SubAck, SubscribeReasonCode};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use crate::error::ProtocolError;
use crate::outcome::Outcome;
use crate::protocol::{BrokerClient, ConnectionOptions, Connector, HandlerTable, MessageHandler};
use crate::types::{QoS, topic};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Capacity of the request channel between a client and its event loop.
const REQUEST_CAPACITY: usize = 10;

/// Delay between reconnection attempts after a dropped connection.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long a disconnect waits for the event loop to flush the DISCONNECT packet.
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

/// Opens [`MqttClient`] connections to one broker.
///
/// # Examples
///
/// ```
/// use devrep::protocol::MqttConnector;
///
/// let connector = MqttConnector::new("mqtt://broker.local:8883").unwrap();
/// assert_eq!(connector.host(), "broker.local");
/// assert_eq!(connector.port(), 8883);
/// ```
#[derive(Debug, Clone)]
pub struct MqttConnector {
    host: String,
    port: u16,
}

impl MqttConnector {
    /// Creates a connector for the broker at `broker_url`.
    ///
    /// Accepts `mqtt://host:port`, `tcp://host:port` or a bare `host[:port]`.
    /// The port defaults to 1883.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if the host is missing or the
    /// port is not a number.
    pub fn new(broker_url: &str) -> Result<Self, ProtocolError> {
        let (host, port) = parse_mqtt_url(broker_url)?;
        Ok(Self { host, port })
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    fn mqtt_options(&self, client_id: &str, options: &ConnectionOptions) -> MqttOptions {
        let mut mqtt_options = MqttOptions::new(client_id, &self.host, self.port);
        mqtt_options.set_keep_alive(options.keep_alive());
        mqtt_options.set_clean_session(options.clean_session);
        mqtt_options.set_inflight(options.max_in_flight);

        if let Some(credentials) = options.usable_credentials() {
            mqtt_options.set_credentials(&credentials.username, &credentials.password);
        }

        if let Some(will) = &options.last_will {
            mqtt_options.set_last_will(rumqttc::LastWill::new(
                &will.topic,
                will.payload.as_bytes().to_vec(),
                rumqttc::QoS::ExactlyOnce,
                true,
            ));
        }

        mqtt_options
    }
}

impl Connector for MqttConnector {
    type Client = MqttClient;

    async fn open(&self, options: &ConnectionOptions) -> crate::Result<MqttClient> {
        options.validate()?;

        // PID + counter keeps ids unique across processes sharing a broker
        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("devrep_{}_{}", std::process::id(), counter);

        tracing::debug!(
            client_id = %client_id,
            host = %self.host,
            port = %self.port,
            "Created MQTT client"
        );

        Ok(MqttClient {
            mqtt_options: self.mqtt_options(&client_id, options),
            shared: Arc::new(Shared {
                client_id,
                handlers: HandlerTable::new(),
                connected: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                qos: options.qos,
            }),
            connection_timeout: options.connection_timeout(),
            auto_reconnect: options.auto_reconnect,
            session: Mutex::new(None),
        })
    }
}

/// State shared between a client and its event-loop task.
struct Shared {
    client_id: String,
    handlers: HandlerTable,
    connected: AtomicBool,
    closed: AtomicBool,
    qos: QoS,
}

/// A live connection: the request side and the task polling the event loop.
struct Session {
    client: AsyncClient,
    acks: Arc<parking_lot::Mutex<SubAckWaiters>>,
    task: JoinHandle<()>,
    stopping: Arc<AtomicBool>,
}

/// Matches SUBACKs to the subscribe requests that are waiting for them.
///
/// The event loop reports each SUBSCRIBE it writes with the packet id it
/// chose, in request order. Requests are queued in that same order, so the
/// front of `queued` always belongs to the next outgoing SUBSCRIBE.
#[derive(Debug, Default)]
struct SubAckWaiters {
    queued: VecDeque<Option<oneshot::Sender<bool>>>,
    in_flight: HashMap<u16, oneshot::Sender<bool>>,
}

impl SubAckWaiters {
    /// The event loop wrote the next queued SUBSCRIBE with `pkid`.
    fn sent(&mut self, pkid: u16) {
        if let Some(Some(waiter)) = self.queued.pop_front() {
            self.in_flight.insert(pkid, waiter);
        }
    }

    /// The broker answered `pkid`.
    fn acked(&mut self, pkid: u16, granted: bool) {
        if let Some(waiter) = self.in_flight.remove(&pkid) {
            let _ = waiter.send(granted);
        }
    }

    /// The connection dropped: SUBSCRIBEs already written will not be answered.
    ///
    /// Queued requests are still in the channel and go out after a reconnect.
    fn connection_lost(&mut self) {
        self.in_flight.clear();
    }

    /// Drops every waiter; their receivers observe a closed channel.
    fn abandon(&mut self) {
        self.queued.clear();
        self.in_flight.clear();
    }
}

/// Returns whether the broker granted every filter of a SUBACK.
fn suback_granted(suback: &SubAck) -> bool {
    suback
        .return_codes
        .iter()
        .all(|code| !matches!(code, SubscribeReasonCode::Failure))
}

/// Queues a SUBSCRIBE together with its waiter.
///
/// `try_subscribe` keeps the request and the waiter in the same critical
/// section, so the event loop cannot report the packet before it is queued.
fn request_subscribe(
    client: &AsyncClient,
    acks: &parking_lot::Mutex<SubAckWaiters>,
    filter: &str,
    qos: QoS,
    waiter: Option<oneshot::Sender<bool>>,
) -> Result<(), ProtocolError> {
    let mut acks = acks.lock();
    client.try_subscribe(filter, qos.into())?;
    acks.queued.push_back(waiter);
    Ok(())
}

/// One MQTT connection.
pub struct MqttClient {
    shared: Arc<Shared>,
    mqtt_options: MqttOptions,
    connection_timeout: Duration,
    auto_reconnect: bool,
    session: Mutex<Option<Session>>,
}

impl MqttClient {
    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::ClientClosed);
        }
        Ok(())
    }

    /// Returns the request handle of the live session, connecting first if needed.
    async fn active_client(&self) -> Result<AsyncClient, ProtocolError> {
        self.active_session().await.map(|(client, _)| client)
    }

    /// Like [`active_client`](Self::active_client), plus the session's SUBACK waiters.
    async fn active_session(
        &self,
    ) -> Result<(AsyncClient, Arc<parking_lot::Mutex<SubAckWaiters>>), ProtocolError> {
        if !self.is_connected() {
            self.connect().await?;
        }
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| (s.client.clone(), Arc::clone(&s.acks)))
            .ok_or_else(|| ProtocolError::ConnectionFailed("client is not connected".to_string()))
    }

    /// Sends a SUBSCRIBE and waits for the broker's SUBACK.
    async fn subscribe_acknowledged(
        &self,
        client: &AsyncClient,
        acks: &parking_lot::Mutex<SubAckWaiters>,
        filter: &str,
    ) -> Result<(), ProtocolError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        request_subscribe(client, acks, filter, self.shared.qos, Some(ack_tx))?;

        match tokio::time::timeout(self.connection_timeout, ack_rx).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(ProtocolError::SubscriptionRejected(filter.to_string())),
            Ok(Err(_)) => Err(ProtocolError::ChannelClosed(
                "connection lost before the subscription was acknowledged".to_string(),
            )),
            Err(_) => Err(ProtocolError::Timeout(self.timeout_ms())),
        }
    }

    fn timeout_ms(&self) -> u64 {
        // Safe: connection timeouts are configured in seconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.connection_timeout.as_millis() as u64;
        timeout_ms
    }

    /// Stops the live session, if any. Returns whether there was one.
    async fn shutdown(&self) -> bool {
        let Some(mut session) = self.session.lock().await.take() else {
            return false;
        };
        session.stopping.store(true, Ordering::Release);

        if self.shared.connected.swap(false, Ordering::AcqRel)
            && let Err(e) = session.client.disconnect().await
        {
            tracing::warn!(client_id = %self.shared.client_id, error = %e, "Failed to send MQTT disconnect");
        }

        if tokio::time::timeout(DISCONNECT_GRACE, &mut session.task)
            .await
            .is_err()
        {
            session.task.abort();
        }
        true
    }
}

impl std::fmt::Debug for MqttClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttClient")
            .field("client_id", &self.shared.client_id)
            .field("connected", &self.is_connected())
            .field("handlers", &self.shared.handlers)
            .finish_non_exhaustive()
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.stopping.store(true, Ordering::Release);
            session.task.abort();
        }
    }
}

impl BrokerClient for MqttClient {
    fn client_id(&self) -> &str {
        &self.shared.client_id
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    fn default_qos(&self) -> QoS {
        self.shared.qos
    }

    async fn connect(&self) -> Result<Outcome, ProtocolError> {
        self.ensure_open()?;

        let mut session = self.session.lock().await;
        if session.is_some() && self.is_connected() {
            return Ok(Outcome::AlreadyConnected);
        }
        // A session without a connection is a reconnect loop still running.
        if let Some(stale) = session.take() {
            stale.stopping.store(true, Ordering::Release);
            stale.task.abort();
        }

        let (client, event_loop) = AsyncClient::new(self.mqtt_options.clone(), REQUEST_CAPACITY);
        let (connack_tx, connack_rx) = oneshot::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let acks = Arc::new(parking_lot::Mutex::new(SubAckWaiters::default()));

        let task = tokio::spawn(handle_mqtt_events(
            event_loop,
            client.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&acks),
            connack_tx,
            self.auto_reconnect,
            Arc::clone(&stopping),
        ));

        match tokio::time::timeout(self.connection_timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(reason))) => {
                task.abort();
                return Err(ProtocolError::ConnectionFailed(reason));
            }
            Ok(Err(_)) => {
                task.abort();
                return Err(ProtocolError::ChannelClosed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                task.abort();
                return Err(ProtocolError::Timeout(self.timeout_ms()));
            }
        }

        for filter in self.shared.handlers.filters() {
            request_subscribe(&client, &acks, &filter, self.shared.qos, None)?;
        }

        tracing::info!(client_id = %self.shared.client_id, "Connected to MQTT broker");
        *session = Some(Session {
            client,
            acks,
            task,
            stopping,
        });
        Ok(Outcome::Done)
    }

    async fn disconnect(&self) -> Result<Outcome, ProtocolError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Ok(Outcome::AlreadyClosed);
        }
        if !self.shutdown().await {
            return Ok(Outcome::AlreadyDisconnected);
        }
        tracing::info!(client_id = %self.shared.client_id, "Disconnected MQTT client");
        Ok(Outcome::Done)
    }

    async fn close(&self) -> Result<Outcome, ProtocolError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(Outcome::AlreadyClosed);
        }
        self.shutdown().await;
        self.shared.handlers.clear();
        tracing::info!(client_id = %self.shared.client_id, "Closed MQTT client");
        Ok(Outcome::Done)
    }

    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retained: bool,
    ) -> Result<Outcome, ProtocolError> {
        self.ensure_open()?;
        let client = self.active_client().await?;

        tracing::debug!(topic = %topic, qos = %qos, retained, "Publishing MQTT message");
        client
            .publish(topic, qos.into(), retained, payload.to_vec())
            .await?;
        Ok(Outcome::Done)
    }

    async fn subscribe(
        &self,
        filter: &str,
        handler: MessageHandler,
    ) -> Result<Outcome, ProtocolError> {
        self.ensure_open()?;
        if topic::validate_filter(filter).is_err() {
            return Err(ProtocolError::SubscriptionRejected(filter.to_string()));
        }
        let (client, acks) = self.active_session().await?;

        // Stored before the request so retained messages sent right after
        // the SUBACK are not missed
        self.shared
            .handlers
            .insert(filter, MessageHandler::clone(&handler));

        let result = self.subscribe_acknowledged(&client, &acks, filter).await;
        if let Err(e) = result {
            self.shared.handlers.remove(filter, &handler);
            tracing::warn!(
                client_id = %self.shared.client_id,
                filter = %filter,
                error = %e,
                "Subscription failed"
            );
            return Err(e);
        }

        tracing::debug!(client_id = %self.shared.client_id, filter = %filter, "Subscribed");
        Ok(Outcome::Done)
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "MQTT broker host is required".to_string(),
        ));
    }

    Ok((host, port))
}

/// Resends every stored subscription after the broker lost our session.
fn resubscribe(client: &AsyncClient, shared: &Shared, acks: &parking_lot::Mutex<SubAckWaiters>) {
    for filter in shared.handlers.filters() {
        if let Err(e) = request_subscribe(client, acks, &filter, shared.qos, None) {
            tracing::warn!(filter = %filter, error = %e, "Failed to resubscribe");
        }
    }
}

/// Handles MQTT events for one connection.
async fn handle_mqtt_events(
    mut event_loop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    acks: Arc<parking_lot::Mutex<SubAckWaiters>>,
    connack_tx: oneshot::Sender<Result<(), String>>,
    auto_reconnect: bool,
    stopping: Arc<AtomicBool>,
) {
    use rumqttc::{Event, Outgoing, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT connected");
                shared.connected.store(true, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Ok(()));
                } else {
                    tracing::info!(client_id = %shared.client_id, "Reconnected to MQTT broker");
                    if !connack.session_present {
                        resubscribe(&client, &shared, &acks);
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                acks.lock().sent(pkid);
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                let granted = suback_granted(&suback);
                if granted {
                    tracing::debug!(?suback, "MQTT subscription acknowledged");
                } else {
                    tracing::warn!(
                        client_id = %shared.client_id,
                        ?suback,
                        "MQTT subscription rejected by broker"
                    );
                }
                acks.lock().acked(suback.pkid, granted);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload);
                tracing::debug!(
                    topic = %publish.topic,
                    payload = %payload,
                    "MQTT message received"
                );
                shared
                    .handlers
                    .dispatch(&publish.topic, &payload, publish.pkid);
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                shared.connected.store(false, Ordering::Release);
                acks.lock().abandon();
                break;
            }
            Ok(_) => {}
            Err(e) => {
                shared.connected.store(false, Ordering::Release);
                if let Some(tx) = connack_tx.take() {
                    acks.lock().abandon();
                    let _ = tx.send(Err(e.to_string()));
                    break;
                }
                if stopping.load(Ordering::Acquire) || !auto_reconnect {
                    acks.lock().abandon();
                    tracing::error!(client_id = %shared.client_id, error = %e, "MQTT event loop error");
                    break;
                }
                acks.lock().connection_lost();
                tracing::warn!(client_id = %shared.client_id, error = %e, "MQTT connection lost, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mqtt_url_with_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1883").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_default_port() {
        let (host, port) = parse_mqtt_url("192.168.1.50").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_tcp_scheme() {
        let (host, port) = parse_mqtt_url("tcp://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn parse_mqtt_url_rejects_bad_port_and_empty_host() {
        assert!(matches!(
            parse_mqtt_url("tcp://broker:abc"),
            Err(ProtocolError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_mqtt_url("mqtt://"),
            Err(ProtocolError::InvalidAddress(_))
        ));
    }

    #[test]
    fn suback_with_a_failure_code_is_not_granted() {
        let granted = SubAck {
            pkid: 1,
            return_codes: vec![SubscribeReasonCode::Success(rumqttc::QoS::ExactlyOnce)],
        };
        let rejected = SubAck {
            pkid: 2,
            return_codes: vec![
                SubscribeReasonCode::Success(rumqttc::QoS::AtMostOnce),
                SubscribeReasonCode::Failure,
            ],
        };
        assert!(suback_granted(&granted));
        assert!(!suback_granted(&rejected));
    }

    #[test]
    fn subacks_reach_the_request_that_sent_them() {
        let mut acks = SubAckWaiters::default();
        let (first_tx, mut first_rx) = oneshot::channel();
        let (third_tx, mut third_rx) = oneshot::channel();
        acks.queued.push_back(Some(first_tx));
        // A replayed subscription nobody waits for
        acks.queued.push_back(None);
        acks.queued.push_back(Some(third_tx));

        acks.sent(7);
        acks.sent(8);
        acks.sent(9);
        assert_eq!(acks.in_flight.len(), 2);

        acks.acked(9, false);
        acks.acked(8, true);
        acks.acked(7, true);

        assert_eq!(first_rx.try_recv(), Ok(true));
        assert_eq!(third_rx.try_recv(), Ok(false));
        assert!(acks.in_flight.is_empty());
    }

    #[test]
    fn reconnect_keeps_queued_requests() {
        let mut acks = SubAckWaiters::default();
        let (sent_tx, mut sent_rx) = oneshot::channel::<bool>();
        let (queued_tx, mut queued_rx) = oneshot::channel::<bool>();
        acks.queued.push_back(Some(sent_tx));
        acks.queued.push_back(Some(queued_tx));
        acks.sent(1);

        acks.connection_lost();
        assert!(matches!(
            sent_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));

        // Written after the reconnect
        acks.sent(1);
        acks.acked(1, true);
        assert_eq!(queued_rx.try_recv(), Ok(true));
    }

    #[test]
    fn stopped_event_loop_releases_waiters() {
        let mut acks = SubAckWaiters::default();
        let (queued_tx, mut queued_rx) = oneshot::channel::<bool>();
        let (sent_tx, mut sent_rx) = oneshot::channel::<bool>();
        acks.queued.push_back(Some(sent_tx));
        acks.queued.push_back(Some(queued_tx));
        acks.sent(1);

        acks.abandon();

        assert!(matches!(
            sent_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(
            queued_rx.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn open_creates_disconnected_client_with_unique_id() {
        let connector = MqttConnector::new("127.0.0.1:1883").unwrap();
        let a = connector.open(&ConnectionOptions::default()).await.unwrap();
        let b = connector.open(&ConnectionOptions::default()).await.unwrap();

        assert!(!a.is_connected());
        assert!(a.client_id().starts_with("devrep_"));
        assert_ne!(a.client_id(), b.client_id());
        assert_eq!(a.default_qos(), QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn open_rejects_invalid_options() {
        let connector = MqttConnector::new("127.0.0.1").unwrap();
        let options = ConnectionOptions::default().with_max_in_flight(0);
        assert!(matches!(
            connector.open(&options).await,
            Err(crate::Error::Value(_))
        ));
    }

    #[tokio::test]
    async fn disconnect_and_close_without_connection_are_benign() {
        let connector = MqttConnector::new("127.0.0.1").unwrap();
        let client = connector.open(&ConnectionOptions::default()).await.unwrap();

        assert_eq!(
            client.disconnect().await.unwrap(),
            Outcome::AlreadyDisconnected
        );
        assert_eq!(client.close().await.unwrap(), Outcome::Done);
        assert_eq!(client.close().await.unwrap(), Outcome::AlreadyClosed);
        assert!(matches!(
            client.connect().await,
            Err(ProtocolError::ClientClosed)
        ));
    }

    #[tokio::test]
    async fn connect_to_unreachable_broker_fails() {
        // Port 1 is never an MQTT broker
        let connector = MqttConnector::new("127.0.0.1:1").unwrap();
        let options = ConnectionOptions::default().with_connection_timeout_secs(2);
        let client = connector.open(&options).await.unwrap();

        let result = client.connect().await;
        assert!(result.is_err());
        assert!(!client.is_connected());
    }
}
