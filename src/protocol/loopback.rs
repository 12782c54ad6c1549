// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process broker.
//!
//! [`LoopbackBroker`] routes publishes between the [`LoopbackClient`]s it
//! opened, keeps retained payloads, and records everything clients publish.
//! It can also publish on behalf of a simulated device, refuse chosen
//! filters, and be taken offline to exercise transport failures.
//!
//! Available with the `loopback` feature.
//!
//! # Examples
//!
//! ```
//! use devrep::protocol::{BrokerClient, ConnectionOptions, Connector, LoopbackBroker, handler};
//! use devrep::types::QoS;
//!
//! # async fn example() -> devrep::Result<()> {
//! let broker = LoopbackBroker::new();
//! let client = broker.open(&ConnectionOptions::default()).await?;
//!
//! client
//!     .subscribe("lamp/#", handler(|topic, payload, _| println!("{topic} = {payload}")))
//!     .await?;
//! broker.inject("lamp/onoff", "true");
//!
//! client.publish("lamp/set", b"on", QoS::AtLeastOnce, false).await?;
//! assert_eq!(broker.published_to("lamp/set").len(), 1);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::error::ProtocolError;
use crate::outcome::Outcome;
use crate::protocol::{
    BrokerClient, ConnectionOptions, Connector, HandlerTable, LastWill, MessageHandler,
};
use crate::types::{QoS, topic};

/// A message published by one of the broker's clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Id of the publishing client.
    pub client_id: String,
    /// Destination topic.
    pub topic: String,
    /// Payload decoded as UTF-8.
    pub payload: String,
    /// Requested quality of service.
    pub qos: QoS,
    /// Whether the broker should retain the payload.
    pub retained: bool,
}

/// An in-process broker.
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone, Default)]
pub struct LoopbackBroker {
    inner: Arc<BrokerState>,
}

#[derive(Default)]
struct BrokerState {
    sessions: RwLock<Vec<Weak<Session>>>,
    retained: RwLock<HashMap<String, String>>,
    denied: RwLock<HashSet<String>>,
    published: Mutex<Vec<PublishedMessage>>,
    offline: AtomicBool,
    next_client: AtomicU64,
    next_message_id: AtomicU16,
}

struct Session {
    client_id: String,
    connected: AtomicBool,
    closed: AtomicBool,
    handlers: HandlerTable,
    last_will: Option<LastWill>,
}

impl LoopbackBroker {
    /// Creates a broker with no clients.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the broker offline or brings it back.
    ///
    /// Going offline drops every connected client without a clean shutdown,
    /// publishing their last wills. While offline, connects fail.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Release);
        if !offline {
            return;
        }

        for session in self.live_sessions() {
            if session.connected.swap(false, Ordering::AcqRel) {
                tracing::debug!(client_id = %session.client_id, "Loopback client dropped");
                if let Some(will) = &session.last_will {
                    self.route(&will.topic, &will.payload, QoS::ExactlyOnce, true);
                }
            }
        }
    }

    /// Makes the broker refuse subscriptions to exactly `filter`.
    ///
    /// Connected clients keep the subscriptions they already hold.
    pub fn deny_subscriptions(&self, filter: &str) {
        self.inner.denied.write().insert(filter.to_string());
    }

    /// Accepts subscriptions to `filter` again.
    pub fn allow_subscriptions(&self, filter: &str) {
        self.inner.denied.write().remove(filter);
    }

    fn is_denied(&self, filter: &str) -> bool {
        self.inner.denied.read().contains(filter)
    }

    /// Returns whether the broker refuses connections.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.inner.offline.load(Ordering::Acquire)
    }

    /// Publishes a message as if an external device had sent it.
    ///
    /// Returns the number of handlers the message was delivered to.
    pub fn inject(&self, topic: &str, payload: &str) -> usize {
        self.route(topic, payload, QoS::AtLeastOnce, false)
    }

    /// Publishes a retained message as if an external device had sent it.
    pub fn inject_retained(&self, topic: &str, payload: &str) -> usize {
        self.route(topic, payload, QoS::AtLeastOnce, true)
    }

    /// Returns every message published by clients, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.inner.published.lock().clone()
    }

    /// Returns the messages clients published to `topic`, oldest first.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.inner
            .published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Forgets the publish log.
    pub fn clear_published(&self) {
        self.inner.published.lock().clear();
    }

    /// Returns the retained payload for `topic`.
    #[must_use]
    pub fn retained(&self, topic: &str) -> Option<String> {
        self.inner.retained.read().get(topic).cloned()
    }

    /// Returns the number of connected clients.
    #[must_use]
    pub fn connected_clients(&self) -> usize {
        self.live_sessions()
            .iter()
            .filter(|s| s.connected.load(Ordering::Acquire))
            .count()
    }

    /// Returns whether the client with `client_id` is connected.
    #[must_use]
    pub fn is_client_connected(&self, client_id: &str) -> bool {
        self.live_sessions()
            .iter()
            .any(|s| s.client_id == client_id && s.connected.load(Ordering::Acquire))
    }

    fn live_sessions(&self) -> Vec<Arc<Session>> {
        let mut sessions = self.inner.sessions.write();
        sessions.retain(|weak| weak.strong_count() > 0);
        sessions.iter().filter_map(Weak::upgrade).collect()
    }

    fn next_message_id(&self, qos: QoS) -> u16 {
        if qos == QoS::AtMostOnce {
            return 0;
        }
        loop {
            let id = self
                .inner
                .next_message_id
                .fetch_add(1, Ordering::Relaxed)
                .wrapping_add(1);
            if id != 0 {
                return id;
            }
        }
    }

    fn route(&self, topic: &str, payload: &str, qos: QoS, retained: bool) -> usize {
        if retained {
            let mut store = self.inner.retained.write();
            if payload.is_empty() {
                store.remove(topic);
            } else {
                store.insert(topic.to_string(), payload.to_string());
            }
        }

        let message_id = self.next_message_id(qos);
        self.live_sessions()
            .iter()
            .filter(|s| s.connected.load(Ordering::Acquire))
            .map(|s| s.handlers.dispatch(topic, payload, message_id))
            .sum()
    }

    /// Delivers retained payloads matching `filter` to a single handler.
    fn replay_retained(&self, filter: &str, handler: &MessageHandler) {
        let matching: Vec<(String, String)> = self
            .inner
            .retained
            .read()
            .iter()
            .filter(|(topic, _)| topic::matches(filter, topic))
            .map(|(t, p)| (t.clone(), p.clone()))
            .collect();

        for (topic, payload) in matching {
            handler(&topic, &payload, 0);
        }
    }
}

impl std::fmt::Debug for LoopbackBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackBroker")
            .field("offline", &self.is_offline())
            .field("connected_clients", &self.connected_clients())
            .finish()
    }
}

impl Connector for LoopbackBroker {
    type Client = LoopbackClient;

    async fn open(&self, options: &ConnectionOptions) -> crate::Result<LoopbackClient> {
        options.validate()?;

        let counter = self.inner.next_client.fetch_add(1, Ordering::Relaxed);
        let session = Arc::new(Session {
            client_id: format!("loopback_{counter}"),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            handlers: HandlerTable::new(),
            last_will: options.last_will.clone(),
        });
        self.inner.sessions.write().push(Arc::downgrade(&session));

        Ok(LoopbackClient {
            session,
            broker: self.clone(),
            default_qos: options.qos,
        })
    }
}

/// A connection to a [`LoopbackBroker`].
pub struct LoopbackClient {
    session: Arc<Session>,
    broker: LoopbackBroker,
    default_qos: QoS,
}

impl LoopbackClient {
    fn ensure_open(&self) -> Result<(), ProtocolError> {
        if self.session.closed.load(Ordering::Acquire) {
            return Err(ProtocolError::ClientClosed);
        }
        Ok(())
    }

    /// Returns the filters this client is subscribed to.
    #[must_use]
    pub fn filters(&self) -> Vec<String> {
        self.session.handlers.filters()
    }
}

impl std::fmt::Debug for LoopbackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackClient")
            .field("client_id", &self.session.client_id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl BrokerClient for LoopbackClient {
    fn client_id(&self) -> &str {
        &self.session.client_id
    }

    fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::Acquire)
    }

    fn default_qos(&self) -> QoS {
        self.default_qos
    }

    async fn connect(&self) -> Result<Outcome, ProtocolError> {
        self.ensure_open()?;
        if self.broker.is_offline() {
            return Err(ProtocolError::ConnectionFailed(
                "loopback broker is offline".to_string(),
            ));
        }
        if self.session.connected.swap(true, Ordering::AcqRel) {
            return Ok(Outcome::AlreadyConnected);
        }

        tracing::debug!(client_id = %self.session.client_id, "Loopback client connected");
        // Resubscribing makes the broker resend retained payloads.
        let retained: Vec<(String, String)> = self
            .broker
            .inner
            .retained
            .read()
            .iter()
            .filter(|(topic, _)| self.session.handlers.matches(topic))
            .map(|(t, p)| (t.clone(), p.clone()))
            .collect();
        for (topic, payload) in retained {
            self.session.handlers.dispatch(&topic, &payload, 0);
        }
        Ok(Outcome::Done)
    }

    async fn disconnect(&self) -> Result<Outcome, ProtocolError> {
        if self.session.closed.load(Ordering::Acquire) {
            return Ok(Outcome::AlreadyClosed);
        }
        if !self.session.connected.swap(false, Ordering::AcqRel) {
            return Ok(Outcome::AlreadyDisconnected);
        }
        tracing::debug!(client_id = %self.session.client_id, "Loopback client disconnected");
        Ok(Outcome::Done)
    }

    async fn close(&self) -> Result<Outcome, ProtocolError> {
        if self.session.closed.swap(true, Ordering::AcqRel) {
            return Ok(Outcome::AlreadyClosed);
        }
        self.session.connected.store(false, Ordering::Release);
        self.session.handlers.clear();
        tracing::debug!(client_id = %self.session.client_id, "Loopback client closed");
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
        if !self.is_connected() {
            self.connect().await?;
        }

        let payload = String::from_utf8_lossy(payload).into_owned();
        self.broker.inner.published.lock().push(PublishedMessage {
            client_id: self.session.client_id.clone(),
            topic: topic.to_string(),
            payload: payload.clone(),
            qos,
            retained,
        });
        self.broker.route(topic, &payload, qos, retained);
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
        if !self.is_connected() {
            self.connect().await?;
        }
        if self.broker.is_denied(filter) {
            tracing::debug!(
                client_id = %self.session.client_id,
                filter = %filter,
                "Loopback subscription refused"
            );
            return Err(ProtocolError::SubscriptionRejected(filter.to_string()));
        }

        self.session
            .handlers
            .insert(filter, MessageHandler::clone(&handler));
        self.broker.replay_retained(filter, &handler);
        Ok(Outcome::Done)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::protocol::handler;

    fn recorder() -> (MessageHandler, Arc<Mutex<Vec<(String, String)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handler = handler(move |topic, payload, _| {
            sink.lock().push((topic.to_string(), payload.to_string()));
        });
        (handler, seen)
    }

    async fn open(broker: &LoopbackBroker) -> LoopbackClient {
        broker.open(&ConnectionOptions::default()).await.unwrap()
    }

    #[tokio::test]
    async fn open_does_not_connect() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        assert!(!client.is_connected());
        assert_eq!(broker.connected_clients(), 0);
    }

    #[tokio::test]
    async fn client_ids_are_unique() {
        let broker = LoopbackBroker::new();
        let a = open(&broker).await;
        let b = open(&broker).await;
        assert_ne!(a.client_id(), b.client_id());
    }

    #[tokio::test]
    async fn lifecycle_calls_are_idempotent() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;

        assert_eq!(client.connect().await.unwrap(), Outcome::Done);
        assert_eq!(client.connect().await.unwrap(), Outcome::AlreadyConnected);
        assert_eq!(client.disconnect().await.unwrap(), Outcome::Done);
        assert_eq!(
            client.disconnect().await.unwrap(),
            Outcome::AlreadyDisconnected
        );
        assert_eq!(client.close().await.unwrap(), Outcome::Done);
        assert_eq!(client.close().await.unwrap(), Outcome::AlreadyClosed);
        assert_eq!(client.disconnect().await.unwrap(), Outcome::AlreadyClosed);
    }

    #[tokio::test]
    async fn closed_client_rejects_traffic() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        client.close().await.unwrap();

        assert!(matches!(
            client.connect().await,
            Err(ProtocolError::ClientClosed)
        ));
        assert!(matches!(
            client.publish("a", b"x", QoS::AtMostOnce, false).await,
            Err(ProtocolError::ClientClosed)
        ));
    }

    #[tokio::test]
    async fn subscribe_connects_and_receives() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        let (handler, seen) = recorder();

        client.subscribe("lamp/#", handler).await.unwrap();
        assert!(client.is_connected());

        broker.inject("lamp/onoff", "true");
        broker.inject("plug/onoff", "false");
        assert_eq!(
            *seen.lock(),
            vec![("lamp/onoff".to_string(), "true".to_string())]
        );
    }

    #[tokio::test]
    async fn disconnected_clients_miss_messages_until_reconnected() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        let (handler, seen) = recorder();
        client.subscribe("lamp/#", handler).await.unwrap();

        client.disconnect().await.unwrap();
        broker.inject("lamp/onoff", "true");
        assert!(seen.lock().is_empty());

        client.connect().await.unwrap();
        broker.inject("lamp/onoff", "false");
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn retained_payloads_replay_on_subscribe() {
        let broker = LoopbackBroker::new();
        broker.inject_retained("lamp/onoff", "true");
        assert_eq!(broker.retained("lamp/onoff").as_deref(), Some("true"));

        let client = open(&broker).await;
        let (handler, seen) = recorder();
        client.subscribe("lamp/#", handler).await.unwrap();
        assert_eq!(seen.lock().len(), 1);

        broker.inject_retained("lamp/onoff", "");
        assert!(broker.retained("lamp/onoff").is_none());
    }

    #[tokio::test]
    async fn publish_is_logged_and_routed() {
        let broker = LoopbackBroker::new();
        let publisher = open(&broker).await;
        let subscriber = open(&broker).await;
        let (handler, seen) = recorder();
        subscriber.subscribe("dev/cmd", handler).await.unwrap();

        publisher
            .publish("dev/cmd", b"on", QoS::AtLeastOnce, true)
            .await
            .unwrap();

        let log = broker.published_to("dev/cmd");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].payload, "on");
        assert_eq!(log[0].client_id, publisher.client_id());
        assert!(log[0].retained);
        assert_eq!(seen.lock().len(), 1);

        broker.clear_published();
        assert!(broker.published().is_empty());
    }

    #[tokio::test]
    async fn offline_broker_refuses_connections_and_sends_last_will() {
        let broker = LoopbackBroker::new();
        let options = ConnectionOptions::default().with_last_will("lamp/status", "offline");
        let client = broker.open(&options).await.unwrap();
        client.connect().await.unwrap();

        broker.set_offline(true);
        assert!(!client.is_connected());
        assert_eq!(broker.retained("lamp/status").as_deref(), Some("offline"));
        assert!(matches!(
            client.connect().await,
            Err(ProtocolError::ConnectionFailed(_))
        ));

        broker.set_offline(false);
        assert_eq!(client.connect().await.unwrap(), Outcome::Done);
    }

    #[tokio::test]
    async fn invalid_filters_are_rejected() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        let result = client.subscribe("a/#/b", handler(|_, _, _| {})).await;
        assert!(matches!(result, Err(ProtocolError::SubscriptionRejected(_))));
        assert!(client.filters().is_empty());
    }

    #[tokio::test]
    async fn denied_filters_are_refused_after_connecting() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        broker.deny_subscriptions("lamp/#");

        let result = client.subscribe("lamp/#", handler(|_, _, _| {})).await;
        assert!(matches!(result, Err(ProtocolError::SubscriptionRejected(_))));
        assert!(client.is_connected());
        assert!(client.filters().is_empty());
        assert_eq!(broker.inject("lamp/onoff", "true"), 0);

        // Only the exact filter is refused
        client.subscribe("lamp/+", handler(|_, _, _| {})).await.unwrap();

        broker.allow_subscriptions("lamp/#");
        client.subscribe("lamp/#", handler(|_, _, _| {})).await.unwrap();
        assert_eq!(broker.inject("lamp/onoff", "true"), 2);
    }

    #[tokio::test]
    async fn qos_zero_deliveries_have_no_message_id() {
        let broker = LoopbackBroker::new();
        let client = open(&broker).await;
        let ids = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ids);
        client
            .subscribe("t", handler(move |_, _, id| sink.lock().push(id)))
            .await
            .unwrap();

        client.publish("t", b"", QoS::AtMostOnce, false).await.unwrap();
        client.publish("t", b"", QoS::ExactlyOnce, false).await.unwrap();

        let ids = ids.lock();
        assert_eq!(ids[0], 0);
        assert_ne!(ids[1], 0);
    }

    #[tokio::test]
    async fn dropped_clients_are_forgotten() {
        let broker = LoopbackBroker::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let client = open(&broker).await;
            let counter = Arc::clone(&hits);
            client
                .subscribe(
                    "t",
                    handler(move |_, _, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .await
                .unwrap();
        }
        assert_eq!(broker.inject("t", "x"), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
