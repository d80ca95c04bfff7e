// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! MQTT transport implementation using rumqttc.
//!
//! One broker connection backs any number of subscriptions: a spawned
//! driver task polls the rumqttc event loop and routes incoming publishes
//! to per-topic channels. Broker connect/reconnect internals stay inside
//! rumqttc; this layer only maps the client's pub/sub surface onto the
//! [`Publisher`] and [`SubscriptionSource`] traits.
//!
//! Topic matching is exact string matching; the shadow protocol never
//! subscribes with wildcards.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transport::{Publisher, Subscription, SubscriptionSource, TransportError, TransportResult};

/// Channel depth per subscription; a consumer this far behind starts
/// dropping messages rather than backpressuring the event loop.
const CHANNEL_CAPACITY: usize = 64;

/// Delay before re-polling the event loop after a connection error.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

type Routes = Arc<Mutex<HashMap<String, Vec<mpsc::Sender<serde_json::Value>>>>>;

/// MQTT-backed pub/sub transport.
pub struct MqttPubSub {
    client: AsyncClient,
    routes: Routes,
    driver: JoinHandle<()>,
}

impl MqttPubSub {
    /// Connects to the broker and spawns the event-loop driver.
    pub fn connect(options: MqttOptions) -> Self {
        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));

        let driver_routes = Arc::clone(&routes);
        let driver = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        route_message(&driver_routes, &publish.topic, &publish.payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt event loop error");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                }
            }
        });

        MqttPubSub { client, routes, driver }
    }

    /// Stops the event-loop driver. Open subscriptions yield `None` from
    /// then on.
    pub fn shutdown(&self) {
        self.driver.abort();
    }
}

impl Drop for MqttPubSub {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Parses an incoming payload and fans it out to the topic's subscribers.
fn route_message(routes: &Routes, topic: &str, payload: &[u8]) {
    let message: serde_json::Value = match serde_json::from_slice(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(topic, error = %e, "dropping non-JSON payload");
            return;
        }
    };

    let mut routes = routes.lock().unwrap_or_else(|e| e.into_inner());
    let Some(senders) = routes.get_mut(topic) else {
        return;
    };
    senders.retain(|sender| match sender.try_send(message.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!(topic, "subscriber lagging, dropping message");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

impl Publisher for MqttPubSub {
    fn publish(
        &self,
        topics: &[String],
        message: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let payload = serde_json::to_vec(&message)
                .map_err(|e| TransportError::Serialization(e.to_string()))?;
            for topic in &topics {
                self.client
                    .publish(topic.clone(), QoS::AtLeastOnce, false, payload.clone())
                    .await
                    .map_err(|e| TransportError::PublishFailed(e.to_string()))?;
                debug!(topic, "published");
            }
            Ok(())
        })
    }
}

impl SubscriptionSource for MqttPubSub {
    fn subscribe(
        &self,
        topics: &[String],
    ) -> Pin<Box<dyn Future<Output = TransportResult<Subscription>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

            for topic in &topics {
                self.client
                    .subscribe(topic.clone(), QoS::AtLeastOnce)
                    .await
                    .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;
                self.routes
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .entry(topic.clone())
                    .or_default()
                    .push(tx.clone());
            }

            let client = self.client.clone();
            let routes = Arc::clone(&self.routes);
            Ok(Subscription::new(rx, move || {
                let mut routes = routes.lock().unwrap_or_else(|e| e.into_inner());
                for topic in &topics {
                    let drained = match routes.get_mut(topic) {
                        Some(senders) => {
                            senders.retain(|sender| !sender.same_channel(&tx));
                            senders.is_empty()
                        }
                        None => false,
                    };
                    if drained {
                        routes.remove(topic);
                        // Last subscriber gone: tell the broker too.
                        if let Err(e) = client.try_unsubscribe(topic.clone()) {
                            warn!(topic, error = %e, "broker unsubscribe failed");
                        }
                    }
                }
            }))
        })
    }
}
