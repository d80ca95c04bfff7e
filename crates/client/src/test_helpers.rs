// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers: a mock transport and shadow message builders.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use verdure_core::protocol::{AcceptedDocument, DocumentsMessage};
use verdure_core::shadow::{
    DocumentState, ShadowMetadata, ShadowProperty, ShadowSnapshot, SnapshotState,
    TimestampMetadata,
};

use crate::transport::{
    Publisher, Subscription, SubscriptionSource, TransportError, TransportResult,
};

/// Mock pub/sub transport implementing both collaborator traits.
///
/// Tests inject incoming messages per topic and script publish/subscribe
/// failures; every publish is recorded for assertion.
pub struct MockPubSub {
    published: Mutex<Vec<(String, serde_json::Value)>>,
    publish_failures: AtomicU32,
    subscribe_failures: Mutex<HashMap<String, u32>>,
    subscribe_calls: Mutex<HashMap<String, u32>>,
    senders: Mutex<HashMap<String, Vec<mpsc::Sender<serde_json::Value>>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl MockPubSub {
    pub fn new() -> Arc<Self> {
        Arc::new(MockPubSub {
            published: Mutex::new(Vec::new()),
            publish_failures: AtomicU32::new(0),
            subscribe_failures: Mutex::new(HashMap::new()),
            subscribe_calls: Mutex::new(HashMap::new()),
            senders: Mutex::new(HashMap::new()),
            cancelled: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Makes the next `n` publishes fail.
    pub fn fail_next_publishes(&self, n: u32) {
        self.publish_failures.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` subscribes to `topic` fail.
    pub fn fail_subscribes(&self, topic: &str, n: u32) {
        self.subscribe_failures.lock().unwrap().insert(topic.to_string(), n);
    }

    /// Every (topic, message) pair published so far.
    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.published.lock().unwrap().clone()
    }

    /// Messages published to one topic.
    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// How many times `subscribe` was called for `topic`.
    pub fn subscribe_calls(&self, topic: &str) -> u32 {
        self.subscribe_calls.lock().unwrap().get(topic).copied().unwrap_or(0)
    }

    /// Delivers a message to every open subscription on `topic`.
    pub fn inject(&self, topic: &str, message: serde_json::Value) {
        let senders = self.senders.lock().unwrap();
        if let Some(list) = senders.get(topic) {
            for sender in list {
                let _ = sender.try_send(message.clone());
            }
        }
    }

    /// Topics whose subscriptions have been cancelled.
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl Publisher for MockPubSub {
    fn publish(
        &self,
        topics: &[String],
        message: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            if self.publish_failures.load(Ordering::SeqCst) > 0 {
                self.publish_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError::PublishFailed("mock publish failure".into()));
            }
            let mut published = self.published.lock().unwrap();
            for topic in topics {
                published.push((topic, message.clone()));
            }
            Ok(())
        })
    }
}

impl SubscriptionSource for MockPubSub {
    fn subscribe(
        &self,
        topics: &[String],
    ) -> Pin<Box<dyn Future<Output = TransportResult<Subscription>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            for topic in &topics {
                *self.subscribe_calls.lock().unwrap().entry(topic.clone()).or_insert(0) += 1;
                let mut failures = self.subscribe_failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(topic) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(TransportError::SubscribeFailed(
                            "mock subscribe failure".into(),
                        ));
                    }
                }
            }

            let (tx, rx) = mpsc::channel(32);
            for topic in &topics {
                self.senders.lock().unwrap().entry(topic.clone()).or_default().push(tx.clone());
            }

            let cancelled = Arc::clone(&self.cancelled);
            let cancel_topics = topics.clone();
            Ok(Subscription::new(rx, move || {
                cancelled.lock().unwrap().extend(cancel_topics);
            }))
        })
    }
}

fn props(entries: &[(&str, bool)]) -> BTreeMap<String, ShadowProperty> {
    entries
        .iter()
        .map(|(key, state)| {
            ((*key).to_string(), ShadowProperty { label: (*key).to_string(), state: *state })
        })
        .collect()
}

fn stamps(entries: &[(&str, u64)]) -> BTreeMap<String, TimestampMetadata> {
    entries
        .iter()
        .map(|(key, ts)| ((*key).to_string(), TimestampMetadata { timestamp: *ts }))
        .collect()
}

/// A `get/accepted` document where desired and reported agree per relay:
/// `(key, desired_state, reported_state)`, desired stamped 10s before
/// `now_secs`, reported 5s before.
pub fn accepted_doc(version: u64, now_secs: u64, relays: &[(&str, bool, bool)]) -> AcceptedDocument {
    let desired: Vec<(&str, bool)> = relays.iter().map(|(k, d, _)| (*k, *d)).collect();
    let reported: Vec<(&str, bool)> = relays.iter().map(|(k, _, r)| (*k, *r)).collect();
    let desired_stamps: Vec<(&str, u64)> =
        relays.iter().map(|(k, _, _)| (*k, now_secs.saturating_sub(10))).collect();
    let reported_stamps: Vec<(&str, u64)> =
        relays.iter().map(|(k, _, _)| (*k, now_secs.saturating_sub(5))).collect();
    AcceptedDocument {
        state: DocumentState { desired: props(&desired), reported: props(&reported), delta: None },
        metadata: ShadowMetadata {
            desired: stamps(&desired_stamps),
            reported: stamps(&reported_stamps),
            delta: None,
        },
        version,
        timestamp: now_secs,
        client_token: None,
    }
}

/// An `update/documents` message whose `current` snapshot mirrors
/// [`accepted_doc`].
pub fn documents_message(
    version: u64,
    now_secs: u64,
    relays: &[(&str, bool, bool)],
) -> DocumentsMessage {
    let accepted = accepted_doc(version, now_secs, relays);
    DocumentsMessage {
        previous: ShadowSnapshot {
            state: SnapshotState::default(),
            metadata: ShadowMetadata::default(),
            version: version.saturating_sub(1),
        },
        current: ShadowSnapshot {
            state: SnapshotState {
                desired: accepted.state.desired,
                reported: accepted.state.reported,
            },
            metadata: accepted.metadata,
            version,
        },
        timestamp: now_secs,
        client_token: None,
    }
}
