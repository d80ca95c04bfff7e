// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the session integration tests: an in-memory fake
//! transport and shadow message builders.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use verdure_client::{Publisher, Subscription, SubscriptionSource, TransportResult};
use verdure_core::protocol::{AcceptedDocument, DocumentsMessage};
use verdure_core::shadow::{
    DocumentState, ShadowMetadata, ShadowProperty, ShadowSnapshot, SnapshotState,
    TimestampMetadata,
};

/// In-memory fake broker: records publishes, lets tests inject messages.
pub struct FakeBroker {
    published: Mutex<Vec<(String, serde_json::Value)>>,
    senders: Mutex<HashMap<String, Vec<mpsc::Sender<serde_json::Value>>>>,
    cancelled: Arc<Mutex<Vec<String>>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeBroker {
            published: Mutex::new(Vec::new()),
            senders: Mutex::new(HashMap::new()),
            cancelled: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn published_to(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn inject(&self, topic: &str, message: serde_json::Value) {
        let senders = self.senders.lock().unwrap();
        if let Some(list) = senders.get(topic) {
            for sender in list {
                let _ = sender.try_send(message.clone());
            }
        }
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl Publisher for FakeBroker {
    fn publish(
        &self,
        topics: &[String],
        message: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let mut published = self.published.lock().unwrap();
            for topic in topics {
                published.push((topic, message.clone()));
            }
            Ok(())
        })
    }
}

impl SubscriptionSource for FakeBroker {
    fn subscribe(
        &self,
        topics: &[String],
    ) -> Pin<Box<dyn Future<Output = TransportResult<Subscription>> + Send + '_>> {
        let topics = topics.to_vec();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel(32);
            for topic in &topics {
                self.senders.lock().unwrap().entry(topic.clone()).or_default().push(tx.clone());
            }
            let cancelled = Arc::clone(&self.cancelled);
            Ok(Subscription::new(rx, move || {
                cancelled.lock().unwrap().extend(topics);
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

fn stamps(keys: &[&str], timestamp: u64) -> BTreeMap<String, TimestampMetadata> {
    keys.iter().map(|key| ((*key).to_string(), TimestampMetadata { timestamp })).collect()
}

/// A `get/accepted` payload: `(key, desired, reported)` triplets with
/// fresh metadata stamps relative to `now_secs`.
pub fn accepted_json(
    version: u64,
    now_secs: u64,
    relays: &[(&str, bool, bool)],
) -> serde_json::Value {
    let keys: Vec<&str> = relays.iter().map(|(k, _, _)| *k).collect();
    let desired: Vec<(&str, bool)> = relays.iter().map(|(k, d, _)| (*k, *d)).collect();
    let reported: Vec<(&str, bool)> = relays.iter().map(|(k, _, r)| (*k, *r)).collect();
    let doc = AcceptedDocument {
        state: DocumentState { desired: props(&desired), reported: props(&reported), delta: None },
        metadata: ShadowMetadata {
            desired: stamps(&keys, now_secs.saturating_sub(10)),
            reported: stamps(&keys, now_secs.saturating_sub(5)),
            delta: None,
        },
        version,
        timestamp: now_secs,
        client_token: None,
    };
    serde_json::to_value(&doc).unwrap()
}

/// An `update/documents` payload whose `current` snapshot carries the
/// given relays.
pub fn documents_json(
    version: u64,
    now_secs: u64,
    relays: &[(&str, bool, bool)],
) -> serde_json::Value {
    let keys: Vec<&str> = relays.iter().map(|(k, _, _)| *k).collect();
    let desired: Vec<(&str, bool)> = relays.iter().map(|(k, d, _)| (*k, *d)).collect();
    let reported: Vec<(&str, bool)> = relays.iter().map(|(k, _, r)| (*k, *r)).collect();
    let msg = DocumentsMessage {
        previous: ShadowSnapshot {
            state: SnapshotState::default(),
            metadata: ShadowMetadata::default(),
            version: version.saturating_sub(1),
        },
        current: ShadowSnapshot {
            state: SnapshotState { desired: props(&desired), reported: props(&reported) },
            metadata: ShadowMetadata {
                desired: stamps(&keys, now_secs.saturating_sub(2)),
                reported: stamps(&keys, now_secs.saturating_sub(1)),
                delta: None,
            },
            version,
        },
        timestamp: now_secs,
        client_token: None,
    };
    serde_json::to_value(&msg).unwrap()
}

/// An `update/delta` payload for a single relay.
pub fn delta_json(version: u64, now_secs: u64, key: &str, state: bool) -> serde_json::Value {
    serde_json::json!({
        "state": { "delta": { key: { "label": key, "state": state } } },
        "metadata": { "delta": { key: { "state": { "timestamp": now_secs } } } },
        "version": version,
        "timestamp": now_secs
    })
}

/// A `*/rejected` payload.
pub fn rejected_json(code: u32, message: &str, now_secs: u64) -> serde_json::Value {
    serde_json::json!({ "code": code, "message": message, "timestamp": now_secs })
}
