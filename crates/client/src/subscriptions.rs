// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription manager: opens the shadow reply topics with bounded retry.
//!
//! Each topic runs an independent state machine:
//!
//! ```text
//! pending ──► success                  (subscribe call returned)
//! pending ──► retrying(1..) ──► failed (budget exhausted)
//! ```
//!
//! State is terminal once success or failed. Retry applies to the
//! subscribe call only; a handler's own failures on incoming messages
//! are never retried here.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use verdure_core::{ShadowTopic, TopicSet};

use crate::config::SyncConfig;
use crate::transport::SubscriptionSource;

/// Lifecycle state of one topic subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Not yet attempted.
    Pending,
    /// Last attempt failed; waiting out the backoff.
    Retrying { attempt: u32 },
    /// Subscription is open and delivering messages.
    Success,
    /// Budget exhausted. Terminal.
    Failed,
}

/// Callback invoked with each parsed payload arriving on a topic.
pub type MessageHandler = Arc<dyn Fn(serde_json::Value) + Send + Sync>;

/// Opens and tracks the shadow protocol's topic subscriptions.
pub struct SubscriptionManager<S: SubscriptionSource> {
    source: Arc<S>,
    config: SyncConfig,
    states: Arc<Mutex<BTreeMap<ShadowTopic, SubscriptionStatus>>>,
    receivers: Mutex<Vec<JoinHandle<()>>>,
    torn_down: Arc<AtomicBool>,
}

impl<S: SubscriptionSource> SubscriptionManager<S> {
    /// Creates a manager with every topic pending.
    pub fn new(source: Arc<S>, config: SyncConfig) -> Self {
        let states = ShadowTopic::ALL
            .iter()
            .map(|topic| (*topic, SubscriptionStatus::Pending))
            .collect();
        SubscriptionManager {
            source,
            config,
            states: Arc::new(Mutex::new(states)),
            receivers: Mutex::new(Vec::new()),
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens one topic subscription with bounded retry.
    ///
    /// Returns true once the subscription is open. On success a receive
    /// loop is spawned that feeds `handler`; the loop (and with it the
    /// subscription's cancellation) is owned by the manager until
    /// [`shutdown`](Self::shutdown).
    pub async fn subscribe_with_retry(
        &self,
        topics: &TopicSet,
        topic: ShadowTopic,
        handler: MessageHandler,
    ) -> bool {
        let topic_str = topics.reply(topic);
        for attempt in 1..=self.config.max_retries {
            if self.torn_down.load(Ordering::SeqCst) {
                return false;
            }
            match self.source.subscribe(&[topic_str.clone()]).await {
                Ok(mut subscription) => {
                    debug!(topic = %topic_str, attempt, "subscription open");
                    self.set_state(topic, SubscriptionStatus::Success);

                    let torn_down = Arc::clone(&self.torn_down);
                    let receiver = tokio::spawn(async move {
                        while let Some(message) = subscription.next().await {
                            if torn_down.load(Ordering::SeqCst) {
                                break;
                            }
                            handler(message);
                        }
                    });
                    self.receivers.lock().unwrap_or_else(|e| e.into_inner()).push(receiver);
                    return true;
                }
                Err(e) => {
                    warn!(topic = %topic_str, attempt, error = %e, "subscribe attempt failed");
                    if attempt == self.config.max_retries {
                        self.set_state(topic, SubscriptionStatus::Failed);
                        return false;
                    }
                    self.set_state(topic, SubscriptionStatus::Retrying { attempt });
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
            }
        }
        false
    }

    /// Opens every shadow reply topic. Returns true if all opened.
    ///
    /// Topics without a handler get a no-op (their messages are consumed
    /// so the channel never backs up).
    pub async fn open_all(
        &self,
        topics: &TopicSet,
        mut handlers: BTreeMap<ShadowTopic, MessageHandler>,
    ) -> bool {
        let mut all_open = true;
        for topic in ShadowTopic::ALL {
            let handler: MessageHandler = match handlers.remove(&topic) {
                Some(handler) => handler,
                None => Arc::new(|_message| {}),
            };
            if !self.subscribe_with_retry(topics, topic, handler).await {
                all_open = false;
            }
        }
        all_open
    }

    /// Current state of one topic.
    pub fn status(&self, topic: ShadowTopic) -> SubscriptionStatus {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&topic)
            .copied()
            .unwrap_or(SubscriptionStatus::Pending)
    }

    /// Snapshot of every topic's state.
    pub fn statuses(&self) -> BTreeMap<ShadowTopic, SubscriptionStatus> {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True once the topics that gate the initial fetch are all open.
    pub fn all_primary_open(&self) -> bool {
        let states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        ShadowTopic::PRIMARY
            .iter()
            .all(|topic| states.get(topic) == Some(&SubscriptionStatus::Success))
    }

    /// Tears the manager down: no further retries, every receive loop
    /// aborted (dropping its subscription cancels the channel).
    pub fn shutdown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        let mut receivers = self.receivers.lock().unwrap_or_else(|e| e.into_inner());
        for receiver in receivers.drain(..) {
            receiver.abort();
        }
    }

    fn set_state(&self, topic: ShadowTopic, state: SubscriptionStatus) {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).insert(topic, state);
    }
}

impl<S: SubscriptionSource> Drop for SubscriptionManager<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "subscriptions_tests.rs"]
mod tests;
