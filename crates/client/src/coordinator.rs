// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Publish coordinator: the initial state fetch and all user-driven
//! desired-state publishes.
//!
//! Retry is an explicit bounded loop with an attempt counter everywhere:
//! exhaustion is a typed error, never unbounded recursion. The initial
//! fetch shares one attempt ceiling between publish failures and
//! response-timeout re-publishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, warn};

use verdure_core::protocol::{PropertyPatch, UpdateRequest};
use verdure_core::settings::{DashboardSettings, SettingsUpdateRequest};
use verdure_core::shadow::is_relay_key;
use verdure_core::{ClockSource, TopicSet};

use crate::config::SyncConfig;
use crate::store::ShadowStore;
use crate::transport::Publisher;

/// Lifecycle of the publish side, surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Pending,
    Success,
    Failed,
}

/// Error type for coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Serialization of an outbound message failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Every attempt in the retry budget failed.
    #[error("publish retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// The session was torn down; no further attempts are scheduled.
    #[error("session is shut down")]
    SessionClosed,

    /// Local validation rejected the payload before any publish.
    #[error(transparent)]
    Validation(#[from] verdure_core::Error),
}

/// Result type for coordinator operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Issues `get` and `update` publishes for one shadow session.
pub struct PublishCoordinator<P: Publisher> {
    publisher: Arc<P>,
    topics: TopicSet,
    store: ShadowStore,
    clock: Arc<dyn ClockSource>,
    config: SyncConfig,
    state: Mutex<PublishStatus>,
    response_seen: AtomicBool,
    response_ok: AtomicBool,
    response_notify: Notify,
    torn_down: AtomicBool,
}

impl<P: Publisher> PublishCoordinator<P> {
    /// Creates a coordinator in the pending publish state.
    pub fn new(
        publisher: Arc<P>,
        topics: TopicSet,
        store: ShadowStore,
        clock: Arc<dyn ClockSource>,
        config: SyncConfig,
    ) -> Self {
        PublishCoordinator {
            publisher,
            topics,
            store,
            clock,
            config,
            state: Mutex::new(PublishStatus::Pending),
            response_seen: AtomicBool::new(false),
            response_ok: AtomicBool::new(false),
            response_notify: Notify::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Current publish state.
    pub fn publish_status(&self) -> PublishStatus {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records that a fetch response arrived (`get/accepted`,
    /// `update/documents`, or a `get/rejected` with `accepted = false`)
    /// and wakes the fetch loop.
    pub fn note_response(&self, accepted: bool) {
        self.response_seen.store(true, Ordering::SeqCst);
        self.response_ok.store(accepted, Ordering::SeqCst);
        self.response_notify.notify_waiters();
    }

    /// Flips the publish state to failed (rejected update path).
    pub fn mark_failed(&self) {
        self.set_state(PublishStatus::Failed);
    }

    /// Stops scheduling further attempts.
    pub fn shutdown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.response_notify.notify_waiters();
    }

    /// Performs the initial state fetch: settle, publish `{}` to `get`,
    /// and await the response, re-publishing on timeout.
    ///
    /// `Ok` means a response arrived (the publish state says whether it
    /// was an acceptance); `RetriesExhausted` means the ceiling ran out
    /// with no response at all.
    pub async fn initial_fetch(&self) -> PublishResult<()> {
        tokio::time::sleep(self.config.settle_delay).await;

        for attempt in 1..=self.config.max_retries {
            if self.torn_down.load(Ordering::SeqCst) {
                return Err(PublishError::SessionClosed);
            }
            if self.response_seen.load(Ordering::SeqCst) {
                self.settle_response();
                return Ok(());
            }

            match self.publisher.publish(&[self.topics.get()], serde_json::json!({})).await {
                Ok(()) => {
                    debug!(attempt, "published shadow get");
                    let waited = tokio::time::timeout(
                        self.config.response_timeout,
                        self.response_notify.notified(),
                    )
                    .await;
                    if waited.is_ok() || self.response_seen.load(Ordering::SeqCst) {
                        if self.torn_down.load(Ordering::SeqCst) {
                            return Err(PublishError::SessionClosed);
                        }
                        self.settle_response();
                        return Ok(());
                    }
                    warn!(attempt, "no response to shadow get, re-publishing");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "shadow get publish failed");
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        self.set_state(PublishStatus::Failed);
        Err(PublishError::RetriesExhausted { attempts: self.config.max_retries })
    }

    /// Manual retry affordance for the terminal rejected-get case:
    /// clears the response flags and re-runs the fetch loop.
    pub async fn retry_get(&self) -> PublishResult<()> {
        self.response_seen.store(false, Ordering::SeqCst);
        self.response_ok.store(false, Ordering::SeqCst);
        self.set_state(PublishStatus::Pending);
        self.initial_fetch().await
    }

    /// Toggles one relay's desired state.
    ///
    /// The optimistic patch lands before the publish so the caller's view
    /// reflects intent instantly; on exhausted retries the error is
    /// returned so the caller can revert.
    pub async fn toggle_relay(&self, relay: &str, new_state: bool) -> PublishResult<()> {
        require_relay_key(relay)?;
        let patch = PropertyPatch {
            label: Some(self.store.relay_label(relay)),
            state: Some(new_state),
        };
        self.store.apply_optimistic(relay, &patch);
        let request = UpdateRequest::for_relay(relay, patch, Some(self.client_token(relay)));
        self.publish_update(serde_json::to_value(&request)?, relay).await
    }

    /// Renames one relay's display label (state untouched).
    pub async fn rename_relay(&self, relay: &str, new_label: &str) -> PublishResult<()> {
        require_relay_key(relay)?;
        let patch = PropertyPatch { label: Some(new_label.to_string()), state: None };
        self.store.apply_optimistic(relay, &patch);
        let request = UpdateRequest::for_relay(relay, patch, Some(self.client_token(relay)));
        self.publish_update(serde_json::to_value(&request)?, relay).await
    }

    /// Sets every known relay to `new_state`, one publish per relay with
    /// a fixed delay between them.
    pub async fn toggle_all(&self, new_state: bool) -> PublishResult<()> {
        for relay in self.store.relay_keys() {
            let patch = PropertyPatch { label: None, state: Some(new_state) };
            let request = UpdateRequest::for_relay(&relay, patch, None);
            self.publish_update(serde_json::to_value(&request)?, &relay).await?;
            tokio::time::sleep(self.config.toggle_all_spacing).await;
        }
        Ok(())
    }

    /// Publishes a settings update, validating locally first.
    pub async fn update_settings(&self, settings: &DashboardSettings) -> PublishResult<()> {
        settings.validate()?;
        let request = SettingsUpdateRequest::new(settings);
        self.publish_update(serde_json::to_value(&request)?, "settings").await
    }

    /// Bounded-retry publish to the `update` topic. Terminal failure
    /// records a rejection notice and flips the publish state.
    async fn publish_update(&self, message: serde_json::Value, what: &str) -> PublishResult<()> {
        for attempt in 1..=self.config.max_retries {
            if self.torn_down.load(Ordering::SeqCst) {
                return Err(PublishError::SessionClosed);
            }
            match self.publisher.publish(&[self.topics.update()], message.clone()).await {
                Ok(()) => {
                    debug!(what, attempt, "published shadow update");
                    return Ok(());
                }
                Err(e) => {
                    warn!(what, attempt, error = %e, "shadow update publish failed");
                    if attempt < self.config.max_retries {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }

        let attempts = self.config.max_retries;
        self.store
            .record_rejection(format!("Failed to update {what} after {attempts} attempts"));
        self.set_state(PublishStatus::Failed);
        Err(PublishError::RetriesExhausted { attempts })
    }

    /// Resolves the publish state once a response has arrived.
    fn settle_response(&self) {
        if self.response_ok.load(Ordering::SeqCst) {
            self.set_state(PublishStatus::Success);
        } else {
            self.set_state(PublishStatus::Failed);
        }
    }

    fn client_token(&self, relay: &str) -> String {
        format!("{relay}-{}", self.clock.now_ms())
    }

    fn set_state(&self, state: PublishStatus) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}

/// Rejects user actions aimed at the sentinel or any non-relay key
/// before an optimistic patch can land.
fn require_relay_key(relay: &str) -> PublishResult<()> {
    if is_relay_key(relay) {
        Ok(())
    } else {
        Err(PublishError::Validation(verdure_core::Error::InvalidRelayKey(relay.to_string())))
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
