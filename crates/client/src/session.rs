// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow session: wires the subscription manager, publish coordinator,
//! and shadow store into one dashboard-lifetime object.
//!
//! # Control flow
//!
//! ```text
//! ┌───────────────┐   open 6 topics    ┌──────────────┐
//! │ Subscription  │───────────────────►│  Transport   │
//! │   Manager     │   (bounded retry)  │  (traits)    │
//! └──────┬────────┘                    └──────▲───────┘
//!        │ all primary open                   │ publish get/update
//! ┌──────▼────────┐   merge reducers   ┌──────┴───────┐
//! │ ShadowStore   │◄───────────────────│   Publish    │
//! │ (document)    │   optimistic patch │ Coordinator  │
//! └───────────────┘                    └──────────────┘
//! ```
//!
//! Incoming messages mutate the store through the version-gated reducers;
//! the sync status is recomputed on read. Teardown cancels every
//! subscription and pending timer; no operation is cancelled mid-flight,
//! retries simply stop being scheduled.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use verdure_core::protocol::{
    AcceptedDocument, DeltaMessage, DocumentsMessage, RejectedMessage, UpdateAccepted,
};
use verdure_core::settings::DashboardSettings;
use verdure_core::{ClockSource, ShadowDocument, ShadowTopic, SyncStatus, TopicSet};

use crate::config::SyncConfig;
use crate::coordinator::{PublishCoordinator, PublishResult, PublishStatus};
use crate::store::{ResponseStatus, ShadowStore};
use crate::subscriptions::{MessageHandler, SubscriptionManager, SubscriptionStatus};
use crate::transport::{Publisher, SubscriptionSource};

/// Everything the presentation layer needs to render banners and badges.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub subscriptions: BTreeMap<ShadowTopic, SubscriptionStatus>,
    pub publish: PublishStatus,
    pub rejection: Option<String>,
    pub response: Option<ResponseStatus>,
}

/// A live shadow synchronization session.
///
/// Created via [`start`](Self::start); lives for the dashboard session;
/// torn down explicitly or on drop.
pub struct ShadowSession<P: Publisher + 'static, S: SubscriptionSource + 'static> {
    store: ShadowStore,
    manager: SubscriptionManager<S>,
    coordinator: Arc<PublishCoordinator<P>>,
    clock: Arc<dyn ClockSource>,
    fetch_task: Mutex<Option<JoinHandle<()>>>,
}

impl<P: Publisher + 'static, S: SubscriptionSource + 'static> ShadowSession<P, S> {
    /// Opens all shadow topic subscriptions and, once the primary topics
    /// are open, kicks off the initial state fetch in the background.
    pub async fn start(
        publisher: Arc<P>,
        source: Arc<S>,
        topics: TopicSet,
        clock: Arc<dyn ClockSource>,
        config: SyncConfig,
    ) -> Self {
        let store = ShadowStore::new();
        let manager = SubscriptionManager::new(source, config.clone());
        let coordinator = Arc::new(PublishCoordinator::new(
            publisher,
            topics.clone(),
            store.clone(),
            Arc::clone(&clock),
            config,
        ));

        let handlers = Self::topic_handlers(&store, &coordinator);
        manager.open_all(&topics, handlers).await;

        let fetch_task = if manager.all_primary_open() {
            let fetcher = Arc::clone(&coordinator);
            Some(tokio::spawn(async move {
                if let Err(e) = fetcher.initial_fetch().await {
                    warn!(error = %e, "initial shadow fetch did not complete");
                }
            }))
        } else {
            warn!("primary shadow subscriptions failed to open, skipping initial fetch");
            None
        };

        ShadowSession {
            store,
            manager,
            coordinator,
            clock,
            fetch_task: Mutex::new(fetch_task),
        }
    }

    fn topic_handlers(
        store: &ShadowStore,
        coordinator: &Arc<PublishCoordinator<P>>,
    ) -> BTreeMap<ShadowTopic, MessageHandler> {
        let mut handlers: BTreeMap<ShadowTopic, MessageHandler> = BTreeMap::new();

        {
            let store = store.clone();
            let coordinator = Arc::clone(coordinator);
            handlers.insert(
                ShadowTopic::GetAccepted,
                Arc::new(move |message| match serde_json::from_value::<AcceptedDocument>(message) {
                    Ok(msg) => {
                        store.apply_accepted(&msg);
                        coordinator.note_response(true);
                    }
                    Err(e) => warn!(error = %e, "malformed get/accepted message"),
                }),
            );
        }

        {
            let store = store.clone();
            let coordinator = Arc::clone(coordinator);
            handlers.insert(
                ShadowTopic::GetRejected,
                Arc::new(move |message| match serde_json::from_value::<RejectedMessage>(message) {
                    Ok(msg) => {
                        store.record_rejection(format!(
                            "Failed to fetch shadow: {} (Code: {})",
                            msg.message, msg.code
                        ));
                        coordinator.note_response(false);
                    }
                    Err(e) => warn!(error = %e, "malformed get/rejected message"),
                }),
            );
        }

        {
            let store = store.clone();
            handlers.insert(
                ShadowTopic::UpdateAccepted,
                Arc::new(move |message| match serde_json::from_value::<UpdateAccepted>(message) {
                    Ok(msg) => store.apply_update_accepted(&msg),
                    Err(e) => warn!(error = %e, "malformed update/accepted message"),
                }),
            );
        }

        {
            let store = store.clone();
            let coordinator = Arc::clone(coordinator);
            handlers.insert(
                ShadowTopic::UpdateRejected,
                Arc::new(move |message| match serde_json::from_value::<RejectedMessage>(message) {
                    Ok(msg) => {
                        store.record_rejection(format!(
                            "Update failed: {} (Code: {})",
                            msg.message, msg.code
                        ));
                        coordinator.mark_failed();
                    }
                    Err(e) => warn!(error = %e, "malformed update/rejected message"),
                }),
            );
        }

        {
            let store = store.clone();
            handlers.insert(
                ShadowTopic::UpdateDelta,
                Arc::new(move |message| match serde_json::from_value::<DeltaMessage>(message) {
                    Ok(msg) => store.apply_delta(&msg),
                    Err(e) => warn!(error = %e, "malformed update/delta message"),
                }),
            );
        }

        {
            let store = store.clone();
            let coordinator = Arc::clone(coordinator);
            handlers.insert(
                ShadowTopic::UpdateDocuments,
                Arc::new(move |message| match serde_json::from_value::<DocumentsMessage>(message) {
                    Ok(msg) => {
                        store.apply_documents(&msg);
                        coordinator.note_response(true);
                    }
                    Err(e) => warn!(error = %e, "malformed update/documents message"),
                }),
            );
        }

        handlers
    }

    /// The current shadow document, once populated.
    pub fn document(&self) -> Option<ShadowDocument> {
        self.store.document()
    }

    /// The current sync classification, once a document exists.
    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.store.sync_status(self.clock.now_ms())
    }

    /// Convenience: true unless the evaluator says the device is offline
    /// (and false before any document has arrived).
    pub fn is_device_online(&self) -> bool {
        self.sync_status()
            .map(|status| status.reason != Some(verdure_core::SyncReason::Offline))
            .unwrap_or(false)
    }

    /// Snapshot of the session's surfaced state.
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            subscriptions: self.manager.statuses(),
            publish: self.coordinator.publish_status(),
            rejection: self.store.rejection(),
            response: self.store.response(),
        }
    }

    /// Toggles one relay's desired state (optimistic-first).
    pub async fn toggle_relay(&self, relay: &str, new_state: bool) -> PublishResult<()> {
        self.coordinator.toggle_relay(relay, new_state).await
    }

    /// Renames one relay's display label.
    pub async fn rename_relay(&self, relay: &str, new_label: &str) -> PublishResult<()> {
        self.coordinator.rename_relay(relay, new_label).await
    }

    /// Sets every relay to the given state, rate-limited per relay.
    pub async fn toggle_all(&self, new_state: bool) -> PublishResult<()> {
        self.coordinator.toggle_all(new_state).await
    }

    /// Publishes validated dashboard settings.
    pub async fn update_settings(&self, settings: &DashboardSettings) -> PublishResult<()> {
        self.coordinator.update_settings(settings).await
    }

    /// Manual retry for a rejected or unanswered initial fetch.
    pub async fn retry_fetch(&self) -> PublishResult<()> {
        self.coordinator.retry_get().await
    }

    /// Tears the session down: cancels subscriptions, stops retries,
    /// aborts the background fetch.
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
        self.manager.shutdown();
        if let Some(task) = self.fetch_task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
        }
    }
}

impl<P: Publisher + 'static, S: SubscriptionSource + 'static> Drop for ShadowSession<P, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
