// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared shadow state for one dashboard session.
//!
//! The store is the single owner of the mutable session state: the shadow
//! document (absent until first populated by the cloud), the last
//! rejection notice, and the accepted/rejected response flag. Message
//! handlers and user actions mutate it through the pure reducers in
//! verdure-core; a stale message is a logged no-op here, never an error.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::debug;

use verdure_core::protocol::{
    AcceptedDocument, DeltaMessage, DocumentsMessage, PropertyPatch, UpdateAccepted,
};
use verdure_core::shadow::default_label;
use verdure_core::{evaluate_sync, ShadowDocument, SyncStatus};

/// Whether the last shadow response was an acceptance or a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Accepted,
    Rejected,
}

#[derive(Default)]
struct StoreInner {
    document: Option<ShadowDocument>,
    rejection: Option<String>,
    response: Option<ResponseStatus>,
}

/// Cheaply cloneable handle to the session's shadow state.
#[derive(Clone, Default)]
pub struct ShadowStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl ShadowStore {
    /// Creates an empty store: no document until the cloud responds.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The current document, if populated.
    pub fn document(&self) -> Option<ShadowDocument> {
        self.lock().document.clone()
    }

    /// The last rejection notice, if any.
    pub fn rejection(&self) -> Option<String> {
        self.lock().rejection.clone()
    }

    /// The last response disposition, if any response arrived.
    pub fn response(&self) -> Option<ResponseStatus> {
        self.lock().response
    }

    /// Merges a `get/accepted` document (populates on first receipt).
    pub fn apply_accepted(&self, msg: &AcceptedDocument) {
        let mut inner = self.lock();
        let next = match inner.document.take() {
            Some(doc) => {
                if doc.is_stale(msg.version) {
                    debug!(version = msg.version, held = doc.version, "discarding stale accepted document");
                    inner.document = Some(doc);
                    return;
                }
                doc.apply_accepted(msg)
            }
            None => ShadowDocument::from_accepted(msg),
        };
        inner.document = Some(next);
        inner.rejection = None;
        inner.response = Some(ResponseStatus::Accepted);
    }

    /// Merges an `update/accepted` echo into the desired tree.
    pub fn apply_update_accepted(&self, msg: &UpdateAccepted) {
        let mut inner = self.lock();
        let Some(doc) = inner.document.take() else {
            debug!("no document yet, ignoring update/accepted");
            return;
        };
        if doc.is_stale(msg.version) {
            debug!(version = msg.version, held = doc.version, "discarding stale update/accepted");
            inner.document = Some(doc);
            return;
        }
        inner.document = Some(doc.apply_update_accepted(msg));
        inner.response = Some(ResponseStatus::Accepted);
    }

    /// Merges an `update/delta` message into the desired tree.
    pub fn apply_delta(&self, msg: &DeltaMessage) {
        let mut inner = self.lock();
        let Some(doc) = inner.document.take() else {
            debug!("no document yet, ignoring update/delta");
            return;
        };
        if doc.is_stale(msg.version) {
            debug!(version = msg.version, held = doc.version, "discarding stale update/delta");
            inner.document = Some(doc);
            return;
        }
        inner.document = Some(doc.apply_delta(msg));
    }

    /// Replaces the document from an `update/documents` pair. Populates
    /// the document if this is the first message to arrive.
    pub fn apply_documents(&self, msg: &DocumentsMessage) {
        let mut inner = self.lock();
        let next = match inner.document.take() {
            Some(doc) => {
                if doc.is_stale(msg.current.version) {
                    debug!(version = msg.current.version, held = doc.version, "discarding stale update/documents");
                    inner.document = Some(doc);
                    return;
                }
                doc.apply_documents(msg)
            }
            None => ShadowDocument::default().apply_documents(msg),
        };
        inner.document = Some(next);
        inner.rejection = None;
        inner.response = Some(ResponseStatus::Accepted);
    }

    /// Applies a tentative desired write ahead of the publish round-trip.
    /// A no-op until the document exists; there is nothing to patch.
    pub fn apply_optimistic(&self, relay: &str, patch: &PropertyPatch) {
        let mut inner = self.lock();
        let Some(doc) = inner.document.take() else {
            debug!(relay, "no document yet, skipping optimistic patch");
            return;
        };
        inner.document = Some(doc.apply_optimistic(relay, patch));
    }

    /// Records a user-visible rejection notice.
    pub fn record_rejection(&self, notice: String) {
        let mut inner = self.lock();
        inner.rejection = Some(notice);
        inner.response = Some(ResponseStatus::Rejected);
    }

    /// Sorted relay keys of the current document (empty when absent).
    pub fn relay_keys(&self) -> Vec<String> {
        self.lock().document.as_ref().map(ShadowDocument::relay_keys).unwrap_or_default()
    }

    /// Current desired label for a relay, falling back to the default.
    pub fn relay_label(&self, relay: &str) -> String {
        self.lock()
            .document
            .as_ref()
            .and_then(|doc| doc.state.desired.get(relay))
            .map(|prop| prop.label.clone())
            .unwrap_or_else(|| default_label(relay))
    }

    /// Classifies the current document, or `None` before first population.
    pub fn sync_status(&self, now_ms: u64) -> Option<SyncStatus> {
        self.lock().document.as_ref().map(|doc| evaluate_sync(doc, now_ms))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
