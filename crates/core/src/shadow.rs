// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The versioned shadow document and its merge reducers.
//!
//! The cloud retains one canonical document per device, holding parallel
//! `desired` (app intent) and `reported` (device-confirmed) property trees
//! plus per-property timestamp metadata and a version counter. All local
//! mutation goes through the reducers here, which are pure: they take the
//! current document and a message and return a new document.
//!
//! Merge rules:
//! - every cloud-sourced reducer is version-gated: a message with
//!   `version` below the held document's is returned unchanged
//! - `apply_documents` fully replaces state and metadata (the only reducer
//!   allowed to shrink pending state)
//! - `apply_delta` merges into `desired` only, never `reported`
//! - `apply_optimistic` is local-only: no metadata, no version bump; it is
//!   reconciled by the next `apply_documents`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{
    AcceptedDocument, DeltaMessage, DocumentsMessage, PropertyPatch, UpdateAccepted,
};

/// Reserved non-relay key present in the shadow's desired/reported maps for
/// protocol bootstrapping. Always excluded from relay iteration.
pub const SENTINEL_KEY: &str = "welcome";

/// One named relay's desired or reported value.
///
/// Immutable value type: replaced wholesale on update, never mutated in
/// place. The display label is user-editable independently of the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowProperty {
    pub label: String,
    pub state: bool,
}

/// Cloud-assigned change timestamp for one property, in whole seconds
/// since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampMetadata {
    pub timestamp: u64,
}

/// Per-field timestamp metadata as the cloud attaches it to delta
/// messages: one stamp per leaf of the property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<TimestampMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TimestampMetadata>,
}

/// Timestamp metadata for the desired/reported/delta trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowMetadata {
    #[serde(default)]
    pub desired: BTreeMap<String, TimestampMetadata>,
    #[serde(default)]
    pub reported: BTreeMap<String, TimestampMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<BTreeMap<String, TimestampMetadata>>,
}

/// The desired/reported/delta property trees of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    #[serde(default)]
    pub desired: BTreeMap<String, ShadowProperty>,
    #[serde(default)]
    pub reported: BTreeMap<String, ShadowProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<BTreeMap<String, ShadowProperty>>,
}

/// A point-in-time view of the document, as carried by `update/documents`
/// messages (which deliver a previous/current pair atomically).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowSnapshot {
    pub state: SnapshotState,
    #[serde(default)]
    pub metadata: ShadowMetadata,
    pub version: u64,
}

/// The state trees of a snapshot (no delta: snapshots are settled views).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotState {
    #[serde(default)]
    pub desired: BTreeMap<String, ShadowProperty>,
    #[serde(default)]
    pub reported: BTreeMap<String, ShadowProperty>,
}

/// The root aggregate: the locally-held view of the cloud shadow.
///
/// `version` is monotonically non-decreasing across accepted updates.
/// `timestamp` is the cloud's document timestamp in epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowDocument {
    pub state: DocumentState,
    pub metadata: ShadowMetadata,
    pub version: u64,
    pub timestamp: u64,
}

/// Returns true if `key` names a relay: not the sentinel, and shaped
/// `relay<N>`. Non-relay desired keys (for example the `client` settings
/// subtree) are excluded from relay iteration by the prefix check.
pub fn is_relay_key(key: &str) -> bool {
    key != SENTINEL_KEY && key.starts_with("relay") && relay_suffix(key).is_some()
}

/// Returns the numeric suffix of a relay key, if it has one.
pub fn relay_suffix(key: &str) -> Option<&str> {
    let suffix = key.strip_prefix("relay")?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(suffix)
}

/// Default display label for a relay key: `relay3` becomes `Relay 3`.
pub fn default_label(key: &str) -> String {
    match relay_suffix(key) {
        Some(suffix) => format!("Relay {suffix}"),
        None => key.to_string(),
    }
}

/// Reduces the cloud's nested per-field delta metadata to one stamp per
/// key, taking the `state` leaf (a relay's meaningful change is its state
/// flip; label edits do not move the sync window).
pub fn reduce_delta_metadata(
    fields: &BTreeMap<String, FieldMetadata>,
) -> BTreeMap<String, TimestampMetadata> {
    fields
        .iter()
        .map(|(key, meta)| {
            let timestamp = meta.state.map(|m| m.timestamp).unwrap_or(0);
            (key.clone(), TimestampMetadata { timestamp })
        })
        .collect()
}

impl ShadowDocument {
    /// Builds the initial document from a `get/accepted` response.
    pub fn from_accepted(msg: &AcceptedDocument) -> Self {
        ShadowDocument {
            state: msg.state.clone(),
            metadata: msg.metadata.clone(),
            version: msg.version,
            timestamp: msg.timestamp,
        }
    }

    /// True if a message at `version` must be discarded (anti-regression).
    pub fn is_stale(&self, version: u64) -> bool {
        version < self.version
    }

    /// Full replace from a `get/accepted` document.
    ///
    /// Returns the document unchanged if the message regresses `version`.
    pub fn apply_accepted(&self, msg: &AcceptedDocument) -> Self {
        if self.is_stale(msg.version) {
            return self.clone();
        }
        Self::from_accepted(msg)
    }

    /// Merge from an `update/accepted` message: desired values and desired
    /// metadata stamps only (the cloud echoes just the accepted desired
    /// subtree).
    pub fn apply_update_accepted(&self, msg: &UpdateAccepted) -> Self {
        if self.is_stale(msg.version) {
            return self.clone();
        }

        let mut next = self.clone();
        for (key, prop) in &msg.state.desired {
            next.state.desired.insert(key.clone(), prop.clone());
        }
        for (key, stamp) in &msg.metadata.desired {
            next.metadata.desired.insert(key.clone(), *stamp);
        }
        next.version = msg.version;
        next.timestamp = msg.timestamp;
        next
    }

    /// Merge from an `update/delta` message.
    ///
    /// Delta keys are merged into `state.desired` and recorded in
    /// `state.delta`; `metadata.delta` is stamped via
    /// [`reduce_delta_metadata`]. `reported` is never touched: the delta is
    /// the desired-not-yet-reported subset, by definition.
    pub fn apply_delta(&self, msg: &DeltaMessage) -> Self {
        if self.is_stale(msg.version) {
            return self.clone();
        }

        let mut next = self.clone();
        for (key, prop) in &msg.state.delta {
            next.state.desired.insert(key.clone(), prop.clone());
        }
        next.state.delta = Some(msg.state.delta.clone());
        next.metadata.delta = msg
            .metadata
            .as_ref()
            .and_then(|m| m.delta.as_ref())
            .map(reduce_delta_metadata);
        next.version = msg.version;
        next.timestamp = msg.timestamp;
        next
    }

    /// Full replace from an `update/documents` message's `current`
    /// snapshot.
    ///
    /// This is the authoritative merge source: it supersedes any
    /// locally-applied optimistic or delta update, and is the only reducer
    /// permitted to shrink pending state. Any standing delta is cleared.
    pub fn apply_documents(&self, msg: &DocumentsMessage) -> Self {
        if self.is_stale(msg.current.version) {
            return self.clone();
        }

        ShadowDocument {
            state: DocumentState {
                desired: msg.current.state.desired.clone(),
                reported: msg.current.state.reported.clone(),
                delta: None,
            },
            metadata: ShadowMetadata {
                desired: msg.current.metadata.desired.clone(),
                reported: msg.current.metadata.reported.clone(),
                delta: None,
            },
            version: msg.current.version,
            timestamp: msg.timestamp,
        }
    }

    /// Tentative local desired write, applied before the publish
    /// round-trip completes so the caller can reflect intent instantly.
    ///
    /// Patches the existing property (or starts from `default_label` and
    /// `false` for an unknown key). Metadata and version are untouched: the
    /// write is unconfirmed until the next `apply_documents` replaces it.
    pub fn apply_optimistic(&self, relay: &str, patch: &PropertyPatch) -> Self {
        let mut next = self.clone();
        let current = next.state.desired.get(relay);
        let property = ShadowProperty {
            label: patch
                .label
                .clone()
                .or_else(|| current.map(|p| p.label.clone()))
                .unwrap_or_else(|| default_label(relay)),
            state: patch.state.or(current.map(|p| p.state)).unwrap_or(false),
        };
        next.state.desired.insert(relay.to_string(), property);
        next
    }

    /// Sorted relay keys of the desired tree, sentinel and non-relay keys
    /// excluded.
    pub fn relay_keys(&self) -> Vec<String> {
        self.state.desired.keys().filter(|k| is_relay_key(k)).cloned().collect()
    }

    /// The cloud's document timestamp as a UTC datetime, for display.
    pub fn updated_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp as i64, 0).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod tests;
