// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync status classification.
//!
//! [`evaluate_sync`] is a pure read-side function over the current shadow
//! document, recomputed whenever the document changes. Classification runs
//! in priority order, first match wins:
//!
//! 1. offline: no recent reported stamps; state comparison is
//!    meaningless without them, so this pre-empts everything
//! 2. in sync: no desired/reported mismatches
//! 3. override: a mismatched relay's reported stamp postdates its
//!    desired stamp, i.e. a physical/out-of-band change, a stronger
//!    signal than elapsed time alone
//! 4. latency: a mismatch outstanding longer than the round-trip window
//! 5. conflict: a mismatch still inside the window, i.e. propagating
//!
//! Metadata stamps are cloud-assigned epoch seconds; they are scaled to
//! milliseconds here, and every derived field of [`SyncStatus`] is in
//! milliseconds.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shadow::{is_relay_key, ShadowDocument};

/// No reported-state stamp younger than this means the device is offline.
pub const OFFLINE_THRESHOLD_MS: u64 = 30_000;

/// Expected desired-to-reported round-trip window; mismatches older than
/// this are classified as latency.
pub const LATENCY_WINDOW_MS: u64 = 5_000;

/// Why desired and reported state disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncReason {
    Offline,
    Latency,
    Conflict,
    Override,
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncReason::Offline => "offline",
            SyncReason::Latency => "latency",
            SyncReason::Conflict => "conflict",
            SyncReason::Override => "override",
        };
        f.write_str(s)
    }
}

/// One relay whose desired and reported values disagree.
///
/// Timestamps are epoch milliseconds (0 when the cloud has no stamp yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfSyncRelay {
    pub name: String,
    pub desired: bool,
    pub reported: bool,
    pub desired_timestamp: u64,
    pub reported_timestamp: u64,
}

/// The derived relationship between desired and reported state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_in_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SyncReason>,
    pub details: String,
    pub out_of_sync_relays: Vec<OutOfSyncRelay>,
    pub last_reported_update_ms: u64,
    pub time_since_last_sync_ms: u64,
}

/// Classifies the document's desired/reported relationship at `now_ms`.
pub fn evaluate_sync(doc: &ShadowDocument, now_ms: u64) -> SyncStatus {
    let last_reported_update_ms = doc
        .metadata
        .reported
        .iter()
        .filter(|(key, _)| is_relay_key(key))
        .map(|(_, m)| m.timestamp * 1000)
        .max()
        .unwrap_or(0);
    let time_since_last_sync_ms = now_ms.saturating_sub(last_reported_update_ms);

    if time_since_last_sync_ms > OFFLINE_THRESHOLD_MS {
        return SyncStatus {
            is_in_sync: false,
            reason: Some(SyncReason::Offline),
            details: "Device appears to be offline".to_string(),
            out_of_sync_relays: collect_relays(doc, false),
            last_reported_update_ms,
            time_since_last_sync_ms,
        };
    }

    let out_of_sync_relays = collect_relays(doc, true);

    if out_of_sync_relays.is_empty() {
        return SyncStatus {
            is_in_sync: true,
            reason: None,
            details: "All relay states are synchronized".to_string(),
            out_of_sync_relays,
            last_reported_update_ms,
            time_since_last_sync_ms,
        };
    }

    let has_override = out_of_sync_relays
        .iter()
        .any(|relay| relay.reported_timestamp > relay.desired_timestamp);
    if has_override {
        return SyncStatus {
            is_in_sync: false,
            reason: Some(SyncReason::Override),
            details: "Physical switch state differs from app control".to_string(),
            out_of_sync_relays,
            last_reported_update_ms,
            time_since_last_sync_ms,
        };
    }

    let has_latency = out_of_sync_relays
        .iter()
        .any(|relay| now_ms.saturating_sub(relay.desired_timestamp) > LATENCY_WINDOW_MS);
    if has_latency {
        return SyncStatus {
            is_in_sync: false,
            reason: Some(SyncReason::Latency),
            details: "Device is taking longer than expected to sync".to_string(),
            out_of_sync_relays,
            last_reported_update_ms,
            time_since_last_sync_ms,
        };
    }

    SyncStatus {
        is_in_sync: false,
        reason: Some(SyncReason::Conflict),
        details: "States are being synchronized".to_string(),
        out_of_sync_relays,
        last_reported_update_ms,
        time_since_last_sync_ms,
    }
}

/// Builds the per-relay comparison set.
///
/// Iterates the desired tree (relay keys only). A relay without a
/// `metadata.desired` stamp is not-yet-synchronized and skipped entirely.
/// A missing reported value or stamp reads as `false`/`0`. With
/// `mismatched_only`, relays whose states agree are dropped.
fn collect_relays(doc: &ShadowDocument, mismatched_only: bool) -> Vec<OutOfSyncRelay> {
    doc.state
        .desired
        .iter()
        .filter(|(key, _)| is_relay_key(key))
        .filter_map(|(key, desired)| {
            let desired_meta = doc.metadata.desired.get(key)?;
            let reported = doc.state.reported.get(key).map(|p| p.state).unwrap_or(false);
            if mismatched_only && desired.state == reported {
                return None;
            }
            Some(OutOfSyncRelay {
                name: key.clone(),
                desired: desired.state,
                reported,
                desired_timestamp: desired_meta.timestamp * 1000,
                reported_timestamp: doc
                    .metadata
                    .reported
                    .get(key)
                    .map(|m| m.timestamp * 1000)
                    .unwrap_or(0),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
