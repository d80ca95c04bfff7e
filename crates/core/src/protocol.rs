// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shadow protocol topics and message shapes.
//!
//! The protocol rides on a fixed set of named pub/sub topics. This module
//! is pure schema: the other components' correctness depends on exact
//! topic-name and payload-shape agreement with the device firmware. The
//! wire format is JSON over an untyped transport, so any mismatch here is
//! a silent integration failure, not a type error. The topic strings and
//! field names below must not drift.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shadow::{
    DocumentState, FieldMetadata, ShadowMetadata, ShadowProperty, ShadowSnapshot,
};

/// Shadow name under which the relay document is retained.
const SHADOW_NAME: &str = "relays";

/// The six reply topics the dashboard subscribes to on mount.
///
/// The `delete` triple is reserved wire surface (see [`TopicSet`]) and not
/// subscribed; `get` and `update` are publish-only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ShadowTopic {
    GetAccepted,
    GetRejected,
    UpdateAccepted,
    UpdateRejected,
    UpdateDelta,
    UpdateDocuments,
}

impl ShadowTopic {
    /// All subscribed reply topics.
    pub const ALL: [ShadowTopic; 6] = [
        ShadowTopic::GetAccepted,
        ShadowTopic::GetRejected,
        ShadowTopic::UpdateAccepted,
        ShadowTopic::UpdateRejected,
        ShadowTopic::UpdateDelta,
        ShadowTopic::UpdateDocuments,
    ];

    /// The topics that must be open before the initial `get` publish:
    /// without these the fetch response (or its rejection) would be lost.
    pub const PRIMARY: [ShadowTopic; 4] = [
        ShadowTopic::GetAccepted,
        ShadowTopic::GetRejected,
        ShadowTopic::UpdateAccepted,
        ShadowTopic::UpdateDocuments,
    ];

    /// The topic's path suffix under the shadow prefix.
    pub fn suffix(self) -> &'static str {
        match self {
            ShadowTopic::GetAccepted => "get/accepted",
            ShadowTopic::GetRejected => "get/rejected",
            ShadowTopic::UpdateAccepted => "update/accepted",
            ShadowTopic::UpdateRejected => "update/rejected",
            ShadowTopic::UpdateDelta => "update/delta",
            ShadowTopic::UpdateDocuments => "update/documents",
        }
    }
}

impl fmt::Display for ShadowTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The full topic namespace for one device.
///
/// Topic strings are device-firmware contract; everything is derived from
/// the thing name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSet {
    prefix: String,
    thing_name: String,
}

impl TopicSet {
    /// Builds the topic set for the given thing name.
    pub fn new(thing_name: &str) -> Self {
        TopicSet {
            prefix: format!("$aws/things/{thing_name}/shadow/name/{SHADOW_NAME}"),
            thing_name: thing_name.to_string(),
        }
    }

    /// The thing name this set was built for.
    pub fn thing_name(&self) -> &str {
        &self.thing_name
    }

    /// Publish topic for the initial state fetch.
    pub fn get(&self) -> String {
        format!("{}/get", self.prefix)
    }

    /// Publish topic for desired-state updates.
    pub fn update(&self) -> String {
        format!("{}/update", self.prefix)
    }

    /// Publish topic for shadow deletion. Reserved: not exercised by
    /// current flows.
    pub fn delete(&self) -> String {
        format!("{}/delete", self.prefix)
    }

    /// Reply topic for `delete` acceptance. Reserved.
    pub fn delete_accepted(&self) -> String {
        format!("{}/delete/accepted", self.prefix)
    }

    /// Reply topic for `delete` rejection. Reserved.
    pub fn delete_rejected(&self) -> String {
        format!("{}/delete/rejected", self.prefix)
    }

    /// Topic string for a subscribed reply topic.
    pub fn reply(&self, topic: ShadowTopic) -> String {
        format!("{}/{}", self.prefix, topic.suffix())
    }

    /// Telemetry stream topic. External collaborator: sensor readings,
    /// not part of the shadow protocol.
    pub fn telemetry(&self) -> String {
        format!("svene/iot/{}/dashboard/telemetry", self.thing_name)
    }

    /// Direct relay-action topic. Legacy: unused by the shadow core.
    pub fn relay_action(&self) -> String {
        format!("svene/iot/{}/action/relay", self.thing_name)
    }
}

/// A full shadow document as delivered on `get/accepted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedDocument {
    pub state: DocumentState,
    #[serde(default)]
    pub metadata: ShadowMetadata,
    pub version: u64,
    pub timestamp: u64,
    #[serde(rename = "clientToken", default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// The cloud's echo of an accepted update: just the desired subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAccepted {
    pub state: DesiredState,
    #[serde(default)]
    pub metadata: ShadowMetadata,
    pub version: u64,
    pub timestamp: u64,
    #[serde(rename = "clientToken", default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// A desired-only state tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default)]
    pub desired: BTreeMap<String, ShadowProperty>,
}

/// The desired-not-yet-reported subset, pushed on `update/delta`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaMessage {
    pub state: DeltaState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DeltaMetadata>,
    pub version: u64,
    pub timestamp: u64,
}

/// Delta property tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaState {
    #[serde(default)]
    pub delta: BTreeMap<String, ShadowProperty>,
}

/// Delta timestamp metadata, nested per-field as the cloud sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<BTreeMap<String, FieldMetadata>>,
}

/// Before/after document pair delivered atomically on `update/documents`
/// whenever the canonical document changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentsMessage {
    pub previous: ShadowSnapshot,
    pub current: ShadowSnapshot,
    pub timestamp: u64,
    #[serde(rename = "clientToken", default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// A `*/rejected` reply with the cloud-supplied error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedMessage {
    pub code: u32,
    pub message: String,
    pub timestamp: u64,
    #[serde(rename = "clientToken", default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// An outbound `update` publish carrying only the changed key(s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub state: DesiredPatch,
    #[serde(rename = "clientToken", default, skip_serializing_if = "Option::is_none")]
    pub client_token: Option<String>,
}

/// Desired-tree patch: partial properties keyed by relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPatch {
    pub desired: BTreeMap<String, PropertyPatch>,
}

/// A partial [`ShadowProperty`]: absent fields are left untouched by the
/// cloud merge, and omitted from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<bool>,
}

impl UpdateRequest {
    /// Builds an update for a single relay.
    ///
    /// The client token is recommended as `"{relay}-{epoch_ms}"` for
    /// correlating updates with their replies.
    pub fn for_relay(relay: &str, patch: PropertyPatch, client_token: Option<String>) -> Self {
        let mut desired = BTreeMap::new();
        desired.insert(relay.to_string(), patch);
        UpdateRequest { state: DesiredPatch { desired }, client_token }
    }

    /// Serializes the request to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl RejectedMessage {
    /// Deserializes a rejection from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl AcceptedDocument {
    /// Deserializes an accepted document from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl DeltaMessage {
    /// Deserializes a delta message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl DocumentsMessage {
    /// Deserializes a documents message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
