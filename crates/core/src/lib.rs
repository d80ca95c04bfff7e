// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! verdure-core: Shared library for the verdure dashboard
//!
//! This crate provides the transport-free half of the device-shadow
//! synchronization core: the versioned shadow document and its pure merge
//! reducers, the topic protocol schema, the sync status evaluator, and the
//! settings/telemetry value types consumed by the client crate.

pub mod clock;
pub mod error;
pub mod protocol;
pub mod settings;
pub mod shadow;
pub mod status;
pub mod telemetry;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use protocol::{
    AcceptedDocument, DeltaMessage, DocumentsMessage, PropertyPatch, RejectedMessage,
    ShadowTopic, TopicSet, UpdateAccepted, UpdateRequest,
};
pub use shadow::{ShadowDocument, ShadowMetadata, ShadowProperty, ShadowSnapshot, SENTINEL_KEY};
pub use status::{evaluate_sync, SyncReason, SyncStatus};
