// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! verdure-client: Device-shadow synchronization client
//!
//! The async half of the sync core: transport traits with an MQTT
//! implementation, the subscription manager, the publish coordinator, and
//! the session object that wires them together around the shared shadow
//! store.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ShadowSession │────►│ Publisher /  │────►│   Broker    │
//! │  (store +    │◄────│ Subscription │◄────│  (MQTT or   │
//! │ coordinator) │     │Source traits │     │   mock)     │
//! └──────────────┘     └──────────────┘     └─────────────┘
//! ```
//!
//! The transport is constructor-injected: tests substitute a fake
//! implementation of the two traits, production uses [`mqtt::MqttPubSub`].

pub mod config;
pub mod coordinator;
pub mod mqtt;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod telemetry;
pub mod transport;

pub use config::SyncConfig;
pub use coordinator::{PublishCoordinator, PublishError, PublishResult, PublishStatus};
pub use mqtt::MqttPubSub;
pub use session::{SessionStatus, ShadowSession};
pub use store::{ResponseStatus, ShadowStore};
pub use subscriptions::{MessageHandler, SubscriptionManager, SubscriptionStatus};
pub use telemetry::{LatestTelemetry, TelemetryStream};
pub use transport::{Publisher, Subscription, SubscriptionSource, TransportError, TransportResult};

#[cfg(test)]
mod test_helpers;
