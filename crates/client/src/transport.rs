// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the pub/sub broker.
//!
//! Provides the two narrow interfaces the sync core consumes:
//! - [`Publisher`] fires a JSON message to one or more named topics
//! - [`SubscriptionSource`] opens a [`Subscription`], a lazy infinite
//!   sequence of parsed payloads, cancellable by the caller
//!
//! Trait-based so tests can substitute a mock transport; the production
//! implementation lives in [`crate::mqtt`].

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Subscribe call failed.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Publish call failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Fire-and-forget publisher over the pub/sub transport.
///
/// Delivery is at-least-once/best-effort; a returned `Ok` means the
/// message was handed to the broker client, not that the device saw it.
pub trait Publisher: Send + Sync {
    /// Publishes one JSON message to every named topic.
    fn publish(
        &self,
        topics: &[String],
        message: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>>;
}

/// Opens message subscriptions on the pub/sub transport.
pub trait SubscriptionSource: Send + Sync {
    /// Opens a subscription covering the named topics.
    ///
    /// Errors from the open call (or the underlying channel failing to
    /// establish) surface here; once a [`Subscription`] is returned, the
    /// stream is live until cancelled.
    fn subscribe(
        &self,
        topics: &[String],
    ) -> Pin<Box<dyn Future<Output = TransportResult<Subscription>> + Send + '_>>;
}

/// An open subscription: an infinite stream of parsed JSON payloads.
///
/// Every opened subscription must be paired with a cancellation; dropping
/// the subscription cancels it, so a leaked channel requires leaking the
/// handle itself.
pub struct Subscription {
    messages: mpsc::Receiver<serde_json::Value>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps a message channel and its cancel action.
    pub fn new(
        messages: mpsc::Receiver<serde_json::Value>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription { messages, cancel: Some(Box::new(cancel)) }
    }

    /// Yields the next payload, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<serde_json::Value> {
        self.messages.recv().await
    }

    /// Cancels the subscription. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        self.messages.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.cancel.is_none())
            .finish()
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
