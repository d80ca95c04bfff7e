// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry stream helper.
//!
//! Telemetry is an external collaborator of the shadow core: a separate
//! topic carrying sensor readings. This wrapper parses the raw payloads
//! and keeps a best-effort last-known value with a freshness window.

use std::sync::{Arc, Mutex};

use tracing::warn;

use verdure_core::telemetry::{TelemetryReading, TELEMETRY_CACHE_EXPIRY_MS};
use verdure_core::TopicSet;

use crate::transport::{Subscription, SubscriptionSource, TransportResult};

/// An open telemetry subscription yielding parsed readings.
#[derive(Debug)]
pub struct TelemetryStream {
    subscription: Subscription,
}

impl TelemetryStream {
    /// Subscribes to the device's telemetry topic.
    pub async fn open<S: SubscriptionSource>(
        source: &S,
        topics: &TopicSet,
    ) -> TransportResult<Self> {
        let subscription = source.subscribe(&[topics.telemetry()]).await?;
        Ok(TelemetryStream { subscription })
    }

    /// Yields the next reading; malformed payloads are skipped.
    pub async fn next(&mut self) -> Option<TelemetryReading> {
        while let Some(message) = self.subscription.next().await {
            match serde_json::from_value(message) {
                Ok(reading) => return Some(reading),
                Err(e) => warn!(error = %e, "malformed telemetry message"),
            }
        }
        None
    }

    /// Cancels the subscription.
    pub fn unsubscribe(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// Best-effort cache of the last telemetry value seen.
///
/// Values older than the expiry window are treated as absent rather than
/// shown stale.
#[derive(Debug, Clone, Default)]
pub struct LatestTelemetry {
    latest: Arc<Mutex<Option<(TelemetryReading, u64)>>>,
}

impl LatestTelemetry {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reading received at `now_ms`.
    pub fn record(&self, reading: TelemetryReading, now_ms: u64) {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some((reading, now_ms));
    }

    /// The last reading, if still fresh at `now_ms`.
    pub fn get(&self, now_ms: u64) -> Option<TelemetryReading> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|(reading, received_at)| {
                if now_ms.saturating_sub(*received_at) > TELEMETRY_CACHE_EXPIRY_MS {
                    None
                } else {
                    Some(reading.clone())
                }
            })
    }
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
