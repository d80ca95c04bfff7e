// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the sync core's retry and pacing behavior.

use std::time::Duration;

/// Retry budgets and delays shared by the subscription manager and the
/// publish coordinator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Attempt ceiling for subscribes, update publishes, and the initial
    /// fetch (publish failures and response timeouts share this budget).
    pub max_retries: u32,
    /// Fixed delay between failed attempts.
    pub retry_backoff: Duration,
    /// Delay between all subscriptions opening and the first `get`
    /// publish.
    pub settle_delay: Duration,
    /// How long the initial fetch waits for `get/accepted` before
    /// re-publishing. Short: a lost response gets re-published rather
    /// than waited out.
    pub response_timeout: Duration,
    /// Delay between per-relay publishes in toggle-all, rate-limiting
    /// the device/broker.
    pub toggle_all_spacing: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            max_retries: 3,
            retry_backoff: Duration::from_millis(1000),
            settle_delay: Duration::from_millis(500),
            response_timeout: Duration::from_millis(100),
            toggle_all_spacing: Duration::from_millis(1000),
        }
    }
}
