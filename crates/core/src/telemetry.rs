// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry stream message type.
//!
//! Sensor readings arrive on a separate topic outside the shadow protocol
//! (see [`crate::protocol::TopicSet::telemetry`]). The field names are
//! device-firmware contract.

use serde::{Deserialize, Serialize};

/// A cached telemetry value older than this is discarded rather than shown.
pub const TELEMETRY_CACHE_EXPIRY_MS: u64 = 5 * 60 * 1000;

/// One telemetry sample as published by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub temperature: f64,
    pub humidity: f64,
    pub light_level: f64,
    pub ph_levels: Vec<f64>,
    pub relay_states: Vec<bool>,
}

#[cfg(test)]
#[path = "telemetry_tests.rs"]
mod tests;
