// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for verdure-core operations.
//!
//! Stale or out-of-order shadow messages are NOT errors: the transport is
//! at-least-once and unordered, so version-regressed messages are expected
//! and silently discarded by the merge reducers.

use thiserror::Error;

/// All possible errors that can occur in verdure-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid relay key: '{0}'\n  hint: relay keys are 'relay' followed by a numeric suffix")]
    InvalidRelayKey(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for verdure-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
