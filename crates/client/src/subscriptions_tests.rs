// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the subscription manager.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use verdure_core::{ShadowTopic, TopicSet};

use super::*;
use crate::test_helpers::MockPubSub;

fn topics() -> TopicSet {
    TopicSet::new("verdure")
}

fn manager(mock: &Arc<MockPubSub>) -> SubscriptionManager<MockPubSub> {
    SubscriptionManager::new(Arc::clone(mock), SyncConfig::default())
}

fn noop_handler() -> MessageHandler {
    Arc::new(|_message| {})
}

#[tokio::test]
async fn opens_on_first_attempt() {
    let mock = MockPubSub::new();
    let manager = manager(&mock);

    let opened = manager
        .subscribe_with_retry(&topics(), ShadowTopic::GetAccepted, noop_handler())
        .await;

    assert!(opened);
    assert_eq!(manager.status(ShadowTopic::GetAccepted), SubscriptionStatus::Success);
    assert_eq!(mock.subscribe_calls(&topics().reply(ShadowTopic::GetAccepted)), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_with_backoff_then_succeeds() {
    let mock = MockPubSub::new();
    let topic_str = topics().reply(ShadowTopic::GetAccepted);
    mock.fail_subscribes(&topic_str, 2);
    let manager = manager(&mock);

    let opened = manager
        .subscribe_with_retry(&topics(), ShadowTopic::GetAccepted, noop_handler())
        .await;

    assert!(opened);
    assert_eq!(manager.status(ShadowTopic::GetAccepted), SubscriptionStatus::Success);
    assert_eq!(mock.subscribe_calls(&topic_str), 3);
}

#[tokio::test(start_paused = true)]
async fn budget_exhaustion_is_terminal() {
    let mock = MockPubSub::new();
    let topic_str = topics().reply(ShadowTopic::UpdateDelta);
    mock.fail_subscribes(&topic_str, 3);
    let manager = manager(&mock);

    let opened = manager
        .subscribe_with_retry(&topics(), ShadowTopic::UpdateDelta, noop_handler())
        .await;

    assert!(!opened);
    assert_eq!(manager.status(ShadowTopic::UpdateDelta), SubscriptionStatus::Failed);
    assert_eq!(mock.subscribe_calls(&topic_str), 3);

    // No further attempts are ever scheduled.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(mock.subscribe_calls(&topic_str), 3);
    assert_eq!(manager.status(ShadowTopic::UpdateDelta), SubscriptionStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn handler_receives_each_message() {
    let mock = MockPubSub::new();
    let manager = manager(&mock);
    let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    let handler: MessageHandler = Arc::new(move |message| {
        sink.lock().unwrap().push(message);
    });
    assert!(
        manager
            .subscribe_with_retry(&topics(), ShadowTopic::UpdateDocuments, handler)
            .await
    );

    let topic_str = topics().reply(ShadowTopic::UpdateDocuments);
    mock.inject(&topic_str, serde_json::json!({"n": 1}));
    mock.inject(&topic_str, serde_json::json!({"n": 2}));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0]["n"], 1);
    assert_eq!(seen[1]["n"], 2);
}

#[tokio::test]
async fn open_all_covers_every_reply_topic() {
    let mock = MockPubSub::new();
    let manager = manager(&mock);

    let all_open = manager.open_all(&topics(), BTreeMap::new()).await;

    assert!(all_open);
    assert!(manager.all_primary_open());
    let statuses = manager.statuses();
    assert_eq!(statuses.len(), 6);
    assert!(statuses.values().all(|s| *s == SubscriptionStatus::Success));
}

#[tokio::test(start_paused = true)]
async fn failed_delta_does_not_block_primary() {
    let mock = MockPubSub::new();
    let topic_str = topics().reply(ShadowTopic::UpdateDelta);
    mock.fail_subscribes(&topic_str, 3);
    let manager = manager(&mock);

    let all_open = manager.open_all(&topics(), BTreeMap::new()).await;

    assert!(!all_open);
    assert_eq!(manager.status(ShadowTopic::UpdateDelta), SubscriptionStatus::Failed);
    // Delta is not a primary topic: the initial fetch can still proceed.
    assert!(manager.all_primary_open());
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_open_subscriptions() {
    let mock = MockPubSub::new();
    let manager = manager(&mock);
    assert!(manager.open_all(&topics(), BTreeMap::new()).await);

    manager.shutdown();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Aborting each receive loop drops its subscription, which cancels
    // the channel.
    assert_eq!(mock.cancelled().len(), 6);
}

#[tokio::test]
async fn torn_down_manager_refuses_new_subscriptions() {
    let mock = MockPubSub::new();
    let manager = manager(&mock);
    manager.shutdown();

    let opened = manager
        .subscribe_with_retry(&topics(), ShadowTopic::GetAccepted, noop_handler())
        .await;

    assert!(!opened);
    assert_eq!(manager.status(ShadowTopic::GetAccepted), SubscriptionStatus::Pending);
    assert_eq!(mock.subscribe_calls(&topics().reply(ShadowTopic::GetAccepted)), 0);
}
