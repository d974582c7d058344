// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn yields_messages_in_set_order() {
    let (feed, mut source) = message_feed();
    feed.set_next_message(UserInput::text("one"));
    assert_eq!(source.next().await.unwrap().text, "one");
    feed.set_next_message(UserInput::text("two"));
    assert_eq!(source.next().await.unwrap().text, "two");
}

#[tokio::test]
async fn consumer_blocks_until_message_is_set() {
    let (feed, mut source) = message_feed();

    let pull = tokio::spawn(async move { source.next().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!pull.is_finished());

    feed.set_next_message(UserInput::text("late"));
    assert_eq!(pull.await.unwrap().unwrap().text, "late");
}

#[tokio::test]
async fn unread_message_is_replaced() {
    let (feed, mut source) = message_feed();
    feed.set_next_message(UserInput::text("stale"));
    feed.set_next_message(UserInput::text("fresh"));
    assert_eq!(source.next().await.unwrap().text, "fresh");
}

#[tokio::test]
async fn resolved_hook_fires_on_consumption() {
    let (feed, mut source) = message_feed();
    let fired = std::sync::Arc::new(AtomicUsize::new(0));

    let f = std::sync::Arc::clone(&fired);
    feed.on_message_resolved(move |input| {
        assert_eq!(input.text, "hello");
        f.fetch_add(1, Ordering::SeqCst);
    });

    feed.set_next_message(UserInput::text("hello"));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    source.next().await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn close_drains_then_ends() {
    let (feed, mut source) = message_feed();
    feed.set_next_message(UserInput::text("last"));
    feed.close();
    assert_eq!(source.next().await.unwrap().text, "last");
    assert!(source.next().await.is_none());
}

#[tokio::test]
async fn close_wakes_blocked_consumer() {
    let (feed, mut source) = message_feed();
    let pull = tokio::spawn(async move { source.next().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    feed.close();
    assert!(pull.await.unwrap().is_none());
}
