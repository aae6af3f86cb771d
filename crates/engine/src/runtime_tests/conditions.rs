// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Condition polling

use super::*;
use crate::EngineError;
use ag_core::Category;

#[tokio::test(start_paused = true)]
async fn false_condition_is_polled_without_running_script() {
    let ctx = setup();
    ctx.scripts.returns(POLL, false);
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(110).await;

    let status = ctx.runtime.condition_status(&watcher, "cond-1").unwrap();
    assert_eq!(status.check_hits, 4);
    assert_eq!(status.hits, 0);
    assert_eq!(memory_int(&watcher, "fired"), 0);
}

#[tokio::test(start_paused = true)]
async fn true_condition_fires_on_every_poll() {
    let ctx = setup();
    ctx.scripts.returns(POLL, true);
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(110).await;

    let status = ctx.runtime.condition_status(&watcher, "cond-1").unwrap();
    assert_eq!(status.check_hits, 4);
    assert_eq!(status.hits, 4);
    assert_eq!(memory_int(&watcher, "fired"), 4);
}

#[tokio::test(start_paused = true)]
async fn condition_sees_current_state() {
    let ctx = setup();
    ctx.scripts.on(POLL, |ctx, _| {
        let fired = ctx.get(Category::Memory, "fired").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(json!(fired < 2))
    });
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(210).await;

    let status = ctx.runtime.condition_status(&watcher, "cond-1").unwrap();
    assert_eq!(status.hits, 2);
    assert_eq!(status.check_hits, 8);
    assert_eq!(memory_int(&watcher, "fired"), 2);
}

#[tokio::test(start_paused = true)]
async fn writes_during_evaluation_are_discarded() {
    let ctx = setup();
    ctx.scripts.on(POLL, |ctx, _| {
        ctx.set(Category::Memory, "fired", 99)?;
        Ok(json!(false))
    });
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(60).await;
    assert_eq!(memory_int(&watcher, "fired"), 0);
    assert_eq!(watcher.state_history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn evaluation_error_counts_as_false_and_keeps_polling() {
    let ctx = setup();
    ctx.scripts.fails(POLL, "boom");
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(110).await;

    let status = ctx.runtime.condition_status(&watcher, "cond-1").unwrap();
    assert_eq!(status.check_hits, 4);
    assert_eq!(status.hits, 0);
    let exceptions = watcher.exceptions();
    assert_eq!(exceptions.len(), 4);
    assert_eq!(exceptions[0].script, "condition:cond-1");
    assert_eq!(exceptions[0].message, "boom");
}

#[tokio::test(start_paused = true)]
async fn disabled_condition_stops_polling() {
    let ctx = setup();
    ctx.scripts.returns(POLL, true);
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    sleep_ms(60).await;
    ctx.runtime.disable_condition(&watcher, "cond-1").unwrap();
    sleep_ms(100).await;
    let status = ctx.runtime.condition_status(&watcher, "cond-1").unwrap();
    assert_eq!(status.check_hits, 2);
    assert!(!status.enabled);

    ctx.runtime.enable_condition(&watcher, "cond-1").await.unwrap();
    sleep_ms(30).await;
    assert_eq!(ctx.runtime.condition_status(&watcher, "cond-1").unwrap().check_hits, 3);
}

#[tokio::test(start_paused = true)]
async fn unknown_condition_is_an_error() {
    let ctx = setup();
    ctx.scripts.returns(POLL, false);
    ctx.register(watcher_definition("alice", 25));
    let watcher = ctx.instantiate("watcher", "watcher-1").await;

    assert!(matches!(
        ctx.runtime.condition_status(&watcher, "nope"),
        Err(EngineError::UnknownCondition { .. })
    ));
    assert!(matches!(
        ctx.runtime.enable_condition(&watcher, "nope").await,
        Err(EngineError::UnknownCondition { .. })
    ));
}
