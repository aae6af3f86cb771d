// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence specs: shutdown, restart, and what survives.

use crate::prelude::*;
use similar_asserts::assert_eq;

#[tokio::test(start_paused = true)]
async fn history_survives_repeated_restarts() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    instantiate(&server, "counter", "counter-1").await;
    sleep_ms(170).await;

    let counter = server.runtime().instance(USER, "counter-1").unwrap();
    let times: Vec<u64> = counter.state_history().iter().map(|s| s.time_ms).collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]), "{times:?}");

    let mut server = server;
    for cycle in 0..3 {
        let before = server.runtime().instance(USER, "counter-1").unwrap();
        let states = before.state_history();
        let outputs = before.output_history();
        let state = (before.parameters(), before.memory(), before.outputs());
        server.shutdown().await.unwrap();

        server = project.server();
        server.start().await.unwrap();
        let after = server.runtime().instance(USER, "counter-1").unwrap();
        assert_eq!(after.state_history(), states, "cycle {cycle}");
        assert_eq!(after.output_history(), outputs, "cycle {cycle}");
        assert_eq!((after.parameters(), after.memory(), after.outputs()), state);
        assert_eq!(after.id(), before.id());

        project.clock.advance(Duration::from_millis(100));
        sleep_ms(120).await;
    }
}

#[tokio::test(start_paused = true)]
async fn restarted_timer_keeps_counting() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    instantiate(&server, "counter", "counter-1").await;
    sleep_ms(170).await;
    server.shutdown().await.unwrap();
    assert!(project.config().snapshot_path().exists());

    let server = project.server();
    server.start().await.unwrap();
    let counter = server.runtime().instance(USER, "counter-1").unwrap();
    assert_eq!(hits(&server, &counter, "timer-1"), 3);

    sleep_ms(120).await;

    assert_eq!(hits(&server, &counter, "timer-1"), 5);
    assert_eq!(int(&counter.outputs(), "field1"), 5);
    let seqs: Vec<u64> = counter.state_history().iter().map(|s| s.seq).collect();
    assert_eq!(seqs, (0..=5).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn disabled_timer_stays_disabled_after_restart() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    let counter = instantiate(&server, "counter", "counter-1").await;
    sleep_ms(70).await;
    server.runtime().disable_timer(&counter, "timer-1").unwrap();
    server.shutdown().await.unwrap();

    let server = project.server();
    server.start().await.unwrap();
    sleep_ms(300).await;

    let counter = server.runtime().instance(USER, "counter-1").unwrap();
    let status = server.runtime().timer_status(&counter, "timer-1").unwrap();
    assert!(!status.enabled);
    assert_eq!(status.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn compressed_snapshot_round_trips() {
    let project = Project::compressed();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    instantiate(&server, "counter", "counter-1").await;
    sleep_ms(120).await;
    server.shutdown().await.unwrap();

    let bytes = std::fs::read(project.config().snapshot_path()).unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());

    let server = project.server();
    server.start().await.unwrap();
    let counter = server.runtime().instance(USER, "counter-1").unwrap();
    assert_eq!(int(&counter.memory(), "count"), 2);
}

#[tokio::test(start_paused = true)]
async fn dependency_graph_is_rebuilt_on_restart() {
    let project = Project::new();
    let definitions = vec![counter_definition(USER, 50), follower_definition(USER, 0)];
    let server = project.started(definitions).await;
    instantiate(&server, "follower", "follower-1").await;
    sleep_ms(120).await;
    server.shutdown().await.unwrap();

    let server = project.server();
    server.start().await.unwrap();
    let rt = server.runtime();
    let counter = rt.instance(USER, "counter-1").unwrap();
    let follower = rt.instance(USER, "follower-1").unwrap();

    assert_eq!(rt.dependent_instances(&counter)[0].id(), follower.id());
    assert!(rt.release(&counter).is_err());

    sleep_ms(60).await;
    assert_eq!(int(&follower.memory(), "runs"), 3);
    assert_eq!(follower.inputs().get("src"), Some(&json!({ "field1": 3 })));
}

#[tokio::test(start_paused = true)]
async fn stopped_server_cannot_start_again() {
    let project = Project::new();
    let server = project.started(vec![]).await;
    server.shutdown().await.unwrap();

    assert!(server.start().await.is_err());
    assert_eq!(server.status().state, SchedulerState::Shutdown);
}
