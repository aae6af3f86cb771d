// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduling policy specs: busy-skip, serialization, pause and resume.

use crate::prelude::*;

const SLOW: &str = "slow";

fn slow_agent(project: &Project, run_ms: u64) -> AgentDefinition {
    project.scripts.on_slow(SLOW, Duration::from_millis(run_ms), |ctx, _| {
        increment(ctx, Category::Memory, "count", 1)?;
        Ok(Value::Null)
    });
    AgentDefinition::new(USER, "slow")
        .memory_field(FieldDecl::new("count", FieldType::Int))
        .timer(AgentTimer::new("timer-1", 50, SLOW))
        .script("work", SLOW)
}

#[tokio::test(start_paused = true)]
async fn slow_script_drops_ticks_and_queue_stays_bounded() {
    let project = Project::new();
    let server = project.started(vec![slow_agent(&project, 130)]).await;
    let agent = instantiate(&server, "slow", "slow-1").await;

    for _ in 0..20 {
        sleep_ms(25).await;
        assert!(server.status().pending <= 1, "queue grew: {:?}", server.status());
    }

    // 500ms at 50ms would be 10 ticks.
    let settled = hits(&server, &agent, "timer-1");
    assert!(settled < 10, "hits = {settled}");
    assert!(settled >= 3, "hits = {settled}");
    assert!(!project.scripts.saw_overlap());
}

#[tokio::test(start_paused = true)]
async fn manual_run_waits_for_timer_run() {
    let project = Project::new();
    let server = project.started(vec![slow_agent(&project, 130)]).await;
    let agent = instantiate(&server, "slow", "slow-1").await;

    sleep_ms(60).await;
    assert!(agent.is_busy());
    let run = server.runtime().run_script(&agent, "work", &[]).await.unwrap();

    assert_eq!(run.status, ag_core::ScriptStatus::Ok);
    assert!(run.started_at_ms <= run.finished_at_ms);
    sleep_ms(400).await;
    assert!(!project.scripts.saw_overlap());
}

#[tokio::test(start_paused = true)]
async fn distinct_instances_run_concurrently() {
    let project = Project::new();
    let server = project.started(vec![slow_agent(&project, 130)]).await;
    let first = instantiate(&server, "slow", "slow-1").await;
    let second = instantiate(&server, "slow", "slow-2").await;

    sleep_ms(100).await;
    assert_eq!(server.status().in_flight, 2);
    sleep_ms(100).await;

    let calls = project.scripts.calls();
    let a = calls.iter().find(|c| &c.instance == first.id()).unwrap();
    let b = calls.iter().find(|c| &c.instance == second.id()).unwrap();
    assert!(a.started < b.finished && b.started < a.finished);
}

#[tokio::test(start_paused = true)]
async fn activities_added_while_paused_wait_for_resume() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    server.pause();

    let counters = vec![
        instantiate(&server, "counter", "counter-1").await,
        instantiate(&server, "counter", "counter-2").await,
        instantiate(&server, "counter", "counter-3").await,
    ];
    sleep_ms(200).await;

    let status = server.status();
    assert_eq!(status.state, SchedulerState::Paused);
    assert_eq!(status.pending, 3);
    assert_eq!(status.completed, 0);
    assert!(counters.iter().all(|c| hits(&server, c, "timer-1") == 0));

    server.resume();
    sleep_ms(10).await;

    let status = server.status();
    assert_eq!(status.completed, 3);
    assert_eq!(status.pending, 3);
    assert!(counters.iter().all(|c| hits(&server, c, "timer-1") == 1));
}

#[tokio::test(start_paused = true)]
async fn resume_does_not_replay_missed_ticks() {
    let project = Project::new();
    let server = project.started(vec![counter_definition(USER, 50)]).await;
    let counter = instantiate(&server, "counter", "counter-1").await;

    sleep_ms(120).await;
    server.pause();
    sleep_ms(1_000).await;
    server.resume();
    sleep_ms(10).await;

    // Two before the pause, one on resume, none for the paused second.
    assert_eq!(hits(&server, &counter, "timer-1"), 3);
}
