// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timer firing, re-arming, and enable/disable

use super::*;
use crate::EngineError;
use ag_core::{AgentTimer, Interval, INIT_SCRIPT};

#[tokio::test(start_paused = true)]
async fn timer_fires_every_interval() {
    let ctx = setup();
    ctx.register(counter_definition("alice", 50));
    let counter = ctx.instantiate("counter", "counter-1").await;

    sleep_ms(360).await;

    let status = ctx.runtime.timer_status(&counter, "timer-1").unwrap();
    assert_eq!(status.hits, 7);
    assert_eq!(memory_int(&counter, "count"), 7);
    assert_eq!(counter.outputs().get("field1"), Some(&json!(7)));
    assert_eq!(counter.state_history().len(), 8);
    assert_eq!(counter.output_history().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn disabled_timer_stops_and_resumes_when_enabled() {
    let ctx = setup();
    ctx.register(counter_definition("alice", 50));
    let counter = ctx.instantiate("counter", "counter-1").await;

    sleep_ms(120).await;
    ctx.runtime.disable_timer(&counter, "timer-1").unwrap();
    let status = ctx.runtime.timer_status(&counter, "timer-1").unwrap();
    assert_eq!(status.hits, 2);
    assert!(!status.enabled);
    assert_eq!(status.next_due_ms, None);

    sleep_ms(200).await;
    assert_eq!(ctx.runtime.timer_status(&counter, "timer-1").unwrap().hits, 2);

    ctx.runtime.enable_timer(&counter, "timer-1").await.unwrap();
    sleep_ms(60).await;
    assert_eq!(ctx.runtime.timer_status(&counter, "timer-1").unwrap().hits, 3);
}

#[tokio::test(start_paused = true)]
async fn disabled_instance_does_not_fire() {
    let ctx = setup();
    ctx.register(counter_definition("alice", 50));
    let counter = ctx.instantiate("counter", "counter-1").await;

    sleep_ms(70).await;
    ctx.runtime.disable(&counter);
    sleep_ms(200).await;
    assert_eq!(memory_int(&counter, "count"), 1);

    ctx.runtime.enable(&counter).await.unwrap();
    sleep_ms(110).await;
    assert_eq!(memory_int(&counter, "count"), 3);
}

#[tokio::test(start_paused = true)]
async fn timer_disabled_in_definition_stays_idle() {
    let ctx = setup();
    ctx.register(
        AgentDefinition::new("alice", "quiet").timer(AgentTimer::new("t", 10, TICK).enabled(false)),
    );
    let quiet = ctx.instantiate("quiet", "quiet-1").await;

    sleep_ms(100).await;
    assert_eq!(ctx.scripts.call_count(TICK), 0);
    assert!(!ctx.runtime.timer_status(&quiet, "t").unwrap().enabled);
}

#[tokio::test(start_paused = true)]
async fn expression_interval_is_evaluated_when_armed() {
    let ctx = setup();
    ctx.scripts.returns("rate", 30);
    let fast = AgentTimer::new("fast", Interval::Expression("rate".into()), "noop");
    ctx.register(counter_definition("alice", 50).timer(fast));
    ctx.scripts.returns("noop", json!(null));
    let counter = ctx.instantiate("counter", "counter-1").await;

    sleep_ms(100).await;
    assert_eq!(ctx.runtime.timer_status(&counter, "fast").unwrap().hits, 3);
    assert_eq!(ctx.scripts.call_count("rate"), 1);
}

#[tokio::test(start_paused = true)]
async fn bad_interval_leaves_timer_disarmed() {
    let ctx = setup();
    ctx.scripts.returns("rate", "soon");
    let timer = AgentTimer::new("t", Interval::Expression("rate".into()), TICK);
    ctx.register(AgentDefinition::new("alice", "odd").timer(timer));
    let odd = ctx.instantiate("odd", "odd-1").await;

    sleep_ms(100).await;
    let status = ctx.runtime.timer_status(&odd, "t").unwrap();
    assert_eq!(status.hits, 0);
    assert_eq!(status.next_due_ms, None);
    let exceptions = odd.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].script, "timer:t:interval");
}

#[tokio::test(start_paused = true)]
async fn oversized_interval_is_rejected_without_arming() {
    let ctx = setup();
    ctx.scripts.returns("rate", 1e300);
    let timer = AgentTimer::new("t", Interval::Expression("rate".into()), TICK);
    ctx.register(AgentDefinition::new("alice", "odd").timer(timer));
    let odd = ctx.instantiate("odd", "odd-1").await;

    sleep_ms(100).await;
    let status = ctx.runtime.timer_status(&odd, "t").unwrap();
    assert_eq!(status.next_due_ms, None);
    assert_eq!(odd.exceptions().len(), 1);
    assert_eq!(ctx.runtime.scheduler().pending(), 0);
    assert!(ctx.runtime.scheduler().wait_until_done(ms(10)).await);
}

#[tokio::test(start_paused = true)]
async fn interval_expression_waits_for_running_script() {
    let ctx = setup();
    ctx.scripts.on_slow("slow", ms(200), |_, _| Ok(json!(null)));
    ctx.scripts.on_slow("rate", ms(20), |_, _| Ok(json!(30)));
    ctx.scripts.returns("noop", json!(null));
    let late = AgentTimer::new("late", Interval::Expression("rate".into()), "noop").enabled(false);
    ctx.register(
        AgentDefinition::new("alice", "busy").timer(AgentTimer::new("t", 50, "slow")).timer(late),
    );
    let busy = ctx.instantiate("busy", "busy-1").await;

    // `slow` runs from 50 to 250; arming `late` waits for it.
    sleep_ms(60).await;
    ctx.runtime.enable_timer(&busy, "late").await.unwrap();

    assert!(!ctx.scripts.saw_overlap());
    assert!(ctx.runtime.timer_status(&busy, "late").unwrap().next_due_ms.is_some());
    let rate = ctx.scripts.calls().into_iter().find(|c| c.source == "rate").unwrap();
    let slow = ctx.scripts.calls().into_iter().find(|c| c.source == "slow").unwrap();
    assert!(rate.started >= slow.finished);
}

#[tokio::test(start_paused = true)]
async fn firing_on_busy_agent_is_skipped_and_rearmed() {
    let ctx = setup();
    ctx.register(counter_definition("alice", 50));
    let counter = ctx.instantiate("counter", "counter-1").await;

    // Firings at 50, 100, and 150 find the agent busy.
    let busy = counter.claim().await;
    sleep_ms(175).await;
    drop(busy);
    assert_eq!(ctx.runtime.timer_status(&counter, "timer-1").unwrap().hits, 0);
    assert_eq!(ctx.runtime.scheduler().skipped_count(), 3);

    sleep_ms(85).await;
    assert_eq!(ctx.runtime.timer_status(&counter, "timer-1").unwrap().hits, 2);
}

#[tokio::test(start_paused = true)]
async fn slow_script_loses_ticks_instead_of_queueing() {
    let ctx = setup();
    ctx.scripts.on_slow("slow", ms(120), |_, _| Ok(json!(null)));
    ctx.register(AgentDefinition::new("alice", "slow").timer(AgentTimer::new("t", 50, "slow")));
    let slow = ctx.instantiate("slow", "slow-1").await;

    // Runs start at 50, 170, 290, and 410; the last is still running.
    sleep_ms(490).await;

    assert_eq!(ctx.runtime.timer_status(&slow, "t").unwrap().hits, 3);
    assert!(ctx.runtime.scheduler().pending() <= 1);
    assert!(!ctx.scripts.saw_overlap());
}

#[tokio::test(start_paused = true)]
async fn unknown_timer_is_an_error() {
    let ctx = setup();
    ctx.register(counter_definition("alice", 50));
    let counter = ctx.instantiate("counter", "counter-1").await;

    let status = ctx.runtime.timer_status(&counter, "nope");
    assert!(matches!(status, Err(EngineError::UnknownTimer { .. })));
    let disabled = ctx.runtime.disable_timer(&counter, "nope");
    assert!(matches!(disabled, Err(EngineError::UnknownTimer { .. })));
    assert!(matches!(
        ctx.runtime.enable_timer(&counter, "nope").await,
        Err(EngineError::UnknownTimer { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn init_runs_once_before_timers() {
    let ctx = setup();
    ctx.scripts.on("setup", |ctx, _| {
        ctx.set(ag_core::Category::Memory, "count", 100)?;
        Ok(json!(null))
    });
    ctx.register(counter_definition("alice", 50).script(INIT_SCRIPT, "setup"));
    let counter = ctx.instantiate("counter", "counter-1").await;

    sleep_ms(60).await;
    assert_eq!(memory_int(&counter, "count"), 101);
    assert!(counter.is_initialized());

    ctx.runtime.disable(&counter);
    ctx.runtime.enable(&counter).await.unwrap();
    sleep_ms(10).await;
    assert_eq!(ctx.scripts.call_count("setup"), 1);
}
