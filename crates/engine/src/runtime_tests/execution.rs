// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script runs, history, and snapshot restore

use super::*;
use crate::EngineError;
use ag_core::{Category, FieldDecl, FieldType, ScriptStatus};

fn scripted_definition() -> AgentDefinition {
    AgentDefinition::new("alice", "scripted")
        .memory_field(FieldDecl::new("total", FieldType::Int))
        .output(FieldDecl::new("last", FieldType::Int))
        .script("add", "add")
        .script("remember", "remember")
        .script("broken", "broken")
}

fn setup_scripted(config: RuntimeConfig) -> TestContext {
    let ctx = setup_with(config);
    ctx.scripts.on("add", |ctx, args| {
        let by = args.first().and_then(|v| v.as_i64()).unwrap_or(1);
        let total = increment(ctx, Category::Memory, "total", by)?;
        ctx.set(Category::Outputs, "last", total)?;
        Ok(json!(total))
    });
    ctx.scripts.on("remember", |ctx, _| {
        increment(ctx, Category::Memory, "total", 1)?;
        Ok(json!(null))
    });
    ctx.scripts.on("broken", |ctx, _| {
        increment(ctx, Category::Memory, "total", 1)?;
        Err(crate::ScriptError::Raised("broken on purpose".into()))
    });
    ctx.register(scripted_definition());
    ctx
}

#[tokio::test(start_paused = true)]
async fn creation_snapshot_is_sequence_zero() {
    let ctx = setup_scripted(RuntimeConfig::default());
    let inst = ctx.instantiate("scripted", "s-1").await;

    let states = inst.state_history();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].seq, 0);
    assert_eq!(states[0].memory.get("total"), Some(&json!(0)));
    assert_eq!(inst.output_history()[0].seq, 0);
}

#[tokio::test(start_paused = true)]
async fn run_script_passes_args_and_records_history() {
    let ctx = setup_scripted(RuntimeConfig::default());
    let inst = ctx.instantiate("scripted", "s-1").await;

    let run = ctx.runtime.run_script(&inst, "add", &[json!(5)]).await.unwrap();
    assert_eq!(run.status, ScriptStatus::Ok);
    assert_eq!(run.return_value, json!(5));
    assert_eq!(inst.last_run(), Some(run));

    let states = inst.state_history();
    assert_eq!(states.len(), 2);
    assert_eq!(states[1].seq, 1);
    assert_eq!(states[1].memory.get("total"), Some(&json!(5)));
    let outputs = inst.output_history();
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[1].seq, 1);
}

#[tokio::test(start_paused = true)]
async fn unchanged_outputs_append_state_only() {
    let ctx = setup_scripted(RuntimeConfig::default());
    let inst = ctx.instantiate("scripted", "s-1").await;

    ctx.runtime.run_script(&inst, "remember", &[]).await.unwrap();
    ctx.runtime.run_script(&inst, "remember", &[]).await.unwrap();

    assert_eq!(inst.state_history().len(), 3);
    assert_eq!(inst.output_history().len(), 1);
    let seqs: Vec<u64> = inst.state_history().iter().map(|s| s.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn failed_script_is_recorded_not_raised() {
    let ctx = setup_scripted(RuntimeConfig::default());
    let inst = ctx.instantiate("scripted", "s-1").await;

    let run = ctx.runtime.run_script(&inst, "broken", &[]).await.unwrap();
    assert_eq!(run.status, ScriptStatus::Failed);
    assert_eq!(run.error.as_deref(), Some("broken on purpose"));

    assert_eq!(memory_int(&inst, "total"), 1);
    assert_eq!(inst.state_history().len(), 2);
    let exceptions = inst.exceptions();
    assert_eq!(exceptions.len(), 1);
    assert_eq!(exceptions[0].script, "broken");

    let run = ctx.runtime.run_script(&inst, "add", &[]).await.unwrap();
    assert_eq!(run.status, ScriptStatus::Ok);
}

#[tokio::test(start_paused = true)]
async fn exception_history_is_bounded() {
    let ctx = setup_scripted(RuntimeConfig { exception_history_limit: 2 });
    let inst = ctx.instantiate("scripted", "s-1").await;

    for _ in 0..5 {
        ctx.runtime.run_script(&inst, "broken", &[]).await.unwrap();
    }
    assert_eq!(inst.exceptions().len(), 2);
    assert_eq!(memory_int(&inst, "total"), 5);
}

#[tokio::test(start_paused = true)]
async fn unknown_script_is_an_error() {
    let ctx = setup_scripted(RuntimeConfig::default());
    let inst = ctx.instantiate("scripted", "s-1").await;

    let err = ctx.runtime.run_script(&inst, "missing", &[]).await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownScript { ref script, .. } if script == "missing"));
    assert_eq!(inst.state_history().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_on_one_instance_are_serialized() {
    let ctx = setup_scripted(RuntimeConfig::default());
    ctx.scripts.on_slow("remember", ms(100), |ctx, _| {
        increment(ctx, Category::Memory, "total", 1)?;
        Ok(json!(null))
    });
    let inst = ctx.instantiate("scripted", "s-1").await;

    let start = tokio::time::Instant::now();
    let (a, b) = tokio::join!(
        ctx.runtime.run_script(&inst, "remember", &[]),
        ctx.runtime.run_script(&inst, "remember", &[]),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(start.elapsed(), ms(200));
    assert_eq!(memory_int(&inst, "total"), 2);
    assert!(!ctx.scripts.saw_overlap());
}

#[tokio::test(start_paused = true)]
async fn different_instances_run_concurrently() {
    let ctx = setup_scripted(RuntimeConfig::default());
    ctx.scripts.on_slow("remember", ms(100), |_, _| Ok(json!(null)));
    let a = ctx.instantiate("scripted", "s-1").await;
    let b = ctx.instantiate("scripted", "s-2").await;

    let start = tokio::time::Instant::now();
    let (ra, rb) = tokio::join!(
        ctx.runtime.run_script(&a, "remember", &[]),
        ctx.runtime.run_script(&b, "remember", &[])
    );
    ra.unwrap();
    rb.unwrap();
    assert_eq!(start.elapsed(), ms(100));
}

#[tokio::test(start_paused = true)]
async fn snapshot_restores_into_fresh_runtime() {
    let ctx = setup_scripted(RuntimeConfig::default());
    ctx.register(counter_definition("alice", 50));
    ctx.register(follower_definition("alice", 0));
    let follower = ctx.instantiate("follower", "follower-1").await;
    sleep_ms(160).await;

    let state = ctx.runtime.snapshot();
    assert_eq!(state.users.len(), 1);
    assert_eq!(state.definitions.len(), 3);
    assert_eq!(state.instances.len(), 2);

    let fresh = setup_with(RuntimeConfig::default());
    let mut restored_state = state.clone();
    restored_state.users.clear();
    fresh.runtime.restore(restored_state).unwrap();

    let restored = fresh.runtime.instance("alice", "follower-1").unwrap();
    assert_eq!(restored.id(), follower.id());
    assert_eq!(restored.output_history(), follower.output_history());
    assert_eq!(restored.state_history(), follower.state_history());
    assert_eq!(restored.inputs(), follower.inputs());

    let counter = fresh.runtime.instance("alice", "counter-1").unwrap();
    assert!(counter.is_auto_created());
    let dependents = fresh.runtime.dependent_instances(&counter);
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].id(), follower.id());
    assert_eq!(fresh.runtime.timer_status(&counter, "timer-1").unwrap().hits, 3);
}

#[tokio::test(start_paused = true)]
async fn restored_instances_resume_without_rerunning_init() {
    let ctx = setup();
    ctx.scripts.returns("setup", json!(null));
    ctx.register(counter_definition("alice", 50).script(ag_core::INIT_SCRIPT, "setup"));
    ctx.instantiate("counter", "counter-1").await;
    sleep_ms(60).await;
    let state = ctx.runtime.snapshot();

    let fresh = setup_with(RuntimeConfig::default());
    fresh.scripts.returns("setup", json!(null));
    let mut state = state;
    state.users.clear();
    fresh.runtime.restore(state).unwrap();
    fresh.runtime.resume_instances().await;
    sleep_ms(110).await;

    let counter = fresh.runtime.instance("alice", "counter-1").unwrap();
    assert_eq!(fresh.scripts.call_count("setup"), 0);
    assert_eq!(memory_int(&counter, "count"), 3);
    assert_eq!(fresh.runtime.timer_status(&counter, "timer-1").unwrap().hits, 3);
}
