// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles and fixtures for engine consumers.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::script::{ScriptContext, ScriptError, ScriptRunner};
use ag_core::{
    AgentCondition, AgentDefinition, AgentTimer, Category, DataSourceReference, FieldDecl,
    FieldType, InstanceId, Interval, Value, INPUTS_CHANGED_SCRIPT,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

type ScriptFn =
    Arc<dyn Fn(&mut ScriptContext, &[Value]) -> Result<Value, ScriptError> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    delay: Duration,
    body: ScriptFn,
}

/// One evaluation seen by a [`ScriptTable`].
#[derive(Debug, Clone)]
pub struct ScriptCall {
    pub source: String,
    pub instance: InstanceId,
    pub started: Instant,
    pub finished: Instant,
}

/// Script runner backed by closures keyed on exact source text.
///
/// Clones share the table and the call log.
#[derive(Clone, Default)]
pub struct ScriptTable {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    calls: Arc<Mutex<Vec<ScriptCall>>>,
}

impl ScriptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `body` for `source`.
    pub fn on<F>(&self, source: &str, body: F) -> &Self
    where
        F: Fn(&mut ScriptContext, &[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        self.on_slow(source, Duration::ZERO, body)
    }

    /// Register `body` for `source`, waiting `delay` before running it.
    pub fn on_slow<F>(&self, source: &str, delay: Duration, body: F) -> &Self
    where
        F: Fn(&mut ScriptContext, &[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        self.entries.lock().insert(source.to_string(), Entry { delay, body: Arc::new(body) });
        self
    }

    /// Register a constant result for `source`, e.g. a condition or interval.
    pub fn returns(&self, source: &str, value: impl Into<Value>) -> &Self {
        let value = value.into();
        self.on(source, move |_, _| Ok(value.clone()))
    }

    /// Register `source` to raise `message`.
    pub fn fails(&self, source: &str, message: &str) -> &Self {
        let message = message.to_string();
        self.on(source, move |_, _| Err(ScriptError::Raised(message.clone())))
    }

    pub fn calls(&self) -> Vec<ScriptCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, source: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.source == source).count()
    }

    /// Whether any two calls on the same instance overlapped in time.
    pub fn saw_overlap(&self) -> bool {
        let calls = self.calls.lock();
        calls.iter().enumerate().any(|(i, a)| {
            calls[i + 1..]
                .iter()
                .any(|b| {
                    a.instance == b.instance && a.started < b.finished && b.started < a.finished
                })
        })
    }
}

#[async_trait]
impl ScriptRunner for ScriptTable {
    async fn evaluate(
        &self,
        source: &str,
        ctx: &mut ScriptContext,
        args: &[Value],
    ) -> Result<Value, ScriptError> {
        let entry = self.entries.lock().get(source).cloned();
        let Some(entry) = entry else {
            return Err(ScriptError::Evaluation(format!("no script registered for '{source}'")));
        };
        let started = Instant::now();
        if !entry.delay.is_zero() {
            ctx.wait(entry.delay.as_millis() as u64).await;
        }
        let result = (entry.body)(ctx, args);
        self.calls.lock().push(ScriptCall {
            source: source.to_string(),
            instance: ctx.instance_id().clone(),
            started,
            finished: Instant::now(),
        });
        result
    }
}

/// Add `by` to an integer symbol.
pub fn increment(
    ctx: &mut ScriptContext,
    category: Category,
    name: &str,
    by: i64,
) -> Result<i64, ScriptError> {
    let next = ctx.get(category, name).and_then(Value::as_i64).unwrap_or(0) + by;
    ctx.set(category, name, next)?;
    Ok(next)
}

// ── Fixtures ───────────────────────────────────────────────────────────

pub const TICK: &str = "tick";
pub const POLL: &str = "poll";
pub const FIRE: &str = "fire";
pub const WATCH: &str = "watch";

/// `count` memory mirrored to `field1`, bumped by timer `timer-1`.
pub fn counter_definition(user: &str, interval_ms: u64) -> AgentDefinition {
    AgentDefinition::new(user, "counter")
        .memory_field(FieldDecl::new("count", FieldType::Int))
        .output(FieldDecl::new("field1", FieldType::Int))
        .timer(AgentTimer::new("timer-1", interval_ms, TICK))
}

/// Polls `POLL` every `interval_ms`, running `FIRE` while it is true.
pub fn watcher_definition(user: &str, interval_ms: u64) -> AgentDefinition {
    AgentDefinition::new(user, "watcher")
        .memory_field(FieldDecl::new("fired", FieldType::Int))
        .condition(AgentCondition::new("cond-1", POLL, Interval::Millis(interval_ms), FIRE))
}

/// Consumes `counter` as input `src`, copying it to `seen` on change.
pub fn follower_definition(user: &str, trigger_interval_ms: u64) -> AgentDefinition {
    AgentDefinition::new(user, "follower")
        .memory_field(FieldDecl::new("runs", FieldType::Int))
        .output(FieldDecl::new("seen", FieldType::Any))
        .input(DataSourceReference::new("src", "counter"))
        .script(INPUTS_CHANGED_SCRIPT, WATCH)
        .trigger_interval_ms(trigger_interval_ms)
}

/// Register counting bodies for the fixture scripts.
///
/// `TICK` increments `count` and copies it to `field1`; `FIRE` increments
/// `fired`; `WATCH` increments `runs` and copies input `src` to `seen`.
pub fn fixture_scripts(table: &ScriptTable) {
    table.on(TICK, |ctx, _| {
        let count = increment(ctx, Category::Memory, "count", 1)?;
        ctx.set(Category::Outputs, "field1", count)?;
        Ok(Value::Null)
    });
    table.on(FIRE, |ctx, _| {
        increment(ctx, Category::Memory, "fired", 1)?;
        Ok(Value::Null)
    });
    table.on(WATCH, |ctx, _| {
        increment(ctx, Category::Memory, "runs", 1)?;
        let seen = ctx.get(Category::Inputs, "src").cloned().unwrap_or(Value::Null);
        ctx.set(Category::Outputs, "seen", seen)?;
        Ok(Value::Null)
    });
}

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
