// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script execution and history recording.

use super::Runtime;
use crate::error::EngineError;
use crate::instance::AgentInstance;
use crate::script::{ScriptError, ScriptRunner};
use ag_core::{Clock, ExceptionRecord, ScriptRun, ScriptStatus, Value};
use std::sync::Arc;

impl<R: ScriptRunner, C: Clock> Runtime<R, C> {
    /// Run a named script of the instance's definition with `args`.
    ///
    /// Waits for the instance's busy lock, so it never overlaps a scheduled
    /// activity of the same instance. Script failures are reported in the
    /// returned [`ScriptRun`], not as an error.
    pub async fn run_script(
        &self,
        instance: &Arc<AgentInstance>,
        name: &str,
        args: &[Value],
    ) -> Result<ScriptRun, EngineError> {
        let definition = instance.definition();
        let script = definition.find_script(name).ok_or_else(|| EngineError::UnknownScript {
            definition: definition.name.clone(),
            script: name.to_string(),
        })?;
        let _busy = instance.claim().await;
        Ok(self.execute(instance, name, &script.source, args).await)
    }

    /// Run a named script if the definition has one. The caller holds the busy lock.
    pub(super) async fn run_named(
        &self,
        instance: &Arc<AgentInstance>,
        name: &str,
    ) -> Option<ScriptRun> {
        let script = instance.definition().find_script(name)?;
        Some(self.execute(instance, name, &script.source, &[]).await)
    }

    /// Run `source` against the instance's tables and record the result.
    ///
    /// Memory and output writes are kept even when the script fails part way.
    /// Every run appends a state snapshot; changed outputs also append an
    /// output record and are pushed to dependents.
    pub(super) async fn execute(
        &self,
        instance: &Arc<AgentInstance>,
        label: &str,
        source: &str,
        args: &[Value],
    ) -> ScriptRun {
        let mut ctx = instance.script_context();
        let started_at_ms = self.clock.epoch_ms();
        let result = self.runner.evaluate(source, &mut ctx, args).await;
        let finished_at_ms = self.clock.epoch_ms();

        let run = match &result {
            Ok(value) => ScriptRun {
                script: label.to_string(),
                status: ScriptStatus::Ok,
                started_at_ms,
                finished_at_ms,
                return_value: value.clone(),
                error: None,
            },
            Err(e) => ScriptRun {
                script: label.to_string(),
                status: ScriptStatus::Failed,
                started_at_ms,
                finished_at_ms,
                return_value: Value::Null,
                error: Some(e.to_string()),
            },
        };

        let (memory, outputs) = ctx.into_tables();
        let limit = self.config.exception_history_limit;
        let changed = instance.with_state_mut(|s| {
            s.memory = memory;
            s.outputs = outputs;
            s.last_run = Some(run.clone());
            if let Err(e) = &result {
                let exception = ExceptionRecord {
                    time_ms: finished_at_ms,
                    script: label.to_string(),
                    message: e.to_string(),
                };
                s.history.record_exception(exception, limit);
            }
            s.history.record(&s.parameters, &s.memory, &s.outputs, finished_at_ms)
        });

        match &result {
            Ok(_) => {
                tracing::debug!(instance = %instance.label(), script = label, changed, "script ran")
            }
            Err(e) => {
                tracing::warn!(
                    instance = %instance.label(),
                    script = label,
                    error = %e,
                    "script failed",
                )
            }
        }
        if changed {
            self.propagate_outputs(instance);
        }
        run
    }

    /// Evaluate an expression against a copy of the instance's tables.
    ///
    /// Writes made during evaluation are discarded. Failures are recorded as
    /// exceptions.
    pub(super) async fn evaluate_expression(
        &self,
        instance: &Arc<AgentInstance>,
        label: &str,
        source: &str,
    ) -> Result<Value, ScriptError> {
        let mut ctx = instance.script_context();
        let result = self.runner.evaluate(source, &mut ctx, &[]).await;
        if let Err(e) = &result {
            self.record_exception(instance, label, &e.to_string());
        }
        result
    }

    pub(super) fn record_exception(&self, instance: &AgentInstance, label: &str, message: &str) {
        tracing::warn!(
            instance = %instance.label(),
            script = label,
            error = message,
            "expression failed",
        );
        let exception = ExceptionRecord {
            time_ms: self.clock.epoch_ms(),
            script: label.to_string(),
            message: message.to_string(),
        };
        let limit = self.config.exception_history_limit;
        instance.with_state_mut(|s| s.history.record_exception(exception, limit));
    }
}
